//! Getting program images into memory: either by name from a ROM directory
//! (with an optional `.txt` description alongside) or straight from a file
//! the user points at.
//!
//! Fetches run on a worker thread so the refresh loop never blocks on disk;
//! results come back through `RomLoader::poll`.
use crate::error::HarnessError;
use log::{debug, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

const ROM_EXTENSION: &str = "ch8";
const DESCRIPTION_EXTENSION: &str = "txt";

/// a program image, exactly as it came off disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    pub name: String,
    pub bytes: Vec<u8>,
    pub description: Option<String>,
}

impl Rom {
    /// wrap raw bytes; an empty image is a failed fetch
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Rom, HarnessError> {
        let name = name.into();
        if bytes.is_empty() {
            return Err(HarnessError::RomEmpty { name });
        }
        Ok(Rom {
            name,
            bytes,
            description: None,
        })
    }

    /// local file ingestion: just the bytes, no description
    pub fn from_file(path: &Path) -> Result<Rom, HarnessError> {
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = fs::read(path).map_err(|source| HarnessError::RomFetch {
            name: name.clone(),
            source,
        })?;
        Rom::from_bytes(name, bytes)
    }
}

/// somewhere ROMs can be fetched from by name
pub trait RomSource {
    fn fetch(&self, name: &str) -> Result<Rom, HarnessError>;
}

/// a directory of `.ch8` files, with optional `.txt` notes of the same stem
pub struct RomDirectory {
    root: PathBuf,
}

impl RomDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        RomDirectory { root: root.into() }
    }

    fn rom_path(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if path.extension().is_some() {
            path
        } else {
            path.with_extension(ROM_EXTENSION)
        }
    }

    /// names of every ROM in the directory, sorted
    pub fn catalog(&self) -> Result<Vec<String>, HarnessError> {
        let entries = fs::read_dir(&self.root).map_err(|source| HarnessError::RomFetch {
            name: self.root.display().to_string(),
            source,
        })?;
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().map_or(false, |ext| ext == ROM_EXTENSION))
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .collect();
        names.sort();
        Ok(names)
    }
}

impl RomSource for RomDirectory {
    fn fetch(&self, name: &str) -> Result<Rom, HarnessError> {
        let path = self.rom_path(name);
        let bytes = fs::read(&path).map_err(|source| HarnessError::RomFetch {
            name: name.to_string(),
            source,
        })?;
        let mut rom = Rom::from_bytes(name, bytes)?;

        // the description is a nicety; never fail the load over it
        let notes = path.with_extension(DESCRIPTION_EXTENSION);
        rom.description = match fs::read_to_string(&notes) {
            Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!("couldn't read {}: {}", notes.display(), e);
                None
            }
        };
        Ok(rom)
    }
}

/// what to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RomRequest {
    /// by name, from the ROM source
    Named(String),
    /// a file the user picked
    Local(PathBuf),
}

impl RomRequest {
    pub fn label(&self) -> String {
        match self {
            RomRequest::Named(name) => name.clone(),
            RomRequest::Local(path) => path.display().to_string(),
        }
    }
}

/// identifies one load; only the most recent ticket gets to start a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(pub(crate) u64);

pub type LoadResult = (LoadTicket, Result<Rom, HarnessError>);

/// Fetches ROMs on a background thread.
pub struct RomLoader {
    requests: Option<Sender<(LoadTicket, RomRequest)>>,
    results: Receiver<LoadResult>,
    worker: Option<JoinHandle<()>>,
}

impl RomLoader {
    pub fn new(source: impl RomSource + Send + 'static) -> Result<Self, HarnessError> {
        let (request_tx, request_rx) = mpsc::channel::<(LoadTicket, RomRequest)>();
        let (result_tx, result_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("rom-loader".into())
            .spawn(move || {
                for (ticket, request) in request_rx {
                    debug!("fetching {:?}", request);
                    let result = match &request {
                        RomRequest::Named(name) => source.fetch(name),
                        RomRequest::Local(path) => Rom::from_file(path),
                    };
                    if result_tx.send((ticket, result)).is_err() {
                        break;
                    }
                }
            })?;
        Ok(RomLoader {
            requests: Some(request_tx),
            results: result_rx,
            worker: Some(worker),
        })
    }

    /// queue a fetch; the result turns up in a later `poll`
    pub fn submit(&self, ticket: LoadTicket, request: RomRequest) {
        let sent = self
            .requests
            .as_ref()
            .map_or(false, |tx| tx.send((ticket, request)).is_ok());
        if !sent {
            warn!("ROM loader has stopped; dropping request");
        }
    }

    /// every load that finished since the last call
    pub fn poll(&self) -> Vec<LoadResult> {
        let mut done = Vec::new();
        loop {
            match self.results.try_recv() {
                Ok(result) => done.push(result),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        done
    }

    /// block for the next finished load
    pub fn wait(&self, timeout: Duration) -> Option<LoadResult> {
        match self.results.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for RomLoader {
    fn drop(&mut self) {
        // closing the channel ends the worker's loop
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// ROMs held in memory, for tests and embedding
#[derive(Default)]
pub struct MemorySource {
    roms: Vec<Rom>,
}

impl MemorySource {
    pub fn new(roms: Vec<Rom>) -> Self {
        MemorySource { roms }
    }
}

impl RomSource for MemorySource {
    fn fetch(&self, name: &str) -> Result<Rom, HarnessError> {
        self.roms
            .iter()
            .find(|rom| rom.name == name)
            .cloned()
            .ok_or_else(|| HarnessError::RomFetch {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such ROM"),
            })
    }
}
