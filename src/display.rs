use crate::machine::Pixel;
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use log::warn;
use std::io;
use tui::backend::CrosstermBackend;
use tui::layout::Rect;
use tui::style::{Color, Style};
use tui::symbols::Marker;
use tui::widgets::canvas::{Canvas, Points};
use tui::widgets::{Block, Borders};
use tui::Terminal;

/// Display is where finished frames go. The harness only ever clears the
/// surface and paints the "on" pixels, so a variety of kinds of screen would
/// work.
pub trait Display {
    /// blank the whole surface
    fn clear_surface(&mut self);

    /// fill a `size` x `size` block whose top-left corner is at (col, row),
    /// in surface coordinates
    fn paint_block(&mut self, col: usize, row: usize, size: usize);

    /// show what has been painted since the last clear
    fn present(&mut self) -> Result<(), io::Error>;

    /// a line of text about what's running; not every screen has room
    fn caption(&mut self, _text: &str) {}
}

/// Paint one frame: clear, then one block per lit pixel, then present.
pub fn render_frame(
    display: &mut dyn Display,
    pixels: &[Pixel],
    width: usize,
    scale: usize,
) -> Result<(), io::Error> {
    display.clear_surface();
    for (i, px) in pixels.iter().enumerate() {
        if *px != 0 {
            display.paint_block((i % width) * scale, (i / width) * scale, scale);
        }
    }
    display.present()
}

/// size of the surface in terminal cells
struct Resolution {
    width: usize,
    height: usize,
}

impl Resolution {
    fn new(width: usize, height: usize, scale: usize) -> Self {
        Resolution {
            width: width * scale,
            height: height * scale,
        }
    }

    fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.width - 1) as f64]
    }

    fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.height - 1) as f64, 0.0]
    }

    /// the canvas points covering one block; canvas y grows upwards
    fn block_points(
        &self,
        col: usize,
        row: usize,
        size: usize,
    ) -> impl Iterator<Item = (f64, f64)> + '_ {
        (row..row + size)
            .filter(move |y| *y < self.height)
            .flat_map(move |y| {
                (col..col + size)
                    .filter(move |x| *x < self.width)
                    .map(move |x| (x as f64, -1.0 * y as f64))
            })
    }

    /// area including the border
    fn area(&self) -> Rect {
        Rect::new(0, 0, 2 + self.width as u16, 2 + self.height as u16)
    }
}

/// monochrome display in a terminal, rendered using TUI and crossterm
pub struct MonoTermDisplay {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    resolution: Resolution,
    points: Vec<(f64, f64)>,
    caption: String,
}

impl MonoTermDisplay {
    pub fn new(width: usize, height: usize, scale: usize) -> Result<MonoTermDisplay, io::Error> {
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(MonoTermDisplay {
            terminal,
            resolution: Resolution::new(width, height, scale.max(1)),
            points: Vec::new(),
            caption: "CHIP-8".to_string(),
        })
    }
}

impl Display for MonoTermDisplay {
    fn clear_surface(&mut self) {
        self.points.clear();
    }

    fn paint_block(&mut self, col: usize, row: usize, size: usize) {
        let points = self.resolution.block_points(col, row, size);
        self.points.extend(points);
    }

    fn present(&mut self) -> Result<(), io::Error> {
        let MonoTermDisplay {
            terminal,
            resolution,
            points,
            caption,
        } = self;
        terminal.draw(|f| {
            // a small terminal just loses the bottom-right of the picture
            let area = resolution.area().intersection(f.size());
            let canvas = Canvas::default()
                .block(
                    Block::default()
                        .title(caption.as_str())
                        .borders(Borders::ALL)
                        .style(Style::default().bg(Color::Black)),
                )
                .x_bounds(resolution.x_bounds())
                .y_bounds(resolution.y_bounds())
                .marker(Marker::Block)
                .paint(|ctx| {
                    ctx.draw(&Points {
                        coords: points.as_slice(),
                        color: Color::White,
                    });
                });
            f.render_widget(canvas, area);
        })?;
        Ok(())
    }

    fn caption(&mut self, text: &str) {
        self.caption = format!("CHIP-8: {}", text);
    }
}

impl Drop for MonoTermDisplay {
    fn drop(&mut self) {
        if let Err(e) = execute!(io::stdout(), Show, LeaveAlternateScreen) {
            warn!("couldn't restore the terminal: {}", e);
        }
    }
}

/// useful for testing non-display routines; remembers what it was asked to do
#[derive(Debug, Default)]
pub struct DummyDisplay {
    pub clears: usize,
    pub presents: usize,
    pub blocks: Vec<(usize, usize, usize)>,
    pub caption: String,
}

impl DummyDisplay {
    pub fn new() -> DummyDisplay {
        DummyDisplay::default()
    }
}

impl Display for DummyDisplay {
    fn clear_surface(&mut self) {
        self.clears += 1;
        self.blocks.clear();
    }

    fn paint_block(&mut self, col: usize, row: usize, size: usize) {
        self.blocks.push((col, row, size));
    }

    fn present(&mut self) -> Result<(), io::Error> {
        self.presents += 1;
        Ok(())
    }

    fn caption(&mut self, text: &str) {
        self.caption = text.to_string();
    }
}
