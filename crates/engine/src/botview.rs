//! Pixel rendering of an entity's local view.
//!
//! A view is a row-major square of single-character cell codes. The renderer
//! centres it on a fixed canvas so that views of different radii line up.

use crate::error::MalformedView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

const BACKGROUND: Rgb = Rgb(0, 0, 0);
const VISIBLE: Rgb = Rgb(103, 100, 100);

/// Largest accepted cell, in pixels.
pub const MAX_CELL_SIZE: u32 = 64;
/// Largest canvas side, in pixels.
pub const MAX_CANVAS_SIDE: u32 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Occluded,
    Wall,
    GoodPlant,
    BadPlant,
    GoodBeast,
    BadBeast,
    EnemyMaster,
    EnemySlave,
    OwnSlave,
    OwnMaster,
}

impl Cell {
    pub fn from_code(c: char) -> Self {
        match c {
            '?' => Cell::Occluded,
            'W' => Cell::Wall,
            'P' => Cell::GoodPlant,
            'p' => Cell::BadPlant,
            'B' => Cell::GoodBeast,
            'b' => Cell::BadBeast,
            'm' => Cell::EnemyMaster,
            's' => Cell::EnemySlave,
            'S' => Cell::OwnSlave,
            'M' => Cell::OwnMaster,
            _ => Cell::Empty,
        }
    }
}

/// An RGB image, 3 bytes per pixel, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, fill: Rgb) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 3);
        for _ in 0..count {
            pixels.extend_from_slice(&[fill.0, fill.1, fill.2]);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        Some(Rgb(self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    fn put(&mut self, x: i64, y: i64, color: Rgb) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let i = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels[i..i + 3].copy_from_slice(&[color.0, color.1, color.2]);
    }

    /// Fills a rectangle, clipped to the frame.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: u32, h: u32, color: Rgb) {
        for py in y..y + i64::from(h) {
            for px in x..x + i64::from(w) {
                self.put(px, py, color);
            }
        }
    }

    /// Fills every pixel whose centre lies within `radius` of (`cx`, `cy`).
    pub fn fill_disc(&mut self, cx: f64, cy: f64, radius: f64, color: Rgb) {
        let r2 = radius * radius;
        let (x0, x1) = ((cx - radius).floor() as i64, (cx + radius).ceil() as i64);
        let (y0, y1) = ((cy - radius).floor() as i64, (cy + radius).ceil() as i64);
        for py in y0..=y1 {
            for px in x0..=x1 {
                let dx = px as f64 + 0.5 - cx;
                let dy = py as f64 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.put(px, py, color);
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRenderer {
    cell_size: u32,
    max_view_size: u32,
}

impl Default for GridRenderer {
    fn default() -> Self {
        Self::new(7, 31)
    }
}

impl GridRenderer {
    /// Sizes are clamped so the canvas side never exceeds [`MAX_CANVAS_SIDE`].
    pub fn new(cell_size: u32, max_view_size: u32) -> Self {
        let cell_size = cell_size.clamp(1, MAX_CELL_SIZE);
        Self {
            cell_size,
            max_view_size: max_view_size.clamp(1, MAX_CANVAS_SIDE / cell_size),
        }
    }

    pub fn canvas_size(&self) -> u32 {
        self.max_view_size * self.cell_size
    }

    /// The cleared canvas with nothing painted on it.
    pub fn blank(&self) -> Frame {
        let side = self.canvas_size();
        Frame::new(side, side, BACKGROUND)
    }

    pub fn render(&self, view: Option<&str>) -> Result<Frame, MalformedView> {
        let mut frame = self.blank();
        let Some(view) = view else {
            return Ok(frame);
        };

        let cells: Vec<char> = view.chars().collect();
        let side = self.side_of(cells.len())?;
        let cell = self.cell_size;
        let offset = i64::from((self.max_view_size - side as u32) * cell / 2);
        let span = side as u32 * cell;
        frame.fill_rect(offset, offset, span, span, VISIBLE);

        for (i, &code) in cells.iter().enumerate() {
            let x = (i % side) as i64 * i64::from(cell) + offset;
            let y = (i / side) as i64 * i64::from(cell) + offset;
            self.paint(&mut frame, x, y, Cell::from_code(code));
        }
        Ok(frame)
    }

    fn side_of(&self, len: usize) -> Result<usize, MalformedView> {
        if len == 0 {
            return Err(MalformedView::Empty);
        }
        let side = (len as f64).sqrt().round() as usize;
        if side * side != len {
            return Err(MalformedView::NotSquare { len });
        }
        if side > self.max_view_size as usize {
            return Err(MalformedView::TooLarge {
                side,
                max: self.max_view_size as usize,
            });
        }
        Ok(side)
    }

    fn paint(&self, frame: &mut Frame, x: i64, y: i64, cell: Cell) {
        let s = self.cell_size;
        let layered = |frame: &mut Frame, back: Rgb, shade: Rgb, face: Rgb| {
            frame.fill_rect(x - 1, y - 1, s, s, back);
            frame.fill_rect(x + 1, y + 1, s, s, shade);
            frame.fill_rect(x, y, s, s, face);
        };
        let marker = |frame: &mut Frame, ring: Rgb| {
            let half = f64::from(s) / 2.0;
            frame.fill_disc(x as f64 + half, y as f64 + half, f64::from(s), ring);
        };

        match cell {
            Cell::Empty => {}
            Cell::Occluded => frame.fill_rect(x, y, s, s, Rgb(0, 0, 0)),
            Cell::Wall => {
                frame.fill_rect(x + 1, y + 1, s, s, Rgb(55, 55, 55));
                frame.fill_rect(x, y, s, s, Rgb(84, 80, 80));
            }
            Cell::GoodPlant => layered(frame, Rgb(0, 180, 0), Rgb(0, 120, 0), Rgb(0, 150, 0)),
            Cell::BadPlant => layered(
                frame,
                Rgb(120, 120, 0),
                Rgb(180, 180, 0),
                Rgb(150, 150, 0),
            ),
            Cell::GoodBeast => layered(frame, Rgb(0, 0, 180), Rgb(0, 0, 120), Rgb(0, 0, 150)),
            Cell::BadBeast => layered(frame, Rgb(180, 0, 0), Rgb(120, 0, 0), Rgb(150, 0, 0)),
            Cell::EnemyMaster => {
                marker(frame, Rgb(200, 0, 200));
                frame.fill_rect(x, y, s, s, Rgb(255, 0, 255));
            }
            Cell::EnemySlave => frame.fill_rect(x, y, s, s, Rgb(255, 0, 255)),
            Cell::OwnSlave => frame.fill_rect(x, y, s, s, Rgb(255, 255, 255)),
            Cell::OwnMaster => {
                marker(frame, Rgb(200, 200, 200));
                frame.fill_rect(x, y, s, s, Rgb(255, 255, 255));
            }
        }
    }
}
