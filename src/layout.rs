//! Page size and n-up layout calculations

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::Error;

/// Simple length type in millimeters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length(pub f64);

impl Length {
    /// Create a length from millimeters
    pub fn from_mm(mm: f64) -> Self {
        Length(mm)
    }

    /// Get the value in points (1/72 inch)
    pub fn pt(&self) -> f64 {
        self.0 * 72.0 / 25.4
    }
}

/// Page dimensions
#[derive(Debug, Clone, Copy)]
pub struct PageDimensions {
    pub width: Length,
    pub height: Length,
}

impl PageDimensions {
    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self {
            width: Length::from_mm(215.9),
            height: Length::from_mm(279.4),
        }
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self {
            width: Length::from_mm(210.0),
            height: Length::from_mm(297.0),
        }
    }

    /// Same sheet turned on its side
    pub fn landscape(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Width and height in whole points, as written into a MediaBox
    pub fn points(&self) -> (f32, f32) {
        (self.width.pt().round() as f32, self.height.pt().round() as f32)
    }
}

/// The one physical paper size a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperSize {
    #[default]
    A4,
    Letter,
}

impl PaperSize {
    pub fn dimensions(self) -> PageDimensions {
        match self {
            PaperSize::A4 => PageDimensions::a4(),
            PaperSize::Letter => PageDimensions::letter(),
        }
    }

    /// Paper name understood by LaTeX `geometry` and `pdfjam`
    pub fn latex_name(self) -> &'static str {
        match self {
            PaperSize::A4 => "a4paper",
            PaperSize::Letter => "letterpaper",
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaperSize::A4 => f.write_str("a4"),
            PaperSize::Letter => f.write_str("letter"),
        }
    }
}

/// Most columns or rows on one sheet, as far as pdfjam n-up is usable
pub const MAX_GRID_SIDE: u32 = 16;

/// Grid arrangement of source pages on one output sheet, written `CxR`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutFormat {
    pub cols: u32,
    pub rows: u32,
}

impl LayoutFormat {
    /// Source pages per output sheet
    pub fn cells(&self) -> u32 {
        self.cols.saturating_mul(self.rows)
    }
}

impl FromStr for LayoutFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::Config(format!("Unknown layout format '{}', expected e.g. \"2x1\"", s));

        let (cols, rows) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let cols: u32 = cols.trim().parse().map_err(|_| invalid())?;
        let rows: u32 = rows.trim().parse().map_err(|_| invalid())?;
        if cols == 0 || rows == 0 {
            return Err(invalid());
        }
        if cols > MAX_GRID_SIDE || rows > MAX_GRID_SIDE {
            return Err(Error::Config(format!(
                "Layout format '{}' is too large, columns and rows must each be at most {}",
                s.trim(),
                MAX_GRID_SIDE
            )));
        }

        Ok(LayoutFormat { cols, rows })
    }
}

impl fmt::Display for LayoutFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.cols, self.rows)
    }
}

/// Axis-aligned rectangle in points, origin bottom-left
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Cell rectangles of a sheet, in reading order (left to right, top to bottom)
pub fn grid_cells(sheet: (f32, f32), format: LayoutFormat) -> Vec<Rect> {
    let (sheet_w, sheet_h) = sheet;
    let cell_w = sheet_w / format.cols as f32;
    let cell_h = sheet_h / format.rows as f32;

    let mut cells = Vec::with_capacity(format.cells() as usize);
    for row in 0..format.rows {
        for col in 0..format.cols {
            cells.push(Rect {
                x: col as f32 * cell_w,
                y: sheet_h - (row + 1) as f32 * cell_h,
                width: cell_w,
                height: cell_h,
            });
        }
    }
    cells
}

/// Scale and offset that fit a `(w, h)` page centered into `cell`
pub fn fit_into(page: (f32, f32), cell: &Rect) -> (f32, f32, f32) {
    let (w, h) = page;
    let scale = (cell.width / w).min(cell.height / h);
    let x = cell.x + (cell.width - w * scale) / 2.0;
    let y = cell.y + (cell.height - h * scale) / 2.0;
    (scale, x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_conversions() {
        let len = Length::from_mm(25.4);
        assert!((len.pt() - 72.0).abs() < 0.01);
    }

    #[test]
    fn test_paper_points() {
        assert_eq!(PaperSize::A4.dimensions().points(), (595.0, 842.0));
        assert_eq!(PaperSize::Letter.dimensions().points(), (612.0, 792.0));
        assert_eq!(PaperSize::A4.dimensions().landscape().points(), (842.0, 595.0));
    }

    #[test]
    fn test_parse_layout_format() {
        let f: LayoutFormat = "2x1".parse().unwrap();
        assert_eq!(f, LayoutFormat { cols: 2, rows: 1 });
        assert_eq!(f.cells(), 2);
        assert_eq!(f.to_string(), "2x1");

        let f: LayoutFormat = " 4X2 ".parse().unwrap();
        assert_eq!(f.cells(), 8);
    }

    #[test]
    fn test_parse_layout_format_rejects_garbage() {
        for token in ["", "2", "2-up", "0x1", "1x0", "axb", "2x1x1", "17x1", "1x17", "70000x70000"] {
            assert!(token.parse::<LayoutFormat>().is_err(), "accepted {:?}", token);
        }
    }

    #[test]
    fn test_largest_layout_format() {
        let f: LayoutFormat = "16x16".parse().unwrap();
        assert_eq!(f.cells(), 256);
        assert_eq!(LayoutFormat { cols: u32::MAX, rows: 2 }.cells(), u32::MAX);
    }

    #[test]
    fn test_grid_cells_reading_order() {
        let cells = grid_cells((200.0, 100.0), LayoutFormat { cols: 2, rows: 2 });
        assert_eq!(cells.len(), 4);
        // First cell is top-left
        assert_eq!(cells[0], Rect { x: 0.0, y: 50.0, width: 100.0, height: 50.0 });
        // Last cell is bottom-right
        assert_eq!(cells[3], Rect { x: 100.0, y: 0.0, width: 100.0, height: 50.0 });
    }

    #[test]
    fn test_fit_into_centers() {
        let cell = Rect { x: 0.0, y: 0.0, width: 100.0, height: 100.0 };
        let (scale, x, y) = fit_into((200.0, 100.0), &cell);
        assert!((scale - 0.5).abs() < 1e-6);
        assert!((x - 0.0).abs() < 1e-6);
        assert!((y - 25.0).abs() < 1e-6);
    }
}
