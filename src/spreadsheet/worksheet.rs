use crate::spreadsheet::cell::CellValue;
use tracing::warn;

/// Upper bound on the padded cells of one worksheet
const MAX_GRID_CELLS: usize = 1 << 22;

/// One worksheet as delivered by a reader, in row order.
/// Rows without any cell are left out. Cells missing from a kept row are
/// `CellValue::Empty` and every row is as wide as the widest one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

/// Collects sparse cells while a worksheet is parsed.
pub(crate) struct WorksheetBuilder {
    name: String,
    cells: Vec<(usize, usize, CellValue)>,
    col_upper_bound: Option<usize>,
}

impl WorksheetBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            cells: Vec::new(),
            col_upper_bound: None,
        }
    }

    /// Adds a cell. Blank values are dropped.
    pub(crate) fn push(&mut self, row: usize, col: usize, value: CellValue) {
        if value.is_blank() {
            return;
        }
        self.col_upper_bound = Some(self.col_upper_bound.map_or(col, |bound| bound.max(col)));
        self.cells.push((row, col, value));
    }

    /// Builds the rows that hold cells. When they would pad out past
    /// `MAX_GRID_CELLS`, the trailing columns are cut and their cells dropped.
    pub(crate) fn finish(mut self) -> Worksheet {
        let Some(col_upper_bound) = self.col_upper_bound else {
            return Worksheet { name: self.name, rows: Vec::new() };
        };
        self.cells.sort_by_key(|(row, col, _)| (*row, *col));
        let row_count = 1 + self.cells.windows(2).filter(|pair| pair[0].0 != pair[1].0).count();
        let width = padded_width(col_upper_bound + 1, row_count);
        let dropped = self.cells.iter().filter(|(_, col, _)| *col >= width).count();
        if dropped > 0 {
            warn!("Drop {} cells past column {} of sheet '{}'", dropped, width, self.name);
        }

        let mut rows = Vec::<Vec<CellValue>>::with_capacity(row_count);
        let mut current_row = None;
        for (row, col, value) in self.cells {
            if current_row != Some(row) {
                rows.push(vec![CellValue::Empty; width]);
                current_row = Some(row);
            }
            if let Some(last) = rows.last_mut().filter(|_| col < width) {
                last[col] = value;
            }
        }
        Worksheet { name: self.name, rows }
    }
}

/// Row width that keeps `rows` padded rows within `MAX_GRID_CELLS`
fn padded_width(columns: usize, rows: usize) -> usize {
    columns.min((MAX_GRID_CELLS / rows.max(1)).max(1))
}
