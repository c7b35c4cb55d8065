use crate::resolve::Highlight;

pub const MIN_COLUMN_WIDTH: usize = 15;
pub const MAX_COLUMN_WIDTH: usize = 70;
const WIDTH_PADDING: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CellStyle {
    #[default]
    Default,
    Highlight(Highlight),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Cell {
    pub value: Option<String>,
    pub style: CellStyle,
}

impl Cell {
    pub fn new(value: Option<String>, style: CellStyle) -> Self {
        Self { value, style }
    }

    fn is_blank(&self) -> bool {
        self.value.as_deref().is_none_or(str::is_empty)
    }
}

/// Rows are relative to the first data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellWrite {
    Single {
        row: usize,
        value: Option<String>,
        style: CellStyle,
    },
    Merged {
        first_row: usize,
        last_row: usize,
        value: String,
        style: CellStyle,
    },
}

impl CellWrite {
    pub fn first_row(&self) -> usize {
        match self {
            CellWrite::Single { row, .. } => *row,
            CellWrite::Merged { first_row, .. } => *first_row,
        }
    }

    pub fn span(&self) -> usize {
        match self {
            CellWrite::Single { .. } => 1,
            CellWrite::Merged {
                first_row,
                last_row,
                ..
            } => last_row - first_row + 1,
        }
    }
}

/// Collapse runs of equal, equally styled cells of one column into merged writes.
///
/// Blank cells are always written on their own and end any run.
pub fn plan_column(cells: &[Cell]) -> Vec<CellWrite> {
    let mut writes = Vec::new();
    let mut start = 0;

    while start < cells.len() {
        let cell = &cells[start];

        if cell.is_blank() {
            writes.push(CellWrite::Single {
                row: start,
                value: cell.value.clone(),
                style: cell.style,
            });
            start += 1;
            continue;
        }

        let mut end = start + 1;
        while end < cells.len() && cells[end] == *cell {
            end += 1;
        }

        let value = cell.value.clone().unwrap_or_default();
        if end - start > 1 {
            writes.push(CellWrite::Merged {
                first_row: start,
                last_row: end - 1,
                value,
                style: cell.style,
            });
        } else {
            writes.push(CellWrite::Single {
                row: start,
                value: Some(value),
                style: cell.style,
            });
        }
        start = end;
    }

    writes
}

/// Width in characters: longest of header and cells, padded, clamped to 15..=70.
pub fn column_width<'a, I>(header: &str, values: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    padded_width(header, values).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
}

/// Same as [`column_width`] without the lower bound.
pub fn capped_width<'a, I>(header: &str, values: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    padded_width(header, values).min(MAX_COLUMN_WIDTH)
}

fn padded_width<'a, I>(header: &str, values: I) -> usize
where
    I: IntoIterator<Item = &'a str>,
{
    let longest = values
        .into_iter()
        .map(|v| v.chars().count())
        .max()
        .unwrap_or(0);
    header.chars().count().max(longest) + WIDTH_PADDING
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(values: &[&str]) -> Vec<Cell> {
        values
            .iter()
            .map(|v| Cell::new(Some(v.to_string()), CellStyle::Default))
            .collect()
    }

    fn spans(writes: &[CellWrite]) -> Vec<(String, usize)> {
        writes
            .iter()
            .map(|w| match w {
                CellWrite::Single { value, .. } => (value.clone().unwrap_or_default(), 1),
                CellWrite::Merged { value, .. } => (value.clone(), w.span()),
            })
            .collect()
    }

    #[test]
    fn test_runs_merge_only_when_adjacent() {
        let writes = plan_column(&plain(&["X", "X", "Y", "Y", "Y", "X"]));
        assert_eq!(
            spans(&writes),
            vec![("X".into(), 2), ("Y".into(), 3), ("X".into(), 1)]
        );
        assert_eq!(writes[1].first_row(), 2);
        assert!(matches!(writes[2], CellWrite::Single { row: 5, .. }));
    }

    #[test]
    fn test_style_boundary_splits_run() {
        let mut cells = plain(&["X", "X", "X"]);
        cells[2].style = CellStyle::Highlight(Highlight::High);
        let writes = plan_column(&cells);
        assert_eq!(spans(&writes), vec![("X".into(), 2), ("X".into(), 1)]);
        assert!(matches!(
            writes[1],
            CellWrite::Single { style: CellStyle::Highlight(Highlight::High), .. }
        ));
    }

    #[test]
    fn test_blanks_never_merge() {
        let cells = vec![
            Cell::new(None, CellStyle::Default),
            Cell::new(None, CellStyle::Default),
            Cell::new(Some(String::new()), CellStyle::Default),
            Cell::new(Some("A".into()), CellStyle::Default),
            Cell::new(None, CellStyle::Default),
            Cell::new(Some("A".into()), CellStyle::Default),
        ];
        let writes = plan_column(&cells);
        assert_eq!(writes.len(), 6);
        assert!(writes.iter().all(|w| w.span() == 1));
    }

    #[test]
    fn test_single_column_run() {
        let writes = plan_column(&plain(&["only"]));
        assert_eq!(writes.len(), 1);
        assert!(plan_column(&[]).is_empty());
    }

    #[test]
    fn test_column_width_bounds() {
        assert_eq!(column_width("Level 1", ["a", "bc"]), 15);
        assert_eq!(column_width("Leaf Value", ["twelve chars"]), 17);
        let long = "x".repeat(200);
        assert_eq!(column_width("h", [long.as_str()]), 70);
        assert_eq!(column_width("Level 10", std::iter::empty()), 15);
    }

    #[test]
    fn test_capped_width_has_no_floor() {
        assert_eq!(capped_width("Error", ["x"]), 10);
    }
}
