use anyhow::{Context, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::merge::{CellStyle, CellWrite};
use crate::resolve::Highlight;
use crate::sheet::{SheetKind, SheetPlan};

const HEADER_FILL: u32 = 0x4F81BD;
/// Longest text a worksheet cell accepts.
pub const MAX_CELL_CHARS: usize = 32_767;

/// Destination for rendered sheets.
pub trait SheetSink {
    /// Returns false when the sheet was not written.
    fn write_sheet(&mut self, plan: &SheetPlan) -> Result<bool>;
    fn finish(&mut self) -> Result<()>;
}

/// Keeps plans in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub sheets: Vec<SheetPlan>,
    pub finished: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, name: &str) -> Option<&SheetPlan> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

impl SheetSink for MemorySink {
    fn write_sheet(&mut self, plan: &SheetPlan) -> Result<bool> {
        self.sheets.push(plan.clone());
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

struct Formats {
    header: Format,
    plain: Format,
    wrapped: Format,
    high: Format,
    medium: Format,
}

impl Formats {
    fn new() -> Self {
        let cell = Format::new()
            .set_align(FormatAlign::Top)
            .set_border(FormatBorder::Thin);
        Self {
            header: Format::new()
                .set_bold()
                .set_font_color(Color::White)
                .set_background_color(Color::RGB(HEADER_FILL))
                .set_border(FormatBorder::Thin),
            plain: cell.clone(),
            wrapped: cell.clone().set_text_wrap(),
            high: cell
                .clone()
                .set_background_color(Color::RGB(Highlight::High.rgb())),
            medium: cell.set_background_color(Color::RGB(Highlight::Medium.rgb())),
        }
    }

    fn for_cell(&self, kind: SheetKind, style: CellStyle) -> &Format {
        match (style, kind) {
            (CellStyle::Highlight(Highlight::High), _) => &self.high,
            (CellStyle::Highlight(Highlight::Medium), _) => &self.medium,
            (CellStyle::Default, SheetKind::Document) => &self.plain,
            (CellStyle::Default, _) => &self.wrapped,
        }
    }
}

/// Writes an `.xlsx` workbook on `finish`.
pub struct XlsxSink {
    path: PathBuf,
    workbook: Workbook,
    formats: Formats,
    names: HashSet<String>,
}

impl XlsxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            workbook: Workbook::new(),
            formats: Formats::new(),
            names: HashSet::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn render(worksheet: &mut Worksheet, plan: &SheetPlan, formats: &Formats) -> Result<()> {
    worksheet
        .set_name(&plan.name)
        .with_context(|| format!("Invalid sheet name '{}'", plan.name))?;

    for (column, spec) in plan.columns.iter().enumerate() {
        let column = u16::try_from(column).context("Too many columns")?;
        worksheet.write_string_with_format(0, column, &spec.header, &formats.header)?;
        worksheet.set_column_width(column, spec.width as f64)?;
    }

    for placed in &plan.writes {
        let column = u16::try_from(placed.column).context("Too many columns")?;
        match &placed.write {
            CellWrite::Single { row, value, style } => {
                let row = sheet_row(*row)?;
                let format = formats.for_cell(plan.kind, *style);
                match value.as_deref() {
                    Some(text) if !text.is_empty() => {
                        worksheet.write_string_with_format(row, column, cell_text(text), format)?;
                    }
                    _ => {
                        worksheet.write_blank(row, column, format)?;
                    }
                }
            }
            CellWrite::Merged {
                first_row,
                last_row,
                value,
                style,
            } => {
                let format = formats.for_cell(plan.kind, *style);
                worksheet.merge_range(
                    sheet_row(*first_row)?,
                    column,
                    sheet_row(*last_row)?,
                    column,
                    cell_text(value),
                    format,
                )?;
            }
        }
    }

    Ok(())
}

/// Text cut to what a cell holds.
fn cell_text(text: &str) -> &str {
    match text.char_indices().nth(MAX_CELL_CHARS) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

/// Data rows sit below the header row.
fn sheet_row(row: usize) -> Result<u32> {
    u32::try_from(row + 1).context("Too many rows")
}

impl SheetSink for XlsxSink {
    /// A sheet that cannot be rendered is logged and left out of the workbook.
    fn write_sheet(&mut self, plan: &SheetPlan) -> Result<bool> {
        // sheet names are compared case-insensitively by spreadsheet applications
        let folded = plan.name.to_lowercase();
        if self.names.contains(&folded) {
            warn!(sheet = %plan.name, "Duplicate sheet name, skipping sheet");
            return Ok(false);
        }

        let mut worksheet = Worksheet::new();
        if let Err(e) = render(&mut worksheet, plan, &self.formats) {
            warn!(
                sheet = %plan.name,
                error = %format!("{:#}", e),
                "Failed to render sheet, skipping sheet"
            );
            return Ok(false);
        }

        self.workbook.push_worksheet(worksheet);
        self.names.insert(folded);
        debug!(sheet = %plan.name, cells = plan.writes.len(), "Wrote sheet");
        Ok(true)
    }

    fn finish(&mut self) -> Result<()> {
        self.workbook
            .save(&self.path)
            .with_context(|| format!("Failed to save report to {}", self.path.display()))?;
        info!(path = %self.path.display(), sheets = self.names.len(), "Saved report");
        Ok(())
    }
}
