//! Source worksheet model and the xlsx loader feeding the split engine.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::Bound;

use polars::prelude::{Column, DataFrame};
use umya_spreadsheet::drawing::Theme;
use umya_spreadsheet::{
    Cell, CellRawValue, Color, HorizontalAlignmentValues, PatternValues, Protection, Spreadsheet,
    Style, UnderlineValues, VerticalAlignmentValues, Worksheet,
};

use crate::conf::{N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX};
use crate::spec::{EnumSourceValue, SpecCellFormat, SpecSourceCell, SplitError};
use crate::util::{normalize_header_labels, validate_unique_columns};

const C_FONT_NAME_DEFAULT: &str = "Calibri";
const N_FONT_SIZE_DEFAULT: f64 = 11.0;
const N_ROW_HEIGHT_DEFAULT: f64 = 15.0;

////////////////////////////////////////////////////////////////////////////////
// #region SourceWorksheet

/// Read-only grid of styled cells addressed by zero-based `(row, col)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceWorksheet {
    name: String,
    dict_cells: BTreeMap<(u32, u16), SpecSourceCell>,
    dict_col_widths: BTreeMap<u16, f64>,
    dict_row_heights: BTreeMap<u32, f64>,
    n_rows: u32,
    n_cols: u16,
}

impl SourceWorksheet {
    /// Create an empty worksheet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sheet name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows up to and including the last used one.
    pub fn height(&self) -> u32 {
        self.n_rows
    }

    /// Number of columns up to and including the last used one.
    pub fn width(&self) -> u16 {
        self.n_cols
    }

    /// Store one cell, growing the used range.
    pub fn set_cell(&mut self, row: u32, col: u16, cell: SpecSourceCell) -> Result<(), String> {
        if row as usize >= N_NROWS_EXCEL_MAX || col as usize >= N_NCOLS_EXCEL_MAX {
            return Err(format!("cell ({row}, {col}) outside the Excel grid"));
        }
        self.n_rows = u32::max(self.n_rows, row + 1);
        self.n_cols = u16::max(self.n_cols, col + 1);
        self.dict_cells.insert((row, col), cell);
        Ok(())
    }

    /// Record a column width in character units.
    pub fn set_col_width(&mut self, col: u16, width: f64) {
        self.dict_col_widths.insert(col, width);
    }

    /// Record a row height in points.
    pub fn set_row_height(&mut self, row: u32, height: f64) {
        self.dict_row_heights.insert(row, height);
    }

    /// Cell at `(row, col)`, if any.
    pub fn get_cell(&self, row: u32, col: u16) -> Option<&SpecSourceCell> {
        self.dict_cells.get(&(row, col))
    }

    /// Cells of one row in column order.
    pub fn iter_row(&self, row: u32) -> impl Iterator<Item = (u16, &SpecSourceCell)> {
        self.dict_cells
            .range((Bound::Included((row, 0)), Bound::Included((row, u16::MAX))))
            .map(|((_, col), cell)| (*col, cell))
    }

    /// Explicit column widths.
    pub fn col_widths(&self) -> &BTreeMap<u16, f64> {
        &self.dict_col_widths
    }

    /// Explicit height of one row.
    pub fn row_height(&self, row: u32) -> Option<f64> {
        self.dict_row_heights.get(&row).copied()
    }

    /// Build the all-text table whose labels sit on 1-based `header_row`.
    ///
    /// Table row `i` corresponds to worksheet row `header_row + i` (zero-based).
    pub fn derive_table(&self, header_row: usize) -> Result<DataFrame, SplitError> {
        if header_row == 0 || header_row > self.n_rows as usize {
            return Err(SplitError::InvalidHeaderRow(header_row));
        }

        let n_row_header = (header_row - 1) as u32;
        let l_labels_raw: Vec<String> = (0..self.n_cols)
            .map(|col| {
                self.get_cell(n_row_header, col)
                    .map(SpecSourceCell::to_text)
                    .unwrap_or_default()
            })
            .collect();
        let l_labels = normalize_header_labels(&l_labels_raw);
        validate_unique_columns(&l_labels).map_err(SplitError::DuplicateColumns)?;

        let n_rows_data = self.n_rows as usize - header_row;
        let mut l_values_by_col = vec![Vec::with_capacity(n_rows_data); self.n_cols as usize];
        for row in (n_row_header + 1)..self.n_rows {
            for (n_idx_col, l_values) in l_values_by_col.iter_mut().enumerate() {
                let c_text = self
                    .get_cell(row, n_idx_col as u16)
                    .map(SpecSourceCell::to_text)
                    .unwrap_or_default();
                l_values.push(c_text);
            }
        }

        let l_columns: Vec<Column> = l_labels
            .iter()
            .zip(l_values_by_col)
            .map(|(c_label, l_values)| Column::new(c_label.as_str().into(), l_values))
            .collect();
        DataFrame::new(l_columns).map_err(|err| SplitError::TableAccess(err.to_string()))
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region XlsxLoader

/// Table plus worksheet decoded from one workbook sheet.
#[derive(Debug, Clone)]
pub struct SpecSplitInput {
    /// All-text table below the header row.
    pub df: DataFrame,
    /// Styled source worksheet.
    pub sheet: SourceWorksheet,
}

/// List sheet names of an xlsx payload in workbook order.
pub fn list_sheet_names(data: &[u8]) -> Result<Vec<String>, SplitError> {
    let book = read_spreadsheet(data)?;
    let n_sheets = book.get_sheet_count();
    let mut l_names = Vec::with_capacity(n_sheets);
    for n_idx in 0..n_sheets {
        if let Some(ws) = book.get_sheet(&n_idx) {
            l_names.push(ws.get_name().to_string());
        }
    }
    Ok(l_names)
}

/// Decode one sheet (default: the first) into a [`SourceWorksheet`].
pub fn read_source_worksheet(
    data: &[u8],
    sheet_name: Option<&str>,
) -> Result<SourceWorksheet, SplitError> {
    let book = read_spreadsheet(data)?;
    let ws = match sheet_name {
        Some(c_name) => book
            .get_sheet_by_name(c_name)
            .ok_or_else(|| SplitError::SheetNotFound(c_name.to_string()))?,
        None => book
            .get_sheet(&0)
            .ok_or_else(|| SplitError::UnreadableInput("workbook has no sheets".to_string()))?,
    };
    convert_worksheet(ws, book.get_theme())
}

/// Decode one sheet and derive its table from 1-based `header_row`.
pub fn read_split_input(
    data: &[u8],
    sheet_name: Option<&str>,
    header_row: usize,
) -> Result<SpecSplitInput, SplitError> {
    let sheet = read_source_worksheet(data, sheet_name)?;
    let df = sheet.derive_table(header_row)?;
    log::debug!(
        "loaded sheet {:?}: {} rows x {} cols, table height {}",
        sheet.name(),
        sheet.height(),
        sheet.width(),
        df.height()
    );
    Ok(SpecSplitInput { df, sheet })
}

fn read_spreadsheet(data: &[u8]) -> Result<Spreadsheet, SplitError> {
    umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(data), true)
        .map_err(|err| SplitError::UnreadableInput(err.to_string()))
}

fn convert_worksheet(ws: &Worksheet, theme: &Theme) -> Result<SourceWorksheet, SplitError> {
    let mut sheet = SourceWorksheet::new(ws.get_name());

    for cell in ws.get_cell_collection() {
        let coord = cell.get_coordinate();
        let n_col = *coord.get_col_num();
        let n_row = *coord.get_row_num();
        if n_col == 0 || n_row == 0 {
            continue;
        }

        let value = derive_source_value(cell);
        let fmt = derive_cell_format(cell.get_style(), theme);
        if value == EnumSourceValue::Blank && fmt.is_empty() {
            continue;
        }

        let col = u16::try_from(n_col - 1)
            .map_err(|_| SplitError::UnreadableInput(format!("column overflow: {n_col}")))?;
        sheet
            .set_cell(n_row - 1, col, SpecSourceCell::new(value).with_format(fmt))
            .map_err(SplitError::UnreadableInput)?;
    }

    for n_col in 1..=(sheet.width() as u32) {
        if let Some(col_dim) = ws.get_column_dimension_by_number(&n_col) {
            let n_width = *col_dim.get_width();
            if n_width > 0.0 {
                sheet.set_col_width((n_col - 1) as u16, n_width);
            }
        }
    }
    for n_row in 1..=sheet.height() {
        if let Some(row_dim) = ws.get_row_dimension(&n_row) {
            let n_height = *row_dim.get_height();
            if n_height > 0.0 && (n_height - N_ROW_HEIGHT_DEFAULT).abs() > f64::EPSILON {
                sheet.set_row_height(n_row - 1, n_height);
            }
        }
    }

    Ok(sheet)
}

fn derive_source_value(cell: &Cell) -> EnumSourceValue {
    if cell.is_formula() {
        let c_formula = cell.get_formula();
        return EnumSourceValue::Formula {
            text: format!("={}", c_formula.trim_start_matches('=')),
            result: cell.get_value().to_string(),
        };
    }

    match cell.get_cell_value().get_raw_value() {
        CellRawValue::Numeric(val) => EnumSourceValue::Number(*val),
        CellRawValue::Bool(val) => EnumSourceValue::Boolean(*val),
        CellRawValue::String(val) => EnumSourceValue::String(val.to_string()),
        CellRawValue::RichText(val) => EnumSourceValue::String(val.get_text().to_string()),
        CellRawValue::Lazy(val) => {
            let txt = val.as_ref();
            match txt.parse::<f64>() {
                Ok(n_val) => EnumSourceValue::Number(n_val),
                Err(_) => EnumSourceValue::String(txt.to_string()),
            }
        }
        CellRawValue::Error(_) => EnumSourceValue::String(cell.get_value().to_string()),
        CellRawValue::Empty => EnumSourceValue::Blank,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StyleConversion

/// Convert a workbook style into overrides on top of Excel's default format.
///
/// Theme colors resolve against the workbook `theme`.
fn derive_cell_format(style: &Style, theme: &Theme) -> SpecCellFormat {
    let mut fmt = SpecCellFormat::default();

    if let Some(font) = style.get_font() {
        let c_font_name = font.get_name();
        if !c_font_name.is_empty() && c_font_name != C_FONT_NAME_DEFAULT {
            fmt.font_name = Some(c_font_name.to_string());
        }
        let n_font_size = *font.get_size();
        if n_font_size > 0.0 && (n_font_size - N_FONT_SIZE_DEFAULT).abs() > f64::EPSILON {
            fmt.font_size = Some(n_font_size);
        }
        if *font.get_bold() {
            fmt.bold = Some(true);
        }
        if *font.get_italic() {
            fmt.italic = Some(true);
        }
        fmt.underline = derive_underline_name(font.get_font_underline().get_val())
            .map(str::to_string);
        if *font.get_strikethrough() {
            fmt.strikethrough = Some(true);
        }
        fmt.font_color =
            derive_color_hex(font.get_color(), theme).filter(|c_hex| c_hex != "#000000");
    }

    if let Some(pattern_fill) = style.get_fill().and_then(|fill| fill.get_pattern_fill()) {
        let c_fg = pattern_fill
            .get_foreground_color()
            .and_then(|color| derive_color_hex(color, theme));
        let c_bg = pattern_fill
            .get_background_color()
            .and_then(|color| derive_color_hex(color, theme));
        match pattern_fill.get_pattern_type() {
            PatternValues::None => {}
            PatternValues::Solid => {
                fmt.bg_color = c_fg.or(c_bg);
            }
            other => {
                fmt.pattern = Some(derive_pattern_name(other).to_string());
                fmt.fg_color = c_fg;
                fmt.bg_color = c_bg;
            }
        }
    }

    if let Some(borders) = style.get_borders() {
        let (top, top_color) = derive_border_side(
            borders.get_top().get_border_style(),
            borders.get_top().get_color(),
            theme,
        );
        let (bottom, bottom_color) = derive_border_side(
            borders.get_bottom().get_border_style(),
            borders.get_bottom().get_color(),
            theme,
        );
        let (left, left_color) = derive_border_side(
            borders.get_left().get_border_style(),
            borders.get_left().get_color(),
            theme,
        );
        let (right, right_color) = derive_border_side(
            borders.get_right().get_border_style(),
            borders.get_right().get_color(),
            theme,
        );
        fmt.top = top;
        fmt.top_color = top_color;
        fmt.bottom = bottom;
        fmt.bottom_color = bottom_color;
        fmt.left = left;
        fmt.left_color = left_color;
        fmt.right = right;
        fmt.right_color = right_color;
    }

    if let Some(alignment) = style.get_alignment() {
        fmt.align = match alignment.get_horizontal() {
            HorizontalAlignmentValues::Left => Some("left".to_string()),
            HorizontalAlignmentValues::Center => Some("center".to_string()),
            HorizontalAlignmentValues::Right => Some("right".to_string()),
            HorizontalAlignmentValues::Fill => Some("fill".to_string()),
            HorizontalAlignmentValues::Justify => Some("justify".to_string()),
            HorizontalAlignmentValues::CenterContinuous => Some("center_across".to_string()),
            HorizontalAlignmentValues::Distributed => Some("distributed".to_string()),
            _ => None,
        };
        fmt.valign = match alignment.get_vertical() {
            VerticalAlignmentValues::Top => Some("top".to_string()),
            VerticalAlignmentValues::Center => Some("vcenter".to_string()),
            VerticalAlignmentValues::Justify => Some("vjustify".to_string()),
            VerticalAlignmentValues::Distributed => Some("vdistributed".to_string()),
            _ => None,
        };
        if *alignment.get_wrap_text() {
            fmt.text_wrap = Some(true);
        }
        fmt.rotation = derive_rotation(*alignment.get_text_rotation());
    }

    if let Some(number_format) = style.get_number_format() {
        let c_code = number_format.get_format_code();
        if !c_code.is_empty() && c_code != "General" {
            fmt.num_format = Some(c_code.to_string());
        }
    }

    if let Some(protection) = style.get_protection() {
        let (locked, hidden) = derive_protection_flags(protection);
        fmt.locked = locked;
        fmt.hidden = hidden;
    }

    fmt
}

/// `AARRGGBB` / `RRGGBB` to `#RRGGBB`, resolving theme and indexed colors.
fn derive_color_hex(color: &Color, theme: &Theme) -> Option<String> {
    let c_argb_raw = color.get_argb_with_theme(theme);
    let c_argb = c_argb_raw.trim();
    let c_rgb = match c_argb.len() {
        8 => c_argb.get(2..)?,
        6 => c_argb,
        _ => return None,
    };
    if !c_rgb.chars().all(|chr| chr.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("#{}", c_rgb.to_ascii_uppercase()))
}

fn derive_border_side(
    border_style: &str,
    color: &Color,
    theme: &Theme,
) -> (Option<i64>, Option<String>) {
    let n_code = derive_border_code(border_style);
    if n_code == 0 {
        return (None, None);
    }
    (Some(n_code), derive_color_hex(color, theme))
}

/// Map an OOXML border style name to the writer's border code.
pub fn derive_border_code(border_style: &str) -> i64 {
    match border_style {
        "thin" => 1,
        "medium" => 2,
        "dashed" => 3,
        "dotted" => 4,
        "thick" => 5,
        "double" => 6,
        "hair" => 7,
        "mediumDashed" => 8,
        "dashDot" => 9,
        "mediumDashDot" => 10,
        "dashDotDot" => 11,
        "mediumDashDotDot" => 12,
        "slantDashDot" => 13,
        _ => 0,
    }
}

fn derive_pattern_name(pattern: &PatternValues) -> &'static str {
    match pattern {
        PatternValues::None => "none",
        PatternValues::Solid => "solid",
        PatternValues::MediumGray => "medium_gray",
        PatternValues::DarkGray => "dark_gray",
        PatternValues::LightGray => "light_gray",
        PatternValues::DarkHorizontal => "dark_horizontal",
        PatternValues::DarkVertical => "dark_vertical",
        PatternValues::DarkDown => "dark_down",
        PatternValues::DarkUp => "dark_up",
        PatternValues::DarkGrid => "dark_grid",
        PatternValues::DarkTrellis => "dark_trellis",
        PatternValues::LightHorizontal => "light_horizontal",
        PatternValues::LightVertical => "light_vertical",
        PatternValues::LightDown => "light_down",
        PatternValues::LightUp => "light_up",
        PatternValues::LightGrid => "light_grid",
        PatternValues::LightTrellis => "light_trellis",
        PatternValues::Gray125 => "gray125",
        PatternValues::Gray0625 => "gray0625",
    }
}

fn derive_underline_name(underline: &UnderlineValues) -> Option<&'static str> {
    match underline {
        UnderlineValues::None => None,
        UnderlineValues::Single => Some("single"),
        UnderlineValues::Double => Some("double"),
        UnderlineValues::SingleAccounting => Some("singleAccounting"),
        UnderlineValues::DoubleAccounting => Some("doubleAccounting"),
    }
}

/// OOXML `textRotation` to the writer's signed angle.
///
/// `1..=90` is counter-clockwise, `91..=180` is clockwise, `255` is stacked text.
fn derive_rotation(text_rotation: u32) -> Option<i16> {
    match text_rotation {
        1..=90 => i16::try_from(text_rotation).ok(),
        91..=180 => i16::try_from(text_rotation - 90).ok().map(|n_deg| -n_deg),
        255 => Some(270),
        _ => None,
    }
}

/// `(locked, hidden)` overrides. An absent `locked` attribute keeps the default lock.
fn derive_protection_flags(protection: &Protection) -> (Option<bool>, Option<bool>) {
    let mut protection_unlocked = protection.clone();
    protection_unlocked.set_locked(false);
    let locked = (protection_unlocked == *protection).then_some(false);

    let hidden = (*protection_unlocked.get_hidden()).then_some(true);
    (locked, hidden)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::derive_text_from_any_value;

    fn create_text_cell(text: &str) -> SpecSourceCell {
        SpecSourceCell::new(EnumSourceValue::String(text.to_string()))
    }

    #[test]
    fn test_iter_row_returns_cells_in_column_order() {
        let mut sheet = SourceWorksheet::new("Data");
        sheet.set_cell(1, 2, create_text_cell("c")).unwrap();
        sheet.set_cell(1, 0, create_text_cell("a")).unwrap();
        sheet.set_cell(2, 0, create_text_cell("next")).unwrap();

        let l_cols: Vec<u16> = sheet.iter_row(1).map(|(col, _)| col).collect();
        assert_eq!(l_cols, vec![0, 2]);
        assert_eq!(sheet.height(), 3);
        assert_eq!(sheet.width(), 3);
    }

    #[test]
    fn test_derive_table_reads_below_header_row() {
        let mut sheet = SourceWorksheet::new("Data");
        sheet.set_cell(0, 0, create_text_cell("Report title")).unwrap();
        sheet.set_cell(1, 0, create_text_cell("Region")).unwrap();
        sheet.set_cell(1, 1, create_text_cell("Qty")).unwrap();
        sheet.set_cell(2, 0, create_text_cell("North")).unwrap();
        sheet
            .set_cell(2, 1, SpecSourceCell::new(EnumSourceValue::Number(5.0)))
            .unwrap();
        sheet.set_cell(3, 0, create_text_cell("South")).unwrap();

        let df = sheet.derive_table(2).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names_str(), vec!["Region", "Qty"]);

        let col_qty = df.column("Qty").unwrap();
        assert_eq!(derive_text_from_any_value(col_qty.get(0).unwrap()), "5");
        assert_eq!(derive_text_from_any_value(col_qty.get(1).unwrap()), "");
    }

    #[test]
    fn test_derive_table_rejects_header_outside_sheet() {
        let mut sheet = SourceWorksheet::new("Data");
        sheet.set_cell(0, 0, create_text_cell("Region")).unwrap();

        assert!(matches!(
            sheet.derive_table(0),
            Err(SplitError::InvalidHeaderRow(0))
        ));
        assert!(matches!(
            sheet.derive_table(3),
            Err(SplitError::InvalidHeaderRow(3))
        ));
    }

    #[test]
    fn test_derive_border_code() {
        assert_eq!(derive_border_code("thin"), 1);
        assert_eq!(derive_border_code("mediumDashDotDot"), 12);
        assert_eq!(derive_border_code("none"), 0);
    }

    #[test]
    fn test_with_format_normalizes_empty_style() {
        let cell = create_text_cell("x").with_format(SpecCellFormat::default());
        assert_eq!(cell.format, None);
    }

    #[test]
    fn test_derive_cell_format_reads_underline_only_when_present() {
        let theme = Theme::default();
        let mut style = Style::default();
        style.get_font_mut().set_bold(true);
        assert_eq!(
            derive_cell_format(&style, &theme),
            SpecCellFormat {
                bold: Some(true),
                ..Default::default()
            }
        );

        style
            .get_font_mut()
            .get_font_underline_mut()
            .set_val(UnderlineValues::DoubleAccounting);
        assert_eq!(
            derive_cell_format(&style, &theme).underline.as_deref(),
            Some("doubleAccounting")
        );
    }

    #[test]
    fn test_derive_color_hex_rejects_malformed_argb() {
        let theme = Theme::default();
        let mut color = Color::default();
        color.set_argb("FF1f4e79");
        assert_eq!(derive_color_hex(&color, &theme).as_deref(), Some("#1F4E79"));

        color.set_argb("\u{20ac}00000");
        assert_eq!(derive_color_hex(&color, &theme), None);
        color.set_argb("FFGG0000");
        assert_eq!(derive_color_hex(&color, &theme), None);
        assert_eq!(derive_color_hex(&Color::default(), &theme), None);
    }

    #[test]
    fn test_derive_rotation() {
        assert_eq!(derive_rotation(0), None);
        assert_eq!(derive_rotation(45), Some(45));
        assert_eq!(derive_rotation(90), Some(90));
        assert_eq!(derive_rotation(120), Some(-30));
        assert_eq!(derive_rotation(180), Some(-90));
        assert_eq!(derive_rotation(255), Some(270));
        assert_eq!(derive_rotation(200), None);
    }

    #[test]
    fn test_derive_protection_flags_keeps_default_lock() {
        let mut protection = Protection::default();
        protection.set_hidden(true);
        assert_eq!(derive_protection_flags(&protection), (None, Some(true)));

        protection.set_locked(false);
        assert_eq!(derive_protection_flags(&protection), (Some(false), Some(true)));

        let mut protection_locked = Protection::default();
        protection_locked.set_locked(true);
        assert_eq!(derive_protection_flags(&protection_locked), (None, None));
    }
}
