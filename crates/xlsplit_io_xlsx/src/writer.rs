//! XLSX writer kernel that builds one output workbook per split group.

use chrono::{Datelike, NaiveDate};
use polars::prelude::DataFrame;
use rust_xlsxwriter::{
    DocProperties, ExcelDateTime, Format, FormatAlign, FormatBorder, FormatPattern,
    FormatUnderline, Formula, Workbook, Worksheet, XlsxError,
};

use crate::conf::TUP_YEAR_RANGE_EXCEL;
use crate::sheet::SourceWorksheet;
use crate::spec::{EnumSourceValue, SpecCellFormat, SpecSourceCell};
use crate::util::{
    clamp_date_stamp, convert_col_idx_to_letters, derive_text_from_any_value, sanitize_sheet_name,
};

////////////////////////////////////////////////////////////////////////////////
// #region GroupWorkbooks

/// Build a plain workbook: column labels on row 1, the group's rows below.
pub fn write_plain_group_workbook(
    df: &DataFrame,
    rows: &[usize],
    sheet_name: &str,
    date_stamp: NaiveDate,
) -> Result<Vec<u8>, String> {
    let mut workbook = create_workbook(date_stamp)?;
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sanitize_sheet_name(sheet_name, "_"))
        .map_err(derive_xlsx_error_text)?;

    for (col_idx, c_label) in df.get_column_names_str().into_iter().enumerate() {
        worksheet
            .write_string(0, cast_col_num(col_idx)?, c_label)
            .map_err(|err| derive_cell_error_text(0, col_idx, err))?;
    }

    for (row_idx_dst, row_idx_src) in rows.iter().enumerate() {
        let n_row_dst = cast_row_num(row_idx_dst + 1)?;
        for (col_idx, column) in df.get_columns().iter().enumerate() {
            let value = column.get(*row_idx_src).map_err(|err| err.to_string())?;
            let c_text = derive_text_from_any_value(value);
            if c_text.is_empty() {
                continue;
            }
            worksheet
                .write_string(n_row_dst, cast_col_num(col_idx)?, c_text)
                .map_err(|err| derive_cell_error_text(row_idx_dst + 1, col_idx, err))?;
        }
    }

    workbook.save_to_buffer().map_err(derive_xlsx_error_text)
}

/// Build a format-preserving workbook from the source worksheet.
///
/// Rows `0..header_row` are copied in place; table row `i` of the group is
/// source row `header_row + i` and lands on successive rows after the header.
pub fn write_formatted_group_workbook(
    source: &SourceWorksheet,
    header_row: usize,
    rows: &[usize],
    sheet_name: &str,
    date_stamp: NaiveDate,
) -> Result<Vec<u8>, String> {
    let mut workbook = create_workbook(date_stamp)?;
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(sanitize_sheet_name(sheet_name, "_"))
        .map_err(derive_xlsx_error_text)?;
    apply_column_widths(source, worksheet)?;

    for row_idx in 0..header_row {
        let n_row = cast_row_num(row_idx)?;
        copy_row_with_format(source, n_row, worksheet, n_row)?;
    }

    for (n_offset, row_idx_table) in rows.iter().enumerate() {
        let n_row_src = cast_row_num(header_row + row_idx_table)?;
        let n_row_dst = cast_row_num(header_row + n_offset)?;
        copy_row_with_format(source, n_row_src, worksheet, n_row_dst)?;
    }

    workbook.save_to_buffer().map_err(derive_xlsx_error_text)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowCopy

/// Copy every cell of source row `row_src` into target row `row_dst`.
///
/// Each styled cell gets its own freshly built [`Format`]; unstyled cells are
/// written without one and unstyled blanks are skipped. The row height follows
/// the source row. Returns the number of cells written.
pub fn copy_row_with_format(
    source: &SourceWorksheet,
    row_src: u32,
    worksheet: &mut Worksheet,
    row_dst: u32,
) -> Result<usize, String> {
    let mut n_written = 0usize;
    for (col, cell) in source.iter_row(row_src) {
        if write_source_cell(worksheet, row_dst, col, cell)
            .map_err(|err| derive_cell_error_text(row_dst as usize, col as usize, err))?
        {
            n_written += 1;
        }
    }

    if let Some(n_height) = source.row_height(row_src) {
        worksheet
            .set_row_height(row_dst, n_height)
            .map_err(derive_xlsx_error_text)?;
    }
    Ok(n_written)
}

fn write_source_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &SpecSourceCell,
) -> Result<bool, XlsxError> {
    let format = cell.format.as_ref().map(derive_rust_xlsx_format);

    match (&cell.value, &format) {
        (EnumSourceValue::Blank, None) => return Ok(false),
        (EnumSourceValue::Blank, Some(fmt)) => {
            worksheet.write_blank(row, col, fmt)?;
        }
        (EnumSourceValue::String(val), None) => {
            worksheet.write_string(row, col, val)?;
        }
        (EnumSourceValue::String(val), Some(fmt)) => {
            worksheet.write_string_with_format(row, col, val, fmt)?;
        }
        (EnumSourceValue::Number(val), None) => {
            worksheet.write_number(row, col, *val)?;
        }
        (EnumSourceValue::Number(val), Some(fmt)) => {
            worksheet.write_number_with_format(row, col, *val, fmt)?;
        }
        (EnumSourceValue::Boolean(val), None) => {
            worksheet.write_boolean(row, col, *val)?;
        }
        (EnumSourceValue::Boolean(val), Some(fmt)) => {
            worksheet.write_boolean_with_format(row, col, *val, fmt)?;
        }
        (EnumSourceValue::Formula { text, result }, None) => {
            worksheet.write_formula(row, col, Formula::new(text).set_result(result))?;
        }
        (EnumSourceValue::Formula { text, result }, Some(fmt)) => {
            worksheet.write_formula_with_format(
                row,
                col,
                Formula::new(text).set_result(result),
                fmt,
            )?;
        }
    }
    Ok(true)
}

fn apply_column_widths(source: &SourceWorksheet, worksheet: &mut Worksheet) -> Result<(), String> {
    for (col, n_width) in source.col_widths() {
        worksheet
            .set_column_width(*col, *n_width)
            .map_err(derive_xlsx_error_text)?;
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormatConversion

/// Build a new writer [`Format`] from one owned cell style.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if let Some(val) = &spec.font_name {
        format = format.set_font_name(val.as_str());
    }
    if let Some(val) = spec.font_size {
        format = format.set_font_size(val);
    }
    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }
    if spec.italic.unwrap_or(false) {
        format = format.set_italic();
    }
    if let Some(val) = &spec.underline
        && let Some(underline) = derive_format_underline(val)
    {
        format = format.set_underline(underline);
    }
    if spec.strikethrough.unwrap_or(false) {
        format = format.set_font_strikethrough();
    }
    if let Some(val) = &spec.font_color {
        format = format.set_font_color(val.as_str());
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if spec.text_wrap.unwrap_or(false) {
        format = format.set_text_wrap();
    }
    if let Some(val) = spec.rotation {
        format = format.set_rotation(val);
    }
    if let Some(val) = spec.indent {
        format = format.set_indent(val);
    }
    if spec.shrink.unwrap_or(false) {
        format = format.set_shrink();
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.as_str());
    }

    if let Some(val) = &spec.pattern
        && let Some(pattern) = derive_format_pattern(val)
    {
        format = format.set_pattern(pattern);
    }
    if let Some(val) = &spec.bg_color {
        format = format.set_background_color(val.as_str());
    }
    if let Some(val) = &spec.fg_color {
        format = format.set_foreground_color(val.as_str());
    }

    if let Some(val) = spec.border {
        format = format.set_border(derive_format_border(val));
    }
    if let Some(val) = spec.top {
        format = format.set_border_top(derive_format_border(val));
    }
    if let Some(val) = spec.bottom {
        format = format.set_border_bottom(derive_format_border(val));
    }
    if let Some(val) = spec.left {
        format = format.set_border_left(derive_format_border(val));
    }
    if let Some(val) = spec.right {
        format = format.set_border_right(derive_format_border(val));
    }
    if let Some(val) = &spec.top_color {
        format = format.set_border_top_color(val.as_str());
    }
    if let Some(val) = &spec.bottom_color {
        format = format.set_border_bottom_color(val.as_str());
    }
    if let Some(val) = &spec.left_color {
        format = format.set_border_left_color(val.as_str());
    }
    if let Some(val) = &spec.right_color {
        format = format.set_border_right_color(val.as_str());
    }

    if spec.locked == Some(false) {
        format = format.set_unlocked();
    }
    if spec.hidden.unwrap_or(false) {
        format = format.set_hidden();
    }

    format
}

fn derive_format_border(border: i64) -> FormatBorder {
    match border {
        0 => FormatBorder::None,
        1 => FormatBorder::Thin,
        2 => FormatBorder::Medium,
        3 => FormatBorder::Dashed,
        4 => FormatBorder::Dotted,
        5 => FormatBorder::Thick,
        6 => FormatBorder::Double,
        7 => FormatBorder::Hair,
        8 => FormatBorder::MediumDashed,
        9 => FormatBorder::DashDot,
        10 => FormatBorder::MediumDashDot,
        11 => FormatBorder::DashDotDot,
        12 => FormatBorder::MediumDashDotDot,
        13 => FormatBorder::SlantDashDot,
        _ => FormatBorder::None,
    }
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "general" => Some(FormatAlign::General),
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "fill" => Some(FormatAlign::Fill),
        "justify" => Some(FormatAlign::Justify),
        "center_across" => Some(FormatAlign::CenterAcross),
        "distributed" => Some(FormatAlign::Distributed),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        "vjustify" | "vertical_justify" => Some(FormatAlign::VerticalJustify),
        "vdistributed" | "vertical_distributed" => Some(FormatAlign::VerticalDistributed),
        _ => None,
    }
}

fn derive_format_underline(underline: &str) -> Option<FormatUnderline> {
    match underline {
        "single" => Some(FormatUnderline::Single),
        "double" => Some(FormatUnderline::Double),
        "singleAccounting" => Some(FormatUnderline::SingleAccounting),
        "doubleAccounting" => Some(FormatUnderline::DoubleAccounting),
        _ => None,
    }
}

fn derive_format_pattern(pattern: &str) -> Option<FormatPattern> {
    match pattern {
        "none" => Some(FormatPattern::None),
        "solid" => Some(FormatPattern::Solid),
        "medium_gray" => Some(FormatPattern::MediumGray),
        "dark_gray" => Some(FormatPattern::DarkGray),
        "light_gray" => Some(FormatPattern::LightGray),
        "dark_horizontal" => Some(FormatPattern::DarkHorizontal),
        "dark_vertical" => Some(FormatPattern::DarkVertical),
        "dark_down" => Some(FormatPattern::DarkDown),
        "dark_up" => Some(FormatPattern::DarkUp),
        "dark_grid" => Some(FormatPattern::DarkGrid),
        "dark_trellis" => Some(FormatPattern::DarkTrellis),
        "light_horizontal" => Some(FormatPattern::LightHorizontal),
        "light_vertical" => Some(FormatPattern::LightVertical),
        "light_down" => Some(FormatPattern::LightDown),
        "light_up" => Some(FormatPattern::LightUp),
        "light_grid" => Some(FormatPattern::LightGrid),
        "light_trellis" => Some(FormatPattern::LightTrellis),
        "gray125" => Some(FormatPattern::Gray125),
        "gray0625" => Some(FormatPattern::Gray0625),
        _ => None,
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Helpers

fn create_workbook(date_stamp: NaiveDate) -> Result<Workbook, String> {
    let date_stamp = clamp_date_stamp(date_stamp, TUP_YEAR_RANGE_EXCEL);
    let dt_created = ExcelDateTime::from_ymd(
        date_stamp.year() as u16,
        date_stamp.month() as u8,
        date_stamp.day() as u8,
    )
    .map_err(derive_xlsx_error_text)?;
    let properties = DocProperties::new().set_creation_datetime(&dt_created);

    let mut workbook = Workbook::new();
    workbook.set_properties(&properties);
    Ok(workbook)
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

fn derive_cell_error_text(row_idx: usize, col_idx: usize, err: XlsxError) -> String {
    format!(
        "xlsx write error at {}{}: {err}",
        convert_col_idx_to_letters(col_idx),
        row_idx + 1
    )
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
