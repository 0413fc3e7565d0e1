//! Split constants and default preset factories.

use chrono::Local;

use crate::spec::SpecSplitOptions;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Excel cell text maximum length.
pub const N_LEN_EXCEL_CELL_TEXT_MAX: usize = 32_767;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];
/// Characters not allowed in output file names.
pub const TUP_FILENAME_ILLEGAL: [char; 9] = ['\\', '/', ':', '*', '?', '"', '<', '>', '|'];
/// Replacement for reserved file name characters.
pub const C_FILENAME_REPLACEMENT: &str = "_";
/// Pivot-table artifact markers; a split key containing one is dropped.
pub const TUP_SPLIT_NOISE_WORDS: [&str; 5] = ["(All)", "Sum of", "Supplier", "Invoice", "Shipmode"];
/// Separator between grouping values in a split key.
pub const C_SPLIT_KEY_SEPARATOR: &str = "-";
/// Archive name prefix suggested to the delivery layer.
pub const C_ARCHIVE_NAME_PREFIX: &str = "SplitResult";
/// Output file extension.
pub const C_OUTPUT_EXTENSION: &str = "xlsx";
/// Sheet name used by plain-mode outputs.
pub const C_SHEET_NAME_PLAIN: &str = "Sheet1";
/// Date stamp layout shared by file and archive names.
pub const C_DATE_STAMP_FORMAT: &str = "%Y%m%d";
/// Year range representable by zip entry timestamps.
pub const TUP_YEAR_RANGE_ZIP: (i32, i32) = (1980, 2107);
/// Year range accepted for workbook creation timestamps.
pub const TUP_YEAR_RANGE_EXCEL: (i32, i32) = (1900, 9999);

/// Build default split options stamped with today's local date.
pub fn derive_default_split_options() -> SpecSplitOptions {
    SpecSplitOptions {
        date_stamp: Local::now().date_naive(),
        ..Default::default()
    }
}

/// Build the default noise-word list as owned strings.
pub fn derive_default_noise_words() -> Vec<String> {
    TUP_SPLIT_NOISE_WORDS
        .iter()
        .map(|word| word.to_string())
        .collect()
}
