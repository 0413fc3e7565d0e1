//! `xlsplit_io_xlsx` v1:
//! Rust-side spreadsheet split kernel.
//!
//! Splits one worksheet into one workbook per distinct value of the chosen
//! grouping columns, optionally keeping values, formulas and cell styles, and
//! packages the outputs into a single zip archive.
//!
//! Modules:
//! - `conf`    : constants and default presets
//! - `spec`    : specs/models/options/errors
//! - `util`    : pure helper functions (column resolution, split keys, naming)
//! - `sheet`   : source worksheet model and xlsx loader
//! - `writer`  : per-group workbook writer and row format copier
//! - `archive` : zip packager
//! - `report`  : run report
//! - `split`   : split engine
pub mod archive;
pub mod conf;
pub mod report;
pub mod sheet;
pub mod spec;
pub mod split;
pub mod util;
pub mod writer;

pub use archive::ZipPackager;
pub use conf::{
    N_LEN_EXCEL_CELL_TEXT_MAX, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
    TUP_SPLIT_NOISE_WORDS, derive_default_noise_words, derive_default_split_options,
};
pub use report::{ReportSplit, ReportSplitBuilder};
pub use sheet::{
    SourceWorksheet, SpecSplitInput, list_sheet_names, read_source_worksheet, read_split_input,
};
pub use spec::{
    EnumColumnIdentifier, EnumDiscardReason, EnumFileNameConflictStrategy,
    EnumGroupFailureStrategy, EnumSourceValue, EnumSplitMode, SpecCellFormat, SpecDiscardedGroup,
    SpecGroupError, SpecRowGroup, SpecSourceCell, SpecSplitFile, SpecSplitOptions,
    SpecSplitOutput, SplitError,
};
pub use split::{plan_row_groups, split_table, split_xlsx_bytes};
pub use util::{
    create_archive_name, create_output_file_name, derive_split_key, resolve_split_columns,
    sanitize_file_stem,
};
pub use writer::copy_row_with_format;
