//! Shared split specification models.

use chrono::NaiveDate;
use thiserror::Error;

use crate::conf::{TUP_YEAR_RANGE_ZIP, derive_default_noise_words};
use crate::report::ReportSplit;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Owned per-cell style descriptor.
///
/// Every field is an override on top of Excel's default cell format; `None`
/// means "not set in the source". One value belongs to exactly one cell and is
/// cloned, never shared, when copied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecCellFormat {
    /// Font family name.
    pub font_name: Option<String>,
    /// Font size in points.
    pub font_size: Option<f64>,
    /// Bold style.
    pub bold: Option<bool>,
    /// Italic style.
    pub italic: Option<bool>,
    /// Underline kind (`single`, `double`, `singleAccounting`, `doubleAccounting`).
    pub underline: Option<String>,
    /// Strikethrough.
    pub strikethrough: Option<bool>,
    /// Font color as `#RRGGBB`.
    pub font_color: Option<String>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,
    /// Text wrap.
    pub text_wrap: Option<bool>,
    /// Text rotation in degrees.
    pub rotation: Option<i16>,
    /// Indent level.
    pub indent: Option<u8>,
    /// Shrink text to fit.
    pub shrink: Option<bool>,

    /// Border style for all sides.
    pub border: Option<i64>,
    /// Top border override.
    pub top: Option<i64>,
    /// Bottom border override.
    pub bottom: Option<i64>,
    /// Left border override.
    pub left: Option<i64>,
    /// Right border override.
    pub right: Option<i64>,
    /// Top border color.
    pub top_color: Option<String>,
    /// Bottom border color.
    pub bottom_color: Option<String>,
    /// Left border color.
    pub left_color: Option<String>,
    /// Right border color.
    pub right_color: Option<String>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Fill pattern name; `None` with `bg_color` set means solid.
    pub pattern: Option<String>,
    /// Background fill color (the visible color of a solid fill).
    pub bg_color: Option<String>,
    /// Pattern foreground color for non-solid fills.
    pub fg_color: Option<String>,

    /// Cell lock flag; Excel default is locked.
    pub locked: Option<bool>,
    /// Formula hidden flag.
    pub hidden: Option<bool>,
}

impl SpecCellFormat {
    /// True when no override is set.
    pub fn is_empty(&self) -> bool {
        *self == SpecCellFormat::default()
    }
}

/// Raw value held by one source worksheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumSourceValue {
    /// Empty cell (may still carry a style).
    Blank,
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Boolean(bool),
    /// Formula text (leading `=` optional) and its cached display result.
    Formula {
        /// Formula text copied verbatim.
        text: String,
        /// Cached result as last computed by the authoring application.
        result: String,
    },
}

/// One cell of a source worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSourceCell {
    /// Literal or formula value.
    pub value: EnumSourceValue,
    /// Explicit style, `None` when the cell uses the default format.
    pub format: Option<SpecCellFormat>,
}

impl SpecSourceCell {
    /// Create an unstyled cell.
    pub fn new(value: EnumSourceValue) -> Self {
        Self {
            value,
            format: None,
        }
    }

    /// Attach an explicit style; empty formats are normalized to `None`.
    pub fn with_format(mut self, format: SpecCellFormat) -> Self {
        self.format = if format.is_empty() {
            None
        } else {
            Some(format)
        };
        self
    }

    /// Display text of the cell as used for table building.
    pub fn to_text(&self) -> String {
        match &self.value {
            EnumSourceValue::Blank => String::new(),
            EnumSourceValue::String(val) => val.clone(),
            EnumSourceValue::Number(val) => val.to_string(),
            EnumSourceValue::Boolean(val) => String::from(if *val { "TRUE" } else { "FALSE" }),
            EnumSourceValue::Formula { result, .. } => result.clone(),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SplitOptions

/// Output construction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumSplitMode {
    /// Column labels plus raw text rows, no styles.
    Plain,
    /// Copy header block and member rows with values, formulas and styles.
    #[default]
    FormatPreserving,
}

/// Policy when two split keys produce the same output file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumFileNameConflictStrategy {
    /// Append `__2`, `__3`, ... to the later split key.
    #[default]
    Suffix,
    /// Abort the run with [`SplitError::FileNameConflict`].
    Error,
}

/// Policy when building one group's workbook fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnumGroupFailureStrategy {
    /// Record the failure in the report and continue with the next group.
    #[default]
    Skip,
    /// Abort the run with [`SplitError::GroupFailed`].
    Abort,
}

/// Column selector reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumColumnIdentifier {
    /// Select by literal column label.
    Name(String),
    /// Select by zero-based column index (from a column letter).
    Index(usize),
}

/// Options for one split run.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecSplitOptions {
    /// Plain or format-preserving output.
    pub rule_mode: EnumSplitMode,
    /// Date used in file names, archive name and document timestamps.
    pub date_stamp: NaiveDate,
    /// Case-insensitive substrings that disqualify a split key.
    pub words_noise: Vec<String>,
    /// File name collision behavior.
    pub rule_conflict_name: EnumFileNameConflictStrategy,
    /// Per-group construction failure behavior.
    pub rule_group_failure: EnumGroupFailureStrategy,
    /// Output sheet name; defaults to the source sheet name (or `Sheet1` in plain mode).
    pub sheet_name_out: Option<String>,
}

impl Default for SpecSplitOptions {
    fn default() -> Self {
        Self {
            rule_mode: EnumSplitMode::FormatPreserving,
            date_stamp: NaiveDate::from_ymd_opt(TUP_YEAR_RANGE_ZIP.0, 1, 1).unwrap_or_default(),
            words_noise: derive_default_noise_words(),
            rule_conflict_name: EnumFileNameConflictStrategy::Suffix,
            rule_group_failure: EnumGroupFailureStrategy::Skip,
            sheet_name_out: None,
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region GroupSpecification

/// Rows sharing one combination of grouping values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRowGroup {
    /// Grouping values in grouping-column order, untrimmed.
    pub values: Vec<String>,
    /// Zero-based table row indices in first-seen order.
    pub rows: Vec<usize>,
}

/// Why a group produced no output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumDiscardReason {
    /// Every grouping value was blank.
    EmptyKey,
    /// The key contained the given noise word.
    NoiseMatch(String),
}

/// One output file entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSplitFile {
    /// Archive entry name.
    pub file_name: String,
    /// Sanitized split key.
    pub split_key: String,
    /// Number of data rows written.
    pub n_rows: usize,
}

/// One discarded group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDiscardedGroup {
    /// Trimmed, unsanitized key.
    pub split_key: String,
    /// Number of table rows in the group.
    pub n_rows: usize,
    /// Discard reason.
    pub reason: EnumDiscardReason,
}

/// One group construction failure with key + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecGroupError {
    /// Sanitized split key of the failing group.
    pub split_key: String,
    /// User-facing error text.
    pub exception: String,
}

/// Result of one split run.
#[derive(Debug, Clone)]
pub struct SpecSplitOutput {
    /// Zip archive bytes.
    pub archive: Vec<u8>,
    /// Suggested archive file name.
    pub archive_name: String,
    /// Run report.
    pub report: ReportSplit,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// "Split call failed" errors.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Empty column identifier list.
    #[error("No grouping columns selected.")]
    NoSplitColumns,
    /// Identifier did not resolve to a table column.
    #[error("Unknown column: {0:?}")]
    UnknownColumn(String),
    /// Table labels are not unique.
    #[error("{0}")]
    DuplicateColumns(String),
    /// Header row position is not usable.
    #[error("Invalid header row: {0} (expected >= 1 and within the sheet).")]
    InvalidHeaderRow(usize),
    /// Format-preserving mode called without a worksheet.
    #[error("Format-preserving split requires the source worksheet.")]
    MissingSourceWorksheet,
    /// Workbook bytes could not be decoded.
    #[error("Unreadable input workbook: {0}")]
    UnreadableInput(String),
    /// Requested sheet does not exist.
    #[error("Sheet not found: {0:?}")]
    SheetNotFound(String),
    /// Table cell access failed.
    #[error("Failed to read table: {0}")]
    TableAccess(String),
    /// Two split keys map to one file name under the `Error` policy.
    #[error("Output file name conflict: {0:?}")]
    FileNameConflict(String),
    /// Group construction failed under the `Abort` policy.
    #[error("Failed to build output for {split_key:?}: {message}")]
    GroupFailed {
        /// Sanitized split key.
        split_key: String,
        /// Underlying error text.
        message: String,
    },
    /// Archive assembly failed.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),
    /// Every group was discarded or failed.
    #[error("Zero groups produced ({cnt_discarded} discarded, {cnt_failed} failed).")]
    NoGroupsProduced {
        /// Groups dropped as empty or noise.
        cnt_discarded: usize,
        /// Groups whose construction failed.
        cnt_failed: usize,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
