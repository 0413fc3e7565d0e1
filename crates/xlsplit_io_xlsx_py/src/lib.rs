use std::collections::BTreeMap;

use chrono::NaiveDate;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyBytes;
use xlsplit_io_xlsx::conf::C_DATE_STAMP_FORMAT;
use xlsplit_io_xlsx::{
    EnumDiscardReason, EnumFileNameConflictStrategy, EnumGroupFailureStrategy, EnumSplitMode,
    ReportSplit, SpecDiscardedGroup, SpecGroupError, SpecSplitFile, SpecSplitOptions, SplitError,
    derive_default_split_options, list_sheet_names, split_xlsx_bytes,
};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "xlsplit.xlsx.split.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

#[pyclass(name = "SpecSplitFile")]
#[derive(Debug, Clone)]
struct PySpecSplitFile {
    #[pyo3(get)]
    file_name: String,
    #[pyo3(get)]
    split_key: String,
    #[pyo3(get)]
    n_rows: usize,
}

impl From<SpecSplitFile> for PySpecSplitFile {
    fn from(spec_file: SpecSplitFile) -> Self {
        Self {
            file_name: spec_file.file_name,
            split_key: spec_file.split_key,
            n_rows: spec_file.n_rows,
        }
    }
}

#[pyclass(name = "SpecDiscardedGroup")]
#[derive(Debug, Clone)]
struct PySpecDiscardedGroup {
    #[pyo3(get)]
    split_key: String,
    #[pyo3(get)]
    n_rows: usize,
    #[pyo3(get)]
    reason: String,
    #[pyo3(get)]
    word_noise: Option<String>,
}

impl From<SpecDiscardedGroup> for PySpecDiscardedGroup {
    fn from(spec_group: SpecDiscardedGroup) -> Self {
        let (reason, word_noise) = match spec_group.reason {
            EnumDiscardReason::EmptyKey => ("empty_key".to_string(), None),
            EnumDiscardReason::NoiseMatch(word) => ("noise_match".to_string(), Some(word)),
        };
        Self {
            split_key: spec_group.split_key,
            n_rows: spec_group.n_rows,
            reason,
            word_noise,
        }
    }
}

#[pyclass(name = "SpecGroupError")]
#[derive(Debug, Clone)]
struct PySpecGroupError {
    #[pyo3(get)]
    split_key: String,
    #[pyo3(get)]
    exception: String,
}

impl From<SpecGroupError> for PySpecGroupError {
    fn from(spec_error: SpecGroupError) -> Self {
        Self {
            split_key: spec_error.split_key,
            exception: spec_error.exception,
        }
    }
}

#[pyclass(name = "ReportSplit")]
#[derive(Debug, Clone)]
struct PyReportSplit {
    #[pyo3(get)]
    cnt_groups: u64,
    #[pyo3(get)]
    cnt_written: u64,
    #[pyo3(get)]
    cnt_discarded: u64,
    #[pyo3(get)]
    cnt_failed: u64,
    #[pyo3(get)]
    files: Vec<PySpecSplitFile>,
    #[pyo3(get)]
    discarded: Vec<PySpecDiscardedGroup>,
    #[pyo3(get)]
    errors: Vec<PySpecGroupError>,
    #[pyo3(get)]
    warnings: Vec<String>,
    inner: ReportSplit,
}

impl From<ReportSplit> for PyReportSplit {
    fn from(report_split: ReportSplit) -> Self {
        Self {
            cnt_groups: report_split.cnt_groups,
            cnt_written: report_split.cnt_written,
            cnt_discarded: report_split.cnt_discarded,
            cnt_failed: report_split.cnt_failed,
            files: report_split
                .files
                .iter()
                .cloned()
                .map(PySpecSplitFile::from)
                .collect(),
            discarded: report_split
                .discarded
                .iter()
                .cloned()
                .map(PySpecDiscardedGroup::from)
                .collect(),
            errors: report_split
                .errors
                .iter()
                .cloned()
                .map(PySpecGroupError::from)
                .collect(),
            warnings: report_split.warnings.clone(),
            inner: report_split,
        }
    }
}

#[pymethods]
impl PyReportSplit {
    #[getter]
    fn error_count(&self) -> usize {
        self.inner.error_count()
    }

    #[getter]
    fn warning_count(&self) -> usize {
        self.inner.warning_count()
    }

    fn to_dict(&self) -> BTreeMap<String, u64> {
        self.inner.to_dict()
    }

    #[pyo3(signature = (prefix = "[SPLIT]"))]
    fn format(&self, prefix: &str) -> String {
        self.inner.format(prefix)
    }

    fn __str__(&self) -> String {
        self.inner.to_string()
    }
}

fn parse_rule_mode(value: &str) -> PyResult<EnumSplitMode> {
    match value {
        "format" => Ok(EnumSplitMode::FormatPreserving),
        "plain" => Ok(EnumSplitMode::Plain),
        _ => Err(PyValueError::new_err(format!(
            "Invalid split mode: `{value}`. Expected one of: ['format', 'plain']"
        ))),
    }
}

fn parse_rule_conflict(value: &str) -> PyResult<EnumFileNameConflictStrategy> {
    match value {
        "suffix" => Ok(EnumFileNameConflictStrategy::Suffix),
        "error" => Ok(EnumFileNameConflictStrategy::Error),
        _ => Err(PyValueError::new_err(format!(
            "Invalid file name conflict strategy: `{value}`. Expected one of: ['suffix', 'error']"
        ))),
    }
}

fn parse_rule_failure(value: &str) -> PyResult<EnumGroupFailureStrategy> {
    match value {
        "skip" => Ok(EnumGroupFailureStrategy::Skip),
        "abort" => Ok(EnumGroupFailureStrategy::Abort),
        _ => Err(PyValueError::new_err(format!(
            "Invalid group failure strategy: `{value}`. Expected one of: ['skip', 'abort']"
        ))),
    }
}

/// Accept `YYYY-MM-DD` or `YYYYMMDD`.
fn parse_date_stamp(value: &str) -> PyResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, C_DATE_STAMP_FORMAT))
        .map_err(|_| {
            PyValueError::new_err(format!(
                "Invalid date stamp: `{value}`. Expected `YYYY-MM-DD` or `YYYYMMDD`."
            ))
        })
}

fn map_split_error(exception: SplitError) -> PyErr {
    match exception {
        SplitError::GroupFailed { .. } | SplitError::ArchiveFailed(_) => {
            PyRuntimeError::new_err(exception.to_string())
        }
        _ => PyValueError::new_err(exception.to_string()),
    }
}

#[pyfunction(name = "list_sheet_names")]
fn list_sheet_names_py(py: Python<'_>, data: &[u8]) -> PyResult<Vec<String>> {
    py.allow_threads(|| list_sheet_names(data))
        .map_err(map_split_error)
}

#[pyfunction(name = "split_xlsx")]
#[pyo3(signature = (
    data,
    columns,
    sheet_name = None,
    header_row = 1,
    mode = "format",
    date_stamp = None,
    rule_conflict = "suffix",
    rule_failure = "skip",
    words_noise = None
))]
#[allow(clippy::too_many_arguments)]
fn split_xlsx_py<'py>(
    py: Python<'py>,
    data: &[u8],
    columns: Vec<String>,
    sheet_name: Option<String>,
    header_row: usize,
    mode: &str,
    date_stamp: Option<&str>,
    rule_conflict: &str,
    rule_failure: &str,
    words_noise: Option<Vec<String>>,
) -> PyResult<(Bound<'py, PyBytes>, String, PyReportSplit)> {
    let cfg_defaults = derive_default_split_options();
    let spec_split_options = SpecSplitOptions {
        rule_mode: parse_rule_mode(mode)?,
        date_stamp: match date_stamp {
            Some(val) => parse_date_stamp(val)?,
            None => cfg_defaults.date_stamp,
        },
        words_noise: words_noise.unwrap_or(cfg_defaults.words_noise),
        rule_conflict_name: parse_rule_conflict(rule_conflict)?,
        rule_group_failure: parse_rule_failure(rule_failure)?,
        sheet_name_out: None,
    };

    let output = py.allow_threads(|| {
        split_xlsx_bytes(
            data,
            sheet_name.as_deref(),
            header_row,
            &columns,
            &spec_split_options,
        )
    });
    let output = output.map_err(map_split_error)?;

    Ok((
        PyBytes::new(py, &output.archive),
        output.archive_name,
        PyReportSplit::from(output.report),
    ))
}

#[pymodule]
fn _xlsplit_io_xlsx_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_class::<PySpecSplitFile>()?;
    module.add_class::<PySpecDiscardedGroup>()?;
    module.add_class::<PySpecGroupError>()?;
    module.add_class::<PyReportSplit>()?;
    module.add_function(wrap_pyfunction!(list_sheet_names_py, module)?)?;
    module.add_function(wrap_pyfunction!(split_xlsx_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
