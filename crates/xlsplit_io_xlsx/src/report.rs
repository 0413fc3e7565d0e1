//! Split report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;

use crate::spec::{EnumDiscardReason, SpecDiscardedGroup, SpecGroupError, SpecSplitFile};

/// Aggregate counters and diagnostics for one split run.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReportSplit {
    /// Number of distinct grouping-value combinations found.
    pub cnt_groups: u64,
    /// Number of groups written to the archive.
    pub cnt_written: u64,
    /// Number of groups dropped as empty or noise.
    pub cnt_discarded: u64,
    /// Number of groups whose workbook could not be built.
    pub cnt_failed: u64,
    /// Written files in archive order.
    pub files: Vec<SpecSplitFile>,
    /// Dropped groups in first-seen order.
    pub discarded: Vec<SpecDiscardedGroup>,
    /// Per-group failures.
    pub errors: Vec<SpecGroupError>,
    /// Non-fatal warnings (renamed outputs etc.).
    pub warnings: Vec<String>,
}

impl ReportSplit {
    /// Number of collected group failures.
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Archive entry names in write order.
    pub fn file_names(&self) -> Vec<&str> {
        self.files.iter().map(|file| file.file_name.as_str()).collect()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_groups".to_string(), self.cnt_groups);
        dict_counts.insert("cnt_written".to_string(), self.cnt_written);
        dict_counts.insert("cnt_discarded".to_string(), self.cnt_discarded);
        dict_counts.insert("cnt_failed".to_string(), self.cnt_failed);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        format!(
            "{prefix} groups={} written={} discarded={} failed={} warnings={}",
            dict_counts["cnt_groups"],
            dict_counts["cnt_written"],
            dict_counts["cnt_discarded"],
            dict_counts["cnt_failed"],
            dict_counts["cnt_warnings"]
        )
    }
}

impl fmt::Display for ReportSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[SPLIT]"))
    }
}

/// Mutable accumulator for split statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportSplitBuilder {
    cnt_groups: u64,
    files: Vec<SpecSplitFile>,
    discarded: Vec<SpecDiscardedGroup>,
    errors: Vec<SpecGroupError>,
    warnings: Vec<String>,
}

impl ReportSplitBuilder {
    /// Set the number of planned groups.
    pub fn set_groups(&mut self, cnt_groups: usize) {
        self.cnt_groups = cnt_groups as u64;
    }

    /// Record one written file.
    pub fn add_written(&mut self, file_name: String, split_key: String, n_rows: usize) {
        self.files.push(SpecSplitFile {
            file_name,
            split_key,
            n_rows,
        });
    }

    /// Record one dropped group.
    pub fn add_discarded(&mut self, split_key: String, n_rows: usize, reason: EnumDiscardReason) {
        self.discarded.push(SpecDiscardedGroup {
            split_key,
            n_rows,
            reason,
        });
    }

    /// Add one key-scoped error.
    pub fn add_error(&mut self, split_key: String, exception: String) {
        self.errors.push(SpecGroupError {
            split_key,
            exception,
        });
    }

    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Groups written so far.
    pub fn cnt_written(&self) -> usize {
        self.files.len()
    }

    /// Groups dropped so far.
    pub fn cnt_discarded(&self) -> usize {
        self.discarded.len()
    }

    /// Groups failed so far.
    pub fn cnt_failed(&self) -> usize {
        self.errors.len()
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportSplit {
        ReportSplit {
            cnt_groups: self.cnt_groups,
            cnt_written: self.files.len() as u64,
            cnt_discarded: self.discarded.len() as u64,
            cnt_failed: self.errors.len() as u64,
            files: self.files,
            discarded: self.discarded,
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_builder_counts_and_format() {
        let mut builder = ReportSplitBuilder::default();
        builder.set_groups(4);
        builder.add_written("North-20240115.xlsx".to_string(), "North".to_string(), 2);
        builder.add_discarded("".to_string(), 1, EnumDiscardReason::EmptyKey);
        builder.add_error("South".to_string(), "xlsx write error".to_string());
        builder.add_warning("renamed".to_string());

        let report = builder.build();
        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_groups"], 4);
        assert_eq!(dict_counts["cnt_written"], 1);
        assert_eq!(dict_counts["cnt_discarded"], 1);
        assert_eq!(dict_counts["cnt_failed"], 1);
        assert_eq!(dict_counts["cnt_warnings"], 1);
        assert_eq!(report.file_names(), vec!["North-20240115.xlsx"]);

        let txt = report.format("[SPLIT]");
        assert_eq!(
            txt,
            "[SPLIT] groups=4 written=1 discarded=1 failed=1 warnings=1"
        );
        assert_eq!(report.to_string(), txt);
    }
}
