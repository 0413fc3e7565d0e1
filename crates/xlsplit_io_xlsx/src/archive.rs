//! In-memory zip packager for split outputs.

use std::collections::BTreeSet;
use std::io::{Cursor, Write};

use chrono::{Datelike, NaiveDate};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::conf::TUP_YEAR_RANGE_ZIP;
use crate::util::clamp_date_stamp;

/// Ordered zip builder; entries are stored as-is and names must be unique ignoring case.
pub struct ZipPackager {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    set_names_existing: BTreeSet<String>,
    l_names: Vec<String>,
}

impl ZipPackager {
    /// Create an empty archive whose entry timestamps are `date_stamp` 00:00:00.
    ///
    /// Dates outside the zip range (1980..=2107) are pinned to its nearest end.
    pub fn new(date_stamp: NaiveDate) -> Result<Self, String> {
        let date_stamp = clamp_date_stamp(date_stamp, TUP_YEAR_RANGE_ZIP);
        let dt_modified = DateTime::from_date_and_time(
            date_stamp.year() as u16,
            date_stamp.month() as u8,
            date_stamp.day() as u8,
            0,
            0,
            0,
        )
        .map_err(|err| format!("invalid archive timestamp {date_stamp}: {err}"))?;

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .last_modified_time(dt_modified);

        Ok(Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            set_names_existing: BTreeSet::new(),
            l_names: Vec::new(),
        })
    }

    /// Append one entry. A name already in the archive is refused.
    pub fn add_file(&mut self, file_name: &str, data: &[u8]) -> Result<(), String> {
        let c_name_folded = file_name.to_lowercase();
        if self.set_names_existing.contains(&c_name_folded) {
            return Err(format!("duplicate archive entry: {file_name:?}"));
        }

        self.writer
            .start_file(file_name, self.options)
            .map_err(|err| format!("zip write error: {err}"))?;
        self.writer
            .write_all(data)
            .map_err(|err| format!("zip write error: {err}"))?;

        self.set_names_existing.insert(c_name_folded);
        self.l_names.push(file_name.to_string());
        Ok(())
    }

    /// Entry names in insertion order.
    pub fn names(&self) -> &[String] {
        &self.l_names
    }

    /// Number of entries written.
    pub fn len(&self) -> usize {
        self.l_names.len()
    }

    /// True when no entry was written.
    pub fn is_empty(&self) -> bool {
        self.l_names.is_empty()
    }

    /// Finalize the central directory and return the archive bytes.
    pub fn finish(self) -> Result<Vec<u8>, String> {
        let cursor = self
            .writer
            .finish()
            .map_err(|err| format!("zip finish error: {err}"))?;
        Ok(cursor.into_inner())
    }
}
