//! Split engine: group table rows and package one workbook per group.

use std::collections::{BTreeSet, HashMap};

use polars::prelude::{Column, DataFrame};

use crate::archive::ZipPackager;
use crate::conf::C_SHEET_NAME_PLAIN;
use crate::report::ReportSplitBuilder;
use crate::sheet::{SourceWorksheet, read_split_input};
use crate::spec::{
    EnumFileNameConflictStrategy, EnumGroupFailureStrategy, EnumSplitMode, SpecRowGroup,
    SpecSplitOptions, SpecSplitOutput, SplitError,
};
use crate::util::{
    create_archive_name, create_output_file_name, derive_split_key, derive_text_from_any_value,
    derive_unique_split_key, fold_split_key, join_split_values, resolve_split_columns,
    validate_unique_columns,
};
use crate::writer::{write_formatted_group_workbook, write_plain_group_workbook};

/// Partition table rows by the exact text tuple of `cols_split`.
///
/// Groups come back in order of first appearance, rows in table order.
pub fn plan_row_groups(df: &DataFrame, cols_split: &[String]) -> Result<Vec<SpecRowGroup>, String> {
    let l_columns: Vec<&Column> = cols_split
        .iter()
        .map(|c_name| df.column(c_name).map_err(|err| err.to_string()))
        .collect::<Result<_, _>>()?;

    let mut dict_group_idx: HashMap<Vec<String>, usize> = HashMap::new();
    let mut l_groups: Vec<SpecRowGroup> = Vec::new();
    for row_idx in 0..df.height() {
        let mut l_values = Vec::with_capacity(l_columns.len());
        for column in &l_columns {
            let value = column.get(row_idx).map_err(|err| err.to_string())?;
            l_values.push(derive_text_from_any_value(value));
        }

        match dict_group_idx.get(&l_values) {
            Some(n_idx) => l_groups[*n_idx].rows.push(row_idx),
            None => {
                dict_group_idx.insert(l_values.clone(), l_groups.len());
                l_groups.push(SpecRowGroup {
                    values: l_values,
                    rows: vec![row_idx],
                });
            }
        }
    }
    Ok(l_groups)
}

/// Split `df` by `cols_split` into a zip of per-group workbooks.
///
/// `sheet_source` is required in format-preserving mode, where table row `i`
/// must be worksheet row `header_row + i` (zero-based). `header_row` is 1-based.
pub fn split_table(
    df: &DataFrame,
    sheet_source: Option<&SourceWorksheet>,
    header_row: usize,
    cols_split: &[String],
    options: &SpecSplitOptions,
) -> Result<SpecSplitOutput, SplitError> {
    if header_row == 0 {
        return Err(SplitError::InvalidHeaderRow(header_row));
    }

    let l_labels: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    validate_unique_columns(&l_labels).map_err(SplitError::DuplicateColumns)?;
    let l_cols_split = resolve_split_columns(&l_labels, cols_split)?;
    log::debug!("split columns resolved: {cols_split:?} -> {l_cols_split:?}");

    let sheet_source = match options.rule_mode {
        EnumSplitMode::Plain => None,
        EnumSplitMode::FormatPreserving => {
            let sheet = sheet_source.ok_or(SplitError::MissingSourceWorksheet)?;
            validate_sheet_alignment(df, sheet, header_row)?;
            Some(sheet)
        }
    };
    let sheet_name_out = match (&options.sheet_name_out, sheet_source) {
        (Some(c_name), _) => c_name.clone(),
        (None, Some(sheet)) => sheet.name().to_string(),
        (None, None) => C_SHEET_NAME_PLAIN.to_string(),
    };

    let l_groups = plan_row_groups(df, &l_cols_split).map_err(SplitError::TableAccess)?;
    log::debug!(
        "planned {} groups over {} rows ({:?} mode)",
        l_groups.len(),
        df.height(),
        options.rule_mode
    );

    let mut packager = ZipPackager::new(options.date_stamp).map_err(SplitError::ArchiveFailed)?;
    let mut report = ReportSplitBuilder::default();
    report.set_groups(l_groups.len());
    let mut set_keys_existing: BTreeSet<String> = BTreeSet::new();

    for group in &l_groups {
        let c_key = match derive_split_key(&group.values, &options.words_noise) {
            Ok(val) => val,
            Err(reason) => {
                let c_key_raw = join_split_values(&group.values);
                log::warn!(
                    "discarded group {c_key_raw:?} ({} rows): {reason:?}",
                    group.rows.len()
                );
                report.add_discarded(c_key_raw, group.rows.len(), reason);
                continue;
            }
        };

        let c_key_unique = match options.rule_conflict_name {
            EnumFileNameConflictStrategy::Suffix => {
                let c_key_unique = derive_unique_split_key(&c_key, &mut set_keys_existing);
                if c_key_unique != c_key {
                    let c_warning = format!("split key {c_key:?} renamed to {c_key_unique:?}");
                    log::warn!("{c_warning}");
                    report.add_warning(c_warning);
                }
                c_key_unique
            }
            EnumFileNameConflictStrategy::Error => {
                if !set_keys_existing.insert(fold_split_key(&c_key)) {
                    return Err(SplitError::FileNameConflict(create_output_file_name(
                        &c_key,
                        options.date_stamp,
                    )));
                }
                c_key
            }
        };
        let c_file_name = create_output_file_name(&c_key_unique, options.date_stamp);

        let result_bytes = match sheet_source {
            Some(sheet) => write_formatted_group_workbook(
                sheet,
                header_row,
                &group.rows,
                &sheet_name_out,
                options.date_stamp,
            ),
            None => write_plain_group_workbook(
                df,
                &group.rows,
                &sheet_name_out,
                options.date_stamp,
            ),
        };

        match result_bytes {
            Ok(v_bytes) => {
                packager
                    .add_file(&c_file_name, &v_bytes)
                    .map_err(SplitError::ArchiveFailed)?;
                log::debug!(
                    "wrote {c_file_name} ({} rows, {} bytes)",
                    group.rows.len(),
                    v_bytes.len()
                );
                report.add_written(c_file_name, c_key_unique, group.rows.len());
            }
            Err(err) => match options.rule_group_failure {
                EnumGroupFailureStrategy::Abort => {
                    return Err(SplitError::GroupFailed {
                        split_key: c_key_unique,
                        message: err,
                    });
                }
                EnumGroupFailureStrategy::Skip => {
                    log::warn!("skipped group {c_key_unique:?}: {err}");
                    report.add_error(c_key_unique, err);
                }
            },
        }
    }

    if packager.is_empty() {
        return Err(SplitError::NoGroupsProduced {
            cnt_discarded: report.cnt_discarded(),
            cnt_failed: report.cnt_failed(),
        });
    }

    let archive = packager.finish().map_err(SplitError::ArchiveFailed)?;
    let report = report.build();
    log::info!("{}", report.format("[SPLIT]"));

    Ok(SpecSplitOutput {
        archive,
        archive_name: create_archive_name(options.date_stamp),
        report,
    })
}

/// Load `data` as xlsx and run [`split_table`] on the chosen sheet.
pub fn split_xlsx_bytes(
    data: &[u8],
    sheet_name: Option<&str>,
    header_row: usize,
    cols_split: &[String],
    options: &SpecSplitOptions,
) -> Result<SpecSplitOutput, SplitError> {
    if header_row == 0 {
        return Err(SplitError::InvalidHeaderRow(header_row));
    }
    let input = read_split_input(data, sheet_name, header_row)?;
    split_table(&input.df, Some(&input.sheet), header_row, cols_split, options)
}

fn validate_sheet_alignment(
    df: &DataFrame,
    sheet: &SourceWorksheet,
    header_row: usize,
) -> Result<(), SplitError> {
    let n_rows_sheet = sheet.height() as usize;
    if header_row > n_rows_sheet {
        return Err(SplitError::InvalidHeaderRow(header_row));
    }
    if header_row + df.height() > n_rows_sheet {
        return Err(SplitError::TableAccess(format!(
            "table has {} rows but worksheet {:?} has {} rows below row {header_row}",
            df.height(),
            sheet.name(),
            n_rows_sheet - header_row
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::spec::{EnumDiscardReason, EnumSourceValue, SpecSourceCell};

    fn create_table(columns: &[(&str, &[&str])]) -> DataFrame {
        let l_columns: Vec<Column> = columns
            .iter()
            .map(|(c_name, l_values)| {
                let l_values: Vec<String> = l_values.iter().map(|val| val.to_string()).collect();
                Column::new((*c_name).into(), l_values)
            })
            .collect();
        DataFrame::new(l_columns).unwrap()
    }

    fn create_options(rule_mode: EnumSplitMode) -> SpecSplitOptions {
        SpecSplitOptions {
            rule_mode,
            date_stamp: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plan_row_groups_keeps_first_seen_order() {
        let df = create_table(&[
            ("Region", &["South", "North", "South", "East"]),
            ("Qty", &["1", "2", "3", "4"]),
        ]);

        let l_groups = plan_row_groups(&df, &["Region".to_string()]).unwrap();
        let l_summary: Vec<(Vec<String>, Vec<usize>)> = l_groups
            .into_iter()
            .map(|group| (group.values, group.rows))
            .collect();
        assert_eq!(
            l_summary,
            vec![
                (vec!["South".to_string()], vec![0, 2]),
                (vec!["North".to_string()], vec![1]),
                (vec!["East".to_string()], vec![3]),
            ]
        );
    }

    #[test]
    fn test_plan_row_groups_compares_text_exactly() {
        let df = create_table(&[("Code", &["5", "5.0", "a", "A"])]);
        let l_groups = plan_row_groups(&df, &["Code".to_string()]).unwrap();
        assert_eq!(l_groups.len(), 4);
    }

    #[test]
    fn test_split_table_rejects_zero_header_row() {
        let df = create_table(&[("Region", &["North"])]);
        let err = split_table(
            &df,
            None,
            0,
            &["Region".to_string()],
            &create_options(EnumSplitMode::Plain),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::InvalidHeaderRow(0)));
    }

    #[test]
    fn test_split_table_requires_sheet_in_format_mode() {
        let df = create_table(&[("Region", &["North"])]);
        let err = split_table(
            &df,
            None,
            1,
            &["Region".to_string()],
            &create_options(EnumSplitMode::FormatPreserving),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::MissingSourceWorksheet));
    }

    #[test]
    fn test_split_table_rejects_misaligned_sheet() {
        let df = create_table(&[("Region", &["North", "South", "East"])]);
        let mut sheet = SourceWorksheet::new("Data");
        sheet
            .set_cell(0, 0, SpecSourceCell::new(EnumSourceValue::String("Region".to_string())))
            .unwrap();
        sheet
            .set_cell(1, 0, SpecSourceCell::new(EnumSourceValue::String("North".to_string())))
            .unwrap();

        let err = split_table(
            &df,
            Some(&sheet),
            1,
            &["A".to_string()],
            &create_options(EnumSplitMode::FormatPreserving),
        )
        .unwrap_err();
        assert!(matches!(err, SplitError::TableAccess(_)));
    }

    #[test]
    fn test_split_table_reports_all_discarded_as_no_groups() {
        let df = create_table(&[("Region", &["", "Sum of Sales", "  "])]);
        let err = split_table(
            &df,
            None,
            1,
            &["Region".to_string()],
            &create_options(EnumSplitMode::Plain),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SplitError::NoGroupsProduced {
                cnt_discarded: 3,
                cnt_failed: 0
            }
        ));
    }

    #[test]
    fn test_split_table_records_discarded_groups() {
        let df = create_table(&[("Region", &["North", "", "Sum of Sales", "North"])]);
        let output = split_table(
            &df,
            None,
            1,
            &["Region".to_string()],
            &create_options(EnumSplitMode::Plain),
        )
        .unwrap();

        assert_eq!(output.archive_name, "SplitResult-20240115.zip");
        assert_eq!(output.report.cnt_groups, 3);
        assert_eq!(output.report.file_names(), vec!["North-20240115.xlsx"]);
        assert_eq!(output.report.files[0].n_rows, 2);
        let l_reasons: Vec<EnumDiscardReason> = output
            .report
            .discarded
            .iter()
            .map(|group| group.reason.clone())
            .collect();
        assert_eq!(
            l_reasons,
            vec![
                EnumDiscardReason::EmptyKey,
                EnumDiscardReason::NoiseMatch("Sum of".to_string()),
            ]
        );
    }
}
