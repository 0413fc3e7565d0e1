//! Stateless helper utilities used by the split engine.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use polars::prelude::AnyValue;

use crate::conf::{
    C_ARCHIVE_NAME_PREFIX, C_DATE_STAMP_FORMAT, C_FILENAME_REPLACEMENT, C_OUTPUT_EXTENSION,
    C_SPLIT_KEY_SEPARATOR, N_LEN_EXCEL_SHEET_NAME_MAX, TUP_EXCEL_ILLEGAL, TUP_FILENAME_ILLEGAL,
};
use crate::spec::{EnumColumnIdentifier, EnumDiscardReason, SplitError};

////////////////////////////////////////////////////////////////////////////////
// #region ColumnResolution

/// Validate that `columns` has no duplicated names.
pub fn validate_unique_columns(columns: &[String]) -> Result<(), String> {
    if columns.len() == columns.iter().collect::<BTreeSet<_>>().len() {
        return Ok(());
    }

    let mut dict_pos: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (n_idx, c_name) in columns.iter().enumerate() {
        dict_pos.entry(c_name).or_default().push(n_idx);
    }

    let c_msg = dict_pos
        .iter()
        .filter_map(|(c_name, l_pos)| {
            if l_pos.len() > 1 {
                Some(format!(
                    "{c_name:?} x{} at indices {:?}",
                    l_pos.len(),
                    l_pos
                ))
            } else {
                None
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    Err(format!("Duplicate column names detected: {c_msg}"))
}

/// Classify a user identifier: one ASCII letter selects by position, anything else by label.
pub fn parse_column_identifier(identifier: &str) -> EnumColumnIdentifier {
    let mut it_chars = identifier.chars();
    if let (Some(chr), None) = (it_chars.next(), it_chars.next())
        && chr.is_ascii_alphabetic()
    {
        let n_idx = (chr.to_ascii_uppercase() as u8 - b'A') as usize;
        return EnumColumnIdentifier::Index(n_idx);
    }
    EnumColumnIdentifier::Name(identifier.to_string())
}

/// Resolve letter-or-label identifiers to concrete labels, keeping identifier order.
pub fn resolve_split_columns(
    columns: &[String],
    identifiers: &[String],
) -> Result<Vec<String>, SplitError> {
    if identifiers.is_empty() {
        return Err(SplitError::NoSplitColumns);
    }

    let mut l_cols_resolved = Vec::with_capacity(identifiers.len());
    for c_identifier in identifiers {
        let c_col = match parse_column_identifier(c_identifier) {
            EnumColumnIdentifier::Index(n_idx) => columns.get(n_idx),
            EnumColumnIdentifier::Name(c_name) => columns.iter().find(|c_col| **c_col == c_name),
        };
        let Some(c_col) = c_col else {
            return Err(SplitError::UnknownColumn(c_identifier.clone()));
        };
        l_cols_resolved.push(c_col.clone());
    }

    Ok(l_cols_resolved)
}

/// Give blank labels an `Unnamed: {idx}` name and suffix repeats with `.1`, `.2`, ...
pub fn normalize_header_labels(labels: &[String]) -> Vec<String> {
    let mut set_seen: BTreeSet<String> = BTreeSet::new();
    let mut l_labels = Vec::with_capacity(labels.len());

    for (n_idx, c_label_raw) in labels.iter().enumerate() {
        let c_label = c_label_raw.trim();
        let c_base = if c_label.is_empty() {
            format!("Unnamed: {n_idx}")
        } else {
            c_label.to_string()
        };

        let mut c_candidate = c_base.clone();
        let mut n_dup = 1usize;
        while set_seen.contains(&c_candidate) {
            c_candidate = format!("{c_base}.{n_dup}");
            n_dup += 1;
        }
        set_seen.insert(c_candidate.clone());
        l_labels.push(c_candidate);
    }

    l_labels
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SplitKey

/// Derive the sanitized split key of a group, or why the group is dropped.
///
/// The noise check runs on the trimmed key before sanitization.
pub fn derive_split_key(
    values: &[String],
    words_noise: &[String],
) -> Result<String, EnumDiscardReason> {
    if values.iter().all(|val| val.trim().is_empty()) {
        return Err(EnumDiscardReason::EmptyKey);
    }

    let c_key = join_split_values(values);
    if let Some(c_word) = find_noise_word(&c_key, words_noise) {
        return Err(EnumDiscardReason::NoiseMatch(c_word.to_string()));
    }

    let c_key_sanitized = sanitize_file_stem(&c_key);
    if c_key_sanitized.trim().is_empty() {
        return Err(EnumDiscardReason::EmptyKey);
    }
    Ok(c_key_sanitized)
}

/// Trimmed grouping values joined in order, before any filtering.
pub fn join_split_values(values: &[String]) -> String {
    values
        .iter()
        .map(|val| val.trim())
        .collect::<Vec<&str>>()
        .join(C_SPLIT_KEY_SEPARATOR)
}

/// Return the first noise word contained in `key`, case-insensitively.
pub fn find_noise_word<'a>(key: &str, words_noise: &'a [String]) -> Option<&'a str> {
    let c_key_lower = key.to_lowercase();
    words_noise
        .iter()
        .find(|c_word| !c_word.is_empty() && c_key_lower.contains(&c_word.to_lowercase()))
        .map(String::as_str)
}

/// Replace reserved file name characters.
pub fn sanitize_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|chr| {
            if TUP_FILENAME_ILLEGAL.contains(&chr) {
                C_FILENAME_REPLACEMENT.to_string()
            } else {
                chr.to_string()
            }
        })
        .collect()
}

/// Return `split_key`, or the first free `split_key__{n}` (n >= 2), and mark it used.
///
/// Keys are compared case-insensitively; `set_keys_existing` holds folded keys.
pub fn derive_unique_split_key(split_key: &str, set_keys_existing: &mut BTreeSet<String>) -> String {
    if set_keys_existing.insert(fold_split_key(split_key)) {
        return split_key.to_string();
    }

    let mut n_idx = 2usize;
    loop {
        let c_candidate = format!("{split_key}__{n_idx}");
        if set_keys_existing.insert(fold_split_key(&c_candidate)) {
            return c_candidate;
        }
        n_idx += 1;
    }
}

/// Case-folded form used for collision checks; `North` and `NORTH` name the same file on
/// case-insensitive file systems.
pub fn fold_split_key(split_key: &str) -> String {
    split_key.to_lowercase()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Naming

/// `{split_key}-{YYYYMMDD}.xlsx`
pub fn create_output_file_name(split_key: &str, date_stamp: NaiveDate) -> String {
    format!(
        "{split_key}-{}.{C_OUTPUT_EXTENSION}",
        date_stamp.format(C_DATE_STAMP_FORMAT)
    )
}

/// `SplitResult-{YYYYMMDD}.zip`
pub fn create_archive_name(date_stamp: NaiveDate) -> String {
    format!(
        "{C_ARCHIVE_NAME_PREFIX}-{}.zip",
        date_stamp.format(C_DATE_STAMP_FORMAT)
    )
}

/// Pin `date_stamp` into `[year_min-01-01, year_max-12-31]`.
pub fn clamp_date_stamp(date_stamp: NaiveDate, year_range: (i32, i32)) -> NaiveDate {
    let (n_year_min, n_year_max) = year_range;
    if date_stamp.year() < n_year_min {
        NaiveDate::from_ymd_opt(n_year_min, 1, 1).unwrap_or(date_stamp)
    } else if date_stamp.year() > n_year_max {
        NaiveDate::from_ymd_opt(n_year_max, 12, 31).unwrap_or(date_stamp)
    } else {
        date_stamp
    }
}

/// Replace invalid chars and trim to valid Excel sheet name.
pub fn sanitize_sheet_name(name: &str, replace_to: &str) -> String {
    let mut c_name = name.to_string();
    for c_illegal in TUP_EXCEL_ILLEGAL {
        c_name = c_name.replace(c_illegal, replace_to);
    }
    c_name = c_name.trim().to_string();
    if c_name.is_empty() {
        c_name = "Sheet".to_string();
    }

    c_name.chars().take(N_LEN_EXCEL_SHEET_NAME_MAX).collect()
}

/// Zero-based column index to Excel letters (`0` -> `A`, `26` -> `AA`).
pub fn convert_col_idx_to_letters(col_idx: usize) -> String {
    let mut n_rest = col_idx + 1;
    let mut l_chars = Vec::new();
    while n_rest > 0 {
        let n_rem = (n_rest - 1) % 26;
        l_chars.push((b'A' + n_rem as u8) as char);
        n_rest = (n_rest - 1) / 26;
    }
    l_chars.iter().rev().collect()
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region TableAccess

/// Cell text of an all-text table; nulls read as `""`.
pub fn derive_text_from_any_value(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(val) => val.to_string(),
        AnyValue::StringOwned(val) => val.to_string(),
        _ => value.to_string(),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_noise_words;

    fn to_strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|val| val.to_string()).collect()
    }

    #[test]
    fn test_resolve_split_columns_by_letter_and_name() {
        let columns = to_strings(&["Region", "Date", "Product"]);

        assert_eq!(
            resolve_split_columns(&columns, &to_strings(&["A", "C"])).unwrap(),
            to_strings(&["Region", "Product"])
        );
        assert_eq!(
            resolve_split_columns(&columns, &to_strings(&["b", "Region"])).unwrap(),
            to_strings(&["Date", "Region"])
        );
    }

    #[test]
    fn test_resolve_split_columns_rejects_unknown_and_empty() {
        let columns = to_strings(&["Region", "Date", "Product"]);

        match resolve_split_columns(&columns, &to_strings(&["Z"])) {
            Err(SplitError::UnknownColumn(c_id)) => assert_eq!(c_id, "Z"),
            other => panic!("expected unknown column, got {other:?}"),
        }
        match resolve_split_columns(&columns, &to_strings(&["region"])) {
            Err(SplitError::UnknownColumn(c_id)) => assert_eq!(c_id, "region"),
            other => panic!("expected unknown column, got {other:?}"),
        }
        assert!(matches!(
            resolve_split_columns(&columns, &[]),
            Err(SplitError::NoSplitColumns)
        ));
    }

    #[test]
    fn test_parse_column_identifier() {
        assert_eq!(parse_column_identifier("a"), EnumColumnIdentifier::Index(0));
        assert_eq!(parse_column_identifier("D"), EnumColumnIdentifier::Index(3));
        assert_eq!(
            parse_column_identifier("7"),
            EnumColumnIdentifier::Name("7".to_string())
        );
        assert_eq!(
            parse_column_identifier("AB"),
            EnumColumnIdentifier::Name("AB".to_string())
        );
    }

    #[test]
    fn test_derive_split_key_joins_trims_and_sanitizes() {
        let words = derive_default_noise_words();

        assert_eq!(
            derive_split_key(&to_strings(&[" North ", "Q1"]), &words),
            Ok("North-Q1".to_string())
        );
        assert_eq!(
            derive_split_key(&to_strings(&["A/B:C"]), &words),
            Ok("A_B_C".to_string())
        );
        assert_eq!(
            derive_split_key(&to_strings(&["x\\y*z?\"<>|"]), &words),
            Ok("x_y_z_____".to_string())
        );
    }

    #[test]
    fn test_derive_split_key_discards_blank_and_noise() {
        let words = derive_default_noise_words();

        assert_eq!(
            derive_split_key(&to_strings(&["  ", ""]), &words),
            Err(EnumDiscardReason::EmptyKey)
        );
        assert_eq!(
            derive_split_key(&to_strings(&["Sum of Sales"]), &words),
            Err(EnumDiscardReason::NoiseMatch("Sum of".to_string()))
        );
        assert_eq!(
            derive_split_key(&to_strings(&["North", "grand (all)"]), &words),
            Err(EnumDiscardReason::NoiseMatch("(All)".to_string()))
        );
        assert_eq!(
            derive_split_key(&to_strings(&["Summer Sales"]), &words),
            Ok("Summer Sales".to_string())
        );
    }

    #[test]
    fn test_derive_unique_split_key_suffixes_repeats() {
        let mut set_keys = BTreeSet::new();
        assert_eq!(derive_unique_split_key("A_B", &mut set_keys), "A_B");
        assert_eq!(derive_unique_split_key("A_B", &mut set_keys), "A_B__2");
        assert_eq!(derive_unique_split_key("A_B", &mut set_keys), "A_B__3");
    }

    #[test]
    fn test_derive_unique_split_key_ignores_case() {
        let mut set_keys = BTreeSet::new();
        assert_eq!(derive_unique_split_key("North", &mut set_keys), "North");
        assert_eq!(derive_unique_split_key("north", &mut set_keys), "north__2");
        assert_eq!(derive_unique_split_key("NORTH", &mut set_keys), "NORTH__3");
        assert_eq!(derive_unique_split_key("North__2", &mut set_keys), "North__2__2");
    }

    #[test]
    fn test_clamp_date_stamp_pins_out_of_range_years() {
        let date_epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(
            clamp_date_stamp(date_epoch, (1980, 2107)),
            NaiveDate::from_ymd_opt(1980, 1, 1).unwrap()
        );
        let date_far = NaiveDate::from_ymd_opt(2200, 6, 1).unwrap();
        assert_eq!(
            clamp_date_stamp(date_far, (1980, 2107)),
            NaiveDate::from_ymd_opt(2107, 12, 31).unwrap()
        );
        let date_mid = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(clamp_date_stamp(date_mid, (1980, 2107)), date_mid);
    }

    #[test]
    fn test_normalize_header_labels() {
        assert_eq!(
            normalize_header_labels(&to_strings(&["Region", "", "Region", " Qty ", "Region"])),
            to_strings(&["Region", "Unnamed: 1", "Region.1", "Qty", "Region.2"])
        );
    }

    #[test]
    fn test_naming_uses_date_stamp() {
        let date_stamp = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            create_output_file_name("North", date_stamp),
            "North-20240309.xlsx"
        );
        assert_eq!(create_archive_name(date_stamp), "SplitResult-20240309.zip");
    }

    #[test]
    fn test_convert_col_idx_to_letters() {
        assert_eq!(convert_col_idx_to_letters(0), "A");
        assert_eq!(convert_col_idx_to_letters(25), "Z");
        assert_eq!(convert_col_idx_to_letters(26), "AA");
        assert_eq!(convert_col_idx_to_letters(701), "ZZ");
    }
}
