// src/lifecycle/test_support.rs
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::utils::constants::{is_numeric_field, LABEL_COLUMN};

/// Writes a labelled survey CSV whose columns separate cleanly by class.
pub(crate) fn write_survey_csv(path: &Path, columns: &[&str], rows: usize) {
    let mut csv = columns.join(",");
    csv.push(',');
    csv.push_str(LABEL_COLUMN);
    csv.push('\n');

    for i in 0..rows {
        let (class_idx, target) = match i % 3 {
            0 => (0usize, "Low"),
            1 => (1, "Medium"),
            _ => (2, "High"),
        };
        for column in columns {
            let cell = if is_numeric_field(column) {
                ((class_idx + 1) * 10_000 + i % 50).to_string()
            } else if *column == "country" {
                ["malawi", "lesotho", "eswatini"][class_idx].to_string()
            } else {
                ["No", "Sometimes", "Yes"][class_idx].to_string()
            };
            let _ = write!(csv, "{},", cell);
        }
        csv.push_str(target);
        csv.push('\n');
    }
    fs::write(path, csv).unwrap();
}
