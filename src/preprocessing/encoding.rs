// src/preprocessing/encoding.rs
use anyhow::{Context, Result};
use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::artifact::{FeatureKind, FeatureSchema};
use crate::preprocessing::normalize::{CanonicalRow, CellValue};
use crate::utils::constants::UNKNOWN_CATEGORY;

/// How an inference-time category was mapped onto a known code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Exact,
    CaseInsensitive,
    UnknownCategory,
    FirstKnown,
}

/// Category -> dense code mapping for one categorical feature.
///
/// Codes are the positions of the categories in sorted order, so they are stable for
/// the lifetime of the table. Tables are only built by [`EncodingTable::fit`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EncodingTable {
    classes: Vec<String>,
    // lower-cased category -> code of the last (highest) category with that spelling
    lowercase: BTreeMap<String, u32>,
    unknown_code: Option<u32>,
}

impl EncodingTable {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        let classes: Vec<String> = values
            .into_iter()
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut lowercase = BTreeMap::new();
        for (code, class) in classes.iter().enumerate() {
            lowercase.insert(class.to_lowercase(), code as u32);
        }
        let unknown_code = classes
            .iter()
            .position(|c| c == UNKNOWN_CATEGORY)
            .map(|p| p as u32);

        Self {
            classes,
            lowercase,
            unknown_code,
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn unknown_code(&self) -> Option<u32> {
        self.unknown_code
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Resolves a value seen at inference time. Never fails: exact match, then
    /// case-insensitive match, then the `"Unknown"` code, then the first known code.
    pub fn resolve(&self, value: &str) -> (u32, Resolution) {
        if let Ok(pos) = self.classes.binary_search_by(|c| c.as_str().cmp(value)) {
            return (pos as u32, Resolution::Exact);
        }
        if let Some(code) = self.lowercase.get(&value.to_lowercase()) {
            return (*code, Resolution::CaseInsensitive);
        }
        if let Some(code) = self.unknown_code {
            return (code, Resolution::UnknownCategory);
        }
        // An empty table has no first code either; 0 keeps the column numeric.
        (0, Resolution::FirstKnown)
    }

    pub fn encode(&self, value: &str) -> u32 {
        self.resolve(value).0
    }
}

/// All encoding tables of an artifact, keyed by feature name.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct EncodingTables {
    tables: BTreeMap<String, EncodingTable>,
}

impl EncodingTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Training path: builds one table per categorical column from the observed values
    /// and returns the encoded matrix (rows x schema columns).
    pub fn fit(schema: &FeatureSchema, rows: &[CanonicalRow]) -> Result<(Self, Array2<f64>)> {
        let mut tables = BTreeMap::new();
        for (idx, column) in schema.columns().iter().enumerate() {
            if column.kind != FeatureKind::Categorical {
                continue;
            }
            let table = EncodingTable::fit(
                rows.iter()
                    .filter_map(|row| row.get(idx).and_then(CellValue::as_category)),
            );
            debug!(
                "Fitted encoding for '{}' with {} categories",
                column.name,
                table.len()
            );
            tables.insert(column.name.clone(), table);
        }

        let encoders = Self { tables };
        let flat: Vec<f64> = rows
            .iter()
            .flat_map(|row| encoders.encode_row(schema, row))
            .collect();
        let matrix = Array2::from_shape_vec((rows.len(), schema.len()), flat)
            .context("Encoded training rows do not match the feature schema")?;
        Ok((encoders, matrix))
    }

    pub fn get(&self, feature: &str) -> Option<&EncodingTable> {
        self.tables.get(feature)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Inference path: encodes one canonical row into schema order.
    /// Categorical columns without a table (schema drift) encode to 0.
    pub fn encode_row(&self, schema: &FeatureSchema, row: &CanonicalRow) -> Vec<f64> {
        schema
            .columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let cell = row.get(idx);
                match column.kind {
                    FeatureKind::Numeric => cell.and_then(CellValue::as_number).unwrap_or(0.0),
                    FeatureKind::Categorical => {
                        let Some(table) = self.tables.get(&column.name) else {
                            return 0.0;
                        };
                        let value = match cell {
                            Some(CellValue::Category(s)) => s.clone(),
                            Some(CellValue::Numeric(v)) => v.to_string(),
                            None => UNKNOWN_CATEGORY.to_string(),
                        };
                        let (code, resolution) = table.resolve(&value);
                        if resolution != Resolution::Exact {
                            debug!(
                                "Resolved '{}' for '{}' to code {} via {:?}",
                                value, column.name, code, resolution
                            );
                        }
                        code as f64
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn insurance_table() -> EncodingTable {
        EncodingTable::fit(["Yes", "No", "Yes", "Unknown"].into_iter())
    }

    #[test]
    fn test_fit_assigns_sorted_dense_codes() {
        let table = insurance_table();
        assert_eq!(table.classes(), &["No", "Unknown", "Yes"]);
        assert_eq!(table.unknown_code(), Some(1));
        assert_eq!(table.encode("No"), 0);
        assert_eq!(table.encode("Yes"), 2);
    }

    #[test]
    fn test_case_insensitive_match() {
        let table = insurance_table();
        assert_eq!(table.resolve("yes"), (2, Resolution::CaseInsensitive));
        assert_eq!(table.encode("yes"), table.encode("Yes"));
        assert_eq!(table.encode("YES"), table.encode("Yes"));
    }

    #[test]
    fn test_unseen_category_uses_unknown_then_first() {
        let table = insurance_table();
        assert_eq!(table.resolve("Maybe"), (1, Resolution::UnknownCategory));

        let without_unknown = EncodingTable::fit(["zimbabwe", "malawi"].into_iter());
        assert_eq!(without_unknown.resolve("narnia"), (0, Resolution::FirstKnown));
        // deterministic
        assert_eq!(without_unknown.encode("narnia"), without_unknown.encode("narnia"));
    }

    #[test]
    fn test_exact_match_wins_over_case_variant() {
        let table = EncodingTable::fit(["Yes", "yes"].into_iter());
        assert_eq!(table.resolve("Yes"), (0, Resolution::Exact));
        assert_eq!(table.resolve("yes"), (1, Resolution::Exact));
        // case variants collapse onto the last one in sorted order
        assert_eq!(table.resolve("YES"), (1, Resolution::CaseInsensitive));

        let table = EncodingTable::fit(["No", "Yes", "yes"].into_iter());
        assert_eq!(table.resolve("YES"), (2, Resolution::CaseInsensitive));
    }

    #[test]
    fn test_empty_table_resolves_to_zero() {
        let table = EncodingTable::fit(std::iter::empty());
        assert!(table.is_empty());
        assert_eq!(table.encode("anything"), 0);
    }

    #[test]
    fn test_fit_and_encode_rows() {
        let schema = FeatureSchema::from_names(&["country", "owner_age", "has_insurance"]);
        let rows = vec![
            vec![
                CellValue::Category("malawi".into()),
                CellValue::Numeric(30.0),
                CellValue::Category("Yes".into()),
            ],
            vec![
                CellValue::Category("lesotho".into()),
                CellValue::Numeric(45.0),
                CellValue::Category("No".into()),
            ],
        ];
        let (tables, matrix) = EncodingTables::fit(&schema, &rows).unwrap();
        assert_eq!(matrix.dim(), (2, 3));
        assert_eq!(matrix[[0, 0]], 1.0);
        assert_eq!(matrix[[1, 0]], 0.0);
        assert_eq!(matrix[[1, 1]], 45.0);
        assert_eq!(tables.feature_names().collect::<Vec<_>>(), vec!["country", "has_insurance"]);

        let inference_row = vec![
            CellValue::Category("MALAWI".into()),
            CellValue::Numeric(29.0),
            CellValue::Category("no".into()),
        ];
        assert_eq!(tables.encode_row(&schema, &inference_row), vec![1.0, 29.0, 0.0]);
    }

    #[test]
    fn test_missing_table_defaults_to_zero() {
        let schema = FeatureSchema::from_names(&["country", "owner_sex"]);
        let rows = vec![vec![
            CellValue::Category("malawi".into()),
            CellValue::Category("Female".into()),
        ]];
        let (mut tables, _) = EncodingTables::fit(&schema, &rows).unwrap();
        tables.tables.remove("owner_sex");

        let encoded = tables.encode_row(
            &schema,
            &vec![CellValue::Category("zimbabwe".into()), CellValue::Category("Male".into())],
        );
        assert_eq!(encoded, vec![0.0, 0.0]);
    }
}
