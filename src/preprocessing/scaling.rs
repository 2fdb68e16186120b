// src/preprocessing/scaling.rs
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::artifact::{FeatureKind, FeatureSchema};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ColumnScale {
    pub mean: f64,
    pub std_dev: f64,
}

impl ColumnScale {
    pub fn apply(&self, value: f64) -> f64 {
        // constant training column
        if self.std_dev.abs() < f64::EPSILON {
            return 0.0;
        }
        (value - self.mean) / self.std_dev
    }
}

/// Per-numeric-feature standardization frozen at training time.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ScalingParameters {
    columns: BTreeMap<String, ColumnScale>,
}

impl ScalingParameters {
    /// Identity scaling, used when a model was fit on unscaled input.
    pub fn none() -> Self {
        Self::default()
    }

    /// Computes mean and population standard deviation of every numeric column.
    pub fn fit(schema: &FeatureSchema, matrix: &Array2<f64>) -> Self {
        let columns = schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(idx, column)| column.kind == FeatureKind::Numeric && *idx < matrix.ncols())
            .map(|(idx, column)| {
                let values = matrix.column(idx);
                let scale = ColumnScale {
                    mean: values.mean().unwrap_or(0.0),
                    std_dev: if values.is_empty() { 0.0 } else { values.std(0.0) },
                };
                (column.name.clone(), scale)
            })
            .collect();
        Self { columns }
    }

    pub fn get(&self, feature: &str) -> Option<&ColumnScale> {
        self.columns.get(feature)
    }

    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn apply_row(&self, schema: &FeatureSchema, row: &mut [f64]) {
        for (column, value) in schema.columns().iter().zip(row.iter_mut()) {
            if let Some(scale) = self.columns.get(&column.name) {
                *value = scale.apply(*value);
            }
        }
    }

    pub fn apply_matrix(&self, schema: &FeatureSchema, matrix: &mut Array2<f64>) {
        for mut row in matrix.rows_mut() {
            if let Some(slice) = row.as_slice_mut() {
                self.apply_row(schema, slice);
            } else {
                let mut owned = row.to_vec();
                self.apply_row(schema, &mut owned);
                row.assign(&ndarray::ArrayView1::from(&owned));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_only_numeric_columns() {
        let schema = FeatureSchema::from_names(&["country", "owner_age"]);
        let matrix = array![[0.0, 20.0], [1.0, 40.0]];
        let params = ScalingParameters::fit(&schema, &matrix);

        assert!(params.get("country").is_none());
        let age = params.get("owner_age").unwrap();
        assert_eq!(age.mean, 30.0);
        assert_eq!(age.std_dev, 10.0);
    }

    #[test]
    fn test_apply_row_standardizes() {
        let schema = FeatureSchema::from_names(&["country", "owner_age"]);
        let matrix = array![[0.0, 20.0], [1.0, 40.0]];
        let params = ScalingParameters::fit(&schema, &matrix);

        let mut row = vec![1.0, 50.0];
        params.apply_row(&schema, &mut row);
        assert_eq!(row, vec![1.0, 2.0]);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let schema = FeatureSchema::from_names(&["personal_income"]);
        let mut matrix = array![[5.0], [5.0], [5.0]];
        let params = ScalingParameters::fit(&schema, &matrix);
        params.apply_matrix(&schema, &mut matrix);
        assert!(matrix.iter().all(|v| *v == 0.0));

        let mut row = vec![1000.0];
        params.apply_row(&schema, &mut row);
        assert_eq!(row, vec![0.0]);
    }

    #[test]
    fn test_none_is_identity() {
        let schema = FeatureSchema::from_names(&["owner_age"]);
        let mut row = vec![42.0];
        ScalingParameters::none().apply_row(&schema, &mut row);
        assert_eq!(row, vec![42.0]);
    }
}
