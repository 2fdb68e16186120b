// src/lifecycle/dataset.rs
use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::models::artifact::FeatureSchema;
use crate::models::survey::FinancialHealth;
use crate::utils::constants::LABEL_COLUMN;

/// Which feature columns a training run takes from a dataset.
#[derive(Debug, Clone, Copy)]
pub enum FeatureSelection<'a> {
    /// Use the listed columns that the dataset actually has.
    Available(&'a [&'a str]),
    /// Every listed column must exist.
    Required(&'a [&'a str]),
}

/// Labelled survey rows loaded from a CSV file, restricted to the selected features.
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    schema: FeatureSchema,
    records: Vec<Vec<Option<String>>>,
    labels: Vec<FinancialHealth>,
    skipped_rows: usize,
}

impl TrainingDataset {
    pub fn from_csv<P: AsRef<Path>>(path: P, selection: FeatureSelection<'_>) -> Result<Self> {
        let path = path.as_ref();
        let reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open training data {}", path.display()))?;
        let dataset = Self::from_csv_reader(reader, selection)
            .with_context(|| format!("Failed to load training data {}", path.display()))?;
        info!(
            "Loaded {} labelled rows with {} features from {}",
            dataset.len(),
            dataset.schema.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R, selection: FeatureSelection<'_>) -> Result<Self> {
        Self::from_csv_reader(csv::Reader::from_reader(reader), selection)
    }

    fn from_csv_reader<R: Read>(
        mut reader: csv::Reader<R>,
        selection: FeatureSelection<'_>,
    ) -> Result<Self> {
        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        let column_index = |name: &str| headers.iter().position(|h| h == name);

        let label_idx = column_index(LABEL_COLUMN)
            .ok_or_else(|| anyhow!("Dataset has no '{}' label column", LABEL_COLUMN))?;

        let selected: Vec<&str> = match selection {
            FeatureSelection::Available(candidates) => candidates
                .iter()
                .copied()
                .filter(|c| column_index(c).is_some())
                .collect(),
            FeatureSelection::Required(required) => {
                let missing: Vec<&str> = required
                    .iter()
                    .copied()
                    .filter(|c| column_index(c).is_none())
                    .collect();
                if !missing.is_empty() {
                    return Err(anyhow!("Dataset is missing required columns: {:?}", missing));
                }
                required.to_vec()
            }
        };
        if selected.is_empty() {
            return Err(anyhow!("Dataset contains none of the survey feature columns"));
        }
        let indices: Vec<usize> = selected.iter().filter_map(|c| column_index(c)).collect();

        let mut records = Vec::new();
        let mut labels = Vec::new();
        let mut skipped_rows = 0;
        for (line, row) in reader.records().enumerate() {
            let row = row.with_context(|| format!("Failed to read CSV row {}", line + 2))?;
            let label = match row.get(label_idx).map(str::parse::<FinancialHealth>) {
                Some(Ok(label)) => label,
                _ => {
                    skipped_rows += 1;
                    continue;
                }
            };
            let record = indices
                .iter()
                .map(|&i| {
                    row.get(i)
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                })
                .collect();
            records.push(record);
            labels.push(label);
        }

        if skipped_rows > 0 {
            warn!(
                "Skipped {} rows without a Low/Medium/High '{}' value",
                skipped_rows, LABEL_COLUMN
            );
        }
        if records.is_empty() {
            return Err(anyhow!("Dataset has no usable labelled rows"));
        }

        Ok(Self {
            schema: FeatureSchema::from_names(&selected),
            records,
            labels,
            skipped_rows,
        })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Raw cells in schema order; `None` marks an empty cell.
    pub fn records(&self) -> &[Vec<Option<String>>] {
        &self.records
    }

    pub fn labels(&self) -> &[FinancialHealth] {
        &self.labels
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn class_counts(&self) -> BTreeMap<FinancialHealth, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }
}
