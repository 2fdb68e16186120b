// src/classifier/prior.rs
use anyhow::{anyhow, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::{check_row_width, check_training_input, distinct_classes, Classifier};
use crate::models::survey::FinancialHealth;

/// Ignores its input and answers with the class frequencies seen during fitting.
/// The prediction is the most frequent class, so it always agrees with the distribution.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct PriorClassifier {
    classes: Vec<FinancialHealth>,
    priors: Vec<f64>,
    n_features: Option<usize>,
}

impl PriorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priors(&self) -> Vec<(FinancialHealth, f64)> {
        self.classes.iter().copied().zip(self.priors.iter().copied()).collect()
    }
}

impl Classifier for PriorClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[FinancialHealth]) -> Result<()> {
        check_training_input(x, y)?;
        let classes = distinct_classes(y);
        let total = y.len() as f64;
        self.priors = classes
            .iter()
            .map(|c| y.iter().filter(|label| *label == c).count() as f64 / total)
            .collect();
        self.classes = classes;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<FinancialHealth> {
        check_row_width(row, self.n_features)?;
        self.classes
            .iter()
            .zip(&self.priors)
            .fold(None::<(FinancialHealth, f64)>, |best, (c, p)| match best {
                Some((_, bp)) if bp >= *p => best,
                _ => Some((*c, *p)),
            })
            .map(|(c, _)| c)
            .ok_or_else(|| anyhow!("Prior classifier has no classes"))
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<(FinancialHealth, f64)>> {
        check_row_width(row, self.n_features)?;
        Ok(self.priors())
    }

    fn classes(&self) -> &[FinancialHealth] {
        &self.classes
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}
