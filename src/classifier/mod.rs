// src/classifier/mod.rs
//
// The learning algorithm is a replaceable capability: anything that can be fit on an
// encoded matrix and then predict a label plus a class distribution for one row.

pub mod forest;
pub mod prior;

use anyhow::{anyhow, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::models::survey::FinancialHealth;

pub use forest::{ForestParams, SurveyForest};
pub use prior::PriorClassifier;

pub trait Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[FinancialHealth]) -> Result<()>;

    fn predict(&self, row: &[f64]) -> Result<FinancialHealth>;

    /// Probability for each class in [`Classifier::classes`] order; sums to 1.
    fn predict_proba(&self, row: &[f64]) -> Result<Vec<(FinancialHealth, f64)>>;

    /// Classes seen during fitting, in ascending order.
    fn classes(&self) -> &[FinancialHealth];

    /// Input width the classifier was fit on, `None` before fitting.
    fn n_features(&self) -> Option<usize>;

    fn predict_batch(&self, x: &Array2<f64>) -> Result<Vec<FinancialHealth>> {
        x.rows()
            .into_iter()
            .map(|row| self.predict(&row.to_vec()))
            .collect()
    }
}

/// Checks training inputs shared by every implementation.
pub(crate) fn check_training_input(x: &Array2<f64>, y: &[FinancialHealth]) -> Result<()> {
    if x.nrows() == 0 {
        return Err(anyhow!("Cannot fit a classifier on zero samples"));
    }
    if x.nrows() != y.len() {
        return Err(anyhow!(
            "Feature matrix has {} rows but {} labels were given",
            x.nrows(),
            y.len()
        ));
    }
    Ok(())
}

pub(crate) fn check_row_width(row: &[f64], n_features: Option<usize>) -> Result<()> {
    match n_features {
        Some(n) if n == row.len() => Ok(()),
        Some(n) => Err(anyhow!(
            "Expected {} features, but got {}",
            n,
            row.len()
        )),
        None => Err(anyhow!("Classifier has not been fitted")),
    }
}

/// Sorted distinct labels.
pub(crate) fn distinct_classes(y: &[FinancialHealth]) -> Vec<FinancialHealth> {
    let mut classes = y.to_vec();
    classes.sort();
    classes.dedup();
    classes
}

/// Serializable closed set of classifiers an artifact can carry.
#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "kind", content = "model")]
pub enum ClassifierModel {
    Forest(SurveyForest),
    Prior(PriorClassifier),
}

impl ClassifierModel {
    pub fn describe(&self) -> String {
        match self {
            Self::Forest(forest) => format!("RandomForest({} trees)", forest.n_trees()),
            Self::Prior(_) => "PriorDistribution".to_string(),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Self::Forest(forest) => forest,
            Self::Prior(prior) => prior,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Self::Forest(forest) => forest,
            Self::Prior(prior) => prior,
        }
    }
}

impl Classifier for ClassifierModel {
    fn fit(&mut self, x: &Array2<f64>, y: &[FinancialHealth]) -> Result<()> {
        self.inner_mut().fit(x, y)
    }

    fn predict(&self, row: &[f64]) -> Result<FinancialHealth> {
        self.inner().predict(row)
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<(FinancialHealth, f64)>> {
        self.inner().predict_proba(row)
    }

    fn classes(&self) -> &[FinancialHealth] {
        self.inner().classes()
    }

    fn n_features(&self) -> Option<usize> {
        self.inner().n_features()
    }

    fn predict_batch(&self, x: &Array2<f64>) -> Result<Vec<FinancialHealth>> {
        self.inner().predict_batch(x)
    }
}
