// src/classifier/forest.rs
use anyhow::{anyhow, Result};
use indicatif::ProgressBar;
use log::{debug, info};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters,
};
use std::fmt;

use super::{check_row_width, check_training_input, distinct_classes, Classifier};
use crate::models::survey::FinancialHealth;
use crate::utils::constants::DEFAULT_RANDOM_SEED;

type Tree = DecisionTreeClassifier<f64, u32, DenseMatrix<f64>, Vec<u32>>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: u16,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 15,
            min_samples_split: 20,
            min_samples_leaf: 5,
            seed: DEFAULT_RANDOM_SEED,
        }
    }
}

impl ForestParams {
    fn tree_parameters(&self) -> DecisionTreeClassifierParameters {
        DecisionTreeClassifierParameters::default()
            .with_max_depth(self.max_depth)
            .with_min_samples_split(self.min_samples_split)
            .with_min_samples_leaf(self.min_samples_leaf)
    }
}

/// Bagged ensemble of smartcore decision trees. Each tree is fit on a seeded bootstrap
/// sample; class probabilities are the share of trees voting for each class.
#[derive(Serialize, Deserialize)]
pub struct SurveyForest {
    params: ForestParams,
    trees: Vec<Tree>,
    classes: Vec<FinancialHealth>,
    n_features: Option<usize>,
    #[serde(skip)]
    progress: Option<ProgressBar>,
}

impl fmt::Debug for SurveyForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurveyForest")
            .field("params", &self.params)
            .field("trees", &self.trees.len())
            .field("classes", &self.classes)
            .field("n_features", &self.n_features)
            .finish()
    }
}

impl SurveyForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
            classes: Vec::new(),
            n_features: None,
            progress: None,
        }
    }

    /// Reports one tick per fitted tree to the given bar.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fits one tree on a per-class bootstrap: every class contributes as many draws as
    /// it has rows, so each sample keeps every class.
    fn fit_tree(
        &self,
        tree_idx: usize,
        rows: &[Vec<f64>],
        labels: &[u32],
        by_class: &[Vec<usize>],
    ) -> Result<Tree> {
        let mut rng = StdRng::seed_from_u64(self.params.seed.wrapping_add(tree_idx as u64));
        let mut sample_rows = Vec::with_capacity(rows.len());
        let mut sample_labels = Vec::with_capacity(rows.len());
        for members in by_class {
            for _ in 0..members.len() {
                let pick = members[rng.gen_range(0..members.len())];
                sample_rows.push(rows[pick].clone());
                sample_labels.push(labels[pick]);
            }
        }
        let x = DenseMatrix::from_2d_vec(&sample_rows);
        Tree::fit(&x, &sample_labels, self.params.tree_parameters())
            .map_err(|e| anyhow!("Decision tree {} failed to fit: {}", tree_idx, e))
    }

    /// Vote counts per row, columns in `self.classes` order.
    fn votes(&self, rows: Vec<Vec<f64>>) -> Result<Vec<Vec<usize>>> {
        if self.n_features.is_none() {
            return Err(anyhow!("Forest has not been fitted"));
        }
        let n_rows = rows.len();
        // single-class training set: no trees, the one class takes every vote
        if self.trees.is_empty() {
            return Ok(vec![vec![1; self.classes.len()]; n_rows]);
        }
        let x = DenseMatrix::from_2d_vec(&rows);
        let mut votes = vec![vec![0usize; self.classes.len()]; n_rows];
        for tree in &self.trees {
            let predicted = tree
                .predict(&x)
                .map_err(|e| anyhow!("Decision tree prediction failed: {}", e))?;
            for (row_votes, label) in votes.iter_mut().zip(predicted) {
                let position = FinancialHealth::from_index(label)
                    .and_then(|class| self.classes.iter().position(|c| *c == class));
                if let Some(pos) = position {
                    row_votes[pos] += 1;
                }
            }
        }
        Ok(votes)
    }

    fn majority(&self, row_votes: &[usize]) -> Result<FinancialHealth> {
        let mut best: Option<(usize, usize)> = None;
        for (pos, count) in row_votes.iter().enumerate() {
            if best.map_or(true, |(_, b)| *count > b) {
                best = Some((pos, *count));
            }
        }
        best.map(|(pos, _)| self.classes[pos])
            .ok_or_else(|| anyhow!("Forest has no classes"))
    }
}

impl Classifier for SurveyForest {
    fn fit(&mut self, x: &Array2<f64>, y: &[FinancialHealth]) -> Result<()> {
        check_training_input(x, y)?;
        if self.params.n_trees == 0 {
            return Err(anyhow!("A forest needs at least one tree"));
        }
        let classes = distinct_classes(y);
        if classes.len() < 2 {
            info!(
                "Only {:?} present in {} samples, fitting a constant forest",
                classes,
                y.len()
            );
            self.trees = Vec::new();
            self.classes = classes;
            self.n_features = Some(x.ncols());
            return Ok(());
        }

        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        let labels: Vec<u32> = y.iter().map(FinancialHealth::index).collect();
        let by_class: Vec<Vec<usize>> = classes
            .iter()
            .map(|class| {
                y.iter()
                    .enumerate()
                    .filter(|(_, label)| *label == class)
                    .map(|(idx, _)| idx)
                    .collect()
            })
            .collect();

        let n_trees = self.params.n_trees;
        let n_workers = num_cpus::get().clamp(1, n_trees);
        info!(
            "Fitting forest of {} trees on {} samples x {} features ({} workers)",
            n_trees,
            rows.len(),
            x.ncols(),
            n_workers
        );

        let progress = self.progress.clone().unwrap_or_else(ProgressBar::hidden);
        let this = &*self;
        let mut fitted: Vec<(usize, Result<Tree>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..n_workers)
                .map(|worker| {
                    let rows = &rows;
                    let labels = &labels;
                    let by_class = &by_class;
                    let progress = progress.clone();
                    scope.spawn(move || {
                        (worker..n_trees)
                            .step_by(n_workers)
                            .map(|tree_idx| {
                                let tree = this.fit_tree(tree_idx, rows, labels, by_class);
                                progress.inc(1);
                                (tree_idx, tree)
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| {
                    h.join()
                        .unwrap_or_else(|_| vec![(usize::MAX, Err(anyhow!("Tree fitting worker panicked")))])
                })
                .collect()
        });
        progress.finish_and_clear();

        fitted.sort_by_key(|(idx, _)| *idx);
        let trees = fitted
            .into_iter()
            .map(|(_, tree)| tree)
            .collect::<Result<Vec<_>>>()?;
        debug!("Fitted {} trees", trees.len());

        self.trees = trees;
        self.classes = classes;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<FinancialHealth> {
        check_row_width(row, self.n_features)?;
        let votes = self.votes(vec![row.to_vec()])?;
        self.majority(&votes[0])
    }

    fn predict_proba(&self, row: &[f64]) -> Result<Vec<(FinancialHealth, f64)>> {
        check_row_width(row, self.n_features)?;
        let votes = self.votes(vec![row.to_vec()])?;
        let row_votes = &votes[0];
        let total: usize = row_votes.iter().sum();
        if total == 0 {
            let uniform = 1.0 / self.classes.len().max(1) as f64;
            return Ok(self.classes.iter().map(|c| (*c, uniform)).collect());
        }
        Ok(self
            .classes
            .iter()
            .zip(row_votes)
            .map(|(c, v)| (*c, *v as f64 / total as f64))
            .collect())
    }

    fn classes(&self) -> &[FinancialHealth] {
        &self.classes
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    fn predict_batch(&self, x: &Array2<f64>) -> Result<Vec<FinancialHealth>> {
        if x.nrows() == 0 {
            return Ok(Vec::new());
        }
        if let Some(first) = x.rows().into_iter().next() {
            check_row_width(&first.to_vec(), self.n_features)?;
        }
        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        self.votes(rows)?
            .iter()
            .map(|row_votes| self.majority(row_votes))
            .collect()
    }
}
