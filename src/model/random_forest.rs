use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::tree::{DecisionTree, TreeParams};
use super::{validate_dataset, Classifier, FitError};
use crate::evaluation::ConfusionMatrix;
use crate::parsing::Dataset;

/// Hyperparameters of a forest. Fixed configuration, never tuned in place.
#[derive(Clone, Debug)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Features tried per split, `floor(sqrt(p))` when unset
    pub mtry: Option<usize>,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl ForestParams {
    pub fn new(n_trees: usize, seed: u64) -> ForestParams {
        ForestParams {
            n_trees,
            mtry: None,
            max_depth: None,
            min_samples_split: 2,
            seed,
        }
    }

    pub fn with_mtry(mut self, mtry: Option<usize>) -> ForestParams {
        self.mtry = mtry;
        self
    }

    pub fn resolve_mtry(&self, n_features: usize) -> usize {
        self.mtry
            .unwrap_or_else(|| ((n_features as f64).sqrt().floor() as usize).max(1))
    }
}

/// Out-of-bag self-assessment: each row is judged only by trees that never saw it
#[derive(Clone, Debug)]
pub struct OobEstimate {
    pub confusion: ConfusionMatrix,
    /// Rows that were in every bootstrap sample and so have no verdict
    pub unscored: usize,
}

impl OobEstimate {
    pub fn error(&self) -> f64 {
        self.confusion.error_rate()
    }
}

/// Bagged ensemble of decision trees voting by majority
#[derive(Clone, Debug)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_categories: usize,
    mtry: usize,
    importance: Vec<f64>,
    oob: OobEstimate,
}

impl RandomForest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn mtry(&self) -> usize {
        self.mtry
    }

    pub fn oob(&self) -> &OobEstimate {
        &self.oob
    }

    /// Votes per category for every row
    pub fn votes(&self, records: &ArrayView2<f64>) -> Array2<usize> {
        let mut votes = Array2::zeros((records.nrows(), self.n_categories));

        for (i, row) in records.axis_iter(Axis(0)).enumerate() {
            for tree in &self.trees {
                votes[[i, tree.predict_row(&row)]] += 1;
            }
        }

        votes
    }

    /// Feature indices with their importance, most important first
    pub fn importance_ranking(&self) -> Vec<(usize, f64)> {
        let mut ranking: Vec<(usize, f64)> = self.importance.iter().copied().enumerate().collect();
        ranking.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        ranking
    }
}

impl Classifier for RandomForest {
    type Params = ForestParams;

    fn fit(
        dataset: &Dataset,
        n_categories: usize,
        params: &ForestParams,
    ) -> Result<RandomForest, FitError> {
        validate_dataset(dataset, n_categories)?;
        if params.n_trees == 0 {
            return Err(FitError::NoTrees);
        }

        let n_rows = dataset.nrows();
        let n_features = dataset.data.ncols();
        let mtry = params.resolve_mtry(n_features);
        if mtry == 0 || mtry > n_features {
            return Err(FitError::InvalidMtry {
                mtry,
                features: n_features,
            });
        }

        let tree_params = TreeParams {
            mtry,
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
        };
        // One seed per tree, drawn up front so the result does not depend on scheduling
        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_trees).map(|_| master.gen()).collect();
        let data = dataset.data.view();
        let target = dataset.target.view();

        let grown: Vec<(DecisionTree, Vec<bool>)> = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let mut in_bag = vec![false; n_rows];
                let rows: Vec<usize> = (0..n_rows)
                    .map(|_| {
                        let r = rng.gen_range(0..n_rows);
                        in_bag[r] = true;
                        r
                    })
                    .collect();
                let tree = DecisionTree::grow(
                    &data,
                    &target,
                    rows,
                    n_categories,
                    &tree_params,
                    &mut rng,
                );

                (tree, in_bag)
            })
            .collect();

        let mut importance = vec![0f64; n_features];
        let mut oob_votes: Array2<usize> = Array2::zeros((n_rows, n_categories));
        for (tree, in_bag) in &grown {
            for (total, gain) in importance.iter_mut().zip(tree.importance()) {
                *total += gain;
            }
            for (r, _) in in_bag.iter().enumerate().filter(|&(_, &bagged)| !bagged) {
                oob_votes[[r, tree.predict_row(&data.row(r))]] += 1;
            }
        }
        for total in importance.iter_mut() {
            *total /= params.n_trees as f64;
        }

        let scored: Vec<usize> = (0..n_rows)
            .filter(|&r| oob_votes.row(r).sum() > 0)
            .collect();
        let oob_truth = target.select(Axis(0), &scored);
        let oob_predicted: Array1<usize> = scored
            .iter()
            .map(|&r| majority(&oob_votes.row(r).to_vec()))
            .collect();
        let oob = OobEstimate {
            confusion: ConfusionMatrix::from_predictions(
                &oob_truth.view(),
                &oob_predicted.view(),
                n_categories,
            ),
            unscored: n_rows - scored.len(),
        };

        tracing::debug!(
            "Grew {} trees with mtry {} on {} rows, OOB error {:.4}",
            params.n_trees,
            mtry,
            n_rows,
            oob.error()
        );

        Ok(RandomForest {
            trees: grown.into_iter().map(|(tree, _)| tree).collect(),
            n_categories,
            mtry,
            importance,
            oob,
        })
    }

    fn predict(&self, records: &ArrayView2<f64>) -> Array1<usize> {
        self.votes(records)
            .axis_iter(Axis(0))
            .map(|row| majority(&row.to_vec()))
            .collect()
    }

    /// Mean decrease in Gini impurity per feature
    fn feature_importance(&self) -> Vec<f64> {
        self.importance.clone()
    }
}

/// Category with the most votes, the lowest index wins ties
fn majority(votes: &[usize]) -> usize {
    let mut best = 0;
    for (i, &v) in votes.iter().enumerate() {
        if v > votes[best] {
            best = i;
        }
    }

    best
}
