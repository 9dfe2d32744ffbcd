use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::SeedableRng;

use crate::cleaning::Categories;
use crate::model::FitError;

/// Row indices of the fit subset and its complement, both sorted
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    pub fit: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Row indices of each category, in row order
fn rows_by_category(labels: &[usize], n_categories: usize) -> Vec<Vec<usize>> {
    let mut groups = vec![vec![]; n_categories];
    for (row, &label) in labels.iter().enumerate() {
        groups[label].push(row);
    }

    groups
}

/// Put `ceil(fraction * n)` rows of every category into the fit subset.
/// `fraction` is expected in (0, 1), see `PipelineConfig::validate`.
pub fn stratified_split(labels: &[usize], n_categories: usize, fraction: f64, seed: u64) -> Split {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fit = vec![];
    let mut validation = vec![];

    for mut group in rows_by_category(labels, n_categories) {
        let take = ((fraction * group.len() as f64).ceil() as usize).min(group.len());
        group.shuffle(&mut rng);
        fit.extend_from_slice(&group[..take]);
        validation.extend_from_slice(&group[take..]);
    }

    fit.sort_unstable();
    validation.sort_unstable();

    Split { fit, validation }
}

/// Sample `size` distinct rows out of `n_rows`, every row when `size >= n_rows`
pub fn sample_rows(n_rows: usize, size: usize, seed: u64) -> Vec<usize> {
    if size >= n_rows {
        return (0..n_rows).collect();
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = index::sample(&mut rng, n_rows, size).into_vec();
    rows.sort_unstable();

    rows
}

/// Assign every row to one of `k` folds. Each category is shuffled and dealt
/// round-robin so folds keep the class balance.
pub fn stratified_folds(
    labels: &[usize],
    categories: &Categories,
    k: usize,
    seed: u64,
) -> Result<Vec<usize>, FitError> {
    if k < 2 {
        return Err(FitError::InvalidFolds(k));
    }

    let groups = rows_by_category(labels, categories.len());
    if let Some((category, group)) = groups
        .iter()
        .enumerate()
        .find(|(_, g)| !g.is_empty() && g.len() < k)
    {
        return Err(FitError::SparseCategory {
            category: categories.name(category).to_string(),
            members: group.len(),
            folds: k,
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut folds = vec![0usize; labels.len()];
    // Carry the dealing position across categories so small classes do not all start at fold 0
    let mut next = 0usize;

    for mut group in groups {
        group.shuffle(&mut rng);
        for row in group {
            folds[row] = next % k;
            next += 1;
        }
    }

    Ok(folds)
}
