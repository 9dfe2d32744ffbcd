use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::seq::index;

/// Hyperparameters of a single tree
#[derive(Clone, Debug)]
pub struct TreeParams {
    /// Features drawn as split candidates at every node
    pub mtry: usize,
    pub max_depth: Option<usize>,
    /// Nodes with fewer rows become leaves
    pub min_samples_split: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Leaf {
        category: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// CART classification tree on Gini impurity. Nodes live in a flat arena, the root is node 0.
#[derive(Clone, Debug)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    /// Total weighted impurity decrease per feature
    importance: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

impl DecisionTree {
    /// Grow a tree on the given rows. Rows may repeat (bootstrap samples).
    pub fn grow(
        data: &ArrayView2<f64>,
        target: &ArrayView1<usize>,
        rows: Vec<usize>,
        n_categories: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> DecisionTree {
        let n_features = data.ncols();
        let mut tree = DecisionTree {
            nodes: vec![Node::Leaf { category: 0 }],
            importance: vec![0f64; n_features],
        };
        // (node slot, rows reaching it, depth)
        let mut pending = vec![(0usize, rows, 0usize)];

        while let Some((slot, rows, depth)) = pending.pop() {
            let counts = class_counts(target, &rows, n_categories);
            let majority = argmax(&counts);
            let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
            let depth_reached = params.max_depth.map_or(false, |max| depth >= max);

            if is_pure || depth_reached || rows.len() < params.min_samples_split {
                tree.nodes[slot] = Node::Leaf { category: majority };
                continue;
            }

            let candidates = index::sample(rng, n_features, params.mtry.min(n_features)).into_vec();
            let split = match best_split(data, target, &rows, &counts, &candidates) {
                Some(split) => split,
                None => {
                    tree.nodes[slot] = Node::Leaf { category: majority };
                    continue;
                }
            };

            tree.importance[split.feature] += split.decrease;
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                .into_iter()
                .partition(|&r| data[[r, split.feature]] <= split.threshold);

            let left = tree.nodes.len();
            let right = left + 1;
            tree.nodes.push(Node::Leaf { category: majority });
            tree.nodes.push(Node::Leaf { category: majority });
            tree.nodes[slot] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            pending.push((right, right_rows, depth + 1));
            pending.push((left, left_rows, depth + 1));
        }

        tree
    }

    pub fn predict_row(&self, row: &ArrayView1<f64>) -> usize {
        let mut current = 0;

        loop {
            match &self.nodes[current] {
                Node::Leaf { category } => return *category,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    current = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn importance(&self) -> &[f64] {
        &self.importance
    }
}

fn class_counts(target: &ArrayView1<usize>, rows: &[usize], n_categories: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_categories];
    for &r in rows {
        counts[target[r]] += 1;
    }

    counts
}

/// Index of the largest count, the lowest index wins ties
fn argmax(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }

    best
}

/// n * Gini impurity, computed from the counts' sum of squares
fn weighted_gini(n: f64, sum_squares: f64) -> f64 {
    if n == 0f64 {
        return 0f64;
    }

    n - sum_squares / n
}

/// Find the threshold with the largest impurity decrease among the candidate features
fn best_split(
    data: &ArrayView2<f64>,
    target: &ArrayView1<usize>,
    rows: &[usize],
    counts: &[usize],
    candidates: &[usize],
) -> Option<SplitCandidate> {
    let n = rows.len() as f64;
    let parent_squares: f64 = counts.iter().map(|&c| (c * c) as f64).sum();
    let parent_impurity = weighted_gini(n, parent_squares);
    let mut best: Option<SplitCandidate> = None;
    let mut pairs: Vec<(f64, usize)> = Vec::with_capacity(rows.len());

    for &feature in candidates {
        pairs.clear();
        pairs.extend(rows.iter().map(|&r| (data[[r, feature]], target[r])));
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = vec![0usize; counts.len()];
        let mut right = counts.to_vec();
        let mut left_squares = 0f64;
        let mut right_squares = parent_squares;

        for i in 0..pairs.len() - 1 {
            let category = pairs[i].1;
            // Moving one row of `category` from the right child to the left one
            left_squares += (2 * left[category] + 1) as f64;
            right_squares -= (2 * right[category] - 1) as f64;
            left[category] += 1;
            right[category] -= 1;

            let (value, next) = (pairs[i].0, pairs[i + 1].0);
            if value == next {
                continue;
            }

            let n_left = (i + 1) as f64;
            let impurity =
                weighted_gini(n_left, left_squares) + weighted_gini(n - n_left, right_squares);
            let decrease = parent_impurity - impurity;

            if decrease > 1e-12 && best.as_ref().map_or(true, |b| decrease > b.decrease) {
                let mid = value + (next - value) / 2f64;
                // Adjacent floats can round the midpoint up onto `next`
                let threshold = if mid < next { mid } else { value };
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    decrease,
                });
            }
        }
    }

    best
}
