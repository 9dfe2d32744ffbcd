use ndarray::{Array2, ArrayView1, Axis};

use crate::cleaning::Categories;

pub mod cross_validation;

/// Category x category count grid. Rows are the true category, columns the predicted one.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
}

impl ConfusionMatrix {
    pub fn from_predictions(
        truth: &ArrayView1<usize>,
        predicted: &ArrayView1<usize>,
        n_categories: usize,
    ) -> ConfusionMatrix {
        let mut counts = Array2::zeros((n_categories, n_categories));
        for (&t, &p) in truth.iter().zip(predicted.iter()) {
            counts[[t, p]] += 1;
        }

        ConfusionMatrix { counts }
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    pub fn correct(&self) -> usize {
        self.counts.diag().sum()
    }

    /// Share of rows on the diagonal, 0 for an empty matrix
    pub fn accuracy(&self) -> f64 {
        match self.total() {
            0 => 0f64,
            total => self.correct() as f64 / total as f64,
        }
    }

    pub fn error_rate(&self) -> f64 {
        1f64 - self.accuracy()
    }

    /// Cohen's kappa: agreement corrected for the agreement expected by chance
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0f64 {
            return 0f64;
        }

        let rows = self.counts.sum_axis(Axis(1));
        let cols = self.counts.sum_axis(Axis(0));
        let expected: f64 = rows
            .iter()
            .zip(cols.iter())
            .map(|(&r, &c)| (r * c) as f64)
            .sum::<f64>()
            / (total * total);

        if expected >= 1f64 {
            return 0f64;
        }

        (self.accuracy() - expected) / (1f64 - expected)
    }

    /// Share of the rows of a true category that were predicted as something else
    pub fn class_error(&self, category: usize) -> f64 {
        let row = self.counts.row(category);
        match row.sum() {
            0 => 0f64,
            n => 1f64 - row[category] as f64 / n as f64,
        }
    }

    /// Text grid with a trailing per-class error column
    pub fn render(&self, categories: &Categories) -> String {
        let width = categories
            .names()
            .iter()
            .map(String::len)
            .chain(self.counts.iter().map(|c| c.to_string().len()))
            .max()
            .unwrap_or(1)
            .max(5);

        let mut out = format!("{:>w$}", "", w = width);
        for name in categories.names() {
            out.push_str(&format!(" {:>w$}", name, w = width));
        }
        out.push_str("  class.error\n");

        for (i, row) in self.counts.axis_iter(Axis(0)).enumerate() {
            out.push_str(&format!("{:>w$}", categories.name(i), w = width));
            for count in row {
                out.push_str(&format!(" {:>w$}", count, w = width));
            }
            out.push_str(&format!("  {:.4}\n", self.class_error(i)));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn matrix() -> ConfusionMatrix {
        let truth = array![0usize, 0, 1, 1, 2, 2, 2];
        let predicted = array![0usize, 1, 1, 1, 2, 2, 0];

        ConfusionMatrix::from_predictions(&truth.view(), &predicted.view(), 3)
    }

    #[test]
    fn sums_match_row_count() {
        let cm = matrix();

        assert_eq!(cm.total(), 7);
        assert_eq!(cm.counts().sum_axis(Axis(0)).sum(), 7);
        assert_eq!(cm.counts().sum_axis(Axis(1)).sum(), 7);
        assert_eq!(cm.counts()[[2, 0]], 1);
    }

    #[test]
    fn accuracy_and_error() {
        let cm = matrix();

        assert_eq!(cm.correct(), 5);
        assert!((cm.accuracy() - 5f64 / 7f64).abs() < 1e-12);
        assert!((cm.error_rate() - 2f64 / 7f64).abs() < 1e-12);
        assert!((cm.class_error(0) - 0.5).abs() < 1e-12);
        assert_eq!(cm.class_error(1), 0f64);
    }

    #[test]
    fn kappa_is_one_for_perfect_agreement() {
        let truth = array![0usize, 1, 2, 1];
        let cm = ConfusionMatrix::from_predictions(&truth.view(), &truth.view(), 3);

        assert!((cm.kappa() - 1f64).abs() < 1e-12);
    }

    #[test]
    fn empty_matrix_scores_zero() {
        let empty = ndarray::Array1::<usize>::zeros(0);
        let cm = ConfusionMatrix::from_predictions(&empty.view(), &empty.view(), 2);

        assert_eq!(cm.accuracy(), 0f64);
        assert_eq!(cm.kappa(), 0f64);
    }

    #[test]
    fn render_lists_every_category() {
        let categories = Categories::from_names(&["A", "B", "C"]);
        let text = matrix().render(&categories);

        assert_eq!(text.lines().count(), 4);
        assert!(text.lines().nth(3).unwrap().trim_start().starts_with('C'));
    }
}
