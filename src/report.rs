use std::fs::File;
use std::io::Write;
use std::path::Path;

use json::object;
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::error::{PipelineError, Result};
use crate::pipeline::PipelineReport;
use crate::predict::Prediction;

/// Shades from no correlation to perfect correlation
const SHADES: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];
const CORRELATION_THRESHOLD: f64 = 0.8;
const TOP_IMPORTANCE: usize = 20;

/// Pearson correlation between every pair of columns. Constant columns correlate with nothing.
pub fn correlation_matrix(data: &ArrayView2<f64>) -> Array2<f64> {
    let p = data.ncols();
    if data.nrows() < 2 {
        return Array2::eye(p);
    }

    let means = data.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));
    let centered = data - &means;
    let cov = centered.t().dot(&centered);
    let sd = cov.diag().mapv(f64::sqrt);

    Array2::from_shape_fn((p, p), |(i, j)| match (i == j, sd[i] * sd[j]) {
        (true, _) => 1f64,
        (false, scale) if scale == 0f64 => 0f64,
        (false, scale) => (cov[[i, j]] / scale).clamp(-1f64, 1f64),
    })
}

/// Feature pairs (i < j) whose absolute correlation is at least `threshold`, strongest first
pub fn correlated_pairs(correlation: &Array2<f64>, threshold: f64) -> Vec<(usize, usize, f64)> {
    let p = correlation.nrows();
    let mut pairs: Vec<(usize, usize, f64)> = (0..p)
        .flat_map(|i| (i + 1..p).map(move |j| (i, j)))
        .map(|(i, j)| (i, j, correlation[[i, j]]))
        .filter(|(_, _, r)| r.abs() >= threshold)
        .collect();
    pairs.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));

    pairs
}

/// One line per feature, one shade character per |r|
pub fn render_heatmap(correlation: &Array2<f64>, names: &[String]) -> String {
    let width = names.iter().map(String::len).max().unwrap_or(0);
    let mut out = String::new();

    for (name, row) in names.iter().zip(correlation.axis_iter(Axis(0))) {
        let shades: String = row
            .iter()
            .map(|r| SHADES[(r.abs() * (SHADES.len() - 1) as f64).round() as usize])
            .collect();
        out.push_str(&format!("{:<w$} |{}|\n", name, shades, w = width));
    }

    out
}

fn percent(x: f64) -> String {
    format!("{:.2}%", x * 100f64)
}

/// Write the human readable report
pub fn write_report<W: Write>(out: &mut W, report: &PipelineReport) -> std::io::Result<()> {
    let features = report.plan.schema().features();

    writeln!(out, "== Data")?;
    writeln!(
        out,
        "training {} x {}, scoring {} x {}",
        report.training_shape.0,
        report.training_shape.1,
        report.scoring_shape.0,
        report.scoring_shape.1
    )?;
    writeln!(
        out,
        "{} columns dropped, {} features kept",
        report.plan.dropped().count(),
        features.len()
    )?;

    writeln!(out, "\n== Class distribution")?;
    for (i, (name, count)) in report.distribution.counts.iter().enumerate() {
        let share = percent(report.distribution.share(i));
        writeln!(out, "{:>4} {:>7} {:>8}", name, count, share)?;
    }

    writeln!(out, "\n== Feature correlation (|r|: ' ' 0 .. '@' 1)")?;
    write!(out, "{}", render_heatmap(&report.correlation, features))?;
    let pairs = correlated_pairs(&report.correlation, CORRELATION_THRESHOLD);
    writeln!(out, "{} pairs with |r| >= {}", pairs.len(), CORRELATION_THRESHOLD)?;
    for (i, j, r) in pairs.iter().take(10) {
        writeln!(out, "  {:>7.3} {} ~ {}", r, features[*i], features[*j])?;
    }

    let oob = report.model.oob();
    writeln!(out, "\n== Random forest")?;
    writeln!(
        out,
        "trees: {}, variables tried at each split: {}",
        report.model.n_trees(),
        report.model.mtry()
    )?;
    writeln!(out, "OOB estimate of error rate: {}", percent(oob.error()))?;
    write!(out, "{}", oob.confusion.render(&report.categories))?;

    writeln!(out, "\n== Variable importance (mean decrease Gini)")?;
    let ranking = report.importance_ranking();
    for (rank, (name, score)) in ranking.iter().take(TOP_IMPORTANCE).enumerate() {
        writeln!(out, "{:>3} {:<24} {:>10.2}", rank + 1, name, score)?;
    }

    writeln!(out, "\n== Validation ({} rows)", report.validation.total())?;
    write!(out, "{}", report.validation.render(&report.categories))?;
    writeln!(out, "accuracy: {}", percent(report.validation.accuracy()))?;
    writeln!(out, "error:    {}", percent(report.validation.error_rate()))?;
    writeln!(out, "kappa:    {:.4}", report.validation.kappa())?;

    if let Some(cv) = &report.cv {
        writeln!(
            out,
            "\n== {}-fold cross-validation on {} sampled rows",
            cv.folds, cv.sample_size
        )?;
        writeln!(out, "{:>5} {:>9} {:>9} {:>7}", "mtry", "accuracy", "sd", "kappa")?;
        for row in &cv.rows {
            writeln!(
                out,
                "{:>5} {:>9.4} {:>9.4} {:>7.4}",
                row.mtry, row.mean_accuracy, row.sd_accuracy, row.mean_kappa
            )?;
        }
        writeln!(out, "best mtry: {}", cv.best_row().mtry)?;
        writeln!(out, "out-of-sample error: {}", percent(cv.out_of_sample_error()))?;
    }

    let predictions = &report.predictions;
    writeln!(out, "\n== Predictions")?;
    for p in &predictions.predictions {
        writeln!(out, "{:>10} {}", p.identifier, p.prediction)?;
    }
    writeln!(out, "tally:")?;
    for (name, count) in &predictions.tally {
        writeln!(out, "{:>4} {}", name, count)?;
    }
    writeln!(
        out,
        "values filled with 0: {}, fractional values in integer columns: {}",
        predictions.coercion.total_filled(),
        predictions.coercion.total_drift()
    )?;

    Ok(())
}

/// Write the predictions as `identifier,prediction` rows
pub fn write_predictions(path: &Path, predictions: &[Prediction]) -> Result<()> {
    let csv_error = |source| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;

    for prediction in predictions {
        writer.serialize(prediction).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Write the headline numbers, importances and predictions as JSON
pub fn write_json_report(path: &Path, report: &PipelineReport) -> Result<()> {
    let io_error = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut data = object! {};
    data["accuracy"] = report.validation.accuracy().into();
    data["error"] = report.validation.error_rate().into();
    data["kappa"] = report.validation.kappa().into();
    data["oob_error"] = report.model.oob().error().into();
    data["trees"] = report.model.n_trees().into();
    data["mtry"] = report.model.mtry().into();

    let features: Vec<&str> = report
        .plan
        .schema()
        .features()
        .iter()
        .map(String::as_str)
        .collect();
    data["features"] = features.into();

    let mut importance = object! {};
    for (name, score) in report.importance_ranking() {
        importance[name] = score.into();
    }
    data["importance"] = importance;

    if let Some(cv) = &report.cv {
        let rows: Vec<json::JsonValue> = cv
            .rows
            .iter()
            .map(|row| {
                let mut entry = object! {};
                entry["mtry"] = row.mtry.into();
                entry["accuracy"] = row.mean_accuracy.into();
                entry["sd"] = row.sd_accuracy.into();
                entry["kappa"] = row.mean_kappa.into();
                entry
            })
            .collect();
        data["cross_validation"] = rows.into();
        data["out_of_sample_error"] = cv.out_of_sample_error().into();
    }

    let predictions: Vec<json::JsonValue> = report
        .predictions
        .predictions
        .iter()
        .map(|p| {
            let mut entry = object! {};
            entry["identifier"] = p.identifier.as_str().into();
            entry["prediction"] = p.prediction.as_str().into();
            entry
        })
        .collect();
    data["predictions"] = predictions.into();

    let mut file = File::create(path).map_err(io_error)?;
    file.write_all(data.dump().as_bytes()).map_err(io_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn correlation_of_linear_columns() {
        let data = array![[1.0, 2.0, 5.0, 3.0], [2.0, 4.0, 4.0, 3.0], [3.0, 6.0, 3.0, 3.0]];
        let corr = correlation_matrix(&data.view());

        assert!((corr[[0, 1]] - 1f64).abs() < 1e-12);
        assert!((corr[[0, 2]] + 1f64).abs() < 1e-12);
        assert_eq!(corr[[0, 3]], 0f64);
        assert_eq!(corr[[3, 3]], 1f64);
    }

    #[test]
    fn pairs_above_threshold() {
        let corr = array![[1.0, 0.9, 0.1], [0.9, 1.0, -0.95], [0.1, -0.95, 1.0]];

        assert_eq!(correlated_pairs(&corr, 0.8), vec![(1, 2, -0.95), (0, 1, 0.9)]);
    }

    #[test]
    fn heatmap_shades_by_magnitude() {
        let corr = array![[1.0, 0.0], [0.0, 1.0]];
        let text = render_heatmap(&corr, &["a".to_string(), "bb".to_string()]);

        assert_eq!(text, "a  |@ |\nbb | @|\n");
    }

    #[test]
    fn predictions_csv_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let predictions = vec![Prediction {
            identifier: "1".into(),
            prediction: "B".into(),
        }];

        write_predictions(&path, &predictions).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "identifier,prediction\n1,B\n");
    }
}
