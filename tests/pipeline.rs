use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use liftform::config::{CvConfig, PipelineConfig};
use liftform::error::PipelineError;
use liftform::model::random_forest::ForestParams;
use liftform::model::Classifier;
use liftform::parsing::pml::read_table;
use liftform::parsing::{Column, Table};
use liftform::pipeline::{run, run_tables};
use liftform::predict::predict_table;
use liftform::report::{write_json_report, write_predictions, write_report};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CLASSES: [&str; 5] = ["A", "B", "C", "D", "E"];
const HEADER: &str = concat!(
    "\"\",user_name,raw_timestamp_part_1,raw_timestamp_part_2,cvtd_timestamp,new_window,",
    "num_window,roll_belt,pitch_belt,yaw_belt,kurtosis_roll_belt,accel_arm_x,magnet_arm_z"
);

/// One accelerometer-like row. `roll_belt`, `pitch_belt` and `accel_arm_x` follow the class.
fn row(rng: &mut StdRng, index: usize, class: usize, sparse: bool) -> String {
    let c = class as f64;
    let kurtosis = match (sparse, index % 10) {
        (true, 0) => format!("{:.3}", rng.gen_range(-1.0..1.0)),
        (true, 1) => "#DIV/0!".to_string(),
        (true, _) => String::new(),
        (false, _) => format!("{:.3}", rng.gen_range(-1.0..1.0)),
    };

    format!(
        "{},user{},{},{},05/12/2011 11:23,no,{},{:.2},{:.2},{:.2},{},{},{}",
        index + 1,
        index % 6,
        1322489729 + index,
        rng.gen_range(0..1000000),
        index / 20,
        c * 10.0 + rng.gen_range(-2.0..2.0),
        -c * 5.0 + rng.gen_range(-1.5..1.5),
        rng.gen_range(-180.0..180.0),
        kurtosis,
        class as i64 * 40 + rng.gen_range(-5..=5),
        rng.gen_range(-400..400),
    )
}

fn training_csv(per_class: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lines = vec![format!("{},classe", HEADER)];

    for i in 0..per_class * CLASSES.len() {
        let class = i % CLASSES.len();
        lines.push(format!("{},{}", row(&mut rng, i, class, true), CLASSES[class]));
    }

    lines.join("\n") + "\n"
}

/// Scoring rows cycle through the classes; `kurtosis_roll_belt` is fully populated here
fn scoring_csv(rows: usize, seed: u64) -> String {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut lines = vec![format!("{},problem_id", HEADER)];

    for i in 0..rows {
        lines.push(format!("{},{}", row(&mut rng, i, i % CLASSES.len(), false), i + 1));
    }

    lines.join("\n") + "\n"
}

fn parse(contents: &str) -> Table {
    read_table(contents.as_bytes(), Path::new("inline.csv")).unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        forest: ForestParams::new(30, 123),
        cv: Some(CvConfig {
            num_trees: 10,
            folds: 5,
            sample_size: 200,
            grid_len: 3,
        }),
        ..PipelineConfig::default()
    }
}

#[test]
fn end_to_end_scores_twenty_rows() {
    let training = parse(&training_csv(60, 1));
    let scoring = parse(&scoring_csv(20, 2));
    let config = config();

    let report = run_tables(&training, &scoring, &config).unwrap();

    assert_eq!(report.training_shape, (300, 14));
    let features = report.plan.schema().features();
    assert_eq!(
        features,
        &["roll_belt", "pitch_belt", "yaw_belt", "accel_arm_x", "magnet_arm_z"].map(String::from)
    );
    assert!(report.plan.dropped().any(|c| c == "kurtosis_roll_belt"));

    assert_eq!(report.validation.total(), report.split.validation.len());
    assert_eq!(report.split.fit.len() + report.split.validation.len(), 300);
    assert!(report.validation.accuracy() > 0.9);

    let cv = report.cv.as_ref().unwrap();
    assert_eq!(cv.sample_size, 200);
    assert_eq!(cv.rows.iter().map(|r| r.mtry).collect::<Vec<_>>(), vec![2, 3, 5]);
    assert!(cv.out_of_sample_error() < 0.2);

    let known: BTreeSet<&str> = CLASSES.into_iter().collect();
    assert_eq!(report.predictions.predictions.len(), 20);
    assert!(report
        .predictions
        .predictions
        .iter()
        .all(|p| known.contains(p.prediction.as_str())));
    assert_eq!(report.predictions.predictions[0].identifier, "1");
    assert_eq!(report.predictions.tally.iter().map(|(_, n)| n).sum::<usize>(), 20);
    assert_eq!(report.predictions.coercion.total_filled(), 0);
}

#[test]
fn cleaned_schemas_line_up() {
    let training = parse(&training_csv(20, 3));
    let scoring = parse(&scoring_csv(5, 4));
    let config = PipelineConfig {
        cv: None,
        ..config()
    };

    let report = run_tables(&training, &scoring, &config).unwrap();
    let cleaned_training = report.plan.apply(&training);
    let cleaned_scoring = report.plan.apply(&scoring);

    let training_features: Vec<&str> = cleaned_training
        .column_names()
        .into_iter()
        .filter(|c| *c != "classe")
        .collect();
    let scoring_features: Vec<&str> = cleaned_scoring
        .column_names()
        .into_iter()
        .filter(|c| *c != "problem_id")
        .collect();
    assert_eq!(training_features, scoring_features);
}

#[test]
fn same_seed_same_results() {
    let training = parse(&training_csv(30, 5));
    let scoring = parse(&scoring_csv(20, 6));
    let config = config();

    let first = run_tables(&training, &scoring, &config).unwrap();
    let second = run_tables(&training, &scoring, &config).unwrap();

    assert_eq!(first.split, second.split);
    assert_eq!(first.validation, second.validation);
    assert_eq!(first.predictions.predictions, second.predictions.predictions);
    assert_eq!(first.cv.unwrap().rows, second.cv.unwrap().rows);
}

#[test]
fn fit_rows_round_trip_through_the_predictor() {
    let training = parse(&training_csv(30, 7));
    let scoring = parse(&scoring_csv(5, 8));
    let config = PipelineConfig {
        cv: None,
        ..config()
    };
    let report = run_tables(&training, &scoring, &config).unwrap();

    // The first fit rows, label stripped and an identifier attached
    let rows: Vec<usize> = report.split.fit.iter().copied().take(12).collect();
    let mut replay = training.select_rows(&rows);
    replay.retain_columns(|c| c != "classe");
    replay.columns.push(Column::new(
        "problem_id",
        rows.iter().map(|r| Some(r.to_string())).collect(),
    ));

    let replayed = predict_table(
        &report.model,
        &replay,
        &report.plan,
        &report.conversion,
        &report.categories,
        "problem_id",
    )
    .unwrap();

    let cleaned = report.plan.apply(&training.select_rows(&rows));
    let records = report.conversion.to_matrix_strict(&cleaned).unwrap();
    let direct = report.model.predict(&records.view());

    let replayed_names: Vec<&str> = replayed
        .predictions
        .iter()
        .map(|p| p.prediction.as_str())
        .collect();
    let direct_names: Vec<&str> = direct.iter().map(|&c| report.categories.name(c)).collect();
    assert_eq!(replayed_names, direct_names);
}

#[test]
fn missing_model_column_is_a_schema_error() {
    let training = parse(&training_csv(20, 9));
    let mut scoring = parse(&scoring_csv(5, 10));
    scoring.retain_columns(|c| c != "pitch_belt");
    let config = PipelineConfig {
        cv: None,
        ..config()
    };

    let err = run_tables(&training, &scoring, &config).unwrap_err();

    assert!(matches!(err, PipelineError::Schema(_)));
}

#[test]
fn labeled_scoring_table_is_rejected() {
    let training = parse(&training_csv(20, 11));
    let scoring = parse(&training_csv(2, 12));

    let err = run_tables(&training, &scoring, &config()).unwrap_err();

    assert!(matches!(err, PipelineError::Schema(_)));
}

#[test]
fn too_few_rows_per_fold_fails_the_fit() {
    let training = parse(&training_csv(20, 13));
    let scoring = parse(&scoring_csv(5, 14));
    let config = PipelineConfig {
        cv: Some(CvConfig {
            num_trees: 5,
            folds: 5,
            sample_size: 12,
            grid_len: 3,
        }),
        ..config()
    };

    let err = run_tables(&training, &scoring, &config).unwrap_err();

    assert!(matches!(err, PipelineError::ModelFit(_)));
}

#[test]
fn split_fraction_outside_the_unit_interval_is_rejected() {
    let training = parse(&training_csv(8, 17));
    let scoring = parse(&scoring_csv(5, 18));

    for split_fraction in [1.5, 1f64, 0f64] {
        let config = PipelineConfig {
            split_fraction,
            cv: None,
            ..config()
        };

        let err = run_tables(&training, &scoring, &config).unwrap_err();

        assert!(matches!(err, PipelineError::Config(_)));
    }
}

#[test]
fn split_without_validation_rows_is_rejected() {
    // One row per class always lands in the fit subset
    let training = parse(&training_csv(1, 19));
    let scoring = parse(&scoring_csv(5, 20));
    let config = PipelineConfig {
        cv: None,
        ..config()
    };

    let err = run_tables(&training, &scoring, &config).unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn negative_na_threshold_is_rejected_before_loading() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.csv");
    let config = PipelineConfig {
        na_threshold: -0.1,
        ..config()
    };

    let err = run(&missing, &missing, &config).unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn scoring_row_without_identifier_is_a_schema_error() {
    let training = parse(&training_csv(20, 21));
    let mut scoring = parse(&scoring_csv(3, 22));
    for column in scoring.columns.iter_mut().filter(|c| c.name == "problem_id") {
        column.cells[2] = None;
    }
    let config = PipelineConfig {
        cv: None,
        ..config()
    };

    let err = run_tables(&training, &scoring, &config).unwrap_err();

    assert!(matches!(err, PipelineError::Schema(_)));
}

#[test]
fn runs_from_files_and_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("pml-training.csv");
    let test_path = dir.path().join("pml-testing.csv");
    std::fs::File::create(&train_path)
        .unwrap()
        .write_all(training_csv(20, 15).as_bytes())
        .unwrap();
    std::fs::File::create(&test_path)
        .unwrap()
        .write_all(scoring_csv(20, 16).as_bytes())
        .unwrap();
    let config = PipelineConfig {
        cv: None,
        ..config()
    };

    let report = run(&train_path, &test_path, &config).unwrap();

    let predictions_path = dir.path().join("predictions.csv");
    write_predictions(&predictions_path, &report.predictions.predictions).unwrap();
    let written = std::fs::read_to_string(&predictions_path).unwrap();
    assert_eq!(written.lines().count(), 21);
    assert!(written.starts_with("identifier,prediction\n"));

    let json_path = dir.path().join("report.json");
    write_json_report(&json_path, &report).unwrap();
    let parsed = json::parse(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(parsed["predictions"].len(), 20);
    assert_eq!(parsed["trees"].as_usize(), Some(30));

    let mut text = Vec::new();
    write_report(&mut text, &report).unwrap();
    let text = String::from_utf8(text).unwrap();
    assert!(text.contains("== Validation"));
    assert!(text.contains("OOB estimate of error rate"));
    assert!(!text.contains("cross-validation"));
}

#[test]
fn unreadable_training_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.csv");

    let err = run(&missing, &missing, &config()).unwrap_err();

    assert!(matches!(err, PipelineError::Io { .. }));
}
