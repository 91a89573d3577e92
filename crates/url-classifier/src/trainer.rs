// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Training, evaluation and selection of the candidate roster
//!
//! [`ModelTrainer`] walks a fixed sequence of phases:
//!
//! ```text
//! Idle -> Split -> Fit -> Evaluate -> Select -> Persist -> Done
//! ```
//!
//! Each operation checks the phase it is called in and fails with
//! `InvalidState` when called out of order. Candidates are fitted
//! independently; a candidate that fails is recorded in the report and left
//! out of selection while the others carry on. Nothing is written to disk
//! before a winner is selected.

use std::{cmp::Ordering, collections::BTreeMap, fmt, fmt::Write as _, path::Path};

use chrono::{DateTime, Utc};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use shared_types::UrlLabel;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    artifact::{ModelArtifact, write_json_atomic},
    config::TrainerConfig,
    dataset::TrainingSet,
    error::{ClassifierError, ClassifierResult},
    features::ExtractorConfig,
    metrics::{EvaluationResult, SelectionMetric},
    models::{Estimator, FittedModel, RosterConfig},
};

/// Progress of a training run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingPhase {
    /// No run started
    Idle,
    /// Data split into train and test rows
    Split,
    /// Candidates fitted
    Fit,
    /// Candidates evaluated
    Evaluate,
    /// Winner selected
    Select,
    /// Winner saved
    Persist,
    /// Report saved
    Done,
}

impl fmt::Display for TrainingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Split => "split",
            Self::Fit => "fit",
            Self::Evaluate => "evaluate",
            Self::Select => "select",
            Self::Persist => "persist",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Stratified train/test partition
#[derive(Debug, Clone, PartialEq)]
pub struct DataSplit {
    /// Rows the candidates are fitted on
    pub train: TrainingSet,
    /// Held-out rows
    pub test: TrainingSet,
}

/// A candidate that fitted successfully
#[derive(Debug, Clone, PartialEq)]
pub struct FittedCandidate {
    /// Roster name
    pub name: String,
    /// The fitted model
    pub model: FittedModel,
}

/// Everything a training run reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Metric the winner was picked on
    pub selection_metric: SelectionMetric,
    /// Name of the winner, once selected
    pub best_model: Option<String>,
    /// Id of the persisted artifact, once saved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<Uuid>,
    /// Evaluation of every surviving candidate
    pub results: BTreeMap<String, EvaluationResult>,
    /// Failure message of every excluded candidate
    pub failures: BTreeMap<String, String>,
}

/// Result of [`ModelTrainer::run`]
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The persisted winner
    pub artifact: ModelArtifact,
    /// The persisted report
    pub report: EvaluationReport,
}

/// Drives the candidate roster through split, fit, evaluation and selection
pub struct ModelTrainer {
    config: TrainerConfig,
    extractor: ExtractorConfig,
    estimators: Vec<Box<dyn Estimator>>,
    phase: TrainingPhase,
    split: Option<DataSplit>,
    fitted: Vec<FittedCandidate>,
    results: Vec<EvaluationResult>,
    failures: Vec<(String, String)>,
    selection: Option<(SelectionMetric, usize)>,
    artifact_id: Option<Uuid>,
}

impl fmt::Debug for ModelTrainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelTrainer")
            .field("config", &self.config)
            .field(
                "estimators",
                &self.estimators.iter().map(|e| e.name()).collect::<Vec<_>>(),
            )
            .field("phase", &self.phase)
            .field("fitted", &self.fitted.len())
            .field("failures", &self.failures)
            .finish()
    }
}

impl ModelTrainer {
    /// Create a trainer for the standard roster
    pub fn new(config: TrainerConfig, roster: &RosterConfig, extractor: ExtractorConfig) -> Self {
        Self::with_estimators(config, roster.estimators(), extractor)
    }

    /// Create a trainer for an explicit list of candidates, in priority order
    pub fn with_estimators(
        config: TrainerConfig,
        estimators: Vec<Box<dyn Estimator>>,
        extractor: ExtractorConfig,
    ) -> Self {
        Self {
            config,
            extractor,
            estimators,
            phase: TrainingPhase::Idle,
            split: None,
            fitted: Vec::new(),
            results: Vec::new(),
            failures: Vec::new(),
            selection: None,
            artifact_id: None,
        }
    }

    /// Get the current phase
    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    /// Get the trainer settings
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Get the current split, if any
    pub fn split(&self) -> Option<&DataSplit> {
        self.split.as_ref()
    }

    /// Candidates that fitted, in roster order
    pub fn fitted(&self) -> &[FittedCandidate] {
        &self.fitted
    }

    /// Evaluation results in roster order
    pub fn results(&self) -> &[EvaluationResult] {
        &self.results
    }

    /// Failed candidates and their error messages, in roster order
    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }

    /// The selected candidate's evaluation
    pub fn best_result(&self) -> Option<&EvaluationResult> {
        self.selection.map(|(_, index)| &self.results[index])
    }

    fn require(&self, allowed: &[TrainingPhase], operation: &str) -> ClassifierResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(ClassifierError::invalid_state(format!(
                "{} cannot run in phase '{}'",
                operation, self.phase
            )))
        }
    }

    /// Partition the data into stratified train and test sets
    ///
    /// Starts a new run, discarding the state of any previous one.
    ///
    /// # Errors
    ///
    /// - `Configuration` if `test_fraction` is outside `(0, 1)`
    /// - `InsufficientData` if a class has fewer than two samples
    #[instrument(skip(self, set), fields(samples = set.len()))]
    pub fn prepare_data(
        &mut self,
        set: &TrainingSet,
        test_fraction: f64,
        seed: u64,
    ) -> ClassifierResult<&DataSplit> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(ClassifierError::config(format!(
                "test_fraction must be in (0, 1), got {}",
                test_fraction
            )));
        }

        let split = stratified_split(set, test_fraction, seed)?;

        info!(
            train = split.train.len(),
            test = split.test.len(),
            test_fraction,
            seed,
            "split data into train and test sets"
        );

        self.reset();
        self.phase = TrainingPhase::Split;
        Ok(self.split.insert(split))
    }

    fn reset(&mut self) {
        self.split = None;
        self.fitted.clear();
        self.results.clear();
        self.failures.clear();
        self.selection = None;
        self.artifact_id = None;
        self.phase = TrainingPhase::Idle;
    }

    /// Fit every candidate on the training split
    ///
    /// # Errors
    ///
    /// Returns `NoViableModel` if every candidate fails
    #[instrument(skip(self))]
    pub fn train_models(&mut self) -> ClassifierResult<&[FittedCandidate]> {
        self.require(&[TrainingPhase::Split], "train_models")?;
        let train = match &self.split {
            Some(split) => &split.train,
            None => return Err(ClassifierError::invalid_state("no data split prepared")),
        };

        let fit_one = |estimator: &dyn Estimator| {
            let name = estimator.name();
            debug!(model = name, "fitting candidate");
            (name, estimator.fit(train))
        };

        let outcomes: Vec<(&'static str, ClassifierResult<FittedModel>)> = if self.config.parallel
        {
            self.estimators
                .par_iter()
                .map(|estimator| fit_one(estimator.as_ref()))
                .collect()
        } else {
            self.estimators
                .iter()
                .map(|estimator| fit_one(estimator.as_ref()))
                .collect()
        };

        let mut fitted = Vec::new();
        let mut failures = Vec::new();
        for (name, outcome) in outcomes {
            match outcome {
                Ok(model) => fitted.push(FittedCandidate {
                    name: name.to_string(),
                    model,
                }),
                Err(e) => {
                    warn!(model = name, error = %e, "candidate failed to fit");
                    failures.push((name.to_string(), e.to_string()));
                }
            }
        }

        self.fitted = fitted;
        self.failures = failures;

        if self.fitted.is_empty() {
            return Err(self.no_viable_model());
        }

        info!(
            fitted = self.fitted.len(),
            failed = self.failures.len(),
            "finished fitting candidates"
        );

        self.phase = TrainingPhase::Fit;
        Ok(&self.fitted)
    }

    /// Score every fitted candidate on the test split
    ///
    /// # Errors
    ///
    /// Returns `NoViableModel` if every candidate fails evaluation
    #[instrument(skip(self))]
    pub fn evaluate_models(&mut self) -> ClassifierResult<&[EvaluationResult]> {
        self.require(&[TrainingPhase::Fit], "evaluate_models")?;
        let test = match &self.split {
            Some(split) => &split.test,
            None => return Err(ClassifierError::invalid_state("no data split prepared")),
        };

        let evaluate_one = |candidate: &FittedCandidate| {
            EvaluationResult::evaluate(&candidate.name, &candidate.model, test)
        };

        let outcomes: Vec<ClassifierResult<EvaluationResult>> = if self.config.parallel {
            self.fitted.par_iter().map(evaluate_one).collect()
        } else {
            self.fitted.iter().map(evaluate_one).collect()
        };

        let mut kept = Vec::new();
        let mut results = Vec::new();
        for (candidate, outcome) in std::mem::take(&mut self.fitted).into_iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    info!(
                        model = %result.name,
                        accuracy = result.accuracy,
                        precision = result.precision,
                        recall = result.recall,
                        f1 = result.f1,
                        auc = ?result.auc,
                        "evaluated candidate"
                    );
                    results.push(result);
                    kept.push(candidate);
                }
                Err(e) => {
                    warn!(model = %candidate.name, error = %e, "candidate failed evaluation");
                    self.failures.push((candidate.name, e.to_string()));
                }
            }
        }

        self.fitted = kept;
        self.results = results;

        if self.results.is_empty() {
            return Err(self.no_viable_model());
        }

        self.phase = TrainingPhase::Evaluate;
        Ok(&self.results)
    }

    /// Pick the candidate with the highest `metric`
    ///
    /// Ties fall back to accuracy, then to roster order. A missing metric
    /// value ranks below every present one. May be called again with another
    /// metric before anything is persisted.
    #[instrument(skip(self))]
    pub fn select_best_model(&mut self, metric: SelectionMetric) -> ClassifierResult<&EvaluationResult> {
        self.require(
            &[TrainingPhase::Evaluate, TrainingPhase::Select],
            "select_best_model",
        )?;

        let mut best: Option<usize> = None;
        for (index, candidate) in self.results.iter().enumerate() {
            let better = match best {
                None => true,
                Some(current) => {
                    compare_candidates(candidate, &self.results[current], metric) == Ordering::Greater
                }
            };
            if better {
                best = Some(index);
            }
        }

        let index = best.ok_or_else(|| self.no_viable_model())?;
        let winner = &self.results[index];
        info!(
            model = %winner.name,
            metric = %metric,
            score = ?metric.score(winner),
            "selected best model"
        );

        self.selection = Some((metric, index));
        self.phase = TrainingPhase::Select;
        Ok(&self.results[index])
    }

    /// Persist the selected model as an artifact
    ///
    /// # Errors
    ///
    /// Returns `Io` if the artifact cannot be written
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save_best_model<P: AsRef<Path>>(&mut self, path: P) -> ClassifierResult<ModelArtifact> {
        let artifact = self.best_artifact()?;
        artifact.save(path)?;

        self.artifact_id = Some(artifact.artifact_id());
        self.phase = self.phase.max(TrainingPhase::Persist);
        Ok(artifact)
    }

    /// Build the artifact of the selected model without writing it
    pub fn best_artifact(&self) -> ClassifierResult<ModelArtifact> {
        self.require(
            &[
                TrainingPhase::Select,
                TrainingPhase::Persist,
                TrainingPhase::Done,
            ],
            "save_best_model",
        )?;
        let (_, index) = self
            .selection
            .ok_or_else(|| ClassifierError::invalid_state("no model selected"))?;

        let evaluation = self.results[index].clone();
        let candidate = self
            .fitted
            .iter()
            .find(|candidate| candidate.name == evaluation.name)
            .ok_or_else(|| {
                ClassifierError::invalid_state(format!(
                    "selected model '{}' has no fitted parameters",
                    evaluation.name
                ))
            })?;
        let training_samples = self.split.as_ref().map(|s| s.train.len()).unwrap_or(0);

        ModelArtifact::new(
            candidate.model.clone(),
            self.extractor.clone(),
            training_samples,
            evaluation,
        )
    }

    /// Persist the evaluation report
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save_evaluation_results<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> ClassifierResult<EvaluationReport> {
        let report = self.report()?;
        write_json_atomic(path.as_ref(), &report)?;
        info!("saved evaluation results to {}", path.as_ref().display());

        if self.phase == TrainingPhase::Persist {
            self.phase = TrainingPhase::Done;
        }
        Ok(report)
    }

    /// The report of the current run
    pub fn report(&self) -> ClassifierResult<EvaluationReport> {
        self.require(
            &[
                TrainingPhase::Select,
                TrainingPhase::Persist,
                TrainingPhase::Done,
            ],
            "report",
        )?;
        let (metric, index) = self
            .selection
            .ok_or_else(|| ClassifierError::invalid_state("no model selected"))?;

        Ok(EvaluationReport {
            generated_at: Utc::now(),
            selection_metric: metric,
            best_model: Some(self.results[index].name.clone()),
            artifact_id: self.artifact_id,
            results: self
                .results
                .iter()
                .map(|result| (result.name.clone(), result.clone()))
                .collect(),
            failures: self.failures.iter().cloned().collect(),
        })
    }

    /// Plain-text table of the evaluated candidates
    pub fn evaluation_summary(&self) -> String {
        let best = self.best_result().map(|result| result.name.as_str());
        let mut summary = String::new();

        let _ = writeln!(
            summary,
            "  {:<22} {:>9} {:>10} {:>8} {:>8} {:>8}",
            "model", "accuracy", "precision", "recall", "f1", "auc"
        );
        for result in &self.results {
            let marker = if Some(result.name.as_str()) == best { '*' } else { ' ' };
            let auc = result
                .auc
                .map(|auc| format!("{:.4}", auc))
                .unwrap_or_else(|| "n/a".to_string());
            let _ = writeln!(
                summary,
                "{} {:<22} {:>9.4} {:>10.4} {:>8.4} {:>8.4} {:>8}",
                marker, result.name, result.accuracy, result.precision, result.recall, result.f1, auc
            );
        }
        for (name, message) in &self.failures {
            let _ = writeln!(summary, "! {:<22} failed: {}", name, message);
        }

        summary
    }

    /// Run every phase with the configured fraction, seed, metric and paths
    #[instrument(skip(self, set), fields(samples = set.len()))]
    pub fn run(&mut self, set: &TrainingSet) -> ClassifierResult<TrainingOutcome> {
        let config = self.config.clone();

        self.prepare_data(set, config.test_fraction, config.seed)?;
        self.train_models()?;
        self.evaluate_models()?;
        self.select_best_model(config.selection_metric)?;
        let artifact = self.save_best_model(&config.model_path)?;
        let report = self.save_evaluation_results(&config.report_path)?;

        info!(
            model = %artifact.model_name(),
            artifact_id = %artifact.artifact_id(),
            "training run complete"
        );

        Ok(TrainingOutcome { artifact, report })
    }

    fn no_viable_model(&self) -> ClassifierError {
        let details = self
            .failures
            .iter()
            .map(|(name, message)| format!("{}: {}", name, message))
            .collect::<Vec<_>>()
            .join("; ");

        if details.is_empty() {
            ClassifierError::no_viable_model("no candidates produced a model")
        } else {
            ClassifierError::no_viable_model(format!("every candidate failed ({})", details))
        }
    }
}

/// Order two results by the metric, then accuracy
fn compare_candidates(
    a: &EvaluationResult,
    b: &EvaluationResult,
    metric: SelectionMetric,
) -> Ordering {
    compare_scores(metric.score(a), metric.score(b))
        .then_with(|| a.accuracy.total_cmp(&b.accuracy))
}

fn compare_scores(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

/// Split each class separately so both sides keep the class balance
pub fn stratified_split(
    set: &TrainingSet,
    test_fraction: f64,
    seed: u64,
) -> ClassifierResult<DataSplit> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in UrlLabel::ALL {
        let mut members: Vec<usize> = set
            .labels()
            .iter()
            .enumerate()
            .filter(|(_, label)| **label == class)
            .map(|(index, _)| index)
            .collect();

        if members.len() < 2 {
            return Err(ClassifierError::insufficient_data(format!(
                "class {} has {} samples; at least 2 are needed for a train/test split",
                class,
                members.len()
            )));
        }

        members.shuffle(&mut rng);
        let test_count =
            ((members.len() as f64 * test_fraction).round() as usize).clamp(1, members.len() - 1);

        test.extend_from_slice(&members[..test_count]);
        train.extend_from_slice(&members[test_count..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    Ok(DataSplit {
        train: set.subset(&train),
        test: set.subset(&test),
    })
}
