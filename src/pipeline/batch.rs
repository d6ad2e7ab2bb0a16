use std::fs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::PreprocessConfig;
use crate::error::PreprocessError;
use crate::pipeline::runtime::{PairError, Preprocessor};
use crate::pipeline::storage::OutputLayout;
use crate::types::{PairOutcome, UtteranceFailure};

pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

/// Utterance ids, one per line; blank lines are skipped.
pub fn read_utt_list(path: &Path) -> Result<Vec<String>, PreprocessError> {
    let text =
        fs::read_to_string(path).map_err(|e| PreprocessError::io("read utterance list", e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInputs {
    pub utt_ids: Vec<String>,
    pub source_root: PathBuf,
    pub target_root: PathBuf,
}

impl BatchInputs {
    pub fn wav_paths(&self, utt_id: &str) -> (PathBuf, PathBuf) {
        let file = format!("{utt_id}.wav");
        (self.source_root.join(&file), self.target_root.join(file))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// One entry per input id, in input order.
    pub outcomes: Vec<PairOutcome>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PairOutcome::Written { .. }))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &UtteranceFailure> {
        self.outcomes.iter().filter_map(|o| match o {
            PairOutcome::Failed(failure) => Some(failure),
            PairOutcome::Written { .. } => None,
        })
    }
}

/// Machine-readable record of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub schema_version: u32,
    pub generated_at: String,
    pub config: PreprocessConfig,
    pub total: usize,
    pub succeeded: usize,
    pub failed_source: usize,
    pub failed_target: usize,
    pub elapsed_seconds: f64,
}

impl BatchSummary {
    pub fn from_report(config: &PreprocessConfig, report: &BatchReport) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            generated_at: chrono::Utc::now().to_rfc3339(),
            config: config.clone(),
            total: report.outcomes.len(),
            succeeded: report.succeeded(),
            failed_source: report.failures().filter(|f| f.blames_source()).count(),
            failed_target: report.failures().filter(|f| f.blames_target()).count(),
            elapsed_seconds: report.elapsed.as_secs_f64(),
        }
    }

    /// Writes the summary as pretty JSON, creating the parent directory.
    pub fn write(&self, path: &Path) -> Result<(), PreprocessError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PreprocessError::io("create summary directory", e))?;
        }
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| PreprocessError::json("serialize batch summary", e))?;
        json.push('\n');
        fs::write(path, json).map_err(|e| PreprocessError::io("write batch summary", e))?;
        tracing::debug!(path = %path.display(), "batch: wrote summary");
        Ok(())
    }
}

/// Processes every pair on a pool of `n_jobs` threads and writes the failure
/// lists.
///
/// A failing or panicking pair is recorded and never aborts the batch.
/// `on_outcome` is called from worker threads as pairs finish.
pub fn run_batch(
    preprocessor: &Preprocessor,
    layout: &OutputLayout,
    inputs: &BatchInputs,
    on_outcome: &(dyn Fn(&PairOutcome) + Sync),
) -> Result<BatchReport, PreprocessError> {
    let started = Instant::now();
    layout.create_dirs()?;

    let n_jobs = preprocessor.config().n_jobs.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_jobs)
        .build()
        .map_err(PreprocessError::worker_pool)?;

    tracing::info!(
        utterances = inputs.utt_ids.len(),
        n_jobs,
        out_dir = %layout.root().display(),
        "batch: starting"
    );

    let outcomes: Vec<PairOutcome> = pool.install(|| {
        inputs
            .utt_ids
            .par_iter()
            .map(|utt_id| {
                let outcome = process_one(preprocessor, layout, inputs, utt_id);
                on_outcome(&outcome);
                outcome
            })
            .collect()
    });

    let report = BatchReport {
        outcomes,
        elapsed: started.elapsed(),
    };
    let failures: Vec<UtteranceFailure> = report.failures().cloned().collect();
    layout.write_failure_lists(&failures)?;

    tracing::info!(
        succeeded = report.succeeded(),
        failed = failures.len(),
        elapsed_s = report.elapsed.as_secs_f64(),
        "batch: finished"
    );
    Ok(report)
}

fn process_one(
    preprocessor: &Preprocessor,
    layout: &OutputLayout,
    inputs: &BatchInputs,
    utt_id: &str,
) -> PairOutcome {
    let (source_wav, target_wav) = inputs.wav_paths(utt_id);
    let result = catch_unwind(AssertUnwindSafe(|| {
        let features = preprocessor.process_pair(utt_id, &source_wav, &target_wav)?;
        layout.write_pair(&features).map_err(PairError::pair)?;
        Ok::<(), PairError>(())
    }));

    let (side, message) = match result {
        Ok(Ok(())) => {
            return PairOutcome::Written {
                utt_id: utt_id.to_string(),
            }
        }
        Ok(Err(err)) => (err.side, err.error.to_string()),
        Err(panic) => (None, format!("worker panicked: {}", panic_message(&*panic))),
    };

    tracing::warn!(
        utt_id,
        side = side.map_or("pair", |s| s.as_str()),
        error = %message,
        "batch: utterance rejected"
    );
    PairOutcome::Failed(UtteranceFailure {
        utt_id: utt_id.to_string(),
        side,
        source_wav,
        target_wav,
        message,
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
