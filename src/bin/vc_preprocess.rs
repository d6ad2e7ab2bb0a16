use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use vc_align_rs::{
    read_utt_list, run_batch, BatchInputs, BatchSummary, LogBase, OutputLayout, PairOutcome,
    PreprocessConfig, PreprocessorBuilder,
};

#[derive(Debug, Parser)]
#[command(name = "vc_preprocess")]
#[command(about = "Extract aligned source/target features for FastSpeech2-style voice conversion")]
struct Args {
    /// Text file with one utterance id per line.
    utt_list: PathBuf,
    /// Directory containing `<id>.wav` source recordings.
    src_wav_root: PathBuf,
    /// Directory containing `<id>.wav` target recordings.
    tgt_wav_root: PathBuf,
    out_dir: PathBuf,
    /// JSON config; flags below override its fields.
    #[arg(long, env = "VC_PREP_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, env = "VC_PREP_N_JOBS")]
    n_jobs: Option<usize>,
    #[arg(long, env = "VC_PREP_SAMPLE_RATE")]
    sample_rate: Option<u32>,
    #[arg(long, env = "VC_PREP_SILENCE_THRESH_H", allow_hyphen_values = true)]
    silence_thresh_h: Option<f32>,
    #[arg(long, env = "VC_PREP_SILENCE_THRESH_T", allow_hyphen_values = true)]
    silence_thresh_t: Option<f32>,
    /// Silence scan chunk in milliseconds.
    #[arg(long, env = "VC_PREP_CHUNK_SIZE")]
    chunk_size: Option<u32>,
    /// Minimum sentence-break silence in milliseconds.
    #[arg(long, env = "VC_PREP_MIN_SILENCE_LEN")]
    min_silence_len: Option<u32>,
    #[arg(long, env = "VC_PREP_FILTER_LENGTH")]
    filter_length: Option<usize>,
    #[arg(long, env = "VC_PREP_HOP_LENGTH")]
    hop_length: Option<usize>,
    #[arg(long, env = "VC_PREP_WIN_LENGTH")]
    win_length: Option<usize>,
    #[arg(long, env = "VC_PREP_N_MEL_CHANNELS")]
    n_mel_channels: Option<usize>,
    #[arg(long, env = "VC_PREP_MEL_FMIN")]
    mel_fmin: Option<f32>,
    #[arg(long, env = "VC_PREP_MEL_FMAX")]
    mel_fmax: Option<f32>,
    #[arg(long, env = "VC_PREP_CLIP")]
    clip: Option<f32>,
    /// One of `natural`, `10`, `2`.
    #[arg(long, env = "VC_PREP_LOG_BASE")]
    log_base: Option<LogBase>,
    /// Non-zero enables pitch interpolation over unvoiced frames.
    #[arg(long, env = "VC_PREP_IS_CONTINUOUS_PITCH")]
    is_continuous_pitch: Option<u8>,
    #[arg(long, env = "VC_PREP_REDUCTION_FACTOR")]
    reduction_factor: Option<usize>,
    /// Non-zero enables per-sentence durations.
    #[arg(long, env = "VC_PREP_SENTENCE_DURATION")]
    sentence_duration: Option<u8>,
    #[arg(long, env = "VC_PREP_OUTPUT_TAG")]
    output_tag: Option<String>,
    /// Sakoe-Chiba band half-width in pooled frames.
    #[arg(long, env = "VC_PREP_DTW_BAND")]
    dtw_band: Option<usize>,
}

impl Args {
    fn resolve_config(&self) -> Result<PreprocessConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                require_path_exists(path, "Config file not found.")?;
                PreprocessConfig::load(path).map_err(|err| err.to_string())?
            }
            None => PreprocessConfig::default(),
        };

        macro_rules! override_field {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field.clone() {
                    config.$field = value;
                })*
            };
        }
        override_field!(
            n_jobs,
            sample_rate,
            silence_thresh_h,
            silence_thresh_t,
            chunk_size,
            min_silence_len,
            filter_length,
            hop_length,
            win_length,
            n_mel_channels,
            mel_fmin,
            mel_fmax,
            clip,
            log_base,
            reduction_factor,
            output_tag,
        );
        if let Some(flag) = self.is_continuous_pitch {
            config.is_continuous_pitch = flag > 0;
        }
        if let Some(flag) = self.sentence_duration {
            config.sentence_duration = flag > 0;
        }
        if self.dtw_band.is_some() {
            config.dtw_band = self.dtw_band;
        }
        Ok(config)
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    init_tracing();

    require_path_exists(&args.utt_list, "Utterance list not found.")?;
    require_path_exists(&args.src_wav_root, "Source wav root not found.")?;
    require_path_exists(&args.tgt_wav_root, "Target wav root not found.")?;

    let config = args.resolve_config()?;
    let utt_ids = read_utt_list(&args.utt_list).map_err(|err| err.to_string())?;
    if utt_ids.is_empty() {
        return Err(format!(
            "No utterance ids found in '{}'.",
            args.utt_list.display()
        ));
    }

    let preprocessor = PreprocessorBuilder::new(config.clone())
        .build()
        .map_err(|err| format!("Invalid configuration: {err}"))?;
    let layout = OutputLayout::new(&args.out_dir, config.output_tag.clone());
    let inputs = BatchInputs {
        utt_ids,
        source_root: args.src_wav_root.clone(),
        target_root: args.tgt_wav_root.clone(),
    };

    let progress = ProgressBar::new(inputs.utt_ids.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-"),
    );
    progress.set_message("starting...");

    let on_outcome = |outcome: &PairOutcome| {
        let id = match outcome {
            PairOutcome::Written { utt_id } => utt_id,
            PairOutcome::Failed(failure) => &failure.utt_id,
        };
        progress.set_message(id.clone());
        progress.inc(1);
    };
    let report = run_batch(&preprocessor, &layout, &inputs, &on_outcome)
        .map_err(|err| format!("Batch failed: {err}"))?;
    progress.finish_with_message("done");

    let summary = BatchSummary::from_report(&config, &report);
    let summary_path = layout.summary_path();
    summary
        .write(&summary_path)
        .map_err(|err| format!("Failed to write summary '{}': {err}", summary_path.display()))?;

    tracing::info!(
        total = summary.total,
        succeeded = summary.succeeded,
        failed_source = summary.failed_source,
        failed_target = summary.failed_target,
        elapsed = %format_duration_hms(report.elapsed),
        summary = %summary_path.display(),
        "vc_preprocess: finished"
    );
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn format_duration_hms(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    let hours = total_ms / 3_600_000;
    let rem_after_hours = total_ms % 3_600_000;
    let minutes = rem_after_hours / 60_000;
    let rem_after_minutes = rem_after_hours % 60_000;
    let seconds = rem_after_minutes / 1_000;
    let millis = rem_after_minutes % 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn require_path_exists(path: &Path, message: &str) -> Result<(), String> {
    if path.exists() {
        return Ok(());
    }
    Err(format!("{message} Missing path: {}", path.display()))
}
