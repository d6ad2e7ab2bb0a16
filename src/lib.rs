pub mod alignment;
pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod types;

pub use config::{LogBase, PreprocessConfig};
pub use error::{EmptyAudioReason, PreprocessError};
pub use pipeline::batch::{read_utt_list, run_batch, BatchInputs, BatchReport, BatchSummary};
pub use pipeline::builder::PreprocessorBuilder;
pub use pipeline::runtime::{PairError, Preprocessor};
pub use pipeline::storage::{FeatureKind, OutputLayout};
pub use pipeline::traits::{FeatureExtractor, PitchTracker, SequenceAligner};
pub use types::{
    AcousticFeatures, AudioSignal, PairFeatures, PairOutcome, SentenceDurations, Side,
    SilenceInterval, UtteranceFailure,
};
