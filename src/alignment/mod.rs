//! Source/target frame alignment: DTW, duration extraction and sentence
//! segmentation.

pub mod dtw;
pub mod duration;
pub mod sentence;


pub use dtw::dtw_path;
pub use duration::{correct_silent_spans, path_to_durations, silent_runs, DurationAligner};
pub use sentence::SentenceSegmenter;
