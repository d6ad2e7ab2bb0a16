use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use ndarray::{Array1, ArrayBase, Data, Dimension};
use ndarray_npy::{write_npy, WritableElement};

use crate::error::PreprocessError;
use crate::types::{PairFeatures, Side, UtteranceFailure};

pub const FEATS_SUFFIX: &str = "-feats.npy";
pub const FAILED_SOURCE_LIST: &str = "failed_src_lst.txt";
pub const FAILED_TARGET_LIST: &str = "failed_tgt_lst.txt";
pub const SUMMARY_FILE: &str = "preprocess_summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Mel,
    Pitch,
    Energy,
    Duration,
    SentDuration,
}

impl FeatureKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Mel => "mel",
            Self::Pitch => "pitch",
            Self::Energy => "energy",
            Self::Duration => "duration",
            Self::SentDuration => "sent_duration",
        }
    }

    /// Kinds stored for `side`; durations exist only on the target side.
    pub fn for_side(side: Side) -> &'static [FeatureKind] {
        match side {
            Side::Source => &[Self::Mel, Self::Pitch, Self::Energy, Self::SentDuration],
            Side::Target => &[
                Self::Mel,
                Self::Pitch,
                Self::Energy,
                Self::Duration,
                Self::SentDuration,
            ],
        }
    }
}

/// Directory tree of one preprocessing run.
///
/// ```text
/// <root>/in_<tag>/{mel,pitch,energy,sent_duration}/<utt_id>-feats.npy
/// <root>/out_<tag>/{mel,pitch,energy,duration,sent_duration}/<utt_id>-feats.npy
/// <root>/failed_src_lst.txt
/// <root>/failed_tgt_lst.txt
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    tag: String,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>, tag: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            tag: tag.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn side_dir(&self, side: Side) -> PathBuf {
        let prefix = match side {
            Side::Source => "in",
            Side::Target => "out",
        };
        self.root.join(format!("{prefix}_{}", self.tag))
    }

    pub fn feature_path(&self, side: Side, kind: FeatureKind, utt_id: &str) -> PathBuf {
        self.side_dir(side)
            .join(kind.dir_name())
            .join(format!("{utt_id}{FEATS_SUFFIX}"))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    pub fn failure_list_path(&self, side: Side) -> PathBuf {
        match side {
            Side::Source => self.root.join(FAILED_SOURCE_LIST),
            Side::Target => self.root.join(FAILED_TARGET_LIST),
        }
    }

    pub fn create_dirs(&self) -> Result<(), PreprocessError> {
        for side in [Side::Source, Side::Target] {
            for kind in FeatureKind::for_side(side) {
                let dir = self.side_dir(side).join(kind.dir_name());
                fs::create_dir_all(&dir)
                    .map_err(|e| PreprocessError::io("create output directory", e))?;
            }
        }
        Ok(())
    }

    /// Persists every array of the pair, removing already written files when
    /// any write fails.
    pub fn write_pair(&self, features: &PairFeatures) -> Result<Vec<PathBuf>, PreprocessError> {
        let mut written = Vec::new();
        match self.write_all(features, &mut written) {
            Ok(()) => Ok(written),
            Err(err) => {
                for path in &written {
                    if let Err(remove_err) = fs::remove_file(path) {
                        tracing::warn!(
                            path = %path.display(),
                            error = %remove_err,
                            "storage: failed to roll back partial output"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    fn write_all(
        &self,
        features: &PairFeatures,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), PreprocessError> {
        let id = features.utt_id.as_str();
        for (side, acoustic) in [
            (Side::Source, &features.source),
            (Side::Target, &features.target),
        ] {
            self.write_array(side, FeatureKind::Mel, id, &acoustic.mel, written)?;
            self.write_array(side, FeatureKind::Pitch, id, &acoustic.pitch, written)?;
            self.write_array(side, FeatureKind::Energy, id, &acoustic.energy, written)?;
        }

        let duration = to_i16(&features.duration, "duration")?;
        self.write_array(Side::Target, FeatureKind::Duration, id, &duration, written)?;

        if let Some(sentences) = &features.sentence_durations {
            let source = to_i16(&sentences.source, "source sentence duration")?;
            let target = to_i16(&sentences.target, "target sentence duration")?;
            self.write_array(Side::Source, FeatureKind::SentDuration, id, &source, written)?;
            self.write_array(Side::Target, FeatureKind::SentDuration, id, &target, written)?;
        }
        Ok(())
    }

    fn write_array<A, S, D>(
        &self,
        side: Side,
        kind: FeatureKind,
        utt_id: &str,
        array: &ArrayBase<S, D>,
        written: &mut Vec<PathBuf>,
    ) -> Result<(), PreprocessError>
    where
        A: WritableElement,
        S: Data<Elem = A>,
        D: Dimension,
    {
        let path = self.feature_path(side, kind, utt_id);
        write_npy(&path, array).map_err(|e| PreprocessError::npy("write feature array", e))?;
        written.push(path);
        Ok(())
    }

    /// Writes both failure lists, one wav path per line, in the given order.
    pub fn write_failure_lists(&self, failures: &[UtteranceFailure]) -> Result<(), PreprocessError> {
        let source = failures
            .iter()
            .filter(|f| f.blames_source())
            .map(|f| f.source_wav.as_path());
        write_path_list(&self.failure_list_path(Side::Source), source)?;
        let target = failures
            .iter()
            .filter(|f| f.blames_target())
            .map(|f| f.target_wav.as_path());
        write_path_list(&self.failure_list_path(Side::Target), target)
    }
}

fn write_path_list<'a>(
    path: &Path,
    entries: impl Iterator<Item = &'a Path>,
) -> Result<(), PreprocessError> {
    let mut file =
        fs::File::create(path).map_err(|e| PreprocessError::io("create failure list", e))?;
    for entry in entries {
        writeln!(file, "{}", entry.display())
            .map_err(|e| PreprocessError::io("write failure list", e))?;
    }
    Ok(())
}

fn to_i16(values: &[usize], what: &str) -> Result<Array1<i16>, PreprocessError> {
    values
        .iter()
        .map(|&v| {
            i16::try_from(v).map_err(|_| {
                PreprocessError::invalid_input(format!("{what} value {v} does not fit in int16"))
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Array1::from)
}
