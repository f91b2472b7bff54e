/// Pair generation settings, loadable from RON.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::embedding::EntityEmbedding;
use crate::core::pair::{PairType, SampleType};
use crate::core::rich_script::IndexOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Every knob of the script → pair instance pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PairConfig {
    /// Lemma instead of surface form for vocabulary keys.
    pub use_lemma: bool,
    pub pair_types: Vec<PairType>,
    pub left_sample_type: SampleType,
    /// Only used by `tf_arg`.
    pub neg_sample_type: SampleType,
    /// Append `-PRED` / `-SUBJ` / `-OBJ` / `-PREP_<p>` to lookup keys.
    pub include_type: bool,
    /// Fall back to the `UNK` index for out-of-vocabulary keys.
    pub use_unk: bool,
    /// Randomly drop frequent predicates as right events.
    pub subsampling: bool,
    pub subsample_threshold: f64,
    pub seed: u64,
    pub filter_stop_events: bool,
    pub use_ner: bool,
    pub include_compounds: bool,
    pub head_only: bool,
    pub rep_only: bool,
    /// Run `check_entity_idx_range` on every script before indexing.
    pub check_entity_idx: bool,
}

impl Default for PairConfig {
    fn default() -> Self {
        Self {
            use_lemma: true,
            pair_types: vec![PairType::TfArg],
            left_sample_type: SampleType::One,
            neg_sample_type: SampleType::One,
            include_type: true,
            use_unk: true,
            subsampling: false,
            subsample_threshold: 1e-4,
            seed: 0,
            filter_stop_events: false,
            use_ner: false,
            include_compounds: false,
            head_only: true,
            rep_only: true,
            check_entity_idx: false,
        }
    }
}

impl PairConfig {
    pub fn load_from_ron(path: &Path) -> Result<PairConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<PairConfig, ConfigError> {
        let config: PairConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pair_types.is_empty() {
            return Err(ConfigError::Invalid("pair_types is empty".to_string()));
        }
        if self.subsample_threshold.is_nan() || self.subsample_threshold <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "subsample_threshold must be positive, got {}",
                self.subsample_threshold
            )));
        }
        Ok(())
    }

    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            include_type: self.include_type,
            use_unk: self.use_unk,
        }
    }

    pub fn entity_embedding(&self) -> EntityEmbedding {
        EntityEmbedding {
            head_only: self.head_only,
            rep_only: self.rep_only,
            use_ner: self.use_ner,
            exclude_mention_idx: None,
        }
    }
}
