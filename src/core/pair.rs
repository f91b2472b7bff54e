/// Pairwise training instances: positive events paired with corrupted
/// versions of themselves, each with a context event from the same document.
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::core::config::PairConfig;
use crate::core::embedding::Embedding;
use crate::core::rich_script::{EventIndex, IndexOptions, RichEvent, RichScript};
use crate::schema::ArgSlot;

#[derive(Debug, Error)]
pub enum PairError {
    #[error("unknown pair type: {0:?} (expected tf_arg, wo_arg or two_args)")]
    UnknownPairType(String),
    #[error("unknown sample type: {0:?} (expected one or all)")]
    UnknownSampleType(String),
}

/// How the negative of a pair is derived from the positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairType {
    /// True argument vs. another entity of the document in the same slot.
    TfArg,
    /// With the argument vs. without it.
    WoArg,
    /// Argument in its own slot vs. moved to another slot.
    TwoArgs,
}

impl PairType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TfArg => "tf_arg",
            Self::WoArg => "wo_arg",
            Self::TwoArgs => "two_args",
        }
    }
}

impl fmt::Display for PairType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PairType {
    type Err = PairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tf_arg" => Ok(Self::TfArg),
            "wo_arg" => Ok(Self::WoArg),
            "two_args" => Ok(Self::TwoArgs),
            other => Err(PairError::UnknownPairType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleType {
    One,
    All,
}

impl SampleType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::One => "one",
            Self::All => "all",
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleType {
    type Err = PairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one" => Ok(Self::One),
            "all" => Ok(Self::All),
            other => Err(PairError::UnknownSampleType(other.to_string())),
        }
    }
}

/// One labeled training instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairInstance {
    pub pair_type: PairType,
    /// `true` for the observed event, `false` for a corruption.
    pub label: bool,
    /// Context event; `None` when the document has no other usable event.
    pub left: Option<EventIndex>,
    pub right: EventIndex,
    /// Slot of the argument the instance is about.
    pub slot: ArgSlot,
}

impl fmt::Display for PairInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t", self.pair_type, u8::from(self.label))?;
        match &self.left {
            Some(left) => write!(f, "{}", left)?,
            None => f.write_str("-")?,
        }
        write!(f, "\t{}\t{}", self.right, self.slot.position())
    }
}

impl RichScript {
    /// Generate pair instances for every usable, non-subsampled event.
    ///
    /// For each requested pair type and each qualifying argument the
    /// positive is emitted first, followed by its negatives, once per
    /// sampled left event. Random draws happen in that order (negative,
    /// then left), so a fixed seed gives a fixed stream.
    pub fn get_pair_input_list<E: Embedding + ?Sized>(
        &self,
        model: &E,
        config: &PairConfig,
        rng: &mut StdRng,
    ) -> Vec<PairInstance> {
        let opts = config.index_options();
        let usable: Vec<usize> = (0..self.events.len())
            .filter(|&idx| self.events[idx].is_usable())
            .collect();
        let mut instances = Vec::new();

        for &right_idx in &usable {
            let right = &self.events[right_idx];
            if right.subsampled {
                continue;
            }
            let lefts: Vec<EventIndex> = usable
                .iter()
                .filter(|&&idx| idx != right_idx)
                .map(|&idx| self.events[idx].event_index())
                .collect();
            let positive = right.event_index();

            for &pair_type in &config.pair_types {
                for slot in ArgSlot::ALL {
                    let Some(entity_idx) = self.qualifying_entity(right, slot) else {
                        continue;
                    };
                    let negatives = match pair_type {
                        PairType::TfArg => self.tf_arg_negatives(
                            right,
                            slot,
                            entity_idx,
                            model,
                            opts,
                            config.neg_sample_type,
                            rng,
                        ),
                        PairType::WoArg => vec![positive.with_slot(slot, None)],
                        PairType::TwoArgs => {
                            self.two_args_negatives(right, slot, entity_idx, model, opts)
                        }
                    };
                    if negatives.is_empty() {
                        continue;
                    }

                    let left_choices: Vec<Option<EventIndex>> = if lefts.is_empty() {
                        vec![None]
                    } else {
                        match config.left_sample_type {
                            SampleType::One => vec![Some(lefts[rng.gen_range(0..lefts.len())])],
                            SampleType::All => lefts.iter().copied().map(Some).collect(),
                        }
                    };

                    for left in left_choices {
                        instances.push(PairInstance {
                            pair_type,
                            label: true,
                            left,
                            right: positive,
                            slot,
                        });
                        instances.extend(negatives.iter().map(|&negative| PairInstance {
                            pair_type,
                            label: false,
                            left,
                            right: negative,
                            slot,
                        }));
                    }
                }
            }
        }
        instances
    }

    /// Entity behind the argument in `slot`, if that argument can anchor
    /// a pair: linked, resolved, and mentioned elsewhere in the document.
    fn qualifying_entity(&self, event: &RichEvent, slot: ArgSlot) -> Option<usize> {
        let arg = event.arg(slot)?;
        let entity_idx = arg.entity_idx?;
        arg.index?;
        (self.entities.get(entity_idx)?.num_mentions() >= 2).then_some(entity_idx)
    }

    #[allow(clippy::too_many_arguments)]
    fn tf_arg_negatives<E: Embedding + ?Sized>(
        &self,
        event: &RichEvent,
        slot: ArgSlot,
        entity_idx: usize,
        model: &E,
        opts: IndexOptions,
        neg_sample_type: SampleType,
        rng: &mut StdRng,
    ) -> Vec<EventIndex> {
        let positive = event.event_index();
        let Some(suffix) = event.slot_suffix(slot) else {
            return Vec::new();
        };
        let true_index = positive.get(slot);
        let candidates: Vec<EventIndex> = self
            .entities
            .iter()
            .enumerate()
            .filter(|&(idx, _)| idx != entity_idx)
            .filter_map(|(_, entity)| entity.index(model, suffix, opts))
            .filter(|&idx| Some(idx) != true_index)
            .map(|idx| positive.with_slot(slot, Some(idx)))
            .collect();
        match neg_sample_type {
            SampleType::All => candidates,
            SampleType::One if candidates.is_empty() => candidates,
            SampleType::One => vec![candidates[rng.gen_range(0..candidates.len())]],
        }
    }

    fn two_args_negatives<E: Embedding + ?Sized>(
        &self,
        event: &RichEvent,
        slot: ArgSlot,
        entity_idx: usize,
        model: &E,
        opts: IndexOptions,
    ) -> Vec<EventIndex> {
        let emptied = event.event_index().with_slot(slot, None);
        let entity = &self.entities[entity_idx];
        ArgSlot::ALL
            .into_iter()
            .filter(|&other| other != slot)
            .filter_map(|other| {
                let suffix = event.slot_suffix(other)?;
                let idx = entity.index(model, suffix, opts)?;
                Some(emptied.with_slot(other, Some(idx)))
            })
            .collect()
    }
}
