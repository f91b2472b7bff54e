/// Rich scripts: scripts resolved against an embedding vocabulary.
///
/// Building a rich script fixes the lookup key and type suffix of every
/// predicate and argument; indexing then attaches vocabulary indices and
/// marks subsampled predicates. Dense vectors are attached separately.
use rand::rngs::StdRng;
use rand::Rng;
use rustc_hash::FxHashSet;
use std::fmt;

use crate::core::config::PairConfig;
use crate::core::embedding::{with_backoff, Embedding, EntityEmbedding, UNK};
use crate::core::vocab::is_stop_predicate;
use crate::schema::{
    ArgSlot, Argument, Counter, Entity, Event, Script, ScriptError, Token, TokenForm,
};

pub const PRED_SUFFIX: &str = "-PRED";
pub const SUBJ_SUFFIX: &str = "-SUBJ";
pub const OBJ_SUFFIX: &str = "-OBJ";
pub const PREP_SUFFIX: &str = "-PREP";

/// Suffix for a prepositional object: `-PREP_<prep>` for allow-listed
/// prepositions, `-PREP` otherwise.
pub fn pobj_suffix(prep: &str, prep_vocab: &FxHashSet<String>) -> String {
    if prep_vocab.contains(prep) {
        format!("{}_{}", PREP_SUFFIX, prep)
    } else {
        PREP_SUFFIX.to_string()
    }
}

/// How keys map to vocabulary indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    pub include_type: bool,
    pub use_unk: bool,
}

impl IndexOptions {
    /// The suffix actually appended to lookup keys.
    pub fn effective_suffix<'s>(&self, suffix: &'s str) -> &'s str {
        if self.include_type {
            suffix
        } else {
            ""
        }
    }

    /// Index of `key` (plus `suffix` when typed). Falls back to `UNK`
    /// when `use_unk` is set; `None` means the key cannot be used.
    pub fn resolve<E: Embedding + ?Sized>(&self, model: &E, key: &str, suffix: &str) -> Option<usize> {
        let typed = |base: &str| {
            with_backoff(suffix).find_map(|s| model.index_of(&format!("{}{}", base, s)))
        };
        let found = if self.include_type {
            typed(key)
        } else {
            model.index_of(key)
        };
        match found {
            Some(idx) => Some(idx),
            None if self.use_unk => {
                let typed_unk = if self.include_type { typed(UNK) } else { None };
                typed_unk.or_else(|| model.unk_index())
            }
            None => None,
        }
    }
}

/// Word2vec-style frequency subsampling of predicates.
#[derive(Debug, Clone)]
pub struct Subsampler {
    counts: Counter,
    total: f64,
    threshold: f64,
}

impl Subsampler {
    pub fn new(counts: Counter, threshold: f64) -> Self {
        let total = counts.values().sum::<usize>() as f64;
        Self {
            counts,
            total,
            threshold,
        }
    }

    /// `min(1, (sqrt(f / t) + 1) * t / f)` for relative frequency `f`.
    /// Unseen predicates are always kept.
    pub fn keep_probability(&self, pred: &str) -> f64 {
        let count = self.counts.get(pred).copied().unwrap_or(0);
        if count == 0 || self.total <= 0.0 {
            return 1.0;
        }
        let freq = count as f64 / self.total;
        (((freq / self.threshold).sqrt() + 1.0) * self.threshold / freq).min(1.0)
    }

    pub fn should_drop(&self, pred: &str, rng: &mut StdRng) -> bool {
        let keep = self.keep_probability(pred);
        keep < 1.0 && rng.gen::<f64>() >= keep
    }
}

/// Vocabulary indices of one event; `None` slots are written as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventIndex {
    pub pred: Option<usize>,
    pub subj: Option<usize>,
    pub obj: Option<usize>,
    pub pobj: Option<usize>,
}

impl EventIndex {
    pub fn get(&self, slot: ArgSlot) -> Option<usize> {
        match slot {
            ArgSlot::Subj => self.subj,
            ArgSlot::Obj => self.obj,
            ArgSlot::Pobj => self.pobj,
        }
    }

    pub fn with_slot(mut self, slot: ArgSlot, index: Option<usize>) -> Self {
        match slot {
            ArgSlot::Subj => self.subj = index,
            ArgSlot::Obj => self.obj = index,
            ArgSlot::Pobj => self.pobj = index,
        }
        self
    }
}

impl fmt::Display for EventIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |idx: Option<usize>| idx.map_or_else(|| "-1".to_string(), |i| i.to_string());
        write!(
            f,
            "{},{},{},{}",
            show(self.pred),
            show(self.subj),
            show(self.obj),
            show(self.pobj)
        )
    }
}

/// An entity with its lookup key (head of the representative mention).
#[derive(Debug, Clone, PartialEq)]
pub struct RichEntity {
    pub key: String,
    pub entity: Entity,
}

impl RichEntity {
    pub fn num_mentions(&self) -> usize {
        self.entity.num_mentions()
    }

    /// Index of this entity placed in a slot with the given suffix.
    pub fn index<E: Embedding + ?Sized>(
        &self,
        model: &E,
        suffix: &str,
        opts: IndexOptions,
    ) -> Option<usize> {
        opts.resolve(model, &self.key, suffix)
    }

    pub fn embedding<E: Embedding + ?Sized>(
        &self,
        model: &E,
        suffix: &str,
        opts: EntityEmbedding,
    ) -> Vec<f32> {
        model.get_entity_embedding(&self.entity, suffix, opts)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RichArgument {
    pub slot: ArgSlot,
    /// Type suffix for this slot, e.g. `-SUBJ` or `-PREP_in`.
    pub suffix: String,
    pub key: String,
    pub entity_idx: Option<usize>,
    pub mention_idx: Option<usize>,
    pub index: Option<usize>,
    pub vector: Option<Vec<f32>>,
    token: Token,
}

impl RichArgument {
    pub fn token(&self) -> &Token {
        &self.token
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RichEvent {
    /// Full predicate representation (negation and particle folded in).
    pub pred_key: String,
    pub pred_index: Option<usize>,
    pub pred_vector: Option<Vec<f32>>,
    pub subj: Option<RichArgument>,
    pub obj: Option<RichArgument>,
    /// The first allow-listed prepositional object, else the first one.
    pub pobj: Option<RichArgument>,
    /// Dropped by subsampling: still usable as context, never as a target.
    pub subsampled: bool,
    pred_token: Token,
}

impl RichEvent {
    pub fn arg(&self, slot: ArgSlot) -> Option<&RichArgument> {
        match slot {
            ArgSlot::Subj => self.subj.as_ref(),
            ArgSlot::Obj => self.obj.as_ref(),
            ArgSlot::Pobj => self.pobj.as_ref(),
        }
    }

    /// Suffix an argument would take in `slot`; `None` for a
    /// prepositional slot the event does not have.
    pub fn slot_suffix(&self, slot: ArgSlot) -> Option<&str> {
        match slot {
            ArgSlot::Subj => Some(SUBJ_SUFFIX),
            ArgSlot::Obj => Some(OBJ_SUFFIX),
            ArgSlot::Pobj => self.pobj.as_ref().map(|arg| arg.suffix.as_str()),
        }
    }

    /// Events whose predicate has no index cannot appear in pairs.
    pub fn is_usable(&self) -> bool {
        self.pred_index.is_some()
    }

    pub fn event_index(&self) -> EventIndex {
        let idx = |arg: &Option<RichArgument>| arg.as_ref().and_then(|a| a.index);
        EventIndex {
            pred: self.pred_index,
            subj: idx(&self.subj),
            obj: idx(&self.obj),
            pobj: idx(&self.pobj),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RichScript {
    pub doc_name: String,
    pub entities: Vec<RichEntity>,
    pub events: Vec<RichEvent>,
}

impl RichScript {
    /// Fix keys and suffixes for every event of `script`.
    ///
    /// Fails when a linked argument points outside the entity list.
    pub fn build(
        script: &Script,
        prep_vocab: &FxHashSet<String>,
        config: &PairConfig,
    ) -> Result<RichScript, ScriptError> {
        let form = TokenForm::new(config.use_lemma).with_ner(config.use_ner);
        let entities: Vec<RichEntity> = script
            .entities
            .iter()
            .map(|entity| RichEntity {
                key: entity
                    .rep_mention()
                    .head_string_form(form, config.include_compounds),
                entity: entity.clone(),
            })
            .collect();

        let mut events = Vec::with_capacity(script.events.len());
        for event in &script.events {
            let pred_key = event.pred.full_representation(config.use_lemma);
            if config.filter_stop_events && is_stop_predicate(&pred_key) {
                log::debug!("{}: filtered stop event {}", script.doc_name, pred_key);
                continue;
            }
            let build_arg = |slot: ArgSlot, suffix: String, arg: &Argument| {
                rich_argument(&entities, event, slot, suffix, arg, form)
            };
            let subj = event
                .subj
                .as_ref()
                .map(|arg| build_arg(ArgSlot::Subj, SUBJ_SUFFIX.to_string(), arg))
                .transpose()?;
            let obj = event
                .obj
                .as_ref()
                .map(|arg| build_arg(ArgSlot::Obj, OBJ_SUFFIX.to_string(), arg))
                .transpose()?;
            let pobj = event
                .pobj_list
                .iter()
                .find(|(prep, _)| prep_vocab.contains(prep))
                .or_else(|| event.pobj_list.first())
                .map(|(prep, arg)| build_arg(ArgSlot::Pobj, pobj_suffix(prep, prep_vocab), arg))
                .transpose()?;

            events.push(RichEvent {
                pred_key,
                pred_index: None,
                pred_vector: None,
                subj,
                obj,
                pobj,
                subsampled: false,
                pred_token: event.pred.token.clone(),
            });
        }

        Ok(RichScript {
            doc_name: script.doc_name.clone(),
            entities,
            events,
        })
    }

    /// Attach vocabulary indices, and subsample predicates when a
    /// subsampler is given.
    pub fn index<E: Embedding + ?Sized>(
        &mut self,
        model: &E,
        config: &PairConfig,
        subsampler: Option<&Subsampler>,
        rng: &mut StdRng,
    ) {
        let opts = config.index_options();
        for event in &mut self.events {
            event.pred_index = opts.resolve(model, &event.pred_key, PRED_SUFFIX);
            for arg in [&mut event.subj, &mut event.obj, &mut event.pobj]
                .into_iter()
                .flatten()
            {
                arg.index = opts.resolve(model, &arg.key, &arg.suffix);
            }

            if let Some(subsampler) = subsampler {
                event.subsampled = subsampler.should_drop(&event.pred_key, rng);
                if event.subsampled {
                    log::debug!("{}: subsampled {}", self.doc_name, event.pred_key);
                }
            }
        }
    }

    /// Attach dense vectors for callers that feed embeddings rather than
    /// indices. Pair generation does not need them.
    ///
    /// Linked arguments get their entity embedding with the argument's own
    /// mention left out.
    pub fn attach_vectors<E: Embedding + ?Sized>(&mut self, model: &E, config: &PairConfig) {
        let opts = config.index_options();
        let entity_opts = config.entity_embedding();
        let pred_suffix = opts.effective_suffix(PRED_SUFFIX);

        for event in &mut self.events {
            event.pred_vector = model
                .lookup_with_suffix(&event.pred_key, pred_suffix)
                .or_else(|| model.get_token_embedding(&event.pred_token, &[], false, pred_suffix))
                .map(<[f32]>::to_vec);

            for arg in [&mut event.subj, &mut event.obj, &mut event.pobj]
                .into_iter()
                .flatten()
            {
                let suffix = opts.effective_suffix(&arg.suffix);
                arg.vector = match arg.entity_idx.and_then(|idx| self.entities.get(idx)) {
                    Some(entity) => Some(entity.embedding(
                        model,
                        suffix,
                        EntityEmbedding {
                            exclude_mention_idx: arg.mention_idx,
                            ..entity_opts
                        },
                    )),
                    None => model
                        .get_token_embedding(&arg.token, &[], config.use_ner, suffix)
                        .map(<[f32]>::to_vec),
                };
            }
        }
    }

    pub fn num_usable_events(&self) -> usize {
        self.events.iter().filter(|e| e.is_usable()).count()
    }
}

fn rich_argument(
    entities: &[RichEntity],
    event: &Event,
    slot: ArgSlot,
    suffix: String,
    arg: &Argument,
    form: TokenForm,
) -> Result<RichArgument, ScriptError> {
    let (key, entity_idx, mention_idx) = match arg.entity_ref() {
        Some((entity_idx, mention_idx)) => {
            let entity = entities
                .get(entity_idx)
                .ok_or_else(|| ScriptError::EntityIdxOutOfRange {
                    arg: arg.to_text(),
                    event: event.to_text(),
                    entity_idx,
                    num_entities: entities.len(),
                })?;
            if mention_idx >= entity.num_mentions() {
                return Err(ScriptError::MentionIdxOutOfRange {
                    arg: arg.to_text(),
                    event: event.to_text(),
                    mention_idx,
                    num_mentions: entity.num_mentions(),
                });
            }
            (entity.key.clone(), Some(entity_idx), Some(mention_idx))
        }
        None => (arg.representation(form), None, None),
    };
    Ok(RichArgument {
        slot,
        suffix,
        key,
        entity_idx,
        mention_idx,
        index: None,
        vector: None,
        token: arg.token().clone(),
    })
}
