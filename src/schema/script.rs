/// Scripts (the event/entity view of one document) and corpora of them.
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use thiserror::Error;

use super::entity::Entity;
use super::event::Event;
use super::token::TokenForm;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("{arg} in event {event} has entity_idx {entity_idx} out of range ({num_entities} entities)")]
    EntityIdxOutOfRange {
        arg: String,
        event: String,
        entity_idx: usize,
        num_entities: usize,
    },
    #[error("{arg} in event {event} has mention_idx {mention_idx} out of range ({num_mentions} mentions)")]
    MentionIdxOutOfRange {
        arg: String,
        event: String,
        mention_idx: usize,
        num_mentions: usize,
    },
}

/// Frequency table keyed by token representation.
pub type Counter = FxHashMap<String, usize>;

const ENTITIES_HEADER: &str = "Entities:";
const EVENTS_HEADER: &str = "Events:";
const DOC_SEPARATOR: &str = "\n###DOC###\n\n";

/// Categories reported by [`Script::get_vocab_count`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VocabCategory {
    Predicate,
    Preposition,
    Argument,
    NameEntity,
    NameEntityTag,
}

impl VocabCategory {
    pub const ALL: [VocabCategory; 5] = [
        VocabCategory::Predicate,
        VocabCategory::Preposition,
        VocabCategory::Argument,
        VocabCategory::NameEntity,
        VocabCategory::NameEntityTag,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Predicate => "predicate",
            Self::Preposition => "preposition",
            Self::Argument => "argument",
            Self::NameEntity => "name_entity",
            Self::NameEntityTag => "name_entity_tag",
        }
    }
}

/// One document: its coreference chains and its events.
///
/// Element types are fixed by the signature, so a script can never hold
/// anything but entities and events:
///
/// ```compile_fail
/// use script_pairs::schema::script::Script;
/// use script_pairs::schema::event::Event;
///
/// let events: Vec<Event> = Vec::new();
/// let _ = Script::new("doc", events.clone(), events);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    pub doc_name: String,
    pub entities: Vec<Entity>,
    pub events: Vec<Event>,
}

impl Script {
    pub fn new(doc_name: impl Into<String>, entities: Vec<Entity>, events: Vec<Event>) -> Self {
        Self {
            doc_name: doc_name.into(),
            entities,
            events,
        }
    }

    pub fn has_entities(&self) -> bool {
        !self.entities.is_empty()
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Verify that every linked argument points at an existing entity and
    /// mention. Not run on construction; call it before expensive
    /// downstream work.
    pub fn check_entity_idx_range(&self) -> Result<(), ScriptError> {
        for event in &self.events {
            for arg in event.all_args() {
                let Some((entity_idx, mention_idx)) = arg.entity_ref() else {
                    continue;
                };
                let entity = self.entities.get(entity_idx).ok_or_else(|| {
                    ScriptError::EntityIdxOutOfRange {
                        arg: arg.to_text(),
                        event: event.to_text(),
                        entity_idx,
                        num_entities: self.entities.len(),
                    }
                })?;
                if mention_idx >= entity.num_mentions() {
                    return Err(ScriptError::MentionIdxOutOfRange {
                        arg: arg.to_text(),
                        event: event.to_text(),
                        mention_idx,
                        num_mentions: entity.num_mentions(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Counts of every literal argument and every mention token.
    pub fn get_token_count(&self, use_lemma: bool) -> Counter {
        let form = TokenForm::new(use_lemma);
        let mut counts = Counter::default();
        for event in &self.events {
            for arg in event.all_args().filter(|arg| !arg.is_linked()) {
                *counts.entry(arg.representation(form)).or_default() += 1;
            }
        }
        for entity in &self.entities {
            for mention in &entity.mentions {
                for token in &mention.tokens {
                    *counts.entry(token.string_form(form)).or_default() += 1;
                }
            }
        }
        counts
    }

    /// Per-category vocabulary counts. Linked arguments count as the head
    /// of their entity's representative mention.
    ///
    /// Fails with [`ScriptError::EntityIdxOutOfRange`] on a dangling entity
    /// reference.
    pub fn get_vocab_count(
        &self,
        use_lemma: bool,
    ) -> Result<BTreeMap<VocabCategory, Counter>, ScriptError> {
        let form = TokenForm::new(use_lemma);
        let mut vocab: BTreeMap<VocabCategory, Counter> = BTreeMap::new();
        let mut bump = |category: VocabCategory, key: &str| {
            *vocab
                .entry(category)
                .or_default()
                .entry(key.to_string())
                .or_default() += 1;
        };

        for event in &self.events {
            bump(
                VocabCategory::Predicate,
                &event.pred.full_representation(use_lemma),
            );
            for (prep, _) in &event.pobj_list {
                if !prep.is_empty() {
                    bump(VocabCategory::Preposition, prep);
                }
            }
        }

        for event in &self.events {
            for arg in event.all_args() {
                let (repr, ner) = match arg.entity_ref() {
                    Some((entity_idx, _)) => {
                        let entity = self.entities.get(entity_idx).ok_or_else(|| {
                            ScriptError::EntityIdxOutOfRange {
                                arg: arg.to_text(),
                                event: event.to_text(),
                                entity_idx,
                                num_entities: self.entities.len(),
                            }
                        })?;
                        let mention = entity.rep_mention();
                        (mention.head_token().string_form(form), mention.ner.as_str())
                    }
                    None => (arg.representation(form), arg.ner()),
                };
                bump(VocabCategory::Argument, &repr);
                if !ner.is_empty() {
                    bump(VocabCategory::NameEntity, &repr);
                    bump(VocabCategory::NameEntityTag, ner);
                }
            }
        }
        Ok(vocab)
    }

    pub fn to_text(&self) -> String {
        let entities: Vec<String> = self
            .entities
            .iter()
            .enumerate()
            .map(|(idx, entity)| format!("entity-{:03}\t{}", idx, entity.to_text()))
            .collect();
        let events: Vec<String> = self
            .events
            .iter()
            .enumerate()
            .map(|(idx, event)| format!("event-{:04}\t{}", idx, event.to_text()))
            .collect();
        format!(
            "{}\n\n{}\n{}\n\n{}\n{}\n",
            self.doc_name,
            ENTITIES_HEADER,
            entities.join("\n"),
            EVENTS_HEADER,
            events.join("\n")
        )
    }

    /// Parse the output of [`Script::to_text`].
    ///
    /// A text holding only a document name is an upstream extraction
    /// failure and yields an empty script rather than an error.
    pub fn from_text(text: &str) -> Result<Script, ScriptError> {
        if text.lines().count() <= 1 {
            return Ok(Script::new(text.trim(), Vec::new(), Vec::new()));
        }

        let mut sections: [Vec<&str>; 3] = Default::default();
        let mut current = 0;
        for line in text.lines().map(str::trim) {
            match line {
                ENTITIES_HEADER if current == 0 => current = 1,
                EVENTS_HEADER if current == 1 => current = 2,
                _ => sections[current].push(line),
            }
        }
        if current != 2 {
            return Err(ScriptError::Parse(format!(
                "missing {} or {} section",
                ENTITIES_HEADER, EVENTS_HEADER
            )));
        }

        let doc_name = sections[0]
            .first()
            .map(|line| line.to_string())
            .unwrap_or_default();
        let entities = labeled_lines(&sections[1])?
            .map(Entity::from_text)
            .collect::<Result<Vec<_>, _>>()?;
        let events = labeled_lines(&sections[2])?
            .map(Event::from_text)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Script::new(doc_name, entities, events))
    }
}

/// Strip the `entity-000\t` / `event-0000\t` labels from non-empty lines.
fn labeled_lines<'a>(
    lines: &[&'a str],
) -> Result<impl Iterator<Item = &'a str>, ScriptError> {
    let stripped = lines
        .iter()
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.split_once('\t')
                .map(|(_, rest)| rest)
                .ok_or_else(|| ScriptError::Parse(format!("unlabeled line: {:?}", line)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(stripped.into_iter())
}

/// Scripts sharing one serialization stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptCorpus {
    pub scripts: Vec<Script>,
}

impl ScriptCorpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_scripts(&self) -> usize {
        self.scripts.len()
    }

    pub fn add_script(&mut self, script: Script) {
        self.scripts.push(script);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Script> {
        self.scripts.iter()
    }

    pub fn to_text(&self) -> String {
        let texts: Vec<String> = self.scripts.iter().map(Script::to_text).collect();
        texts.join(DOC_SEPARATOR)
    }

    pub fn from_text(text: &str) -> Result<ScriptCorpus, ScriptError> {
        let scripts = text
            .split(DOC_SEPARATOR)
            .map(Script::from_text)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ScriptCorpus { scripts })
    }
}

impl<'a> IntoIterator for &'a ScriptCorpus {
    type Item = &'a Script;
    type IntoIter = std::slice::Iter<'a, Script>;

    fn into_iter(self) -> Self::IntoIter {
        self.scripts.iter()
    }
}
