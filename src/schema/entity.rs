use super::mention::Mention;
use super::script::ScriptError;

const MENTION_SEPARATOR: &str = " :: ";

/// A coreference chain: every mention of one referent in a document.
///
/// Mention positions are stable; events refer to mentions by
/// `(entity_idx, mention_idx)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub mentions: Vec<Mention>,
    rep_idx: usize,
}

impl Entity {
    /// Build an entity from its mentions, renumbering `mention_idx`.
    ///
    /// The representative mention is the first one flagged `rep`, or the
    /// first mention if none is flagged.
    pub fn new(mut mentions: Vec<Mention>) -> Result<Entity, ScriptError> {
        if mentions.is_empty() {
            return Err(ScriptError::Parse(
                "an entity needs at least one mention".to_string(),
            ));
        }
        for (idx, mention) in mentions.iter_mut().enumerate() {
            mention.mention_idx = idx;
        }
        let rep_idx = mentions.iter().position(|m| m.rep).unwrap_or(0);
        Ok(Entity { mentions, rep_idx })
    }

    pub fn rep_mention(&self) -> &Mention {
        &self.mentions[self.rep_idx]
    }

    pub fn num_mentions(&self) -> usize {
        self.mentions.len()
    }

    pub fn to_text(&self) -> String {
        let mentions: Vec<String> = self.mentions.iter().map(Mention::to_text).collect();
        mentions.join(MENTION_SEPARATOR)
    }

    pub fn from_text(text: &str) -> Result<Entity, ScriptError> {
        let mentions = text
            .split(MENTION_SEPARATOR)
            .map(|m| Mention::from_text(m.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        Entity::new(mentions)
    }
}
