use super::mention::parse_index;
use super::script::ScriptError;
use super::token::{Token, TokenForm};

/// A filler of an event slot.
///
/// Either a reference into the script's entity list, or a literal token
/// that belongs to no coreference chain (written with `-1:-1` indices).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    Linked {
        entity_idx: usize,
        mention_idx: usize,
        token: Token,
    },
    Literal {
        token: Token,
    },
}

impl Argument {
    pub fn linked(entity_idx: usize, mention_idx: usize, token: Token) -> Self {
        Self::Linked {
            entity_idx,
            mention_idx,
            token,
        }
    }

    pub fn literal(token: Token) -> Self {
        Self::Literal { token }
    }

    pub fn token(&self) -> &Token {
        match self {
            Self::Linked { token, .. } | Self::Literal { token } => token,
        }
    }

    /// `(entity_idx, mention_idx)` for linked arguments.
    pub fn entity_ref(&self) -> Option<(usize, usize)> {
        match self {
            Self::Linked {
                entity_idx,
                mention_idx,
                ..
            } => Some((*entity_idx, *mention_idx)),
            Self::Literal { .. } => None,
        }
    }

    pub fn is_linked(&self) -> bool {
        matches!(self, Self::Linked { .. })
    }

    pub fn ner(&self) -> &str {
        &self.token().ner
    }

    pub fn representation(&self, form: TokenForm) -> String {
        self.token().string_form(form)
    }

    /// `entity_idx:mention_idx:token_idx:token`
    pub fn to_text(&self) -> String {
        match self {
            Self::Linked {
                entity_idx,
                mention_idx,
                token,
            } => format!(
                "{}:{}:{}:{}",
                entity_idx,
                mention_idx,
                token.token_idx,
                token.to_text()
            ),
            Self::Literal { token } => format!("-1:-1:{}:{}", token.token_idx, token.to_text()),
        }
    }

    pub fn from_text(text: &str) -> Result<Argument, ScriptError> {
        let fields: Vec<&str> = text.splitn(4, ':').collect();
        if fields.len() != 4 {
            return Err(ScriptError::Parse(format!("malformed argument: {:?}", text)));
        }
        let token_idx = parse_index(fields[2], text)?;
        let token = Token::from_text(fields[3], token_idx)?;
        match (fields[0], fields[1]) {
            ("-1", "-1") => Ok(Self::literal(token)),
            (entity, mention) => Ok(Self::linked(
                parse_index(entity, text)?,
                parse_index(mention, text)?,
                token,
            )),
        }
    }
}
