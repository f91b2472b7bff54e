use super::script::ScriptError;
use super::token::{Token, TokenForm};

/// A contiguous span of tokens referring to one entity in one sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub sent_idx: usize,
    /// Start of the token span (inclusive).
    pub start_token_idx: usize,
    /// End of the token span (exclusive).
    pub end_token_idx: usize,
    /// Sentence-level index of the head token; always inside the span.
    pub head_token_idx: usize,
    /// Whether this is the representative mention of its entity.
    pub rep: bool,
    pub ner: String,
    pub tokens: Vec<Token>,
    /// Position within the owning entity's mention list.
    pub mention_idx: usize,
}

impl Mention {
    pub fn new(
        sent_idx: usize,
        start_token_idx: usize,
        end_token_idx: usize,
        head_token_idx: usize,
        rep: bool,
        ner: impl Into<String>,
        tokens: Vec<Token>,
    ) -> Result<Mention, ScriptError> {
        if start_token_idx >= end_token_idx {
            return Err(ScriptError::Parse(format!(
                "empty mention span {}..{}",
                start_token_idx, end_token_idx
            )));
        }
        if tokens.len() != end_token_idx - start_token_idx {
            return Err(ScriptError::Parse(format!(
                "mention span {}..{} has {} tokens",
                start_token_idx,
                end_token_idx,
                tokens.len()
            )));
        }
        if !(start_token_idx..end_token_idx).contains(&head_token_idx) {
            return Err(ScriptError::Parse(format!(
                "head token {} outside mention span {}..{}",
                head_token_idx, start_token_idx, end_token_idx
            )));
        }
        Ok(Mention {
            sent_idx,
            start_token_idx,
            end_token_idx,
            head_token_idx,
            rep,
            ner: ner.into(),
            tokens,
            mention_idx: 0,
        })
    }

    pub fn head_token(&self) -> &Token {
        &self.tokens[self.head_token_idx - self.start_token_idx]
    }

    /// Nouns directly preceding the head inside the span (`New` in `New York`).
    pub fn head_compounds(&self) -> Vec<&Token> {
        let head_pos = self.head_token_idx - self.start_token_idx;
        let first = self.tokens[..head_pos]
            .iter()
            .rposition(|t| !t.is_noun())
            .map_or(0, |i| i + 1);
        self.tokens[first..head_pos].iter().collect()
    }

    /// Representation of the head token, optionally with compounds folded in.
    pub fn head_string_form(&self, form: TokenForm, include_compounds: bool) -> String {
        if include_compounds {
            self.head_token()
                .compound_form(&self.head_compounds(), form)
        } else {
            self.head_token().string_form(form)
        }
    }

    pub fn to_text(&self) -> String {
        let tokens: Vec<String> = self.tokens.iter().map(Token::to_text).collect();
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.sent_idx,
            self.start_token_idx,
            self.end_token_idx,
            self.head_token_idx,
            if self.rep { 1 } else { 0 },
            self.ner,
            tokens.join(" ")
        )
    }

    /// Parse `sent:start:end:head:rep:ner:tok tok ...`.
    pub fn from_text(text: &str) -> Result<Mention, ScriptError> {
        let fields: Vec<&str> = text.splitn(7, ':').collect();
        if fields.len() != 7 {
            return Err(ScriptError::Parse(format!("malformed mention: {:?}", text)));
        }
        let sent_idx = parse_index(fields[0], text)?;
        let start = parse_index(fields[1], text)?;
        let end = parse_index(fields[2], text)?;
        let head = parse_index(fields[3], text)?;
        let rep = match fields[4] {
            "1" => true,
            "0" => false,
            other => {
                return Err(ScriptError::Parse(format!(
                    "bad rep flag {:?} in mention {:?}",
                    other, text
                )))
            }
        };
        let tokens = fields[6]
            .split_whitespace()
            .enumerate()
            .map(|(i, tok)| Token::from_text(tok, start + i))
            .collect::<Result<Vec<_>, _>>()?;
        Mention::new(sent_idx, start, end, head, rep, fields[5], tokens)
    }
}

pub(crate) fn parse_index(field: &str, context: &str) -> Result<usize, ScriptError> {
    field
        .parse()
        .map_err(|_| ScriptError::Parse(format!("bad index {:?} in {:?}", field, context)))
}
