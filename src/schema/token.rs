use super::script::ScriptError;

/// How a token is turned into a vocabulary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenForm {
    /// Use the lemma instead of the surface word.
    pub use_lemma: bool,
    /// Replace the form with the named-entity tag when one is present.
    pub use_ner: bool,
}

impl TokenForm {
    pub fn word() -> Self {
        Self {
            use_lemma: false,
            use_ner: false,
        }
    }

    pub fn lemma() -> Self {
        Self {
            use_lemma: true,
            use_ner: false,
        }
    }

    pub fn new(use_lemma: bool) -> Self {
        Self {
            use_lemma,
            use_ner: false,
        }
    }

    pub fn with_ner(mut self, use_ner: bool) -> Self {
        self.use_ner = use_ner;
        self
    }
}

/// A single word occurrence inside a sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub word: String,
    pub lemma: String,
    pub pos: String,
    /// Named-entity tag, empty when the token is not part of a named entity.
    pub ner: String,
    /// Position of the token within its sentence.
    pub token_idx: usize,
}

impl Token {
    pub fn new(
        word: impl Into<String>,
        lemma: impl Into<String>,
        pos: impl Into<String>,
        token_idx: usize,
    ) -> Self {
        Self {
            word: word.into(),
            lemma: lemma.into(),
            pos: pos.into(),
            ner: String::new(),
            token_idx,
        }
    }

    pub fn with_ner(mut self, ner: impl Into<String>) -> Self {
        self.ner = ner.into();
        self
    }

    pub fn is_noun(&self) -> bool {
        self.pos.starts_with("NN")
    }

    pub fn is_verb(&self) -> bool {
        self.pos.starts_with("VB")
    }

    /// Lowercased word or lemma, or the NER tag when `use_ner` is set and
    /// the token carries one.
    pub fn string_form(&self, form: TokenForm) -> String {
        if form.use_ner && !self.ner.is_empty() {
            return self.ner.clone();
        }
        if form.use_lemma {
            self.lemma.to_lowercase()
        } else {
            self.word.to_lowercase()
        }
    }

    /// String form with preceding compound modifiers folded in, e.g.
    /// `new_york` for the head `york`. A named-entity tag still wins.
    pub fn compound_form(&self, compounds: &[&Token], form: TokenForm) -> String {
        if (form.use_ner && !self.ner.is_empty()) || compounds.is_empty() {
            return self.string_form(form);
        }
        let plain = form.with_ner(false);
        let mut parts: Vec<String> = compounds.iter().map(|t| t.string_form(plain)).collect();
        parts.push(self.string_form(plain));
        parts.join("_")
    }

    /// `word/lemma/pos/ner`. A `/` or `\` inside a field is escaped with a
    /// backslash.
    pub fn to_text(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            escape_field(&self.word),
            escape_field(&self.lemma),
            escape_field(&self.pos),
            escape_field(&self.ner)
        )
    }

    /// Parse the output of [`Token::to_text`].
    pub fn from_text(text: &str, token_idx: usize) -> Result<Token, ScriptError> {
        let malformed = || ScriptError::Parse(format!("malformed token: {:?}", text));
        let fields = split_fields(text).ok_or_else(malformed)?;
        let [word, lemma, pos, ner]: [String; 4] =
            fields.try_into().map_err(|_| malformed())?;
        if word.is_empty() {
            return Err(malformed());
        }
        Ok(Token {
            word,
            lemma,
            pos,
            ner,
            token_idx,
        })
    }
}

fn escape_field(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        if c == '/' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Split on unescaped `/`, unescaping each field. `None` on a dangling
/// backslash.
fn split_fields(text: &str) -> Option<Vec<String>> {
    let mut fields = vec![String::new()];
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => fields.last_mut()?.push(chars.next()?),
            '/' => fields.push(String::new()),
            _ => fields.last_mut()?.push(c),
        }
    }
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_forms() {
        let token = Token::new("Bought", "buy", "VBD", 2);
        assert_eq!(token.string_form(TokenForm::word()), "bought");
        assert_eq!(token.string_form(TokenForm::lemma()), "buy");
    }

    #[test]
    fn ner_replaces_form_only_when_tagged() {
        let john = Token::new("John", "John", "NNP", 0).with_ner("PERSON");
        let house = Token::new("house", "house", "NN", 3);
        let form = TokenForm::lemma().with_ner(true);
        assert_eq!(john.string_form(form), "PERSON");
        assert_eq!(house.string_form(form), "house");
    }

    #[test]
    fn compound_form_joins_modifiers() {
        let new = Token::new("New", "New", "NNP", 4);
        let york = Token::new("York", "York", "NNP", 5);
        assert_eq!(york.compound_form(&[&new], TokenForm::word()), "new_york");
        assert_eq!(york.compound_form(&[], TokenForm::word()), "york");
    }

    #[test]
    fn parse_token_with_slash_in_word() {
        let token = Token::from_text("1\\/2/1\\/2/CD/", 7).unwrap();
        assert_eq!(token.word, "1/2");
        assert_eq!(token.lemma, "1/2");
        assert_eq!(token.pos, "CD");
        assert_eq!(token.ner, "");
        assert_eq!(token.token_idx, 7);
    }

    #[test]
    fn slash_and_backslash_round_trip() {
        let token = Token::new("and/or", "and/or", "CC", 3);
        assert_eq!(token.to_text(), "and\\/or/and\\/or/CC/");
        assert_eq!(Token::from_text(&token.to_text(), 3).unwrap(), token);

        let token = Token::new("a\\b/", "a\\b/", ":", 0);
        assert_eq!(Token::from_text(&token.to_text(), 0).unwrap(), token);
    }

    #[test]
    fn unescaped_extra_slash_is_rejected() {
        assert!(Token::from_text("1/2/1/2/CD/", 0).is_err());
        assert!(Token::from_text("run/run/VB/\\", 0).is_err());
    }

    #[test]
    fn parse_token_round_trip() {
        let token = Token::new("Mary", "Mary", "NNP", 1).with_ner("PERSON");
        assert_eq!(Token::from_text(&token.to_text(), 1).unwrap(), token);
    }

    #[test]
    fn parse_token_missing_fields() {
        assert!(Token::from_text("ran/run", 0).is_err());
        assert!(Token::from_text("/run/VBD/", 0).is_err());
    }
}
