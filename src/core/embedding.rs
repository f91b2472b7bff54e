/// Word-embedding lookup: the read-only key/vector store that scripts are
/// resolved against, with word2vec loaders.
use rustc_hash::FxHashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

use crate::schema::{Entity, Mention, Token, TokenForm};

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed embedding file: {0}")]
    Format(String),
    #[error("vector for {word:?} has dimension {found}, expected {expected}")]
    Dimension {
        word: String,
        expected: usize,
        found: usize,
    },
}

/// Key of the reserved unknown-word entry.
pub const UNK: &str = "UNK";

const PREP_SUFFIX: &str = "-PREP";
const TYPED_PREP_PREFIX: &str = "-PREP_";

/// `suffix`, then the bare `-PREP` when `suffix` names a specific
/// preposition.
pub fn with_backoff(suffix: &str) -> impl Iterator<Item = &str> {
    let generic = suffix
        .starts_with(TYPED_PREP_PREFIX)
        .then_some(PREP_SUFFIX);
    std::iter::once(suffix).chain(generic)
}

/// Which parts of an entity contribute to its embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityEmbedding {
    /// Only the head token of each mention.
    pub head_only: bool,
    /// Only the representative mention.
    pub rep_only: bool,
    pub use_ner: bool,
    /// Mention left out of the sum (ignored when `rep_only`).
    pub exclude_mention_idx: Option<usize>,
}

impl Default for EntityEmbedding {
    fn default() -> Self {
        Self {
            head_only: true,
            rep_only: true,
            use_ner: false,
            exclude_mention_idx: None,
        }
    }
}

/// A loaded embedding table. Misses are `None`, never errors.
pub trait Embedding {
    fn dimension(&self) -> usize;

    fn lookup(&self, key: &str) -> Option<&[f32]>;

    fn index_of(&self, key: &str) -> Option<usize>;

    fn unk_index(&self) -> Option<usize> {
        self.index_of(UNK)
    }

    fn zeros(&self) -> Vec<f32> {
        vec![0.0; self.dimension()]
    }

    /// Look up `key + suffix`, backing off from `-PREP_<p>` to `-PREP`.
    fn lookup_with_suffix(&self, key: &str, suffix: &str) -> Option<&[f32]> {
        with_backoff(suffix).find_map(|s| self.lookup(&format!("{}{}", key, s)))
    }

    /// Word form first, then lemma form.
    fn get_token_embedding(
        &self,
        token: &Token,
        compounds: &[&Token],
        use_ner: bool,
        suffix: &str,
    ) -> Option<&[f32]> {
        [false, true].into_iter().find_map(|use_lemma| {
            let form = TokenForm::new(use_lemma).with_ner(use_ner);
            self.lookup_with_suffix(&token.compound_form(compounds, form), suffix)
        })
    }

    /// Sum of token embeddings; missing tokens contribute nothing.
    fn get_mention_embedding(
        &self,
        mention: &Mention,
        use_ner: bool,
        suffix: &str,
        head_only: bool,
    ) -> Vec<f32> {
        let mut embedding = self.zeros();
        let tokens: Vec<&Token> = if head_only {
            vec![mention.head_token()]
        } else {
            mention.tokens.iter().collect()
        };
        for token in tokens {
            if let Some(vector) = self.get_token_embedding(token, &[], use_ner, suffix) {
                add_assign(&mut embedding, vector);
            }
        }
        embedding
    }

    /// Sum (not average) of mention embeddings. Compounds are never folded
    /// in here.
    fn get_entity_embedding(
        &self,
        entity: &Entity,
        suffix: &str,
        opts: EntityEmbedding,
    ) -> Vec<f32> {
        if opts.rep_only {
            return self.get_mention_embedding(
                entity.rep_mention(),
                opts.use_ner,
                suffix,
                opts.head_only,
            );
        }
        let mut embedding = self.zeros();
        for mention in &entity.mentions {
            if Some(mention.mention_idx) == opts.exclude_mention_idx {
                continue;
            }
            let vector = self.get_mention_embedding(mention, opts.use_ner, suffix, opts.head_only);
            add_assign(&mut embedding, &vector);
        }
        embedding
    }
}

fn add_assign(acc: &mut [f32], other: &[f32]) {
    for (a, b) in acc.iter_mut().zip(other) {
        *a += *b;
    }
}

/// In-memory embedding table with row-major vector storage.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingModel {
    dimension: usize,
    words: Vec<String>,
    index: FxHashMap<String, usize>,
    vectors: Vec<f32>,
}

impl EmbeddingModel {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Add or replace a vector, returning its index.
    pub fn insert(&mut self, word: impl Into<String>, vector: &[f32]) -> Result<usize, EmbeddingError> {
        let word = word.into();
        if vector.len() != self.dimension {
            return Err(EmbeddingError::Dimension {
                word,
                expected: self.dimension,
                found: vector.len(),
            });
        }
        if let Some(&idx) = self.index.get(&word) {
            let start = idx * self.dimension;
            self.vectors[start..start + self.dimension].copy_from_slice(vector);
            return Ok(idx);
        }
        let idx = self.words.len();
        self.index.insert(word.clone(), idx);
        self.words.push(word);
        self.vectors.extend_from_slice(vector);
        Ok(idx)
    }

    /// Parse the word2vec text format: a `count dimension` header, then one
    /// `word v1 v2 ...` line per vector.
    pub fn from_word2vec_text(text: &str) -> Result<EmbeddingModel, EmbeddingError> {
        let mut lines = text.lines();
        let (count, dimension) = parse_header(lines.next().unwrap_or_default())?;
        let mut model = EmbeddingModel::new(dimension);
        for line in lines.filter(|l| !l.trim().is_empty()) {
            let mut fields = line.split_whitespace();
            let word = fields
                .next()
                .ok_or_else(|| EmbeddingError::Format(format!("empty vector line: {:?}", line)))?;
            let vector = fields
                .map(|f| {
                    f.parse::<f32>().map_err(|_| {
                        EmbeddingError::Format(format!("bad component {:?} for {:?}", f, word))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            model.insert(word, &vector)?;
        }
        if model.len() != count {
            log::warn!("header announced {} vectors, read {}", count, model.len());
        }
        Ok(model)
    }

    /// Read the word2vec binary format: a text header, then for each entry
    /// the word, a space, and `dimension` little-endian f32 values.
    pub fn read_word2vec_binary<R: Read>(reader: R) -> Result<EmbeddingModel, EmbeddingError> {
        let mut reader = BufReader::new(reader);
        let mut header = String::new();
        reader.read_line(&mut header)?;
        let (count, dimension) = parse_header(&header)?;
        let vector_bytes = dimension
            .checked_mul(4)
            .ok_or_else(|| EmbeddingError::Format(format!("bad header: {:?}", header)))?;
        let mut model = EmbeddingModel::new(dimension);
        let mut word_buf = Vec::new();
        let mut vector_buf = Vec::new();
        for _ in 0..count {
            word_buf.clear();
            reader.read_until(b' ', &mut word_buf)?;
            if word_buf.last() != Some(&b' ') {
                return Err(EmbeddingError::Format(format!(
                    "truncated binary file after {} vectors",
                    model.len()
                )));
            }
            word_buf.pop();
            let word = String::from_utf8_lossy(&word_buf).trim_start().to_string();
            // Sized by the bytes actually read, not the header.
            vector_buf.clear();
            (&mut reader)
                .take(vector_bytes as u64)
                .read_to_end(&mut vector_buf)?;
            if vector_buf.len() != vector_bytes {
                return Err(EmbeddingError::Format(format!(
                    "truncated vector for {:?}",
                    word
                )));
            }
            let vector: Vec<f32> = vector_buf
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            model.insert(word, &vector)?;
        }
        Ok(model)
    }

    pub fn load_word2vec(path: &Path, binary: bool) -> Result<EmbeddingModel, EmbeddingError> {
        log::info!("loading word2vec model from {} (binary = {})", path.display(), binary);
        let model = if binary {
            Self::read_word2vec_binary(std::fs::File::open(path)?)?
        } else {
            Self::from_word2vec_text(&std::fs::read_to_string(path)?)?
        };
        log::info!("loaded {} vectors of dimension {}", model.len(), model.dimension);
        Ok(model)
    }

    /// Re-index to follow `vocab` order. Words without a vector are
    /// skipped, vectors without a vocabulary entry are dropped.
    pub fn restrict_to_vocab<S: AsRef<str>>(&self, vocab: &[S]) -> EmbeddingModel {
        let mut model = EmbeddingModel::new(self.dimension);
        for word in vocab {
            if let Some(vector) = self.lookup(word.as_ref()) {
                // Dimensions agree by construction.
                let _ = model.insert(word.as_ref(), vector);
            }
        }
        if model.len() < self.len() {
            log::info!(
                "vocabulary kept {} of {} vectors",
                model.len(),
                self.len()
            );
        }
        model
    }

    /// Load vectors and, when given, a `word count` vocabulary file that
    /// fixes the index order.
    pub fn load(
        vectors_path: &Path,
        vocab_path: Option<&Path>,
        binary: bool,
    ) -> Result<EmbeddingModel, EmbeddingError> {
        let model = Self::load_word2vec(vectors_path, binary)?;
        match vocab_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                let vocab: Vec<&str> = text
                    .lines()
                    .filter_map(|line| line.split_whitespace().next())
                    .collect();
                Ok(model.restrict_to_vocab(&vocab))
            }
            None => Ok(model),
        }
    }
}

impl Embedding for EmbeddingModel {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn lookup(&self, key: &str) -> Option<&[f32]> {
        let idx = *self.index.get(key)?;
        let start = idx * self.dimension;
        Some(&self.vectors[start..start + self.dimension])
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }
}

fn parse_header(line: &str) -> Result<(usize, usize), EmbeddingError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [count, dimension] => match (count.parse(), dimension.parse()) {
            (Ok(count), Ok(dimension)) => Ok((count, dimension)),
            _ => Err(EmbeddingError::Format(format!("bad header: {:?}", line))),
        },
        _ => Err(EmbeddingError::Format(format!("bad header: {:?}", line))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VECTORS: &str = "5 2\n\
        bought-PRED 1.0 0.0\n\
        buy-PRED 0.5 0.5\n\
        john-SUBJ 0.0 1.0\n\
        park-PREP 2.0 2.0\n\
        UNK 0.0 0.0\n";

    fn model() -> EmbeddingModel {
        EmbeddingModel::from_word2vec_text(VECTORS).unwrap()
    }

    #[test]
    fn parse_text_format() {
        let model = model();
        assert_eq!(model.len(), 5);
        assert_eq!(model.dimension(), 2);
        assert_eq!(model.lookup("john-SUBJ"), Some(&[0.0, 1.0][..]));
        assert_eq!(model.index_of("buy-PRED"), Some(1));
        assert_eq!(model.unk_index(), Some(4));
        assert_eq!(model.lookup("mary-SUBJ"), None);
    }

    #[test]
    fn bad_header_is_rejected() {
        assert!(EmbeddingModel::from_word2vec_text("two 2\n").is_err());
        assert!(EmbeddingModel::from_word2vec_text("").is_err());
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let err = EmbeddingModel::from_word2vec_text("1 3\nword 1.0 2.0\n").unwrap_err();
        assert!(matches!(err, EmbeddingError::Dimension { expected: 3, found: 2, .. }));
    }

    #[test]
    fn binary_format() {
        let mut bytes = b"2 2\n".to_vec();
        for (word, vector) in [("run", [1.0f32, 2.0]), ("walk", [3.0, 4.0])] {
            bytes.extend_from_slice(word.as_bytes());
            bytes.push(b' ');
            for x in vector {
                bytes.extend_from_slice(&x.to_le_bytes());
            }
            bytes.push(b'\n');
        }
        let model = EmbeddingModel::read_word2vec_binary(&bytes[..]).unwrap();
        assert_eq!(model.lookup("run"), Some(&[1.0, 2.0][..]));
        assert_eq!(model.lookup("walk"), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn corrupt_binary_header_is_rejected() {
        let err = EmbeddingModel::read_word2vec_binary(&b"1 4611686018427387904
run \x00"[..])
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Format(_)));

        let err = EmbeddingModel::read_word2vec_binary(&b"1 1000000
run \x00\x00"[..])
            .unwrap_err();
        assert!(matches!(err, EmbeddingError::Format(_)));
    }

    #[test]
    fn token_embedding_falls_back_to_lemma() {
        let model = model();
        let token = Token::new("buys", "buy", "VBZ", 0);
        assert_eq!(
            model.get_token_embedding(&token, &[], false, "-PRED"),
            Some(&[0.5, 0.5][..])
        );
        let bought = Token::new("bought", "buy", "VBD", 0);
        assert_eq!(
            model.get_token_embedding(&bought, &[], false, "-PRED"),
            Some(&[1.0, 0.0][..])
        );
        let unknown = Token::new("flew", "fly", "VBD", 0);
        assert_eq!(model.get_token_embedding(&unknown, &[], false, "-PRED"), None);
    }

    #[test]
    fn typed_preposition_backs_off() {
        let model = model();
        let park = Token::new("park", "park", "NN", 3);
        assert_eq!(
            model.get_token_embedding(&park, &[], false, "-PREP_in"),
            Some(&[2.0, 2.0][..])
        );
        assert_eq!(model.get_token_embedding(&park, &[], false, "-OBJ"), None);
    }

    #[test]
    fn entity_embedding_sums_mentions() {
        let model = model();
        let john = |idx: usize| {
            Mention::new(idx, 0, 1, 0, idx == 0, "", vec![Token::new("John", "John", "NNP", 0)])
                .unwrap()
        };
        let entity = Entity::new(vec![john(0), john(1), john(2)]).unwrap();
        let rep = model.get_entity_embedding(&entity, "-SUBJ", EntityEmbedding::default());
        assert_eq!(rep, vec![0.0, 1.0]);

        let all = EntityEmbedding {
            rep_only: false,
            ..EntityEmbedding::default()
        };
        assert_eq!(model.get_entity_embedding(&entity, "-SUBJ", all), vec![0.0, 3.0]);

        let excluding = EntityEmbedding {
            exclude_mention_idx: Some(1),
            ..all
        };
        assert_eq!(
            model.get_entity_embedding(&entity, "-SUBJ", excluding),
            vec![0.0, 2.0]
        );
    }

    #[test]
    fn missing_mention_tokens_give_zero_vector() {
        let model = model();
        let mention =
            Mention::new(0, 0, 1, 0, true, "", vec![Token::new("zebra", "zebra", "NN", 0)]).unwrap();
        assert_eq!(model.get_mention_embedding(&mention, false, "-OBJ", false), vec![0.0, 0.0]);
    }

    #[test]
    fn restrict_to_vocab_reorders() {
        let model = model().restrict_to_vocab(&["john-SUBJ", "missing", "UNK"]);
        assert_eq!(model.len(), 2);
        assert_eq!(model.index_of("john-SUBJ"), Some(0));
        assert_eq!(model.unk_index(), Some(1));
        assert_eq!(model.index_of("buy-PRED"), None);
    }
}
