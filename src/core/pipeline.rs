/// The pair pipeline: ScriptCorpus → pair instance stream.
///
/// Wires together entity-index validation, rich script building,
/// embedding indexing, subsampling, and pair generation.
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::config::{ConfigError, PairConfig};
use crate::core::embedding::{Embedding, EmbeddingError};
use crate::core::pair::{PairInstance, PairType};
use crate::core::rich_script::{RichScript, Subsampler};
use crate::core::vocab::{default_prep_vocab, read_counter, read_vocab_list, VocabError};
use crate::schema::{Counter, Script, ScriptCorpus, ScriptError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("script error: {0}")]
    Script(#[from] ScriptError),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0} is not valid UTF-8")]
    Encoding(PathBuf),
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub documents: usize,
    /// Documents without events; they never produce instances.
    pub empty_documents: usize,
    pub events: usize,
    pub subsampled_events: usize,
    pub instances: BTreeMap<PairType, usize>,
}

impl PipelineStats {
    pub fn total_instances(&self) -> usize {
        self.instances.values().sum()
    }

    pub fn log_summary(&self) {
        log::info!(
            "{} documents ({} empty), {} events ({} subsampled), {} instances",
            self.documents,
            self.empty_documents,
            self.events,
            self.subsampled_events,
            self.total_instances()
        );
        for (pair_type, count) in &self.instances {
            log::info!("  {}: {}", pair_type, count);
        }
    }
}

/// Pair generation over a whole corpus. Built via `PairPipeline::builder()`.
///
/// One random generator is seeded from the config and shared across every
/// document of the run, so output depends on document order.
pub struct PairPipeline<'a> {
    model: &'a dyn Embedding,
    config: PairConfig,
    prep_vocab: FxHashSet<String>,
    subsampler: Option<Subsampler>,
    rng: StdRng,
    stats: PipelineStats,
}

/// Builder for constructing a `PairPipeline`.
pub struct PairPipelineBuilder {
    config: PairConfig,
    prep_vocab_path: Option<PathBuf>,
    pred_count_path: Option<PathBuf>,
    /// Directly provided allow-list (for testing without files).
    prep_vocab: Option<FxHashSet<String>>,
    /// Directly provided predicate counts (for testing without files).
    pred_counts: Option<Counter>,
}

impl<'a> PairPipeline<'a> {
    pub fn builder() -> PairPipelineBuilder {
        PairPipelineBuilder {
            config: PairConfig::default(),
            prep_vocab_path: None,
            pred_count_path: None,
            prep_vocab: None,
            pred_counts: None,
        }
    }

    pub fn config(&self) -> &PairConfig {
        &self.config
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Pair instances for one script.
    pub fn process_script(&mut self, script: &Script) -> Result<Vec<PairInstance>, PipelineError> {
        self.stats.documents += 1;
        if !script.has_events() {
            self.stats.empty_documents += 1;
            log::debug!("skipping {}: no events", script.doc_name);
            return Ok(Vec::new());
        }

        // 1. Validate cross references
        if self.config.check_entity_idx {
            script.check_entity_idx_range()?;
        }

        // 2. Resolve keys, then indices and vectors
        let mut rich = RichScript::build(script, &self.prep_vocab, &self.config)?;
        rich.index(
            self.model,
            &self.config,
            self.subsampler.as_ref(),
            &mut self.rng,
        );
        self.stats.events += rich.events.len();
        self.stats.subsampled_events += rich.events.iter().filter(|e| e.subsampled).count();

        // 3. Sample pairs
        let instances = rich.get_pair_input_list(self.model, &self.config, &mut self.rng);
        if instances.is_empty() {
            log::debug!("{}: no pair instances", script.doc_name);
        }
        for instance in &instances {
            *self.stats.instances.entry(instance.pair_type).or_default() += 1;
        }
        Ok(instances)
    }

    /// Write one line per instance. A document adds lines only when it
    /// yields instances. Returns the number of lines written.
    pub fn write_corpus<W: Write>(
        &mut self,
        corpus: &ScriptCorpus,
        writer: &mut W,
    ) -> Result<usize, PipelineError> {
        let mut written = 0;
        for script in corpus {
            let instances = self.process_script(script)?;
            if instances.is_empty() {
                continue;
            }
            let mut block = String::new();
            for instance in &instances {
                block.push_str(&instance.to_string());
                block.push('\n');
            }
            writer.write_all(block.as_bytes())?;
            written += instances.len();
        }
        Ok(written)
    }

    /// Read a corpus file and write its instances.
    pub fn write_file<W: Write>(&mut self, path: &Path, writer: &mut W) -> Result<usize, PipelineError> {
        let corpus = read_corpus(path)?;
        let written = self.write_corpus(&corpus, writer)?;
        log::info!(
            "{}: {} scripts, {} instances",
            path.display(),
            corpus.num_scripts(),
            written
        );
        Ok(written)
    }
}

impl PairPipelineBuilder {
    pub fn config(mut self, config: PairConfig) -> Self {
        self.config = config;
        self
    }

    /// Preposition allow-list file; the built-in list is used otherwise.
    pub fn prep_vocab_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.prep_vocab_path = Some(path.into());
        self
    }

    /// Predicate counter file, required when subsampling.
    pub fn pred_count_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pred_count_path = Some(path.into());
        self
    }

    /// Provide the allow-list directly (for testing without files).
    pub fn with_prep_vocab(mut self, prep_vocab: FxHashSet<String>) -> Self {
        self.prep_vocab = Some(prep_vocab);
        self
    }

    /// Provide predicate counts directly (for testing without files).
    pub fn with_pred_counts(mut self, pred_counts: Counter) -> Self {
        self.pred_counts = Some(pred_counts);
        self
    }

    pub fn build(self, model: &dyn Embedding) -> Result<PairPipeline<'_>, PipelineError> {
        self.config.validate()?;

        let prep_vocab = match (self.prep_vocab, &self.prep_vocab_path) {
            (Some(prep_vocab), _) => prep_vocab,
            (None, Some(path)) => read_vocab_list(path)?,
            (None, None) => default_prep_vocab(),
        };

        let pred_counts = match (self.pred_counts, &self.pred_count_path) {
            (Some(counts), _) => Some(counts),
            (None, Some(path)) => Some(read_counter(path)?),
            (None, None) => None,
        };

        let subsampler = if self.config.subsampling {
            let counts = pred_counts.ok_or_else(|| {
                ConfigError::Invalid("subsampling requires predicate counts".to_string())
            })?;
            log::info!(
                "subsampling {} predicates with threshold {}",
                counts.len(),
                self.config.subsample_threshold
            );
            Some(Subsampler::new(counts, self.config.subsample_threshold))
        } else {
            None
        };

        let rng = StdRng::seed_from_u64(self.config.seed);
        Ok(PairPipeline {
            model,
            config: self.config,
            prep_vocab,
            subsampler,
            rng,
            stats: PipelineStats::default(),
        })
    }
}

/// Read a script corpus, decompressing `*.zst` files.
pub fn read_corpus(path: &Path) -> Result<ScriptCorpus, PipelineError> {
    let mut reader = BufReader::new(File::open(path)?);
    let bytes = if path.extension().is_some_and(|ext| ext == "zst") {
        zstd::stream::decode_all(reader)?
    } else {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        bytes
    };
    let text = String::from_utf8(bytes).map_err(|_| PipelineError::Encoding(path.to_path_buf()))?;
    Ok(ScriptCorpus::from_text(&text)?)
}

/// Corpus files (`*.zst` or `*.txt`) directly under `dir`, sorted by name.
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_corpus = path
            .extension()
            .is_some_and(|ext| ext == "zst" || ext == "txt");
        if path.is_file() && is_corpus {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::embedding::EmbeddingModel;
    use crate::core::pair::SampleType;
    use crate::schema::{Argument, Entity, Event, Mention, Predicate, Token};

    fn person(name: &str, mentions: usize) -> Entity {
        let mentions = (0..mentions)
            .map(|sent| {
                Mention::new(sent, 0, 1, 0, sent == 0, "", vec![Token::new(name, name, "NNP", 0)])
                    .unwrap()
            })
            .collect();
        Entity::new(mentions).unwrap()
    }

    fn event(pred: &str, subj: usize) -> Event {
        Event::new(
            Predicate::new(Token::new(pred, pred, "VBD", 1), false, "").unwrap(),
            Some(Argument::linked(subj, 0, Token::new("x", "x", "NN", 0))),
            None,
            Vec::new(),
        )
        .unwrap()
    }

    fn corpus() -> ScriptCorpus {
        let mut corpus = ScriptCorpus::new();
        for doc in 0..4 {
            corpus.add_script(Script::new(
                format!("doc{}", doc),
                vec![person("john", 2), person("mary", 1), person("ann", 1)],
                vec![event("say", 0), event("walk", 0), event("say", 0), event("run", 1)],
            ));
        }
        corpus.add_script(Script::new("empty", Vec::new(), Vec::new()));
        corpus
    }

    fn model() -> EmbeddingModel {
        let mut model = EmbeddingModel::new(1);
        for key in ["say-PRED", "walk-PRED", "run-PRED", "john-SUBJ", "mary-SUBJ", "ann-SUBJ", "UNK"] {
            model.insert(key, &[1.0]).unwrap();
        }
        model
    }

    fn pred_counts() -> Counter {
        let mut counts = Counter::default();
        counts.insert("say".to_string(), 50);
        counts.insert("walk".to_string(), 1);
        counts.insert("run".to_string(), 1);
        counts
    }

    fn run(config: PairConfig) -> (String, PipelineStats) {
        let model = model();
        let mut pipeline = PairPipeline::builder()
            .config(config)
            .with_pred_counts(pred_counts())
            .build(&model)
            .unwrap();
        let mut out = Vec::new();
        pipeline.write_corpus(&corpus(), &mut out).unwrap();
        (String::from_utf8(out).unwrap(), pipeline.stats().clone())
    }

    #[test]
    fn output_lines_match_stats() {
        let (output, stats) = run(PairConfig::default());
        assert_eq!(stats.documents, 5);
        assert_eq!(stats.empty_documents, 1);
        assert_eq!(stats.events, 16);
        // Three john events per document, one positive and one negative each.
        assert_eq!(stats.total_instances(), 4 * 3 * 2);
        assert_eq!(output.lines().count(), stats.total_instances());
        assert!(output.lines().all(|line| line.split('\t').count() == 5));
    }

    #[test]
    fn subsampling_is_deterministic() {
        let config = PairConfig {
            subsampling: true,
            subsample_threshold: 0.05,
            seed: 11,
            left_sample_type: SampleType::One,
            ..PairConfig::default()
        };
        let (first, first_stats) = run(config.clone());
        let (second, second_stats) = run(config);
        assert_eq!(first, second);
        assert_eq!(first_stats, second_stats);
        assert!(first_stats.subsampled_events > 0);
        assert!(first_stats.total_instances() < 4 * 3 * 2);
    }

    #[test]
    fn subsampling_needs_counts() {
        let model = model();
        let config = PairConfig {
            subsampling: true,
            ..PairConfig::default()
        };
        let result = PairPipeline::builder().config(config).build(&model);
        assert!(matches!(result, Err(PipelineError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn dangling_entity_aborts() {
        let model = model();
        let config = PairConfig {
            check_entity_idx: true,
            ..PairConfig::default()
        };
        let mut pipeline = PairPipeline::builder().config(config).build(&model).unwrap();
        let script = Script::new("bad", vec![person("john", 2)], vec![event("walk", 4)]);
        assert!(matches!(
            pipeline.process_script(&script),
            Err(PipelineError::Script(ScriptError::EntityIdxOutOfRange { .. }))
        ));
    }

    #[test]
    fn read_plain_and_compressed_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let text = corpus().to_text();
        std::fs::write(dir.path().join("b.txt"), &text).unwrap();
        let compressed = zstd::stream::encode_all(text.as_bytes(), 0).unwrap();
        std::fs::write(dir.path().join("a.zst"), compressed).unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let files = corpus_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.zst", "b.txt"]);

        for file in &files {
            assert_eq!(read_corpus(file).unwrap().num_scripts(), 5);
        }
    }
}
