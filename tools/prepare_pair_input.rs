/// Prepare Pair Input: turns a directory of script corpora into a
/// zstd-compressed stream of pairwise training instances.
///
/// Usage: prepare_pair_input <input_dir> <output.zst> <word2vec> <word2vec_vocab> [options]
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use script_pairs::core::config::PairConfig;
use script_pairs::core::embedding::EmbeddingModel;
use script_pairs::core::pair::{PairType, SampleType};
use script_pairs::core::pipeline::{corpus_files, PairPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate pair instances from script corpora", long_about = None)]
struct Cli {
    /// Directory of script corpus files (*.zst or *.txt)
    input_path: PathBuf,

    /// Output file (zstd compressed)
    output_path: PathBuf,

    /// Word2vec vectors
    word2vec: PathBuf,

    /// `word count` vocabulary fixing the index order
    word2vec_vocab: PathBuf,

    /// Vectors are in word2vec binary format
    #[arg(long)]
    binary: bool,

    /// RON config; the flags below override its fields
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Preposition allow-list (built-in list otherwise)
    #[arg(long, value_name = "PATH")]
    prep_vocab: Option<PathBuf>,

    /// Predicate counter, required with --subsampling
    #[arg(long, value_name = "PATH")]
    pred_count: Option<PathBuf>,

    #[arg(long, value_name = "BOOL")]
    use_lemma: Option<bool>,

    #[arg(long)]
    subsampling: bool,

    #[arg(long, value_name = "T")]
    subsample_threshold: Option<f64>,

    /// Comma separated: tf_arg, wo_arg, two_args
    #[arg(long, value_delimiter = ',', value_name = "TYPES")]
    pair_type_list: Vec<PairType>,

    /// one | all
    #[arg(long, value_name = "TYPE")]
    left_sample_type: Option<SampleType>,

    /// one | all
    #[arg(long, value_name = "TYPE")]
    neg_sample_type: Option<SampleType>,

    #[arg(long)]
    seed: Option<u64>,

    /// Validate entity indices of every script first
    #[arg(long)]
    check_entity_idx: bool,

    /// zstd compression level
    #[arg(long, default_value_t = 3)]
    level: i32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = build_config(&cli)?;
    if !cli.input_path.is_dir() {
        bail!("{} is not a directory", cli.input_path.display());
    }

    let model = EmbeddingModel::load(&cli.word2vec, Some(cli.word2vec_vocab.as_path()), cli.binary)
        .with_context(|| format!("loading vectors from {}", cli.word2vec.display()))?;

    let mut builder = PairPipeline::builder().config(config);
    if let Some(path) = &cli.prep_vocab {
        builder = builder.prep_vocab_path(path);
    }
    if let Some(path) = &cli.pred_count {
        builder = builder.pred_count_path(path);
    }
    let mut pipeline = builder.build(&model).context("building pipeline")?;

    let files = corpus_files(&cli.input_path)
        .with_context(|| format!("listing {}", cli.input_path.display()))?;
    log::info!("{} corpus files in {}", files.len(), cli.input_path.display());

    let output = File::create(&cli.output_path)
        .with_context(|| format!("creating {}", cli.output_path.display()))?;
    let mut encoder = zstd::Encoder::new(BufWriter::new(output), cli.level)?;
    for path in &files {
        pipeline
            .write_file(path, &mut encoder)
            .with_context(|| format!("processing {}", path.display()))?;
    }
    encoder.finish()?.flush()?;

    pipeline.stats().log_summary();
    Ok(())
}

fn build_config(cli: &Cli) -> Result<PairConfig> {
    let mut config = match &cli.config {
        Some(path) => PairConfig::load_from_ron(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PairConfig::default(),
    };
    if let Some(use_lemma) = cli.use_lemma {
        config.use_lemma = use_lemma;
    }
    if cli.subsampling {
        config.subsampling = true;
    }
    if let Some(threshold) = cli.subsample_threshold {
        config.subsample_threshold = threshold;
    }
    if !cli.pair_type_list.is_empty() {
        config.pair_types = cli.pair_type_list.clone();
    }
    if let Some(sample_type) = cli.left_sample_type {
        config.left_sample_type = sample_type;
    }
    if let Some(sample_type) = cli.neg_sample_type {
        config.neg_sample_type = sample_type;
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if cli.check_entity_idx {
        config.check_entity_idx = true;
    }
    config.validate()?;
    Ok(config)
}
