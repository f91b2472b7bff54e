/// Count Vocab: per-category vocabulary counts over a directory of script
/// corpora. The predicate counter feeds subsampling in prepare_pair_input.
///
/// Usage: count_vocab <input_dir> <output_dir> [--use-lemma <bool>]
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use env_logger::Env;
use script_pairs::core::pipeline::{corpus_files, read_corpus};
use script_pairs::core::vocab::{merge_counter, write_counter};
use script_pairs::schema::{Counter, VocabCategory};

#[derive(Parser, Debug)]
#[command(author, version, about = "Count script vocabulary by category", long_about = None)]
struct Cli {
    /// Directory of script corpus files (*.zst or *.txt)
    input_path: PathBuf,

    /// Directory receiving one `<category>.txt` counter per category
    output_path: PathBuf,

    #[arg(long, value_name = "BOOL", default_value_t = true, action = ArgAction::Set)]
    use_lemma: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut totals: BTreeMap<VocabCategory, Counter> = BTreeMap::new();
    let mut num_scripts = 0;
    for path in corpus_files(&cli.input_path)
        .with_context(|| format!("listing {}", cli.input_path.display()))?
    {
        let corpus = read_corpus(&path).with_context(|| format!("reading {}", path.display()))?;
        for script in &corpus {
            script
                .check_entity_idx_range()
                .with_context(|| format!("{} in {}", script.doc_name, path.display()))?;
            let vocab = script
                .get_vocab_count(cli.use_lemma)
                .with_context(|| format!("{} in {}", script.doc_name, path.display()))?;
            for (category, counter) in vocab {
                merge_counter(totals.entry(category).or_default(), &counter);
            }
        }
        num_scripts += corpus.num_scripts();
        log::info!("{}: {} scripts", path.display(), corpus.num_scripts());
    }

    std::fs::create_dir_all(&cli.output_path)
        .with_context(|| format!("creating {}", cli.output_path.display()))?;
    for category in VocabCategory::ALL {
        let counter = totals.remove(&category).unwrap_or_default();
        let path = cli.output_path.join(format!("{}.txt", category.name()));
        let mut writer = BufWriter::new(
            File::create(&path).with_context(|| format!("creating {}", path.display()))?,
        );
        write_counter(&mut writer, &counter)?;
        writer.flush()?;
        log::info!("{}: {} distinct entries", category.name(), counter.len());
    }
    log::info!("counted {} scripts", num_scripts);
    Ok(())
}
