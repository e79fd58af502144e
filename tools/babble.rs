/// Babble — print sentences generated from a text corpus.
///
/// Usage: babble --corpus <file|dir> [--config <config.ron>] [--count N] [--seed S]
use clap::Parser;
use std::path::PathBuf;
use std::process;

use markov_babble::core::sentence::SentenceEngine;

#[derive(Parser, Debug)]
#[command(name = "babble")]
#[command(about = "Generate sentences from a variable-order Markov chain")]
struct Args {
    /// Corpus file, or a directory of text files
    #[arg(long)]
    corpus: PathBuf,

    /// Generator configuration (RON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Conjunction list, one word per line
    #[arg(long)]
    conjunctions: Option<PathBuf>,

    /// Names to capitalise, one per line
    #[arg(long)]
    names: Option<PathBuf>,

    /// Number of sentences to print
    #[arg(long, default_value = "1")]
    count: usize,

    /// RNG seed; defaults to the current time
    #[arg(long)]
    seed: Option<u64>,

    /// Preferred first word
    #[arg(long)]
    start: Option<String>,

    /// Also write the model dump to this file
    #[arg(long)]
    dump: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let seed = args.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });

    let mut builder = SentenceEngine::builder().corpus_path(&args.corpus).seed(seed);
    if let Some(ref path) = args.config {
        builder = builder.config_path(path);
    }
    if let Some(ref path) = args.conjunctions {
        builder = builder.conjunctions_file(path);
    }
    if let Some(ref path) = args.names {
        builder = builder.names_file(path);
    }

    let mut engine = builder.build().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    if let Some(ref path) = args.dump {
        if let Err(e) = engine.model().dump_to_path(path) {
            eprintln!("Error writing model dump '{}': {}", path.display(), e);
            process::exit(1);
        }
        eprintln!("Model dump written to {}", path.display());
    }

    let mut failures = 0;
    for _ in 0..args.count {
        match engine.generate(args.start.as_deref()) {
            Ok(sentence) => println!("{}", sentence),
            Err(e) => {
                eprintln!("Error: {}", e);
                failures += 1;
            }
        }
    }

    if failures == args.count && args.count > 0 {
        process::exit(1);
    }
}
