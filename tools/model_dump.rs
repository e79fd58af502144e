/// Model Dump — build a model from a corpus and write it as text.
///
/// Usage: model_dump --input <file|dir> --output <dump.txt> [--order K]
use clap::Parser;
use std::path::PathBuf;
use std::process;

use markov_babble::core::corpus::{Corpus, Tokenizer};
use markov_babble::core::model::ModelBuilder;
use markov_babble::schema::config::GeneratorConfig;

#[derive(Parser, Debug)]
#[command(name = "model_dump")]
#[command(about = "Write a corpus model as `key:{\"next\": count}` lines")]
struct Args {
    /// Corpus file, or a directory of text files
    #[arg(long)]
    input: PathBuf,

    /// Output file
    #[arg(long)]
    output: PathBuf,

    /// Longest context order
    #[arg(long, default_value = "3")]
    order: usize,

    /// Generator configuration (RON) supplying token rules and blacklists
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let config = match args.config {
        Some(ref path) => GeneratorConfig::load_from_ron(path).unwrap_or_else(|e| {
            eprintln!("Error loading config '{}': {}", path.display(), e);
            process::exit(1);
        }),
        None => GeneratorConfig::default(),
    };

    let tokenizer = Tokenizer::new(config.tokens.clone(), &config.word_blacklist);
    let corpus = Corpus::load(&args.input, &tokenizer, &config.file_blacklist).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    println!(
        "Building order-{} model from '{}' ({} tokens)...",
        args.order,
        args.input.display(),
        corpus.token_count()
    );
    let model = ModelBuilder::build(&corpus, args.order).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    for order in 1..=model.max_order() {
        println!("  order {}: {} keys", order, model.order_len(order));
    }

    if let Err(e) = model.dump_to_path(&args.output) {
        eprintln!("Error writing '{}': {}", args.output.display(), e);
        process::exit(1);
    }
    println!("Dump written to {}", args.output.display());
}
