//! The sentence engine: corpus → model → walk → rejection gate → filters.
//!
//! Built via `SentenceEngine::builder()`. Each call to [`SentenceEngine::generate`]
//! runs the walk under a fresh seeded RNG per attempt, discards attempts
//! that dead-end or repeat a word too often, and gives up after
//! `max_retries` attempts.

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::corpus::{Corpus, CorpusError, Tokenizer};
use crate::core::filters::PostProcessor;
use crate::core::model::{Model, ModelBuilder, ModelError};
use crate::core::random::RandomSource;
use crate::core::walk::{WalkEngine, WalkError};
use crate::schema::config::{ConfigError, GeneratorConfig};
use crate::schema::wordlist::load_word_list;

#[derive(Debug, Error)]
pub enum SentenceError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("corpus error: {0}")]
    Corpus(#[from] CorpusError),
    #[error("model error: {0}")]
    Model(#[from] ModelError),
    #[error("walk error: {0}")]
    Walk(#[from] WalkError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no corpus was provided")]
    MissingCorpus,
    #[error("generation failed after {0} retries")]
    GenerationFailed(u32),
}

/// A finished sentence and the raw tokens it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    text: String,
    tokens: Vec<String>,
}

impl Sentence {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// True when no token occurs more than `max_occurrence` times.
pub fn within_occurrence_limit(tokens: &[String], max_occurrence: usize) -> bool {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for token in tokens {
        let count = counts.entry(token.as_str()).or_insert(0);
        *count += 1;
        if *count > max_occurrence {
            return false;
        }
    }
    true
}

/// Generates sentences from one model. Build via `SentenceEngine::builder()`.
pub struct SentenceEngine {
    model: Model,
    config: GeneratorConfig,
    processor: PostProcessor,
    seed: u64,
    generation_count: u64,
}

/// Builder for constructing a `SentenceEngine`.
pub struct SentenceEngineBuilder {
    corpus_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
    conjunctions_path: Option<PathBuf>,
    names_path: Option<PathBuf>,
    seed: u64,
    /// Directly provided corpus (for testing without files).
    corpus: Option<Corpus>,
    /// Directly provided config (for testing without files).
    config: Option<GeneratorConfig>,
}

impl SentenceEngine {
    pub fn builder() -> SentenceEngineBuilder {
        SentenceEngineBuilder {
            corpus_path: None,
            config_path: None,
            conjunctions_path: None,
            names_path: None,
            seed: 0,
            corpus: None,
            config: None,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate one sentence, starting from `seed_word` when the model
    /// knows it.
    ///
    /// Attempt `n` of the k-th call is seeded with
    /// `seed + k + n * 7919`, so a fixed engine seed reproduces the same
    /// sequence of sentences.
    pub fn generate(&mut self, seed_word: Option<&str>) -> Result<Sentence, SentenceError> {
        let max_retries = self.config.max_retries;

        for retry in 0..max_retries {
            let mut rng = StdRng::seed_from_u64(
                self.seed
                    .wrapping_add(self.generation_count)
                    .wrapping_add(retry as u64 * 7919),
            );
            if let Some(sentence) = self.attempt(seed_word, &mut rng)? {
                self.generation_count += 1;
                return Ok(sentence);
            }
        }

        self.generation_count += 1;
        warn!("No acceptable sentence after {} attempts", max_retries);
        Err(SentenceError::GenerationFailed(max_retries))
    }

    /// Generate `count` sentences in a row.
    pub fn generate_many(&mut self, count: usize) -> Result<Vec<Sentence>, SentenceError> {
        let mut sentences = Vec::with_capacity(count);
        for _ in 0..count {
            sentences.push(self.generate(None)?);
        }
        Ok(sentences)
    }

    /// Generate one sentence drawing every random choice from `rng`.
    pub fn generate_with<R: RandomSource + ?Sized>(
        &self,
        rng: &mut R,
        seed_word: Option<&str>,
    ) -> Result<Sentence, SentenceError> {
        for _ in 0..self.config.max_retries {
            if let Some(sentence) = self.attempt(seed_word, rng)? {
                return Ok(sentence);
            }
        }
        warn!("No acceptable sentence after {} attempts", self.config.max_retries);
        Err(SentenceError::GenerationFailed(self.config.max_retries))
    }

    /// One walk plus the rejection gate. `Ok(None)` means the attempt
    /// was discarded and another should be made.
    fn attempt<R: RandomSource + ?Sized>(
        &self,
        seed_word: Option<&str>,
        rng: &mut R,
    ) -> Result<Option<Sentence>, SentenceError> {
        let budget = self.draw_budget(rng);
        let walk = WalkEngine::new(&self.model, self.config.policy.clone());

        let state = match walk.generate(budget, seed_word, rng) {
            Ok(state) => state,
            Err(WalkError::UnknownContext(key)) => {
                debug!("Walk dead-ended at '{}', retrying", key);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if !within_occurrence_limit(state.tokens(), self.config.max_word_occurrence) {
            debug!(
                "Rejected {} tokens: a word occurs more than {} times",
                state.tokens().len(),
                self.config.max_word_occurrence
            );
            return Ok(None);
        }

        let tokens = state.into_tokens();
        let text = self.processor.process(&tokens, rng);
        Ok(Some(Sentence { text, tokens }))
    }

    fn draw_budget<R: RandomSource + ?Sized>(&self, rng: &mut R) -> usize {
        let max = self.config.max_chars;
        match self.config.min_chars {
            Some(min) if min < max => min + rng.index((max - min).saturating_add(1)),
            _ => max,
        }
    }
}

impl SentenceEngineBuilder {
    /// A corpus file, or a directory whose files are all read.
    pub fn corpus_path(mut self, path: impl AsRef<Path>) -> Self {
        self.corpus_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replaces the configured conjunction list.
    pub fn conjunctions_file(mut self, path: impl AsRef<Path>) -> Self {
        self.conjunctions_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Adds to the configured name list.
    pub fn names_file(mut self, path: impl AsRef<Path>) -> Self {
        self.names_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Provide the corpus directly (for testing without files).
    pub fn with_corpus(mut self, corpus: Corpus) -> Self {
        self.corpus = Some(corpus);
        self
    }

    /// Provide the config directly (for testing without files).
    /// Takes precedence over `config_path`.
    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<SentenceEngine, SentenceError> {
        let mut config = match (self.config, &self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => GeneratorConfig::load_from_ron(path)?,
            (None, None) => GeneratorConfig::default(),
        };

        if let Some(ref path) = self.conjunctions_path {
            config.conjunctions = load_word_list(path)?;
        }
        if let Some(ref path) = self.names_path {
            config.names.extend(load_word_list(path)?);
        }
        config.validate()?;

        let corpus = match (self.corpus, &self.corpus_path) {
            (Some(corpus), _) => corpus,
            (None, Some(path)) => {
                let tokenizer = Tokenizer::new(config.tokens.clone(), &config.word_blacklist);
                Corpus::load(path, &tokenizer, &config.file_blacklist)?
            }
            (None, None) => return Err(SentenceError::MissingCorpus),
        };

        let model = ModelBuilder::build(&corpus, config.max_context_order)?;
        let processor = PostProcessor::from_config(&config);
        info!(
            "Sentence engine ready: {} tokens, {} filters, seed {}",
            corpus.token_count(),
            processor.filters().len(),
            self.seed
        );

        Ok(SentenceEngine {
            model,
            config,
            processor,
            seed: self.seed,
            generation_count: 0,
        })
    }
}
