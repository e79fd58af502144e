//! Generator configuration: RON-loaded settings and the backoff policy table.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::filters::FilterName;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a generation session can be tuned with.
///
/// Every field has a default, so a RON file only needs to name the
/// values it changes:
///
/// ```ron
/// (
///     max_context_order: 2,
///     max_word_occurrence: 3,
///     filters: [trailing_conjunction, random_trailing_punctuation],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Longest context (K) the model is built for.
    pub max_context_order: usize,
    /// Character budget of one sentence.
    pub max_chars: usize,
    /// When set, each sentence draws its budget from `min_chars..=max_chars`.
    pub min_chars: Option<usize>,
    /// A sentence using any token more often than this is rejected.
    pub max_word_occurrence: usize,
    /// Walk attempts per sentence before giving up.
    pub max_retries: u32,
    /// Post-processing filters, applied in this order.
    pub filters: Vec<FilterName>,
    pub policy: BackoffPolicy,
    pub tokens: TokenRules,
    /// Weighted choices for the appended terminal punctuation.
    pub trailing_punctuation: Vec<(char, u32)>,
    /// Corpus file names (or stems) to skip when loading a directory.
    pub file_blacklist: Vec<String>,
    /// Words dropped from the corpus.
    pub word_blacklist: Vec<String>,
    /// Words a sentence must not end on.
    pub conjunctions: Vec<String>,
    /// Names that are capitalised wherever they appear.
    pub names: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_context_order: 3,
            max_chars: 260,
            min_chars: Some(180),
            max_word_occurrence: 2,
            max_retries: 100,
            filters: FilterName::default_order(),
            policy: BackoffPolicy::default(),
            tokens: TokenRules::default(),
            trailing_punctuation: vec![('.', 3), ('!', 1), ('?', 1)],
            file_blacklist: Vec::new(),
            word_blacklist: Vec::new(),
            conjunctions: ["and", "but", "or", "nor", "for", "yet", "so", "because", "that"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            names: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    /// Load and validate a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<GeneratorConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a configuration from a RON string.
    pub fn parse_ron(input: &str) -> Result<GeneratorConfig, ConfigError> {
        let config: GeneratorConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_context_order == 0 {
            return Err(invalid("max_context_order must be at least 1"));
        }
        if self.max_chars == 0 {
            return Err(invalid("max_chars must be positive"));
        }
        if let Some(min) = self.min_chars {
            if min > self.max_chars {
                return Err(ConfigError::Invalid(format!(
                    "min_chars ({}) exceeds max_chars ({})",
                    min, self.max_chars
                )));
            }
        }
        if self.max_word_occurrence == 0 {
            return Err(invalid("max_word_occurrence must be at least 1"));
        }
        if self.max_retries == 0 {
            return Err(invalid("max_retries must be at least 1"));
        }
        if self.trailing_punctuation.iter().map(|(_, w)| *w).sum::<u32>() == 0 {
            return Err(invalid("trailing_punctuation needs a positive total weight"));
        }
        if let Some((c, _)) = self
            .trailing_punctuation
            .iter()
            .find(|(c, _)| !is_terminal(*c))
        {
            return Err(ConfigError::Invalid(format!(
                "trailing punctuation '{}' is not one of . ! ?",
                c
            )));
        }
        self.policy.validate()
    }
}

/// Declarative table of every probability the walk consults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    /// Base chance of trying a context of order `i + 1`. The last entry
    /// covers every higher order. Must not increase with the order.
    pub attempt: Vec<f64>,
    pub branching: BranchingBands,
    /// A random first word with at most this many successors may be rerolled.
    pub reroll_max_branching: usize,
    pub reroll_chance: f64,
    pub max_rerolls: usize,
    /// Chance of abandoning a digit run by jumping to a random word.
    pub digit_escape_chance: f64,
    pub max_digit_retries: usize,
    /// Characters before the budget inside which a terminal word ends the walk.
    pub tail_window: usize,
    /// Tokens appended from multi-word contexts right after the first word.
    pub bootstrap_tokens: usize,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            attempt: vec![1.0, 0.85, 0.6, 0.4],
            branching: BranchingBands::default(),
            reroll_max_branching: 2,
            reroll_chance: 0.9,
            max_rerolls: 16,
            digit_escape_chance: 0.1,
            max_digit_retries: 12,
            tail_window: 70,
            bootstrap_tokens: 2,
        }
    }
}

impl BackoffPolicy {
    /// A policy with no randomness in the backoff: the longest known
    /// context always wins (the A→A→A guard still applies), seeds are
    /// never rerolled and digit runs are only broken by resampling.
    pub fn deterministic() -> Self {
        Self {
            attempt: vec![1.0],
            branching: BranchingBands {
                rich_above: 3,
                rich: 1.0,
                medium: 1.0,
                sparse: 1.0,
            },
            reroll_chance: 0.0,
            digit_escape_chance: 0.0,
            ..Self::default()
        }
    }

    /// Base chance of attempting a context of the given order.
    pub fn attempt_probability(&self, order: usize) -> f64 {
        let index = order.saturating_sub(1);
        self.attempt
            .get(index)
            .or_else(|| self.attempt.last())
            .copied()
            .unwrap_or(1.0)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attempt.is_empty() {
            return Err(invalid("policy.attempt must have at least one entry"));
        }
        for p in &self.attempt {
            check_probability("policy.attempt", *p)?;
        }
        if self.attempt.windows(2).any(|w| w[1] > w[0]) {
            return Err(invalid("policy.attempt must not increase with the order"));
        }
        check_probability("policy.reroll_chance", self.reroll_chance)?;
        check_probability("policy.digit_escape_chance", self.digit_escape_chance)?;
        self.branching.validate()
    }
}

/// Acceptance probability of an attested context, by branching factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchingBands {
    /// Contexts with more distinct successors than this are "rich".
    pub rich_above: usize,
    pub rich: f64,
    /// Two successors up to `rich_above`.
    pub medium: f64,
    /// A single successor that does not repeat the last token.
    pub sparse: f64,
}

impl Default for BranchingBands {
    fn default() -> Self {
        Self {
            rich_above: 3,
            rich: 0.9,
            medium: 0.6,
            sparse: 0.25,
        }
    }
}

impl BranchingBands {
    /// `repeats_last` is true when the only successor equals the current
    /// last token; such a context is never accepted.
    pub fn acceptance(&self, branching: usize, repeats_last: bool) -> f64 {
        if branching > self.rich_above {
            self.rich
        } else if branching >= 2 {
            self.medium
        } else if repeats_last {
            0.0
        } else {
            self.sparse
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_probability("policy.branching.rich", self.rich)?;
        check_probability("policy.branching.medium", self.medium)?;
        check_probability("policy.branching.sparse", self.sparse)?;
        if self.rich_above < 2 {
            return Err(invalid("policy.branching.rich_above must be at least 2"));
        }
        Ok(())
    }
}

/// How raw words are cleaned into tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRules {
    /// Removed wherever they occur.
    pub strip: Vec<char>,
    /// Removed from either end of a word.
    pub trim: Vec<char>,
    /// Replaced by a space, splitting the word.
    pub separators: Vec<char>,
}

impl Default for TokenRules {
    fn default() -> Self {
        Self {
            strip: vec!['"', '“', '”', '„', '«', '»', '(', ')', '[', ']', '{', '}', '*'],
            trim: vec!['\'', '‘', '’', ':', ';'],
            separators: vec!['/', '\\', '|'],
        }
    }
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

fn check_probability(field: &str, p: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(ConfigError::Invalid(format!(
            "{} must be between 0.0 and 1.0, got {}",
            field, p
        )));
    }
    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid(message.to_string())
}
