//! Corpus loading: raw text files into cleaned, per-line token sequences.

use log::{debug, info};
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::schema::config::TokenRules;

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corpus path not found: {0}")]
    NotFound(PathBuf),
    #[error("corpus contains no usable tokens")]
    Empty,
}

/// Splits lines into normalized tokens.
///
/// A token is lowercased, stripped of quotes and brackets, split on
/// separator characters and trimmed of edge punctuation. Commas and the
/// terminal marks `.`, `!`, `?` stay attached to their word because the
/// post-processor relies on them.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    rules: TokenRules,
    blacklist: FxHashSet<String>,
}

impl Tokenizer {
    pub fn new(rules: TokenRules, word_blacklist: &[String]) -> Self {
        Self {
            rules,
            blacklist: word_blacklist.iter().map(|w| w.to_lowercase()).collect(),
        }
    }

    /// Tokenize one line of text.
    pub fn tokenize_line(&self, line: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        for word in line.split_whitespace() {
            if is_punctuation_only(word) {
                continue;
            }
            self.clean_word(word, &mut tokens);
        }
        tokens
    }

    fn clean_word(&self, word: &str, out: &mut Vec<String>) {
        let cleaned: String = word
            .to_lowercase()
            .chars()
            .filter(|c| !self.rules.strip.contains(c))
            .map(|c| if self.rules.separators.contains(&c) { ' ' } else { c })
            .collect();

        for part in cleaned.split_whitespace() {
            let part = part.trim_matches(|c: char| self.rules.trim.contains(&c));
            if part.is_empty() || is_punctuation_only(part) {
                continue;
            }
            let core = part.trim_matches(|c: char| !c.is_alphanumeric());
            if self.blacklist.contains(core) || self.blacklist.contains(part) {
                continue;
            }
            out.push(part.to_string());
        }
    }
}

/// The training text: one token sequence per non-empty input line, so no
/// n-gram ever spans a line break.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    lines: Vec<Vec<String>>,
}

impl Corpus {
    /// Build a corpus from already tokenized lines.
    ///
    /// # Errors
    /// `CorpusError::Empty` if there is not a single token.
    pub fn from_token_lines(lines: Vec<Vec<String>>) -> Result<Corpus, CorpusError> {
        let lines: Vec<Vec<String>> = lines.into_iter().filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            return Err(CorpusError::Empty);
        }
        Ok(Corpus { lines })
    }

    /// Tokenize a block of text, line by line.
    pub fn from_text(text: &str, tokenizer: &Tokenizer) -> Result<Corpus, CorpusError> {
        Self::from_lines(text.lines(), tokenizer)
    }

    pub fn from_lines<I, S>(lines: I, tokenizer: &Tokenizer) -> Result<Corpus, CorpusError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tokenized = lines
            .into_iter()
            .map(|line| tokenizer.tokenize_line(line.as_ref()))
            .collect();
        Self::from_token_lines(tokenized)
    }

    /// Load a corpus from a single file or from every file directly
    /// inside a directory.
    ///
    /// Directory entries are read in file-name order so the same
    /// directory always yields the same corpus. Files whose name or stem
    /// appears in `file_blacklist` are skipped; subdirectories are ignored.
    pub fn load(
        path: &Path,
        tokenizer: &Tokenizer,
        file_blacklist: &[String],
    ) -> Result<Corpus, CorpusError> {
        if !path.exists() {
            return Err(CorpusError::NotFound(path.to_path_buf()));
        }

        let files = if path.is_dir() {
            list_corpus_files(path, file_blacklist)?
        } else {
            vec![path.to_path_buf()]
        };

        let mut lines = Vec::new();
        for file in &files {
            let text = std::fs::read_to_string(file).map_err(|source| CorpusError::Io {
                path: file.clone(),
                source,
            })?;
            let before = lines.len();
            lines.extend(
                text.lines()
                    .map(|line| tokenizer.tokenize_line(line))
                    .filter(|tokens| !tokens.is_empty()),
            );
            debug!("{}: {} lines", file.display(), lines.len() - before);
        }

        let corpus = Self::from_token_lines(lines)?;
        info!(
            "Loaded corpus from {} file(s): {} lines, {} tokens",
            files.len(),
            corpus.lines.len(),
            corpus.token_count()
        );
        Ok(corpus)
    }

    pub fn lines(&self) -> &[Vec<String>] {
        &self.lines
    }

    pub fn token_count(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }
}

fn list_corpus_files(dir: &Path, file_blacklist: &[String]) -> Result<Vec<PathBuf>, CorpusError> {
    let io_err = |source: std::io::Error| CorpusError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|s| s.to_str()).unwrap_or_default();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if file_blacklist.iter().any(|b| b == name || b == stem) {
            debug!("Skipping blacklisted corpus file {}", path.display());
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

fn is_punctuation_only(word: &str) -> bool {
    !word.chars().any(char::is_alphanumeric)
}
