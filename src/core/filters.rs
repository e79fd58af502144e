//! Sentence post-processing: an ordered pipeline of named text filters
//! that turns a raw token sequence into a finished sentence.

use regex::{Captures, Regex};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

use crate::core::random::RandomSource;
use crate::schema::config::GeneratorConfig;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("unknown filter: {0}")]
    Unknown(String),
}

/// The filters a [`PostProcessor`] can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterName {
    TrailingConjunction,
    TrailingCommas,
    PunctuationWhitespace,
    PunctuationCapitalization,
    RandomTrailingPunctuation,
    CapitalizeNames,
}

impl FilterName {
    pub const ALL: [FilterName; 6] = [
        FilterName::TrailingConjunction,
        FilterName::TrailingCommas,
        FilterName::PunctuationWhitespace,
        FilterName::PunctuationCapitalization,
        FilterName::RandomTrailingPunctuation,
        FilterName::CapitalizeNames,
    ];

    /// Every filter, in the order they are normally applied.
    pub fn default_order() -> Vec<FilterName> {
        Self::ALL.to_vec()
    }

    pub fn name(&self) -> &'static str {
        match self {
            FilterName::TrailingConjunction => "trailing_conjunction",
            FilterName::TrailingCommas => "trailing_commas",
            FilterName::PunctuationWhitespace => "punctuation_whitespace",
            FilterName::PunctuationCapitalization => "punctuation_capitalization",
            FilterName::RandomTrailingPunctuation => "random_trailing_punctuation",
            FilterName::CapitalizeNames => "capitalize_names",
        }
    }
}

impl fmt::Display for FilterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FilterName {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|f| f.name() == s)
            .copied()
            .ok_or_else(|| FilterError::Unknown(s.to_string()))
    }
}

/// Applies the configured filters, in order, to a joined token sequence.
#[derive(Debug, Clone)]
pub struct PostProcessor {
    filters: Vec<FilterName>,
    conjunctions: FxHashSet<String>,
    names: FxHashSet<String>,
    trailing_punctuation: Vec<(char, u32)>,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::from_config(&GeneratorConfig::default())
    }
}

impl PostProcessor {
    /// Word lists are matched case-insensitively. Multi-word names are
    /// split so that each part is capitalised on its own.
    pub fn new(
        filters: Vec<FilterName>,
        conjunctions: &[String],
        names: &[String],
        trailing_punctuation: Vec<(char, u32)>,
    ) -> Self {
        Self {
            filters,
            conjunctions: conjunctions.iter().map(|c| c.to_lowercase()).collect(),
            names: names
                .iter()
                .flat_map(|n| n.split_whitespace())
                .map(str::to_lowercase)
                .collect(),
            trailing_punctuation,
        }
    }

    pub fn from_config(config: &GeneratorConfig) -> Self {
        Self::new(
            config.filters.clone(),
            &config.conjunctions,
            &config.names,
            config.trailing_punctuation.clone(),
        )
    }

    pub fn filters(&self) -> &[FilterName] {
        &self.filters
    }

    /// Join `tokens` with single spaces and run every filter over the result.
    pub fn process<R: RandomSource + ?Sized>(&self, tokens: &[String], rng: &mut R) -> String {
        let mut text = tokens.join(" ");
        for filter in &self.filters {
            text = self.apply(*filter, &text, rng);
        }
        text
    }

    /// Run a single filter.
    pub fn apply<R: RandomSource + ?Sized>(
        &self,
        filter: FilterName,
        text: &str,
        rng: &mut R,
    ) -> String {
        match filter {
            FilterName::TrailingConjunction => trailing_conjunction(text, &self.conjunctions),
            FilterName::TrailingCommas => trailing_commas(text),
            FilterName::PunctuationWhitespace => punctuation_whitespace(text),
            FilterName::PunctuationCapitalization => punctuation_capitalization(text),
            FilterName::RandomTrailingPunctuation => {
                random_trailing_punctuation(text, &self.trailing_punctuation, rng)
            }
            FilterName::CapitalizeNames => capitalize_names(text, &self.names),
        }
    }
}

/// Drop trailing words while their bare, lowercased form is a
/// conjunction. The first word is always kept.
pub fn trailing_conjunction(text: &str, conjunctions: &FxHashSet<String>) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    while words.len() > 1 {
        let Some(last) = words.last() else { break };
        if !conjunctions.contains(&bare(last).to_lowercase()) {
            break;
        }
        words.pop();
    }
    words.join(" ")
}

/// Drop a single trailing comma along with any whitespace around it.
pub fn trailing_commas(text: &str) -> String {
    let trimmed = text.trim_end();
    match trimmed.strip_suffix(',') {
        Some(rest) => rest.trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// Insert a space between a terminal mark and a word character that
/// follows it directly, as in `"stop.go"`.
pub fn punctuation_whitespace(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"([.!?])([\p{L}\p{N}_])").expect("punctuation pattern is valid")
    });
    re.replace_all(text, "$1 $2").trim().to_string()
}

/// Capitalise the word after every word containing `.`, `!` or `?`.
///
/// Only the first letter changes, so the filter is idempotent.
pub fn punctuation_capitalization(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(words.len());
    for (i, word) in words.iter().enumerate() {
        if i > 0 && has_terminal(words[i - 1]) {
            out.push(capitalize_first(word));
        } else {
            out.push(word.to_string());
        }
    }
    out.join(" ")
}

/// Append a weighted terminal mark unless the text already ends in one.
pub fn random_trailing_punctuation<R: RandomSource + ?Sized>(
    text: &str,
    choices: &[(char, u32)],
    rng: &mut R,
) -> String {
    if text.is_empty() || text.ends_with(['.', '!', '?']) {
        return text.to_string();
    }
    let weights: Vec<u32> = choices.iter().map(|(_, w)| *w).collect();
    match rng.weighted(&weights) {
        Some(index) => format!("{}{}", text, choices[index].0),
        None => text.to_string(),
    }
}

/// Capitalise every word whose bare form is a known name.
pub fn capitalize_names(text: &str, names: &FxHashSet<String>) -> String {
    if names.is_empty() {
        return text.to_string();
    }
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}-]+").expect("word pattern is valid"));
    re.replace_all(text, |caps: &Captures| {
        let word = &caps[0];
        if names.contains(&word.to_lowercase()) {
            capitalize_first(word)
        } else {
            word.to_string()
        }
    })
    .into_owned()
}

fn bare(word: &str) -> &str {
    word.trim_matches(|c: char| !c.is_alphanumeric())
}

fn has_terminal(word: &str) -> bool {
    word.contains(['.', '!', '?'])
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::random::ScriptedSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn set(words: &[&str]) -> FxHashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn strings(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn filter_names_parse() {
        assert_eq!(
            "trailing_commas".parse::<FilterName>().unwrap(),
            FilterName::TrailingCommas
        );
        assert!("shouting".parse::<FilterName>().is_err());
        for filter in FilterName::ALL {
            assert_eq!(filter.to_string().parse::<FilterName>().unwrap(), filter);
        }
    }

    #[test]
    fn dangling_conjunction_is_dropped() {
        let conj = set(&["and", "but"]);
        assert_eq!(trailing_conjunction("she said and", &conj), "she said");
        assert_eq!(trailing_conjunction("she said, but and", &conj), "she said,");
        assert_eq!(trailing_conjunction("she said and,", &conj), "she said");
        assert_eq!(trailing_conjunction("And", &conj), "And");
        assert_eq!(trailing_conjunction("sand", &conj), "sand");
    }

    #[test]
    fn trailing_comma_drops_only_the_comma() {
        assert_eq!(trailing_commas("she said,"), "she said");
        assert_eq!(trailing_commas("she said, "), "she said");
        assert_eq!(trailing_commas("she, said"), "she, said");
        assert_eq!(trailing_commas(""), "");
    }

    #[test]
    fn whitespace_after_terminal_marks() {
        assert_eq!(punctuation_whitespace("stop.go now!then"), "stop. go now! then");
        assert_eq!(punctuation_whitespace("a.b.c"), "a. b. c");
        assert_eq!(punctuation_whitespace("done. ok"), "done. ok");
        assert_eq!(punctuation_whitespace("what?!"), "what?!");
    }

    #[test]
    fn capitalization_after_terminal_words() {
        assert_eq!(
            punctuation_capitalization("it rained. we left! why? because"),
            "it rained. We left! Why? Because"
        );
        assert_eq!(punctuation_capitalization("end."), "end.");
    }

    #[test]
    fn capitalization_is_idempotent() {
        let once = punctuation_capitalization("it rained. we left! éclair time? ok");
        assert_eq!(punctuation_capitalization(&once), once);
        assert_eq!(once, "it rained. We left! Éclair time? Ok");
    }

    #[test]
    fn trailing_punctuation_is_appended() {
        let choices = [('.', 3), ('!', 1), ('?', 1)];
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let out = random_trailing_punctuation("hello world", &choices, &mut rng);
            assert!(out.ends_with(['.', '!', '?']), "got {:?}", out);
            assert_eq!(out.len(), "hello world".len() + 1);
        }
    }

    #[test]
    fn trailing_punctuation_follows_weights() {
        let choices = [('.', 3), ('!', 1), ('?', 1)];
        let mut low = ScriptedSource::constant(0.1);
        let mut high = ScriptedSource::constant(0.95);
        assert_eq!(random_trailing_punctuation("hi", &choices, &mut low), "hi.");
        assert_eq!(random_trailing_punctuation("hi", &choices, &mut high), "hi?");
    }

    #[test]
    fn existing_terminal_mark_is_kept() {
        let mut rng = ScriptedSource::constant(0.5);
        assert_eq!(
            random_trailing_punctuation("hi!", &[('.', 1)], &mut rng),
            "hi!"
        );
        assert_eq!(random_trailing_punctuation("", &[('.', 1)], &mut rng), "");
        assert_eq!(rng.consumed(), 0);
    }

    #[test]
    fn names_are_capitalised_anywhere() {
        let names = set(&["alice", "bob"]);
        assert_eq!(
            capitalize_names("alice met bob, then alicent left with bob.", &names),
            "Alice met Bob, then alicent left with Bob."
        );
    }

    #[test]
    fn possessive_names_are_capitalised() {
        let names = set(&["marta"]);
        assert_eq!(
            capitalize_names("marta's boat and marta’s nets near marta.", &names),
            "Marta's boat and Marta’s nets near Marta."
        );
    }

    #[test]
    fn processor_runs_filters_in_order() {
        let processor = PostProcessor::new(
            FilterName::default_order(),
            &strings(&["and"]),
            &strings(&["Ada Lovelace"]),
            vec![('.', 1)],
        );
        let mut rng = ScriptedSource::constant(0.0);
        let out = processor.process(
            &strings(&["ada", "wrote.then", "lovelace", "slept,", "and"]),
            &mut rng,
        );
        assert_eq!(out, "Ada wrote. Then Lovelace slept.");
    }

    #[test]
    fn processor_respects_custom_order() {
        let processor = PostProcessor::new(
            vec![FilterName::TrailingCommas],
            &strings(&["and"]),
            &[],
            vec![('.', 1)],
        );
        let mut rng = ScriptedSource::constant(0.0);
        assert_eq!(processor.process(&strings(&["x,", "and"]), &mut rng), "x, and");
        assert_eq!(processor.filters(), &[FilterName::TrailingCommas]);
    }
}
