//! Weighted random walk over a [`Model`] with context backoff.
//!
//! A walk picks a first word, bootstraps into an observed multi-word
//! context, then repeatedly chooses the longest context the
//! [`BackoffPolicy`] lets it use and samples the next token from it,
//! until the character budget would be exceeded.

use log::debug;
use thiserror::Error;

use crate::core::model::{Distribution, Model};
use crate::core::random::RandomSource;
use crate::schema::config::BackoffPolicy;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("no distribution for context '{0}'")]
    UnknownContext(String),
    #[error("distribution for '{0}' has a zero total count")]
    DegenerateDistribution(String),
    #[error("model has no single-token contexts")]
    EmptyModel,
}

/// Tokens produced so far and their rendered (space-joined) length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationState {
    tokens: Vec<String>,
    rendered_len: usize,
    digit_escapes: usize,
}

impl GenerationState {
    fn push(&mut self, token: String) {
        self.rendered_len = self.len_with(&token);
        self.tokens.push(token);
    }

    /// Rendered length if `token` were appended.
    fn len_with(&self, token: &str) -> usize {
        let separator = usize::from(!self.tokens.is_empty());
        self.rendered_len + separator + token.chars().count()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<String> {
        self.tokens
    }

    /// Character count of the tokens joined by single spaces.
    pub fn rendered_len(&self) -> usize {
        self.rendered_len
    }

    /// How many times a digit run was broken by jumping to a random word.
    pub fn digit_escapes(&self) -> usize {
        self.digit_escapes
    }

    pub fn last(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }
}

/// Generates raw token sequences from a read-only model.
pub struct WalkEngine<'m> {
    model: &'m Model,
    policy: BackoffPolicy,
}

impl<'m> WalkEngine<'m> {
    pub fn new(model: &'m Model, policy: BackoffPolicy) -> Self {
        Self { model, policy }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    /// Walk the model until the next token would push the rendered
    /// sentence past `max_chars`, or until a word ending in `.`, `!` or
    /// `?` lands inside the tail window of the budget.
    ///
    /// `seed_word` is used as the first token only if the model knows it;
    /// otherwise a random first word is drawn.
    ///
    /// # Errors
    /// `UnknownContext` when the last token has no successors at any
    /// order. The attempt is lost; the caller should retry.
    pub fn generate<R: RandomSource + ?Sized>(
        &self,
        max_chars: usize,
        seed_word: Option<&str>,
        rng: &mut R,
    ) -> Result<GenerationState, WalkError> {
        let mut state = GenerationState::default();
        state.push(self.pick_first(seed_word, rng)?);
        self.bootstrap(&mut state, max_chars, rng);

        while !self.ends_in_tail(&state, max_chars) {
            // Not even a one-character token fits.
            if state.len_with("x") > max_chars {
                break;
            }
            let (next, escaped) = self.step(&state, rng)?;
            if state.len_with(&next) > max_chars {
                break;
            }
            if escaped {
                state.digit_escapes += 1;
            }
            state.push(next);
        }

        Ok(state)
    }

    /// Choose the first word, rerolling near-deterministic ones.
    pub(crate) fn pick_first<R: RandomSource + ?Sized>(
        &self,
        seed_word: Option<&str>,
        rng: &mut R,
    ) -> Result<String, WalkError> {
        if let Some(seed) = seed_word {
            let seed = seed.to_lowercase();
            if self.model.contains_token(&seed) {
                return Ok(seed);
            }
            debug!("Seed word '{}' is not in the model, drawing a random start", seed);
        }

        let mut candidate = self.model.random_key(1, rng).ok_or(WalkError::EmptyModel)?;
        for _ in 0..self.policy.max_rerolls {
            let branching = self.model.get(1, candidate).map_or(0, Distribution::branching);
            if branching > self.policy.reroll_max_branching || !rng.chance(self.policy.reroll_chance) {
                break;
            }
            candidate = self.model.random_key(1, rng).ok_or(WalkError::EmptyModel)?;
        }
        Ok(candidate.to_string())
    }

    /// Extend the opening word with tokens from an observed longer
    /// context, so the walk starts inside real multi-word phrasing.
    pub(crate) fn bootstrap<R: RandomSource + ?Sized>(
        &self,
        state: &mut GenerationState,
        max_chars: usize,
        rng: &mut R,
    ) {
        for _ in 0..self.policy.bootstrap_tokens {
            let order = state.tokens.len() + 1;
            if order > self.model.max_order() {
                break;
            }
            let after_digit = state.last().is_some_and(is_numeric);
            let keys: Vec<&str> = self
                .model
                .keys_with_prefix(order, &state.tokens)
                .into_iter()
                .filter(|k| !(after_digit && k.rsplit(' ').next().is_some_and(is_numeric)))
                .collect();
            if keys.is_empty() {
                break;
            }
            let key = keys[rng.index(keys.len())];
            let Some(last) = key.rsplit(' ').next() else {
                break;
            };
            if state.len_with(last) > max_chars {
                break;
            }
            state.push(last.to_string());
        }
    }

    /// Produce one next token. The flag is true when a digit run was
    /// broken by an escape jump.
    fn step<R: RandomSource + ?Sized>(
        &self,
        state: &GenerationState,
        rng: &mut R,
    ) -> Result<(String, bool), WalkError> {
        let tokens = state.tokens();
        let last = state.last().unwrap_or_default();

        let next = self.sample_next(tokens, rng)?;
        if !(is_numeric(last) && is_numeric(&next)) {
            return Ok((next, false));
        }

        let mut retries = 0;
        loop {
            if retries >= self.policy.max_digit_retries || rng.chance(self.policy.digit_escape_chance) {
                debug!("Escaping digit run after '{}' ({} resamples)", last, retries);
                let jump = self.model.random_key(1, rng).ok_or(WalkError::EmptyModel)?;
                return Ok((jump.to_string(), true));
            }
            let next = self.sample_next(tokens, rng)?;
            if !is_numeric(&next) {
                return Ok((next, false));
            }
            retries += 1;
        }
    }

    fn sample_next<R: RandomSource + ?Sized>(
        &self,
        tokens: &[String],
        rng: &mut R,
    ) -> Result<String, WalkError> {
        let (key, dist) = self.select_context(tokens, rng)?;
        dist.sample(rng)
            .map(str::to_owned)
            .ok_or(WalkError::DegenerateDistribution(key))
    }

    /// Pick the context to sample from, scanning from the longest
    /// usable order down to 1.
    ///
    /// Each order is attempted with its base probability; an attempted
    /// key that exists is accepted according to its branching factor.
    /// If nothing is accepted the order-1 key of the last token is used.
    pub(crate) fn select_context<R: RandomSource + ?Sized>(
        &self,
        tokens: &[String],
        rng: &mut R,
    ) -> Result<(String, &'m Distribution), WalkError> {
        let Some(last) = tokens.last() else {
            return Err(WalkError::UnknownContext(String::new()));
        };
        let n = tokens.len();
        let top = n.min(self.model.max_order());

        for order in (1..=top).rev() {
            if !rng.chance(self.policy.attempt_probability(order)) {
                continue;
            }
            let key = tokens[n - order..].join(" ");
            let Some(dist) = self.model.get(order, &key) else {
                continue;
            };
            let repeats_last = dist.single_successor() == Some(last.as_str());
            let acceptance = self
                .policy
                .branching
                .acceptance(dist.branching(), repeats_last);
            if rng.chance(acceptance) {
                return Ok((key, dist));
            }
        }

        match self.model.get(1, last) {
            Some(dist) => Ok((last.clone(), dist)),
            None => Err(WalkError::UnknownContext(last.clone())),
        }
    }

    fn ends_in_tail(&self, state: &GenerationState, max_chars: usize) -> bool {
        let in_tail = state.rendered_len() >= max_chars.saturating_sub(self.policy.tail_window);
        in_tail && state.last().is_some_and(ends_sentence)
    }
}

/// A token made of digits, optionally with inner `,`/`.` separators and
/// trailing punctuation ("1999", "3.14", "1,000.").
pub fn is_numeric(token: &str) -> bool {
    let core = token.trim_end_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | ';' | ':'));
    core.chars().any(|c| c.is_ascii_digit())
        && core.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
}

/// True if the token ends in terminal punctuation.
pub fn ends_sentence(token: &str) -> bool {
    token.ends_with(['.', '!', '?'])
}
