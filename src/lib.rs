//! Markov Babble — sentence generation from a variable-order word chain.
//!
//! Builds a backoff n-gram model from a text corpus, walks it with
//! weighted sampling under a character budget, and runs the raw token
//! sequence through an ordered clean-up pipeline. Corpus acquisition and
//! whatever consumes the sentences live outside this crate.

pub mod core;
pub mod schema;
