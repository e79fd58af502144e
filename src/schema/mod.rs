//! Data read from disk: generator configuration and word lists.

pub mod config;
pub mod wordlist;
