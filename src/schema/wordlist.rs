//! Plain-text word lists: blacklists, conjunctions and known names.

use std::path::Path;

/// Parse a word list: one entry per line, surrounding whitespace dropped,
/// blank lines and `#` comments ignored.
pub fn parse_word_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

/// Read a word list file.
pub fn load_word_list(path: &Path) -> std::io::Result<Vec<String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_word_list(&contents))
}
