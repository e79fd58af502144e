//! Multi-order n-gram model: context keys of 1..=K tokens mapped to
//! next-token frequency distributions.

use log::info;
use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Bound;
use std::path::Path;
use thiserror::Error;

use crate::core::corpus::Corpus;
use crate::core::random::RandomSource;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("context order must be at least 1, got {0}")]
    InvalidOrder(usize),
    #[error("corpus has no line long enough to produce a transition")]
    NoTransitions,
}

/// Next-token counts observed after one context key.
///
/// Counts are always >= 1 and the total is positive for every
/// distribution stored in a [`Model`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distribution {
    counts: BTreeMap<String, u32>,
    total: u32,
}

impl Distribution {
    fn observe(&mut self, next: &str) {
        *self.counts.entry(next.to_string()).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn count(&self, token: &str) -> u32 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    /// Number of distinct next tokens.
    pub fn branching(&self) -> usize {
        self.counts.len()
    }

    /// The next token, if exactly one has ever been observed.
    pub fn single_successor(&self) -> Option<&str> {
        if self.counts.len() == 1 {
            self.counts.keys().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// `count / total` for every next token.
    pub fn probabilities(&self) -> Vec<(&str, f64)> {
        let total = self.total as f64;
        self.iter().map(|(tok, c)| (tok, c as f64 / total)).collect()
    }

    /// Draw a next token proportionally to its count.
    ///
    /// Returns `None` only for an empty distribution.
    pub fn sample<R: RandomSource + ?Sized>(&self, rng: &mut R) -> Option<&str> {
        let weights: Vec<u32> = self.counts.values().copied().collect();
        let index = rng.weighted(&weights)?;
        self.counts.keys().nth(index).map(String::as_str)
    }
}

/// The union over orders 1..=K of context key → [`Distribution`].
///
/// Keys are the context tokens joined by single spaces. Tokens never
/// contain whitespace, so a key's order is its word count and keys of
/// different orders cannot collide. Keys are kept sorted, which makes
/// iteration (and therefore seeded generation) reproducible and lets
/// prefix searches run as range scans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    orders: Vec<BTreeMap<String, Distribution>>,
    /// Order-1 keys in sorted order, for constant-time random starts.
    unigrams: Vec<String>,
}

/// Aggregates a [`Corpus`] into a [`Model`].
pub struct ModelBuilder;

impl ModelBuilder {
    /// Count every (context, next token) pair for context lengths
    /// 1..=`max_order`, never crossing a line boundary.
    ///
    /// # Errors
    /// - `InvalidOrder` if `max_order` is 0.
    /// - `NoTransitions` if no line has two or more tokens.
    pub fn build(corpus: &Corpus, max_order: usize) -> Result<Model, ModelError> {
        if max_order == 0 {
            return Err(ModelError::InvalidOrder(max_order));
        }

        let mut orders: Vec<BTreeMap<String, Distribution>> = vec![BTreeMap::new(); max_order];

        for (index, table) in orders.iter_mut().enumerate() {
            let order = index + 1;
            for line in corpus.lines() {
                for window in line.windows(order + 1) {
                    let key = window[..order].join(" ");
                    table.entry(key).or_default().observe(&window[order]);
                }
            }
        }

        if orders[0].is_empty() {
            return Err(ModelError::NoTransitions);
        }

        let unigrams = orders[0].keys().cloned().collect();
        let model = Model { orders, unigrams };
        info!(
            "Model built: order {}, {} context keys ({} unigram)",
            max_order,
            model.len(),
            model.order_len(1)
        );
        Ok(model)
    }
}

impl Model {
    /// K, the longest context order stored.
    pub fn max_order(&self) -> usize {
        self.orders.len()
    }

    /// Total number of context keys over all orders.
    pub fn len(&self) -> usize {
        self.orders.iter().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys of one order.
    pub fn order_len(&self, order: usize) -> usize {
        self.table(order).map_or(0, BTreeMap::len)
    }

    /// Look up a key of any order.
    pub fn distribution(&self, key: &str) -> Option<&Distribution> {
        let order = key.split(' ').count();
        self.get(order, key)
    }

    pub fn get(&self, order: usize, key: &str) -> Option<&Distribution> {
        self.table(order)?.get(key)
    }

    pub fn contains_token(&self, token: &str) -> bool {
        self.get(1, token).is_some()
    }

    /// Keys of one order, in sorted order.
    pub fn keys(&self, order: usize) -> impl Iterator<Item = &str> {
        self.table(order)
            .into_iter()
            .flat_map(|t| t.keys().map(String::as_str))
    }

    /// Uniformly random key of the given order.
    pub fn random_key<R: RandomSource + ?Sized>(&self, order: usize, rng: &mut R) -> Option<&str> {
        if order == 1 {
            if self.unigrams.is_empty() {
                return None;
            }
            let index = rng.index(self.unigrams.len());
            return self.unigrams.get(index).map(String::as_str);
        }
        let table = self.table(order)?;
        if table.is_empty() {
            return None;
        }
        let index = rng.index(table.len());
        table.keys().nth(index).map(String::as_str)
    }

    /// Keys of `order` whose leading tokens equal `prefix`.
    pub fn keys_with_prefix(&self, order: usize, prefix: &[String]) -> Vec<&str> {
        let Some(table) = self.table(order) else {
            return Vec::new();
        };
        if prefix.is_empty() || prefix.len() >= order {
            return Vec::new();
        }
        let mut start = prefix.join(" ");
        start.push(' ');
        table
            .range::<String, _>((Bound::Included(&start), Bound::Unbounded))
            .map(|(k, _)| k.as_str())
            .take_while(|k| k.starts_with(start.as_str()))
            .collect()
    }

    /// Write a human-readable dump, one `key:{"next": count, ...}` line
    /// per context key, shorter orders first.
    pub fn write_dump<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for table in &self.orders {
            for (key, dist) in table {
                let entries: Vec<String> = dist
                    .iter()
                    .map(|(tok, count)| format!("{:?}: {}", tok, count))
                    .collect();
                writeln!(writer, "{}:{{{}}}", key, entries.join(", "))?;
            }
        }
        Ok(())
    }

    pub fn dump_to_path(&self, path: &Path) -> std::io::Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write_dump(&mut writer)?;
        writer.flush()
    }

    fn table(&self, order: usize) -> Option<&BTreeMap<String, Distribution>> {
        if order == 0 {
            return None;
        }
        self.orders.get(order - 1)
    }
}
