//! Username variant generation.
//!
//! Expands seed names with prefix/suffix permutations and keeps only the
//! candidates whose length fits the service's limits.
//!
//! # Examples
//!
//! ```
//! use handle_check_lib::generate::{generate_variants, GenerationConfig};
//!
//! let config = GenerationConfig::default();
//! let names = generate_variants(&["neo".to_string()], &config);
//! assert_eq!(names[0], "neo");
//! assert!(names.contains(&"neo_".to_string()));
//! assert!(names.contains(&"neoofficial".to_string()));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Suffixes tried when none are configured.
pub const DEFAULT_SUFFIXES: [&str; 10] = [
    "", "_", ".", "0", "1", "2", "3", "official", "real", "thereal",
];

/// Settings for variant generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Strings prepended to each seed
    #[serde(default)]
    pub prefixes: Vec<String>,

    /// Strings appended to each seed
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,

    /// Shortest acceptable candidate (in characters)
    /// Default: 3
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    /// Longest acceptable candidate (in characters)
    /// Default: 30
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

fn default_suffixes() -> Vec<String> {
    DEFAULT_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

fn default_min_length() -> usize {
    3
}

fn default_max_length() -> usize {
    30
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            suffixes: default_suffixes(),
            min_length: default_min_length(),
            max_length: default_max_length(),
        }
    }
}

impl GenerationConfig {
    /// Set the length window.
    pub fn with_length_range(mut self, min_length: usize, max_length: usize) -> Self {
        self.min_length = min_length;
        self.max_length = max_length.max(min_length);
        self
    }

    /// Whether `candidate` fits the length window.
    pub fn accepts(&self, candidate: &str) -> bool {
        let len = candidate.chars().count();
        len >= self.min_length && len <= self.max_length
    }
}

/// Apply prefix and suffix permutations to a list of seeds.
///
/// For each seed, yields `prefix + seed + suffix` for every pair, then
/// `seed + suffix` for every suffix. An empty suffix yields the bare form.
pub fn apply_affixes<'a>(
    seeds: &'a [String],
    prefixes: &'a [String],
    suffixes: &'a [String],
) -> impl Iterator<Item = String> + 'a {
    seeds.iter().flat_map(move |seed| {
        let mut variants = Vec::new();

        for prefix in prefixes {
            variants.push(format!("{}{}", prefix, seed));
            for suffix in suffixes {
                variants.push(format!("{}{}{}", prefix, seed, suffix));
            }
        }

        for suffix in suffixes {
            variants.push(format!("{}{}", seed, suffix));
        }

        variants
    })
}

/// Seeds first, then their variants, length-filtered and deduplicated in order.
pub fn generate_variants(seeds: &[String], config: &GenerationConfig) -> Vec<String> {
    let mut seen = HashSet::new();

    seeds
        .iter()
        .cloned()
        .chain(apply_affixes(seeds, &config.prefixes, &config.suffixes))
        .filter(|candidate| config.accepts(candidate))
        .filter(|candidate| seen.insert(candidate.clone()))
        .collect()
}
