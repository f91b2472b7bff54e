//! Script Pairs: narrative scripts and pairwise training instances.
//!
//! Reduces documents to predicate-argument events linked through
//! coreference chains, resolves them against a word-embedding vocabulary,
//! and samples positive/negative argument substitutions for training
//! event composition models.

pub mod core;
pub mod schema;
