//! Embedding resolution and pair generation over scripts.

pub mod config;
pub mod embedding;
pub mod pair;
pub mod pipeline;
pub mod rich_script;
pub mod vocab;
