//! Script data model: tokens, mentions, entities, events, and the
//! line-oriented text format they serialize to.

pub mod argument;
pub mod document;
pub mod entity;
pub mod event;
pub mod mention;
pub mod script;
pub mod token;

pub use argument::Argument;
pub use entity::Entity;
pub use event::{ArgSlot, Event, Predicate};
pub use mention::Mention;
pub use script::{Counter, Script, ScriptCorpus, ScriptError, VocabCategory};
pub use token::{Token, TokenForm};
