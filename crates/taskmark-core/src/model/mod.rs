//! In-memory task graph

mod document;
pub mod graph;
mod rules;
mod task;

pub use document::{Document, DocumentBuilder};
pub use rules::{ContentRule, Rule, RuleContainer, RuleGroup};
pub use task::{Script, Task};
