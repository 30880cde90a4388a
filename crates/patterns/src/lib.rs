//! Pattern compilation and rule formulas.
//!
//! A pattern is parsed with the grammar of its target language and then
//! rewritten so that metavariables and ellipses become explicit markers the
//! matcher can dispatch on.

mod cache;
mod compile;
pub mod formula;

pub use cache::{CacheStats, PatternCache};
pub use compile::{compile_pattern, is_metavariable_name, ParseError, PatternRoot, PatternTree};
pub use formula::{Formula, FormulaError, PatternId, Predicate};

#[cfg(test)]
mod tests;
