/// Front ends, one module per language.
///
/// Each module exposes a `Frontend` implementation and a `parse_<language>`
/// convenience function for programs.
pub mod generic;
pub use generic::{parse_generic, GenericFrontend};

pub mod javascript;
pub use javascript::{parse_javascript, JavaScriptFrontend};
