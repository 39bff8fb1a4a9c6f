//! Declaration locating over HCL text.
//!
//! Files are treated as text with located sub-spans: an anchor regex finds
//! where a dependency is declared, and the declaration ends at the next `}`
//! in column zero.

pub mod errors;
pub mod locator;

pub use errors::LocateError;
pub use locator::{locate, DeclarationPattern, DeclarationTarget, Span};
