//! Field patching inside located declarations.

pub mod field;
pub mod plan;

pub use field::{FieldPatcher, VERSION_FIELD};
pub use plan::PatchPlan;
