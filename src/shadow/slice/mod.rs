//! Bounds-checked typed access to record payloads.
//!
//! Records are encoded little-endian regardless of the target.

mod macros;
mod ro;
mod wo;

pub use ro::ROSlice;
pub use wo::WOSlice;
