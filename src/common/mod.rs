//! Contains datastructures and utility functions
//! common to both the `compiler` and `vm`.
//!
//! - Core data-structures: values, closures, and compiled functions.
//! - Opcodes and the operators they carry.
//! - Source code representation and span annotations.

pub mod source;
pub mod span;
pub mod number;
pub mod operator;
pub mod opcode;
pub mod lit;
pub mod lambda;
pub mod closure;
pub mod value;
