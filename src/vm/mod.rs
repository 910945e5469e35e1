//! This module contains the core VM implementation.
//! Note that these modules are public for documentation visiblility,
//! But should never be used outside of the module by `common` or `compiler`.

pub mod frame;
pub mod scope;
pub mod trace;

#[allow(clippy::module_inception)]
pub mod vm;
