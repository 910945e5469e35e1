//! # Ink
//! This crate contains the core of an Ink interpreter:
//! a dynamically typed, functional scripting language
//! with a small standard library and callback-based concurrency.
//! If you're looking for the command line interface,
//! it lives in the `cli` crate of this workspace.
//!
//! ## Embedding Ink in Rust
//! ```ignore
//! use ink::{config::Config, engine::Engine};
//!
//! fn main() {
//!     let mut engine = Engine::new(Config::default());
//!     engine.eval_str("out('Hello from Ink!\n')").unwrap();
//!     engine.drain().unwrap();
//! }
//! ```
//!
//! ## Overview of the compilation process
//! Within the compiler pipeline, source code is represented as a `Source` object.
//! A source is lexed into tokens, parsed into an AST arena,
//! optionally constant folded, and compiled into a `Program` of bytecode functions.
//! Compilation resolves every variable to a `(depth, slot)` pair,
//! so the VM never looks anything up by name.
//!
//! The `Engine` owns the natives, the import cache, and the task queue;
//! it runs programs on a `VM` and then drains the callbacks
//! their background tasks schedule, one at a time.

pub mod common;
pub mod compiler;
pub mod config;
pub mod core;
pub mod engine;
pub mod vm;
