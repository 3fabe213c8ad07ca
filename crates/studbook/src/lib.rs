//! Studbook - pedigree ancestry analysis for kennel and breeding registries.
//!
//! This crate provides both a CLI application and a library for the
//! ancestry-analysis core of a breeding registry: building a bounded,
//! identity-preserving ancestor graph for a dog, computing Wright's
//! coefficient of inbreeding over it, deriving chart layouts, and applying
//! validated, roll-backable pedigree mutations.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod coi;
pub mod domain;
pub mod error;
pub mod graph;
pub mod layout;
pub mod mutation;
pub mod registry;
pub mod session;

// Public CLI module (needed by binary)
pub mod cli;

// Output formatting for the CLI
pub mod output;

pub use error::{Error, Result};
