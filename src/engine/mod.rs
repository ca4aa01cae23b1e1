//! Substitution core - the only part of the service with real algorithmic content.
//!
//! This module is split into the three leaf components:
//! - `validation` - checks a submitted value map against a parameter schema
//! - `scanner` - finds `{{name}}` placeholder spans inside a text body
//! - `substitute` - applies validated values to matched placeholders
//!
//! Everything here is pure text manipulation over an already-decoded document
//! part. The assembly pipeline (`crate::generation::pipeline`) owns the
//! decode/encode steps and the collaborator calls.

pub mod scanner;
pub mod substitute;
pub mod validation;

pub use scanner::{scan, MatchMode, Span};
pub use substitute::substitute;
pub use validation::{validate, ValidationError, ValidationErrors};
