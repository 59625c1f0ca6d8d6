//! Canonical request documents
//!
//! The wire shape is fixed:
//!
//! ```text
//! {"method":"<b64>","uri":"<b64>","version":"<b64>","headers":[["<b64>","<b64>"],...],"body":"<b64>"}
//! ```
//!
//! [`render`] produces it on the serving path. [`parse`] and [`diff`] read
//! documents back, for verification and for comparing the output of
//! different backends for the same input.

pub mod diff;
pub mod parse;
pub mod render;

#[cfg(test)]
mod tests;

pub use diff::{Discrepancy, diff};
pub use parse::{DocumentError, ParsedDocument, parse};
pub use render::{CanonicalDocument, render};
