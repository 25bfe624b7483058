//! Shared infrastructure for the Vesper compiler.
//!
//! Currently this is just source positions: [`Span`] byte offsets and the
//! [`LineIndex`] used to turn them into human-readable line/column pairs.

pub mod span;

pub use span::{LineIndex, Span};
