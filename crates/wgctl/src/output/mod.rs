//! Human-readable formatting for CLI output.
//!
//! Gated behind the `output` feature so library users who only want the
//! protocol layer do not carry it.

pub mod formatting;
