//! Output helpers for the wg commands.

pub use wgctl::output::formatting::{format_bytes, format_time_ago};
