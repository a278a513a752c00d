//! Utility functions for display formatting.

pub mod format;

pub use format::{format_date, format_peso, format_phone, truncate_string};
