//! Shared utility functions.

pub mod lenient;
