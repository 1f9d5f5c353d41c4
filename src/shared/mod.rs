//! Cross-cutting utilities

pub mod shutdown;
