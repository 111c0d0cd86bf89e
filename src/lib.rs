//! Theme-driven Markdown to inline-styled HTML rendering.

pub mod application;
pub mod config;
pub mod infra;
