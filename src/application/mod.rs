//! Application services: the rendering pipeline and its error surface.

pub mod error;
pub mod render;
