//! Data models for Rota

mod lease;
mod schedule;

pub use lease::*;
pub use schedule::*;
