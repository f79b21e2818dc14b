//! Core math modules.

pub mod gamma;
pub mod sampling;
pub mod stable;
