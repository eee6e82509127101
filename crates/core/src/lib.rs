//! Core business logic for samvad.

pub mod services;

pub use services::*;
