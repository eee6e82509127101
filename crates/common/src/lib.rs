//! Common utilities and shared types for samvad.
//!
//! This crate provides foundational components used across all samvad crates:
//!
//! - **Configuration**: Application settings via [`Config`]
//! - **Error handling**: Unified error types via [`AppError`] and [`AppResult`]
//! - **ID Generation**: ULID primary keys, report numbers and staff ids via [`IdGenerator`]
//! - **Storage**: File storage backends for uploaded photos
//!
//! # Example
//!
//! ```no_run
//! use samvad_common::{Config, IdGenerator, AppResult};
//!
//! fn example() -> AppResult<()> {
//!     let config = Config::load()?;
//!     let id_gen = IdGenerator::new();
//!     let number = id_gen.generate_report_number();
//!     println!("Listening on {}, next report {number}", config.bind_address());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod id;
pub mod storage;

pub use config::Config;
pub use error::{AppError, AppResult, FieldError};
pub use id::IdGenerator;
pub use storage::{LocalStorage, StorageBackend, StoredFile};
