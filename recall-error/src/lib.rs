//! # recall-error
//!
//! Unified error handling for recall.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what error occurred (e.g., UnsafeExpression, EmbeddingFailed)
//! - **Error Context**: Assist in locating the cause with rich context
//! - **Error Source**: Wrap underlying errors without leaking raw types
//!
//! ## Usage
//!
//! ```rust
//! use recall_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::DimensionMismatch, "expected 384, got 768")
//!         .with_operation("memory::store_document")
//!         .with_context("doc_id", "a1b2c3"))
//! }
//! ```
//!
//! ## Principles
//!
//! - All fallible functions return `Result<T, recall_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - Same error handled once, subsequent ops only append context
//! - Don't abuse `From<OtherError>` to prevent raw error leakage

mod error;
mod kind;

pub use error::Error;
pub use kind::ErrorKind;

/// Result type alias using recall Error
pub type Result<T> = std::result::Result<T, Error>;
