//! Domain model and lifecycle for the test generation session store.
//!
//! A [`session::Session`] owns requirements, which own test cases. All
//! mutations go through the record store methods on `Session`; persistence is
//! abstracted behind [`session::SessionRepository`] and sequenced by
//! [`session::SessionManager`].

pub mod classification;
pub mod error;
pub mod fingerprint;
pub mod limits;
pub mod requirement;
pub mod sanitizer;
pub mod session;
pub mod test_case;

// Re-export common error type
pub use error::{Result, TestGenError};
