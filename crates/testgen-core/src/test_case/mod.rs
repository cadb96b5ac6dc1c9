//! Test case domain module.

mod model;

pub use model::{Priority, TestCase, TestCaseStatus, TestKind, TestStep};
