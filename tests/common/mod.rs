//! Common test utilities for docflow-client integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod backend;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use backend::*;
