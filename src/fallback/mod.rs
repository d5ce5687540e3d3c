//! Canned responses served when an upstream is open-circuited or failing.

pub mod registry;

pub use registry::{FallbackRegistry, FallbackResponse};
