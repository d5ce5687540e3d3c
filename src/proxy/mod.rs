//! Proxying: orchestration and upstream forwarding.

pub mod engine;
pub mod upstream;

pub use engine::{EngineBuildError, ProxyEngine};
pub use upstream::{UpstreamClient, UpstreamError};
