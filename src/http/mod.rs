//! HTTP surface: server assembly, middleware, response constructors.

pub mod request_id;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
