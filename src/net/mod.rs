//! Network foundation: bounded connection acceptance.

pub mod listener;

pub use listener::{BoundedStream, ClientAddr, Listener, ListenerError};
