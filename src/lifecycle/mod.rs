//! Process lifecycle: startup, signals, shutdown.

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
