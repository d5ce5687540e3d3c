//! Request routing subsystem.
//!
//! # Responsibilities
//! - Match incoming requests against configured conditions
//! - Resolve the target route (upstream + policy bundle) or report no-match
//!
//! # Design Decisions
//! - Matchers are pure functions of the request (deterministic, reload-safe)
//! - The table is immutable after construction; a reload builds and swaps
//!   a whole new table, never mutating the live one

pub mod matcher;
pub mod table;

pub use table::{Route, RouteBuildError, RouteTable};
