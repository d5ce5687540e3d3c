//! Static fallback responses.
//!
//! # Responsibilities
//! - Hold configured fallback bodies keyed by id
//! - Serve lookups for routes whose breaker is open or upstream failed
//!
//! # Design Decisions
//! - Read-only after load; a reload builds a new registry
//! - A missing id is a normal outcome (caller substitutes a generic 502),
//!   not an error; dangling route references are logged once at build

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::schema::{FallbackConfig, RouteConfig};

/// A canned response served in place of an upstream call.
#[derive(Debug, Clone)]
pub struct FallbackResponse {
    pub id: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Immutable id → fallback map for one engine generation.
#[derive(Debug, Default)]
pub struct FallbackRegistry {
    responses: HashMap<String, Arc<FallbackResponse>>,
}

impl FallbackRegistry {
    /// Build the registry and warn about route references that resolve
    /// to nothing; those routes will serve a generic 502 instead.
    pub fn from_config(fallbacks: &[FallbackConfig], routes: &[RouteConfig]) -> Self {
        let responses: HashMap<String, Arc<FallbackResponse>> = fallbacks
            .iter()
            .map(|f| {
                (
                    f.id.clone(),
                    Arc::new(FallbackResponse {
                        id: f.id.clone(),
                        status: f.status,
                        content_type: f.content_type.clone(),
                        body: f.body.clone(),
                    }),
                )
            })
            .collect();

        for route in routes {
            if let Some(id) = &route.fallback_id {
                if !responses.contains_key(id) {
                    tracing::warn!(
                        route = %route.id,
                        fallback_id = %id,
                        "Route references an unregistered fallback; it will serve 502"
                    );
                }
            }
        }

        Self { responses }
    }

    /// Look up a fallback by id. `None` is a normal outcome.
    pub fn lookup(&self, id: &str) -> Option<Arc<FallbackResponse>> {
        self.responses.get(id).cloned()
    }

    /// Number of registered fallbacks.
    pub fn len(&self) -> usize {
        self.responses.len()
    }

    /// True when no fallbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}
