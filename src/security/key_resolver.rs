//! Rate-limit partition key extraction.
//!
//! # Responsibilities
//! - Parse the configured strategy selector string
//! - Resolve a partition key from request attributes
//!
//! # Design Decisions
//! - Resolution is a pure function of headers + peer address: no I/O,
//!   no suspension, no failure path
//! - A missing attribute resolves to the configured `fallback_key`, so
//!   the catch-all partition is a visible policy choice
//! - The default `constant:<key>` strategy makes limiting global across
//!   clients, matching the deployment this gateway replaces

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName};
use thiserror::Error;

use crate::config::schema::ResolverConfig;

/// Error parsing a strategy selector string.
#[derive(Debug, Error)]
pub enum StrategyParseError {
    #[error("unknown strategy {0:?} (expected header:<name>, remote-ip, or constant[:<value>])")]
    Unknown(String),

    #[error("header strategy requires a header name (header:<name>)")]
    MissingHeaderName,

    #[error("{0:?} is not a valid header name")]
    InvalidHeaderName(String),
}

/// A parsed key-resolution strategy.
#[derive(Debug, Clone)]
pub enum KeyStrategy {
    /// Key is the value of the named request header.
    Header(HeaderName),
    /// Key is the peer IP address.
    RemoteIp,
    /// Every request shares one key (global limiting).
    Constant(String),
}

impl KeyStrategy {
    /// Parse a selector string: `header:<name>`, `remote-ip`, or
    /// `constant[:<value>]`.
    pub fn parse(selector: &str) -> Result<Self, StrategyParseError> {
        match selector.split_once(':') {
            Some(("header", name)) => {
                if name.is_empty() {
                    return Err(StrategyParseError::MissingHeaderName);
                }
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| StrategyParseError::InvalidHeaderName(name.to_string()))?;
                Ok(KeyStrategy::Header(name))
            }
            Some(("constant", value)) => Ok(KeyStrategy::Constant(value.to_string())),
            None if selector == "remote-ip" => Ok(KeyStrategy::RemoteIp),
            None if selector == "constant" => Ok(KeyStrategy::Constant("constant".to_string())),
            None if selector == "header" => Err(StrategyParseError::MissingHeaderName),
            _ => Err(StrategyParseError::Unknown(selector.to_string())),
        }
    }
}

/// Resolves the rate-limit partition key for a request.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    strategy: KeyStrategy,
    fallback_key: String,
}

impl KeyResolver {
    /// Build a resolver from a validated config.
    pub fn from_config(config: &ResolverConfig) -> Result<Self, StrategyParseError> {
        Ok(Self {
            strategy: KeyStrategy::parse(&config.strategy)?,
            fallback_key: config.fallback_key.clone(),
        })
    }

    /// Resolve the partition key. Infallible and non-blocking.
    pub fn resolve(&self, headers: &HeaderMap, peer: SocketAddr) -> String {
        match &self.strategy {
            KeyStrategy::Header(name) => headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| self.fallback_key.clone()),
            KeyStrategy::RemoteIp => peer.ip().to_string(),
            KeyStrategy::Constant(key) => key.clone(),
        }
    }
}
