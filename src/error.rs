//! Error types for route building, tracking and provider lookups.

use thiserror::Error;

/// Errors produced by the guidance engine and its providers.
///
/// Route construction errors propagate to whoever called `start`. Reroute
/// failures are absorbed by the engine (the previous route stays active) and
/// only surface as status text.
#[derive(Debug, Error, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error), uniffi(flat_error))]
pub enum NavError {
    /// The provider returned no usable geometry or steps.
    #[error("no usable route: {0}")]
    RouteEmpty(String),

    /// A reroute fetch failed; the previous route remains authoritative.
    #[error("reroute failed: {0}")]
    RerouteFailed(String),

    /// A position sample had a missing or non-finite coordinate.
    #[error("position sample rejected")]
    SampleRejected,

    /// The position source cannot be used at all.
    #[error("position source unavailable: {0}")]
    SourceUnavailable(String),

    /// Place search returned no candidates for the query.
    #[error("destination not found: {0}")]
    PlaceNotFound(String),

    /// Transport, HTTP status or decoding failure talking to a provider.
    #[error("provider error: {0}")]
    Provider(String),
}
