//! Error types and layer-policy classification for the discovery crate.
//!
//! This module provides:
//! - [`DiscoveryError`]: The main error enum for all discovery operations
//! - [`LayerPolicy`]: Classification for determining pipeline behaviour

mod policy;

pub use policy::LayerPolicy;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during area discovery.
///
/// Each variant is classified into a [`LayerPolicy`] via the
/// [`layer_policy`](Self::layer_policy) method, which determines how the
/// orchestrator should handle the error.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The provider's request budget is exhausted.
    /// The caller should wait the advised duration or skip the layer.
    #[error("Rate limited: {provider} (retry after {retry_after:?})")]
    RateLimited {
        /// The provider whose budget is exhausted
        provider: String,
        /// How long until the sliding window frees a slot
        retry_after: Duration,
    },

    /// The request to the provider timed out.
    #[error("Timeout: {provider}")]
    Timeout {
        /// The provider that timed out
        provider: String,
    },

    /// The provider returned a non-2xx status or an API-reported error payload.
    /// Logged, the layer is skipped, the pipeline continues.
    #[error("Provider error: {provider} - {message}")]
    Http {
        /// The provider that returned the error
        provider: String,
        /// The error message from the provider
        message: String,
    },

    /// The provider returned a payload that could not be decoded into the
    /// expected envelope.
    #[error("Malformed response from {provider}: {message}")]
    Malformed {
        /// The provider that returned the payload
        provider: String,
        /// Description of the decode failure
        message: String,
    },

    /// The operation is not supported by this provider.
    /// Try the next provider that advertises the capability.
    #[error("Operation '{operation}' not supported by provider: {provider}")]
    Unsupported {
        /// The operation that was requested
        operation: String,
        /// The provider that does not support it
        provider: String,
    },

    /// The caller cancelled the run before it completed.
    #[error("Discovery cancelled")]
    Cancelled,

    /// Every layer failed, including the synthetic grid.
    /// Only possible when the entity carries no usable coordinates.
    /// This is terminal and surfaced to the caller.
    #[error("No candidates found for entity: {entity}")]
    NoCandidatesFound {
        /// The entity that could not seed any layer
        entity: String,
    },

    /// A network error occurred while communicating with a provider.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl DiscoveryError {
    /// Returns the layer policy for this error.
    ///
    /// - [`LayerPolicy::SkipLayer`]: the layer contributed nothing; log and
    ///   move on to the next layer
    /// - [`LayerPolicy::Fatal`]: abort the run and surface the error
    ///
    /// # Examples
    ///
    /// ```
    /// use geoscout::errors::{DiscoveryError, LayerPolicy};
    ///
    /// let error = DiscoveryError::Timeout { provider: "GEONAMES".to_string() };
    /// assert_eq!(error.layer_policy(), LayerPolicy::SkipLayer);
    ///
    /// let error = DiscoveryError::NoCandidatesFound { entity: "Atlantis".to_string() };
    /// assert_eq!(error.layer_policy(), LayerPolicy::Fatal);
    /// ```
    pub fn layer_policy(&self) -> LayerPolicy {
        match self {
            // Provider-level failures downgrade to "this layer contributed
            // nothing"
            Self::RateLimited { .. }
            | Self::Timeout { .. }
            | Self::Http { .. }
            | Self::Malformed { .. }
            | Self::Unsupported { .. }
            | Self::Network(_) => LayerPolicy::SkipLayer,

            // Total pipeline failure or caller abort
            Self::Cancelled | Self::NoCandidatesFound { .. } => LayerPolicy::Fatal,
        }
    }
}
