//! Multi-platform broadcast provisioning
//!
//! One task per requested platform, each bounded by the per-platform
//! timeout. A failing platform never affects the others; the call only
//! fails when every requested platform failed.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use relaycast_core::{Destination, StreamOptions};

use crate::credentials::CredentialProvider;
use crate::error::{FanoutError, PlatformError};
use crate::registry::IntegrationRegistry;

/// A broadcast provisioned on one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedDestination {
    pub destination: Destination,
    pub broadcast_id: String,
    pub watch_url: String,
}

/// Result for one requested platform.
#[derive(Debug)]
pub struct PlatformResult {
    /// Requested name, lower-cased.
    pub platform: String,
    pub outcome: Result<ProvisionedDestination, PlatformError>,
}

/// Per-platform results in request order. At least one succeeded unless the
/// request was empty.
#[derive(Debug, Default)]
pub struct FanoutOutcome {
    pub results: Vec<PlatformResult>,
}

impl FanoutOutcome {
    /// Destinations of the successful platforms, in request order.
    #[must_use]
    pub fn destinations(&self) -> Vec<Destination> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .map(|p| p.destination.clone())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PlatformError)> {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().err().map(|e| (r.platform.as_str(), e)))
    }

    /// Some platforms failed while others succeeded.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.failures().next().is_some()
    }
}

pub struct PlatformFanout {
    integrations: Arc<IntegrationRegistry>,
    credentials: Arc<dyn CredentialProvider>,
    platform_timeout: Duration,
}

impl PlatformFanout {
    #[must_use]
    pub fn new(
        integrations: Arc<IntegrationRegistry>,
        credentials: Arc<dyn CredentialProvider>,
        platform_timeout: Duration,
    ) -> Self {
        Self {
            integrations,
            credentials,
            platform_timeout,
        }
    }

    /// Provision one broadcast per entry of `platforms`, concurrently.
    pub async fn create_multi_stream(
        &self,
        platforms: &[String],
        options: &StreamOptions,
    ) -> Result<FanoutOutcome, FanoutError> {
        if platforms.is_empty() {
            return Ok(FanoutOutcome::default());
        }

        let options = Arc::new(options.clone());
        let names: Vec<String> = platforms.iter().map(|p| p.trim().to_ascii_lowercase()).collect();

        let handles = names.iter().map(|name| {
            let name = name.clone();
            let integrations = Arc::clone(&self.integrations);
            let credentials = Arc::clone(&self.credentials);
            let options = Arc::clone(&options);
            let limit = self.platform_timeout;

            tokio::spawn(async move {
                match tokio::time::timeout(limit, provision(&integrations, credentials.as_ref(), &name, &options)).await {
                    Ok(result) => result,
                    Err(_) => Err(PlatformError::Timeout(limit)),
                }
            })
        });
        let joined = join_all(handles).await;

        let results: Vec<PlatformResult> = names
            .into_iter()
            .zip(joined)
            .map(|(platform, joined)| {
                let outcome = joined.unwrap_or_else(|e| Err(PlatformError::Join(e.to_string())));
                match &outcome {
                    Ok(provisioned) => info!(
                        platform = %platform,
                        broadcast_id = %provisioned.broadcast_id,
                        "Platform broadcast provisioned"
                    ),
                    Err(e) => warn!(platform = %platform, error = %e, "Platform broadcast failed"),
                }
                PlatformResult { platform, outcome }
            })
            .collect();

        if results.iter().all(|r| r.outcome.is_err()) {
            let failures = results
                .into_iter()
                .filter_map(|r| r.outcome.err().map(|e| (r.platform, e)))
                .collect();
            return Err(FanoutError::AllFailed(failures));
        }

        Ok(FanoutOutcome { results })
    }
}

async fn provision(
    integrations: &IntegrationRegistry,
    credentials: &dyn CredentialProvider,
    name: &str,
    options: &StreamOptions,
) -> Result<ProvisionedDestination, PlatformError> {
    let integration = integrations.get(name)?;
    let platform = integration.platform();
    let credential = credentials.credential(platform).await?;
    let broadcast = integration.create_broadcast(&credential, options).await?;

    Ok(ProvisionedDestination {
        destination: Destination::new(platform.as_str(), platform.ingest_base_url(), broadcast.stream_key),
        broadcast_id: broadcast.broadcast_id,
        watch_url: broadcast.watch_url,
    })
}
