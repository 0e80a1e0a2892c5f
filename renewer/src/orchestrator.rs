use crate::error::{self, Result};
use crate::inplace::InPlaceRenewal;
use crate::poll::PollPolicy;
use crate::rolling::{RollingUpdateRenewal, RollingUpdateSummary};

use models::capi::ClusterApiClient;
use models::node::MaintenanceClient;
use models::pod::MaintenanceImage;

use async_trait::async_trait;
use snafu::ResultExt;
use std::fmt;
use tracing::{event, instrument, Level};

/// Which renewal strategy to run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RenewalMode {
    InPlace,
    RollingUpdate,
}

impl From<bool> for RenewalMode {
    /// Maps the `--renew-in-place` flag onto a mode.
    fn from(renew_in_place: bool) -> Self {
        if renew_in_place {
            RenewalMode::InPlace
        } else {
            RenewalMode::RollingUpdate
        }
    }
}

impl fmt::Display for RenewalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenewalMode::InPlace => write!(f, "in-place"),
            RenewalMode::RollingUpdate => write!(f, "rolling-update"),
        }
    }
}

/// What a successful renewal did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RenewalOutcome {
    InPlace { renewed_nodes: Vec<String> },
    RollingUpdate(RollingUpdateSummary),
}

#[async_trait]
/// A way of renewing control-plane certificates.
pub trait RenewalStrategy: Send + Sync {
    /// Renews certificates expiring within `expiration_threshold`. Errors are wrapped with the
    /// failing strategy.
    async fn renew(&self, expiration_threshold: &str) -> Result<RenewalOutcome>;
}

#[async_trait]
impl<T: MaintenanceClient> RenewalStrategy for InPlaceRenewal<T> {
    async fn renew(&self, expiration_threshold: &str) -> Result<RenewalOutcome> {
        let renewed_nodes = InPlaceRenewal::renew(self, expiration_threshold)
            .await
            .context(error::InPlaceSnafu)?;
        Ok(RenewalOutcome::InPlace { renewed_nodes })
    }
}

#[async_trait]
impl<C: ClusterApiClient> RenewalStrategy for RollingUpdateRenewal<C> {
    async fn renew(&self, expiration_threshold: &str) -> Result<RenewalOutcome> {
        // Replacing machines reissues every certificate, so the threshold has no effect here.
        event!(
            Level::DEBUG,
            expiration_threshold,
            "Rolling update renews all certificates."
        );
        let summary = RollingUpdateRenewal::renew(self)
            .await
            .context(error::RollingUpdateSnafu)?;
        Ok(RenewalOutcome::RollingUpdate(summary))
    }
}

/// Checks that `expiration_threshold` is a duration string such as `24h` or `3d 12h`.
pub fn validate_threshold(expiration_threshold: &str) -> Result<()> {
    humantime::parse_duration(expiration_threshold).context(error::ConfigSnafu {
        threshold: expiration_threshold,
    })?;
    Ok(())
}

/// Builds the strategy for the requested mode and runs it.
pub struct RenewalOrchestrator<T, C>
where
    T: MaintenanceClient + Clone + 'static,
    C: ClusterApiClient + Clone + 'static,
{
    maintenance_client: T,
    cluster_api_client: C,
    image: MaintenanceImage,
    poll_policy: PollPolicy,
}

impl<T, C> RenewalOrchestrator<T, C>
where
    T: MaintenanceClient + Clone + 'static,
    C: ClusterApiClient + Clone + 'static,
{
    pub fn new(maintenance_client: T, cluster_api_client: C) -> Self {
        RenewalOrchestrator {
            maintenance_client,
            cluster_api_client,
            image: MaintenanceImage::default(),
            poll_policy: PollPolicy::default(),
        }
    }

    pub fn with_image(mut self, image: MaintenanceImage) -> Self {
        self.image = image;
        self
    }

    pub fn with_poll_policy(mut self, poll_policy: PollPolicy) -> Self {
        self.poll_policy = poll_policy;
        self
    }

    /// Returns the strategy implementing `mode`.
    pub fn strategy(&self, mode: RenewalMode) -> Box<dyn RenewalStrategy> {
        match mode {
            RenewalMode::InPlace => Box::new(
                InPlaceRenewal::new(self.maintenance_client.clone())
                    .with_image(self.image.clone())
                    .with_poll_policy(self.poll_policy),
            ),
            RenewalMode::RollingUpdate => {
                Box::new(RollingUpdateRenewal::new(self.cluster_api_client.clone()))
            }
        }
    }

    #[instrument(skip(self), err)]
    pub async fn renew(
        &self,
        mode: RenewalMode,
        expiration_threshold: &str,
    ) -> Result<RenewalOutcome> {
        validate_threshold(expiration_threshold)?;

        event!(Level::INFO, %mode, expiration_threshold, "Starting certificate renewal.");
        self.strategy(mode).renew(expiration_threshold).await
    }
}
