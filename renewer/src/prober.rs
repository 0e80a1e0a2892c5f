use crate::error::{self, Result};
use models::node::{node_is_ready, MaintenanceClient};

use snafu::ResultExt;
use tracing::{event, instrument, Level};

/// Checks whether a node reports itself `Ready`.
///
/// API failures are returned as lookup errors. Callers that poll decide whether they are fatal.
#[instrument(skip(client), err)]
pub async fn is_node_healthy<T>(client: &T, node_name: &str) -> Result<bool>
where
    T: MaintenanceClient + ?Sized,
{
    let node = client
        .get_node(node_name)
        .await
        .context(error::NodeLookupSnafu { node_name })?;

    let healthy = node_is_ready(&node);
    event!(Level::DEBUG, node_name, healthy, "Probed node health.");
    Ok(healthy)
}
