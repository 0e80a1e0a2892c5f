use crate::error::{self, Result};
use crate::poll::{Attempt, PollError, PollPolicy};
use crate::prober::is_node_healthy;

use models::constants::LABEL_CONTROL_PLANE;
use models::node::{MaintenanceClient, MasterNode};
use models::pod::{maintenance_pod, MaintenanceImage};

use k8s_openapi::api::core::v1::Pod;
use snafu::{ensure, OptionExt, ResultExt};
use tracing::{event, instrument, Level};

const POD_PHASE_SUCCEEDED: &str = "Succeeded";
const POD_PHASE_FAILED: &str = "Failed";

/// Where a single node is in its in-place renewal.
///
/// `PodFailed` and `NodeUnhealthy` are terminal for the whole run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeRenewalState {
    Pending,
    PodCreated,
    PodSucceeded,
    PodFailed,
    NodeHealthy,
    NodeUnhealthy,
}

fn pod_phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|status| status.phase.as_deref())
}

/// Renews certificates by running a maintenance pod on each control-plane node in turn.
///
/// Nodes are handled strictly one at a time: the next node is only touched once the previous
/// node's pod has succeeded and the node reports `Ready` again.
pub struct InPlaceRenewal<T: MaintenanceClient> {
    client: T,
    image: MaintenanceImage,
    poll_policy: PollPolicy,
}

impl<T: MaintenanceClient> InPlaceRenewal<T> {
    pub fn new(client: T) -> Self {
        InPlaceRenewal {
            client,
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

    /// Renews every control-plane node, returning the names of the renewed nodes in the order
    /// they were handled.
    #[instrument(skip(self), err)]
    pub async fn renew(&self, expiration_threshold: &str) -> Result<Vec<String>> {
        let nodes = self
            .client
            .list_control_plane_nodes()
            .await
            .context(error::ListNodesSnafu)?;

        ensure!(
            !nodes.is_empty(),
            error::NoControlPlaneNodesSnafu {
                label: LABEL_CONTROL_PLANE
            }
        );
        event!(
            Level::INFO,
            node_count = nodes.len(),
            "Renewing certificates on control-plane nodes one at a time."
        );

        let mut renewed = Vec::with_capacity(nodes.len());
        for node in nodes.iter() {
            self.renew_node(node, expiration_threshold).await?;
            renewed.push(node.name().to_string());
        }
        Ok(renewed)
    }

    /// Drives a single node from `Pending` to `NodeHealthy`.
    #[instrument(skip(self, node), fields(node_name = node.name()), err)]
    async fn renew_node(
        &self,
        node: &MasterNode,
        expiration_threshold: &str,
    ) -> Result<NodeRenewalState> {
        log_transition(node, NodeRenewalState::Pending);

        let pod = maintenance_pod(node, expiration_threshold, &self.image);
        let created = self
            .client
            .create_pod(node, &pod)
            .await
            .context(error::CreatePodSnafu {
                node_name: node.name(),
            })?;
        let pod_name = created
            .metadata
            .name
            .clone()
            .context(error::PodWithoutNameSnafu {
                node_name: node.name(),
            })?;
        let namespace = created
            .metadata
            .namespace
            .clone()
            .or(pod.metadata.namespace)
            .unwrap_or_default();
        log_transition(node, NodeRenewalState::PodCreated);

        let state = self.wait_for_pod(node, &namespace, &pod_name).await?;
        log_transition(node, state);

        let state = self.wait_for_node(node).await?;
        log_transition(node, state);

        Ok(state)
    }

    async fn wait_for_pod(
        &self,
        node: &MasterNode,
        namespace: &str,
        pod_name: &str,
    ) -> Result<NodeRenewalState> {
        let client = &self.client;
        let outcome = self
            .poll_policy
            .poll("maintenance pod phase", || async move {
                match client.get_pod(namespace, pod_name).await {
                    Ok(pod) => match pod_phase(&pod) {
                        Some(POD_PHASE_SUCCEEDED) => Attempt::Ready(()),
                        Some(POD_PHASE_FAILED) => Attempt::Abort,
                        _ => Attempt::NotReady,
                    },
                    Err(err) => Attempt::Transient(err),
                }
            })
            .await;

        match outcome {
            Ok(()) => Ok(NodeRenewalState::PodSucceeded),
            Err(PollError::Aborted { .. }) => {
                log_transition(node, NodeRenewalState::PodFailed);
                error::PodFailedSnafu {
                    node_name: node.name(),
                    namespace,
                    pod_name,
                }
                .fail()
            }
            Err(PollError::Exhausted { attempts }) => error::PodTimeoutSnafu {
                node_name: node.name(),
                namespace,
                pod_name,
                attempts,
            }
            .fail(),
        }
    }

    async fn wait_for_node(&self, node: &MasterNode) -> Result<NodeRenewalState> {
        let client = &self.client;
        let node_name = node.name();
        let outcome = self
            .poll_policy
            .poll("node readiness", || async move {
                match is_node_healthy(client, node_name).await {
                    Ok(true) => Attempt::Ready(()),
                    Ok(false) => Attempt::NotReady,
                    Err(err) => Attempt::Transient(err),
                }
            })
            .await;

        match outcome {
            Ok(()) => Ok(NodeRenewalState::NodeHealthy),
            Err(PollError::Exhausted { attempts }) | Err(PollError::Aborted { attempts }) => {
                log_transition(node, NodeRenewalState::NodeUnhealthy);
                error::NodeUnhealthySnafu {
                    node_name,
                    attempts,
                }
                .fail()
            }
        }
    }
}

fn log_transition(node: &MasterNode, state: NodeRenewalState) {
    match state {
        NodeRenewalState::PodFailed | NodeRenewalState::NodeUnhealthy => {
            event!(Level::ERROR, node_name = node.name(), ?state, "Node renewal failed.")
        }
        _ => event!(Level::INFO, node_name = node.name(), ?state, "Node renewal progressed."),
    }
}
