use super::{
    control_plane_label_selector,
    error::{self, Result},
    MasterNode,
};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::{Api, ListParams, PostParams};
use snafu::ResultExt;
use std::convert::TryFrom;
use std::sync::Arc;
use tracing::instrument;

#[cfg(feature = "mockall")]
use mockall::{mock, predicate::*};

#[async_trait]
/// A trait providing an interface to the node and pod operations needed by an in-place renewal.
/// This is provided as a trait in order to allow mocks to be used for testing purposes.
pub trait MaintenanceClient: Send + Sync {
    /// List every node carrying the control-plane role label, in API list order.
    async fn list_control_plane_nodes(&self) -> Result<Vec<MasterNode>>;
    /// Fetch the named node.
    async fn get_node(&self, node_name: &str) -> Result<Node>;
    /// Create a maintenance pod for the given node. Returns the pod as accepted by the API, with
    /// its generated name filled in.
    async fn create_pod(&self, node: &MasterNode, pod: &Pod) -> Result<Pod>;
    /// Fetch the named pod.
    async fn get_pod(&self, namespace: &str, pod_name: &str) -> Result<Pod>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock MaintenanceClient for use in tests.
    pub MaintenanceClient {}
    #[async_trait]
    impl MaintenanceClient for MaintenanceClient {
        async fn list_control_plane_nodes(&self) -> Result<Vec<MasterNode>>;
        async fn get_node(&self, node_name: &str) -> Result<Node>;
        async fn create_pod(&self, node: &MasterNode, pod: &Pod) -> Result<Pod>;
        async fn get_pod(&self, namespace: &str, pod_name: &str) -> Result<Pod>;
    }
}

#[async_trait]
impl<T> MaintenanceClient for Arc<T>
where
    T: MaintenanceClient,
{
    async fn list_control_plane_nodes(&self) -> Result<Vec<MasterNode>> {
        (**self).list_control_plane_nodes().await
    }

    async fn get_node(&self, node_name: &str) -> Result<Node> {
        (**self).get_node(node_name).await
    }

    async fn create_pod(&self, node: &MasterNode, pod: &Pod) -> Result<Pod> {
        (**self).create_pod(node, pod).await
    }

    async fn get_pod(&self, namespace: &str, pod_name: &str) -> Result<Pod> {
        (**self).get_pod(namespace, pod_name).await
    }
}

#[derive(Clone)]
/// Concrete implementation of the `MaintenanceClient` trait. This implementation will almost
/// certainly be used in any case that isn't a unit test.
pub struct K8SMaintenanceClient {
    k8s_client: kube::client::Client,
}

impl K8SMaintenanceClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SMaintenanceClient { k8s_client }
    }
}

#[async_trait]
impl MaintenanceClient for K8SMaintenanceClient {
    #[instrument(skip(self), err)]
    async fn list_control_plane_nodes(&self) -> Result<Vec<MasterNode>> {
        let label_selector = control_plane_label_selector();
        let nodes: Api<Node> = Api::all(self.k8s_client.clone());

        let node_list = nodes
            .list(&ListParams::default().labels(&label_selector))
            .await
            .context(error::ListNodesSnafu {
                label_selector: label_selector.clone(),
            })?;

        node_list.iter().map(MasterNode::try_from).collect()
    }

    #[instrument(skip(self), err)]
    async fn get_node(&self, node_name: &str) -> Result<Node> {
        let nodes: Api<Node> = Api::all(self.k8s_client.clone());
        nodes.get(node_name).await.context(error::GetNodeSnafu {
            node_name: node_name.to_string(),
        })
    }

    #[instrument(skip(self, pod), err)]
    async fn create_pod(&self, node: &MasterNode, pod: &Pod) -> Result<Pod> {
        let pods: Api<Pod> = match pod.metadata.namespace.as_ref() {
            Some(ns) => Api::namespaced(self.k8s_client.clone(), ns),
            None => Api::default_namespaced(self.k8s_client.clone()),
        };

        pods.create(&PostParams::default(), pod)
            .await
            .context(error::CreatePodSnafu {
                node_name: node.name().to_string(),
            })
    }

    #[instrument(skip(self), err)]
    async fn get_pod(&self, namespace: &str, pod_name: &str) -> Result<Pod> {
        let pods: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        pods.get(pod_name).await.context(error::GetPodSnafu {
            namespace: namespace.to_string(),
            pod_name: pod_name.to_string(),
        })
    }
}
