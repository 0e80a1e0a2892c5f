use super::{
    error::{self, Result},
    SecretQuery,
};

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, Pod, Secret};
use kube::api::{Api, DeleteParams, ListParams};
use snafu::ResultExt;
use std::sync::Arc;
use tracing::instrument;

#[cfg(feature = "mockall")]
use mockall::{mock, predicate::*};

/// Deletions issued by token rotation skip the grace period.
fn immediate_delete() -> DeleteParams {
    DeleteParams {
        grace_period_seconds: Some(0),
        ..Default::default()
    }
}

#[async_trait]
/// A trait providing an interface to the core objects read by the certificate inventory and token rotation.
/// This is provided as a trait in order to allow mocks to be used for testing purposes.
pub trait InventoryClient: Send + Sync {
    /// List the Secrets matching `query`.
    async fn list_secrets(&self, query: &SecretQuery) -> Result<Vec<Secret>>;
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()>;
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;
    async fn list_nodes(&self) -> Result<Vec<Node>>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock InventoryClient for use in tests.
    pub InventoryClient {}
    #[async_trait]
    impl InventoryClient for InventoryClient {
        async fn list_secrets(&self, query: &SecretQuery) -> Result<Vec<Secret>>;
        async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret>;
        async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()>;
        async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>>;
        async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;
        async fn list_nodes(&self) -> Result<Vec<Node>>;
    }
}

#[async_trait]
impl<T> InventoryClient for Arc<T>
where
    T: InventoryClient,
{
    async fn list_secrets(&self, query: &SecretQuery) -> Result<Vec<Secret>> {
        (**self).list_secrets(query).await
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        (**self).get_secret(namespace, name).await
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        (**self).delete_secret(namespace, name).await
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        (**self).list_pods(namespace).await
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        (**self).delete_pod(namespace, name).await
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        (**self).list_nodes().await
    }
}

#[derive(Clone)]
/// Concrete implementation of the `InventoryClient` trait.
pub struct K8SInventoryClient {
    k8s_client: kube::client::Client,
}

impl K8SInventoryClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SInventoryClient { k8s_client }
    }
}

#[async_trait]
impl InventoryClient for K8SInventoryClient {
    #[instrument(skip(self), err)]
    async fn list_secrets(&self, query: &SecretQuery) -> Result<Vec<Secret>> {
        let secrets: Api<Secret> = match query.namespace.as_ref() {
            Some(ns) => Api::namespaced(self.k8s_client.clone(), ns),
            None => Api::all(self.k8s_client.clone()),
        };
        let mut params = ListParams::default();
        if let Some(selector) = query.field_selector() {
            params = params.fields(&selector);
        }

        let list = secrets
            .list(&params)
            .await
            .context(error::ListSecretsSnafu {
                scope: query.scope(),
            })?;
        Ok(list.items)
    }

    #[instrument(skip(self), err)]
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Secret> {
        let secrets: Api<Secret> = Api::namespaced(self.k8s_client.clone(), namespace);
        secrets.get(name).await.context(error::GetSecretSnafu {
            namespace: namespace.to_string(),
            name: name.to_string(),
        })
    }

    #[instrument(skip(self), err)]
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        let secrets: Api<Secret> = Api::namespaced(self.k8s_client.clone(), namespace);
        secrets
            .delete(name, &immediate_delete())
            .await
            .context(error::DeleteSecretSnafu {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>> {
        let pods: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        let list = pods
            .list(&ListParams::default())
            .await
            .context(error::ListPodsSnafu {
                namespace: namespace.to_string(),
            })?;
        Ok(list.items)
    }

    #[instrument(skip(self), err)]
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        let pods: Api<Pod> = Api::namespaced(self.k8s_client.clone(), namespace);
        pods.delete(name, &immediate_delete())
            .await
            .context(error::DeletePodSnafu {
                namespace: namespace.to_string(),
                name: name.to_string(),
            })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let nodes: Api<Node> = Api::all(self.k8s_client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .context(error::ListAllNodesSnafu)?;
        Ok(list.items)
    }
}
