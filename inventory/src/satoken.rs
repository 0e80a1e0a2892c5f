use crate::error::{self, Result};

use models::constants::SECRET_TYPE_SA_TOKEN;
use models::inventory::{InventoryClient, SecretQuery};

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use serde::Serialize;
use snafu::{ensure, ResultExt};
use tracing::{event, instrument, Level};

/// A rotated token Secret and the Pods restarted because they mounted it.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotatedToken {
    pub secret_name: String,
    pub deleted_pods: Vec<String>,
}

fn mounts_volume(pod: &Pod, volume_name: &str) -> bool {
    pod.spec
        .as_ref()
        .and_then(|spec| spec.volumes.as_ref())
        .map(|volumes| volumes.iter().any(|volume| volume.name == volume_name))
        .unwrap_or(false)
}

/// Rotates service-account tokens by deleting their Secrets, then deleting the Pods that mount
/// them so they restart with the token the controller issues in its place.
pub struct TokenRotation<T: InventoryClient> {
    client: T,
}

impl<T: InventoryClient> TokenRotation<T> {
    pub fn new(client: T) -> Self {
        TokenRotation { client }
    }

    /// Rotates the named token Secret, or every token Secret in `namespace` when no name is given.
    #[instrument(skip(self), err)]
    pub async fn rotate(
        &self,
        namespace: &str,
        secret_name: Option<&str>,
    ) -> Result<Vec<RotatedToken>> {
        let names = match secret_name {
            Some(name) => {
                let secret = self
                    .client
                    .get_secret(namespace, name)
                    .await
                    .context(error::InventorySnafu)?;
                ensure!(
                    secret.type_.as_deref() == Some(SECRET_TYPE_SA_TOKEN),
                    error::NotServiceAccountTokenSnafu { name }
                );
                vec![name.to_string()]
            }
            None => {
                let secrets = self
                    .client
                    .list_secrets(
                        &SecretQuery::all()
                            .in_namespace(namespace)
                            .of_type(SECRET_TYPE_SA_TOKEN),
                    )
                    .await
                    .context(error::InventorySnafu)?;
                ensure!(!secrets.is_empty(), error::NoTokensSnafu { namespace });
                secrets.iter().map(|secret| secret.name_any()).collect()
            }
        };

        let mut rotated = Vec::with_capacity(names.len());
        for name in names {
            rotated.push(self.rotate_one(namespace, &name).await?);
        }
        Ok(rotated)
    }

    async fn rotate_one(&self, namespace: &str, secret_name: &str) -> Result<RotatedToken> {
        event!(Level::INFO, namespace, secret_name, "Rotating token.");
        self.client
            .delete_secret(namespace, secret_name)
            .await
            .context(error::InventorySnafu)?;

        let pods = self
            .client
            .list_pods(namespace)
            .await
            .context(error::InventorySnafu)?;

        let mut deleted_pods = Vec::new();
        for pod in pods.iter().filter(|pod| mounts_volume(pod, secret_name)) {
            let pod_name = pod.name_any();
            event!(Level::INFO, namespace, pod_name = pod_name.as_str(), "Deleting pod.");
            self.client
                .delete_pod(namespace, &pod_name)
                .await
                .context(error::InventorySnafu)?;
            deleted_pods.push(pod_name);
        }

        Ok(RotatedToken {
            secret_name: secret_name.to_string(),
            deleted_pods,
        })
    }
}
