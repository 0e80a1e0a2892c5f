use super::{
    control_plane_api_resource,
    error::{self, Result},
    ControlPlane, TemplateReference,
};
use crate::constants::CONTROL_PLANE_KIND;

use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::core::DynamicObject;
use snafu::ResultExt;
use std::sync::Arc;
use tracing::instrument;

#[cfg(feature = "mockall")]
use mockall::{mock, predicate::*};

#[async_trait]
/// A trait providing an interface to the cluster-api objects needed by a rolling-update renewal.
/// This is provided as a trait in order to allow mocks to be used for testing purposes.
pub trait ClusterApiClient: Send + Sync {
    /// List every control-plane object in the cluster, in API list order.
    async fn list_control_planes(&self) -> Result<Vec<DynamicObject>>;
    /// Fetch the machine template named by `reference`.
    async fn get_machine_template(&self, reference: &TemplateReference) -> Result<DynamicObject>;
    /// Create `template` as a new object of the referenced kind, in the referenced namespace.
    async fn create_machine_template(
        &self,
        reference: &TemplateReference,
        template: &DynamicObject,
    ) -> Result<DynamicObject>;
    /// Apply a JSON patch to the given control plane.
    async fn patch_control_plane(
        &self,
        control_plane: &ControlPlane,
        patch: &json_patch::Patch,
    ) -> Result<()>;
}

#[cfg(feature = "mockall")]
mock! {
    /// A Mock ClusterApiClient for use in tests.
    pub ClusterApiClient {}
    #[async_trait]
    impl ClusterApiClient for ClusterApiClient {
        async fn list_control_planes(&self) -> Result<Vec<DynamicObject>>;
        async fn get_machine_template(&self, reference: &TemplateReference) -> Result<DynamicObject>;
        async fn create_machine_template(
            &self,
            reference: &TemplateReference,
            template: &DynamicObject,
        ) -> Result<DynamicObject>;
        async fn patch_control_plane(
            &self,
            control_plane: &ControlPlane,
            patch: &json_patch::Patch,
        ) -> Result<()>;
    }
}

#[async_trait]
impl<T> ClusterApiClient for Arc<T>
where
    T: ClusterApiClient,
{
    async fn list_control_planes(&self) -> Result<Vec<DynamicObject>> {
        (**self).list_control_planes().await
    }

    async fn get_machine_template(&self, reference: &TemplateReference) -> Result<DynamicObject> {
        (**self).get_machine_template(reference).await
    }

    async fn create_machine_template(
        &self,
        reference: &TemplateReference,
        template: &DynamicObject,
    ) -> Result<DynamicObject> {
        (**self).create_machine_template(reference, template).await
    }

    async fn patch_control_plane(
        &self,
        control_plane: &ControlPlane,
        patch: &json_patch::Patch,
    ) -> Result<()> {
        (**self).patch_control_plane(control_plane, patch).await
    }
}

#[derive(Clone)]
/// Concrete implementation of the `ClusterApiClient` trait, backed by the dynamic Kubernetes API.
pub struct K8SClusterApiClient {
    k8s_client: kube::client::Client,
}

impl K8SClusterApiClient {
    pub fn new(k8s_client: kube::client::Client) -> Self {
        K8SClusterApiClient { k8s_client }
    }

    fn template_api(&self, reference: &TemplateReference) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.k8s_client.clone(),
            reference.namespace(),
            &reference.api_resource(),
        )
    }
}

#[async_trait]
impl ClusterApiClient for K8SClusterApiClient {
    #[instrument(skip(self), err)]
    async fn list_control_planes(&self) -> Result<Vec<DynamicObject>> {
        let control_planes: Api<DynamicObject> =
            Api::all_with(self.k8s_client.clone(), &control_plane_api_resource());

        let list = control_planes
            .list(&ListParams::default())
            .await
            .context(error::ListControlPlanesSnafu {
                kind: CONTROL_PLANE_KIND,
            })?;
        Ok(list.items)
    }

    #[instrument(skip(self), err)]
    async fn get_machine_template(&self, reference: &TemplateReference) -> Result<DynamicObject> {
        self.template_api(reference)
            .get(&reference.name)
            .await
            .context(error::GetMachineTemplateSnafu {
                kind: reference.kind.clone(),
                namespace: reference.namespace(),
                name: reference.name.clone(),
            })
    }

    #[instrument(skip(self, template), err)]
    async fn create_machine_template(
        &self,
        reference: &TemplateReference,
        template: &DynamicObject,
    ) -> Result<DynamicObject> {
        self.template_api(reference)
            .create(&PostParams::default(), template)
            .await
            .context(error::CreateMachineTemplateSnafu {
                kind: reference.kind.clone(),
                namespace: reference.namespace(),
                name: reference.name.clone(),
            })
    }

    #[instrument(skip(self, patch), err)]
    async fn patch_control_plane(
        &self,
        control_plane: &ControlPlane,
        patch: &json_patch::Patch,
    ) -> Result<()> {
        let control_planes: Api<DynamicObject> = Api::namespaced_with(
            self.k8s_client.clone(),
            &control_plane.namespace,
            &control_plane_api_resource(),
        );

        control_planes
            .patch(
                &control_plane.name,
                &PatchParams::default(),
                &Patch::Json::<()>(patch.clone()),
            )
            .await
            .context(error::PatchControlPlaneSnafu {
                namespace: control_plane.namespace.clone(),
                name: control_plane.name.clone(),
            })?;

        Ok(())
    }
}
