use crate::error::{self, Result};

use models::capi::{clone_machine_template, template_name_patch, ClusterApiClient, ControlPlane};

use kube::ResourceExt;
use snafu::{OptionExt, ResultExt};
use std::convert::TryFrom;
use tracing::{event, instrument, Level};

/// What a successful rolling update changed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RollingUpdateSummary {
    pub control_plane: String,
    pub namespace: String,
    pub previous_template: String,
    pub new_template: String,
}

/// Renews certificates by handing the control plane a fresh machine template, which makes the
/// infrastructure provider replace every control-plane machine.
///
/// This is a single pass with no retries. The original template is never modified.
pub struct RollingUpdateRenewal<C: ClusterApiClient> {
    client: C,
}

impl<C: ClusterApiClient> RollingUpdateRenewal<C> {
    pub fn new(client: C) -> Self {
        RollingUpdateRenewal { client }
    }

    #[instrument(skip(self), err)]
    pub async fn renew(&self) -> Result<RollingUpdateSummary> {
        let control_plane = self.find_control_plane().await?;
        let reference = &control_plane.template;

        let template = self
            .client
            .get_machine_template(reference)
            .await
            .context(error::TemplateLookupSnafu {
                control_plane: control_plane.name.as_str(),
            })?;

        let created = self
            .client
            .create_machine_template(reference, &clone_machine_template(&template))
            .await
            .context(error::CreateTemplateSnafu {
                template: reference.to_string(),
            })?;
        let clone_name = created.metadata.name.clone().context(error::CloneWithoutNameSnafu {
            template: reference.to_string(),
        })?;
        event!(
            Level::INFO,
            template = %reference,
            clone_name = clone_name.as_str(),
            "Created machine template clone."
        );

        if let Err(source) = self
            .client
            .patch_control_plane(&control_plane, &template_name_patch(&clone_name))
            .await
        {
            event!(
                Level::ERROR,
                control_plane = control_plane.name.as_str(),
                orphaned_template = clone_name.as_str(),
                "Control plane was not updated; the machine template clone is unreferenced."
            );
            return Err(source).context(error::PatchControlPlaneSnafu {
                control_plane: control_plane.name.as_str(),
                clone_name,
            });
        }

        event!(
            Level::INFO,
            control_plane = control_plane.name.as_str(),
            previous_template = reference.name.as_str(),
            new_template = clone_name.as_str(),
            "Control plane now references the cloned machine template."
        );

        Ok(RollingUpdateSummary {
            previous_template: reference.name.clone(),
            new_template: clone_name,
            control_plane: control_plane.name,
            namespace: control_plane.namespace,
        })
    }

    /// Picks the control plane to update: the first one listed.
    async fn find_control_plane(&self) -> Result<ControlPlane> {
        let objects = self
            .client
            .list_control_planes()
            .await
            .context(error::ControlPlaneLookupSnafu)?;

        let first = objects.first().context(error::ControlPlaneNotFoundSnafu)?;
        if objects.len() > 1 {
            let candidates: Vec<String> = objects
                .iter()
                .map(|object| format!("{}/{}", object.namespace().unwrap_or_default(), object.name_any()))
                .collect();
            event!(
                Level::WARN,
                ?candidates,
                selected = first.name_any().as_str(),
                "Found more than one control-plane resource; only the first is updated."
            );
        }

        ControlPlane::try_from(first).context(error::ControlPlaneLookupSnafu)
    }
}
