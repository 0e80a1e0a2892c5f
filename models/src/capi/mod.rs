//! Cluster API objects touched by a rolling-update renewal.
//!
//! Both the control plane and its machine template are handled as `DynamicObject`s so that any
//! infrastructure provider's template kind can be cloned without a typed binding for it.
mod client;
mod error;

pub use self::client::*;
pub use self::error::Error as ClusterApiError;
use self::error::Result;

use crate::constants::{
    CAPI_VERSION, CONTROL_PLANE_GROUP, CONTROL_PLANE_KIND, CONTROL_PLANE_PLURAL,
    INFRASTRUCTURE_GROUP, TEMPLATE_NAME_PATCH_PATH,
};

use json_patch::{PatchOperation, ReplaceOperation};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};

use std::convert::TryFrom;
use std::fmt;

#[cfg(feature = "mockall")]
pub use self::client::MockClusterApiClient;

/// The `ApiResource` for the control-plane kind this system renews through.
pub fn control_plane_api_resource() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(CONTROL_PLANE_GROUP, CAPI_VERSION, CONTROL_PLANE_KIND),
        CONTROL_PLANE_PLURAL,
    )
}

/// A control plane's reference to the machine template used to provision its machines.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl TemplateReference {
    /// The `ApiResource` of the referenced template.
    ///
    /// The group and version come from the reference's `apiVersion`, falling back to the
    /// cluster-api infrastructure group. The plural is the lower-cased kind plus `s`.
    pub fn api_resource(&self) -> ApiResource {
        let (group, version) = match self.api_version.as_deref() {
            Some(api_version) => match api_version.split_once('/') {
                Some((group, version)) => (group, version),
                None => ("", api_version),
            },
            None => (INFRASTRUCTURE_GROUP, CAPI_VERSION),
        };
        let plural = format!("{}s", self.kind.to_lowercase());
        ApiResource::from_gvk_with_plural(&GroupVersionKind::gvk(group, version, &self.kind), &plural)
    }

    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or_default()
    }
}

impl fmt::Display for TemplateReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}/{}'", self.kind, self.namespace(), self.name)
    }
}

/// The fields of a control-plane resource that a rolling-update renewal reads.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ControlPlane {
    pub name: String,
    pub namespace: String,
    /// The template reference. Its namespace defaults to the control plane's own.
    pub template: TemplateReference,
}

impl TryFrom<&DynamicObject> for ControlPlane {
    type Error = ClusterApiError;

    fn try_from(object: &DynamicObject) -> Result<Self> {
        let name = object
            .metadata
            .name
            .clone()
            .context(error::MissingMetadataSnafu { field: "name" })?;
        let namespace = object
            .metadata
            .namespace
            .clone()
            .context(error::MissingMetadataSnafu { field: "namespace" })?;

        let reference = object
            .data
            .get("spec")
            .and_then(|spec| spec.get("infrastructureTemplate"))
            .context(error::MissingTemplateReferenceSnafu { name: name.clone() })?;
        let mut template: TemplateReference = serde_json::from_value(reference.clone())
            .context(error::InvalidTemplateReferenceSnafu { name: name.clone() })?;
        if template.namespace.as_deref().unwrap_or_default().is_empty() {
            template.namespace = Some(namespace.clone());
        }

        Ok(ControlPlane {
            name,
            namespace,
            template,
        })
    }
}

/// Returns a copy of `template` ready to be created as a new object.
///
/// The body is left as-is. The name and resource version are cleared and a generated-name prefix
/// derived from the original name is set, so the API server assigns the clone a fresh name.
pub fn clone_machine_template(template: &DynamicObject) -> DynamicObject {
    let mut clone = template.clone();
    let original_name = clone.metadata.name.take().unwrap_or_default();
    clone.metadata.generate_name = Some(format!("{}-", original_name));
    clone.metadata.resource_version = None;
    clone
}

/// Builds the single-operation JSON patch pointing a control plane at `template_name`.
pub fn template_name_patch(template_name: &str) -> json_patch::Patch {
    json_patch::Patch(vec![PatchOperation::Replace(ReplaceOperation {
        path: TEMPLATE_NAME_PATCH_PATH.to_string(),
        value: serde_json::Value::String(template_name.to_string()),
    })])
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn fake_control_plane(data: serde_json::Value) -> DynamicObject {
        DynamicObject::new("test-control-plane", &control_plane_api_resource())
            .within("default")
            .data(data)
    }

    #[test]
    fn test_control_plane_from_dynamic_object() {
        let object = fake_control_plane(json!({
            "spec": {
                "infrastructureTemplate": {
                    "apiVersion": "infrastructure.cluster.x-k8s.io/v1alpha3",
                    "kind": "DockerMachineTemplate",
                    "name": "test-machine-template",
                    "namespace": "capi-system",
                }
            }
        }));

        let control_plane = ControlPlane::try_from(&object).unwrap();
        assert_eq!(control_plane.name, "test-control-plane");
        assert_eq!(control_plane.namespace, "default");
        assert_eq!(control_plane.template.kind, "DockerMachineTemplate");
        assert_eq!(control_plane.template.name, "test-machine-template");
        assert_eq!(control_plane.template.namespace(), "capi-system");
    }

    #[test]
    fn test_template_namespace_defaults_to_control_plane() {
        let object = fake_control_plane(json!({
            "spec": {
                "infrastructureTemplate": {
                    "kind": "Metal3MachineTemplate",
                    "name": "cp-template",
                }
            }
        }));

        let control_plane = ControlPlane::try_from(&object).unwrap();
        assert_eq!(control_plane.template.namespace(), "default");
    }

    #[test]
    fn test_control_plane_without_reference() {
        let object = fake_control_plane(json!({ "spec": {} }));
        assert!(matches!(
            ControlPlane::try_from(&object),
            Err(ClusterApiError::MissingTemplateReference { .. })
        ));

        let object = fake_control_plane(json!({
            "spec": { "infrastructureTemplate": { "name": "no-kind" } }
        }));
        assert!(matches!(
            ControlPlane::try_from(&object),
            Err(ClusterApiError::InvalidTemplateReference { .. })
        ));
    }

    #[test]
    fn test_template_api_resource() {
        let test_cases = vec![
            (
                None,
                "DockerMachineTemplate",
                ("infrastructure.cluster.x-k8s.io", "v1alpha3", "dockermachinetemplates"),
            ),
            (
                Some("infrastructure.cluster.x-k8s.io/v1alpha4"),
                "Metal3MachineTemplate",
                ("infrastructure.cluster.x-k8s.io", "v1alpha4", "metal3machinetemplates"),
            ),
        ];

        for (api_version, kind, (group, version, plural)) in test_cases {
            let reference = TemplateReference {
                api_version: api_version.map(str::to_string),
                kind: kind.to_string(),
                name: "t".to_string(),
                namespace: None,
            };
            let ar = reference.api_resource();
            assert_eq!(ar.group, group);
            assert_eq!(ar.version, version);
            assert_eq!(ar.plural, plural);
            assert_eq!(ar.kind, kind);
        }
    }

    #[test]
    fn test_clone_machine_template() {
        let reference = TemplateReference {
            api_version: None,
            kind: "DockerMachineTemplate".to_string(),
            name: "test-machine-template".to_string(),
            namespace: Some("default".to_string()),
        };
        let mut original = DynamicObject::new("test-machine-template", &reference.api_resource())
            .within("default")
            .data(json!({ "spec": { "template": { "spec": { "customImage": "kindest/node" } } } }));
        original.metadata.resource_version = Some("12345".to_string());

        let clone = clone_machine_template(&original);

        assert!(clone.metadata.name.is_none());
        assert!(clone.metadata.resource_version.is_none());
        assert_eq!(
            clone.metadata.generate_name.as_deref(),
            Some("test-machine-template-")
        );
        assert_eq!(clone.metadata.namespace, original.metadata.namespace);
        assert_eq!(clone.types, original.types);
        assert_eq!(clone.data, original.data);
        // The original is left untouched.
        assert_eq!(original.metadata.name.as_deref(), Some("test-machine-template"));
        assert_eq!(original.metadata.resource_version.as_deref(), Some("12345"));
    }

    #[test]
    fn test_template_name_patch() {
        let patch = template_name_patch("test-machine-template-x7k2p");
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!([{
                "op": "replace",
                "path": "/spec/infrastructureTemplate/name",
                "value": "test-machine-template-x7k2p",
            }])
        );
    }
}
