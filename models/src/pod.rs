use crate::constants::{
    APP_COMPONENT, APP_MANAGED_BY, APP_NAME, CONTAINER_RUNTIME_SOCKET, MAINTENANCE_BINARY,
    MAINTENANCE_COMPONENT, MAINTENANCE_IMAGE, MAINTENANCE_NAMESPACE, PKI_HOST_PATH, RENEWCTL,
    TAINT_CONTROL_PLANE, TAINT_MASTER,
};
use crate::node::MasterNode;

use k8s_openapi::api::core::v1::{
    Capabilities, Container, HostPathVolumeSource, Pod, PodSpec, SecurityContext, Toleration,
    Volume, VolumeMount,
};
use kube::api::ObjectMeta;
use maplit::btreemap;

const PKI_VOLUME: &str = "pki";
const RUNTIME_SOCKET_VOLUME: &str = "container-runtime-socket";

/// Image and binary used by maintenance pods.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MaintenanceImage {
    pub image: String,
    pub binary: String,
}

impl Default for MaintenanceImage {
    fn default() -> Self {
        MaintenanceImage {
            image: MAINTENANCE_IMAGE.to_string(),
            binary: MAINTENANCE_BINARY.to_string(),
        }
    }
}

/// The generated-name prefix for the maintenance pod targeting `node_name`.
pub fn maintenance_pod_prefix(node_name: &str) -> String {
    format!("{}-{}-", MAINTENANCE_COMPONENT, node_name)
}

/// Defines the maintenance pod which renews certificates on a single control-plane node.
///
/// The pod is pinned through `spec.nodeName` rather than a node selector so that it can only ever
/// land on `node`, and it is never restarted: a failed renewal needs an operator, not a retry.
pub fn maintenance_pod(
    node: &MasterNode,
    expiration_threshold: &str,
    image: &MaintenanceImage,
) -> Pod {
    Pod {
        metadata: ObjectMeta {
            generate_name: Some(maintenance_pod_prefix(node.name())),
            namespace: Some(MAINTENANCE_NAMESPACE.to_string()),
            labels: Some(
                btreemap! {
                    APP_NAME => MAINTENANCE_COMPONENT,
                    APP_COMPONENT => MAINTENANCE_COMPONENT,
                    APP_MANAGED_BY => RENEWCTL,
                }
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ),
            ..Default::default()
        },
        spec: Some(PodSpec {
            node_name: Some(node.name().to_string()),
            host_pid: Some(true),
            host_network: Some(true),
            restart_policy: Some("Never".to_string()),
            tolerations: Some(
                [TAINT_CONTROL_PLANE, TAINT_MASTER]
                    .iter()
                    .map(|key| Toleration {
                        key: Some(key.to_string()),
                        operator: Some("Exists".to_string()),
                        effect: Some("NoSchedule".to_string()),
                        ..Default::default()
                    })
                    .collect(),
            ),
            containers: vec![Container {
                name: MAINTENANCE_COMPONENT.to_string(),
                image: Some(image.image.clone()),
                command: Some(vec![image.binary.clone()]),
                args: Some(vec![
                    "--expiration-threshold".to_string(),
                    expiration_threshold.to_string(),
                ]),
                security_context: Some(SecurityContext {
                    capabilities: Some(Capabilities {
                        add: Some(vec!["SYS_PTRACE".to_string()]),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                volume_mounts: Some(vec![
                    VolumeMount {
                        name: PKI_VOLUME.to_string(),
                        mount_path: PKI_HOST_PATH.to_string(),
                        ..Default::default()
                    },
                    VolumeMount {
                        name: RUNTIME_SOCKET_VOLUME.to_string(),
                        mount_path: CONTAINER_RUNTIME_SOCKET.to_string(),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }],
            volumes: Some(vec![
                Volume {
                    name: PKI_VOLUME.to_string(),
                    host_path: Some(HostPathVolumeSource {
                        path: PKI_HOST_PATH.to_string(),
                        type_: Some("Directory".to_string()),
                    }),
                    ..Default::default()
                },
                Volume {
                    name: RUNTIME_SOCKET_VOLUME.to_string(),
                    host_path: Some(HostPathVolumeSource {
                        path: CONTAINER_RUNTIME_SOCKET.to_string(),
                        type_: Some("Socket".to_string()),
                    }),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    }
}
