/// Helper macro to avoid retyping the cluster-api base domain when creating further string
/// constants from it. When given no parameters, this returns the base domain. When given a string
/// literal parameter it prefixes the base domain with `parameter.`.
#[macro_export]
macro_rules! capi_domain {
    () => {
        "cluster.x-k8s.io"
    };
    ($s:literal) => {
        concat!($s, ".", capi_domain!())
    };
}

pub const RENEWCTL: &str = "renewctl";

// Standard tags https://kubernetes.io/docs/concepts/overview/working-with-objects/common-labels/
pub const APP_NAME: &str = "app.kubernetes.io/name";
pub const APP_COMPONENT: &str = "app.kubernetes.io/component";
pub const APP_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

// Node labels, taints and annotations
pub const LABEL_CONTROL_PLANE: &str = "node-role.kubernetes.io/control-plane";
pub const TAINT_CONTROL_PLANE: &str = "node-role.kubernetes.io/control-plane";
pub const TAINT_MASTER: &str = "node-role.kubernetes.io/master";
pub const ANNOTATION_CERT_EXPIRATION: &str = "cert-expiration";
pub const NODE_READY_CONDITION: &str = "Ready";

// Maintenance pod constants
pub const MAINTENANCE_NAMESPACE: &str = "kube-system";
pub const MAINTENANCE_COMPONENT: &str = "cert-renew";
pub const MAINTENANCE_IMAGE: &str = "quay.io/airshipit/cert-renew:latest";
pub const MAINTENANCE_BINARY: &str = "/usr/local/bin/cert-renew";
pub const PKI_HOST_PATH: &str = "/etc/kubernetes/pki";
pub const CONTAINER_RUNTIME_SOCKET: &str = "/run/containerd/containerd.sock";

// cluster-api constants
pub const CAPI_VERSION: &str = "v1alpha3";
pub const CONTROL_PLANE_GROUP: &str = capi_domain!("controlplane");
pub const INFRASTRUCTURE_GROUP: &str = capi_domain!("infrastructure");
pub const CONTROL_PLANE_KIND: &str = "KubeadmControlPlane";
pub const CONTROL_PLANE_PLURAL: &str = "kubeadmcontrolplanes";
pub const TEMPLATE_NAME_PATCH_PATH: &str = "/spec/infrastructureTemplate/name";

// Secret types
pub const SECRET_TYPE_TLS: &str = "kubernetes.io/tls";
pub const SECRET_TYPE_SA_TOKEN: &str = "kubernetes.io/service-account-token";
