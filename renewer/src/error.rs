use models::capi::ClusterApiError;
use models::node::NodeClientError;

use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "Invalid expiration threshold '{}', expected a duration such as '24h': '{}'",
        threshold,
        source
    ))]
    Config {
        source: humantime::DurationError,
        threshold: String,
    },

    #[snafu(display("Unable to list control-plane nodes: '{}'", source))]
    ListNodes { source: NodeClientError },

    #[snafu(display("No control-plane nodes found with label '{}'.", label))]
    NoControlPlaneNodes { label: String },

    #[snafu(display("Unable to look up Node '{}': '{}'", node_name, source))]
    NodeLookup {
        source: NodeClientError,
        node_name: String,
    },

    #[snafu(display("Unable to read control-plane resource: '{}'", source))]
    ControlPlaneLookup { source: ClusterApiError },

    #[snafu(display("No control-plane resource found."))]
    ControlPlaneNotFound,

    #[snafu(display(
        "Unable to read machine template for control plane '{}': '{}'",
        control_plane,
        source
    ))]
    TemplateLookup {
        source: ClusterApiError,
        control_plane: String,
    },

    #[snafu(display("Unable to create maintenance Pod for Node '{}': '{}'", node_name, source))]
    CreatePod {
        source: NodeClientError,
        node_name: String,
    },

    #[snafu(display(
        "Maintenance Pod created for Node '{}' was returned without a name.",
        node_name
    ))]
    PodWithoutName { node_name: String },

    #[snafu(display("Unable to clone machine template {}: '{}'", template, source))]
    CreateTemplate {
        source: ClusterApiError,
        template: String,
    },

    #[snafu(display("Clone of machine template {} was returned without a name.", template))]
    CloneWithoutName { template: String },

    #[snafu(display(
        "Unable to point control plane '{}' at machine template '{}'; the clone '{}' is left unreferenced and must be deleted manually: '{}'",
        control_plane,
        clone_name,
        clone_name,
        source
    ))]
    PatchControlPlane {
        source: ClusterApiError,
        control_plane: String,
        clone_name: String,
    },

    #[snafu(display(
        "Maintenance Pod '{}/{}' on Node '{}' did not succeed after {} checks. Inspect its logs with 'kubectl logs -n {} {}'.",
        namespace,
        pod_name,
        node_name,
        attempts,
        namespace,
        pod_name
    ))]
    PodTimeout {
        node_name: String,
        namespace: String,
        pod_name: String,
        attempts: usize,
    },

    #[snafu(display(
        "Maintenance Pod '{}/{}' on Node '{}' failed. Inspect its logs with 'kubectl logs -n {} {}'.",
        namespace,
        pod_name,
        node_name,
        namespace,
        pod_name
    ))]
    PodFailed {
        node_name: String,
        namespace: String,
        pod_name: String,
    },

    #[snafu(display(
        "Node '{}' did not report Ready after {} checks following certificate renewal.",
        node_name,
        attempts
    ))]
    NodeUnhealthy { node_name: String, attempts: usize },

    #[snafu(display("In-place certificate renewal failed: {}", source))]
    InPlace {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    #[snafu(display("Rolling-update certificate renewal failed: {}", source))]
    RollingUpdate {
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}
