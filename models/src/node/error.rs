use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "Unable to list nodes matching label selector '{}': '{}'",
        label_selector,
        source
    ))]
    ListNodes {
        source: kube::Error,
        label_selector: String,
    },

    #[snafu(display("Unable to fetch Node '{}': '{}'", node_name, source))]
    GetNode {
        source: kube::Error,
        node_name: String,
    },

    #[snafu(display(
        "Unable to create maintenance Pod for Node '{}': '{}'",
        node_name,
        source
    ))]
    CreatePod {
        source: kube::Error,
        node_name: String,
    },

    #[snafu(display("Unable to fetch Pod '{}/{}': '{}'", namespace, pod_name, source))]
    GetPod {
        source: kube::Error,
        namespace: String,
        pod_name: String,
    },

    #[snafu(display("Node object returned by the Kubernetes API has no name."))]
    MissingNodeName,

    #[snafu(display(
        "Node '{}' does not carry the control-plane role label '{}'.",
        node_name,
        label
    ))]
    NotControlPlane { node_name: String, label: String },
}
