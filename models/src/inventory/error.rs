use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to list Secrets in '{}': '{}'", scope, source))]
    ListSecrets { source: kube::Error, scope: String },

    #[snafu(display("Unable to fetch Secret '{}/{}': '{}'", namespace, name, source))]
    GetSecret {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display("Unable to delete Secret '{}/{}': '{}'", namespace, name, source))]
    DeleteSecret {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display("Unable to list Pods in '{}': '{}'", namespace, source))]
    ListPods {
        source: kube::Error,
        namespace: String,
    },

    #[snafu(display("Unable to delete Pod '{}/{}': '{}'", namespace, name, source))]
    DeletePod {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display("Unable to list Nodes: '{}'", source))]
    ListAllNodes { source: kube::Error },
}
