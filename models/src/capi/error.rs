use snafu::Snafu;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("Unable to list {} objects: '{}'", kind, source))]
    ListControlPlanes { source: kube::Error, kind: String },

    #[snafu(display(
        "Unable to fetch {} '{}/{}': '{}'",
        kind,
        namespace,
        name,
        source
    ))]
    GetMachineTemplate {
        source: kube::Error,
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display(
        "Unable to create {} from template '{}/{}': '{}'",
        kind,
        namespace,
        name,
        source
    ))]
    CreateMachineTemplate {
        source: kube::Error,
        kind: String,
        namespace: String,
        name: String,
    },

    #[snafu(display(
        "Unable to patch control plane '{}/{}': '{}'",
        namespace,
        name,
        source
    ))]
    PatchControlPlane {
        source: kube::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display("Cluster API object is missing required metadata field '{}'.", field))]
    MissingMetadata { field: String },

    #[snafu(display(
        "Control plane '{}' has no 'spec.infrastructureTemplate' reference.",
        name
    ))]
    MissingTemplateReference { name: String },

    #[snafu(display(
        "Control plane '{}' has an invalid 'spec.infrastructureTemplate' reference: '{}'",
        name,
        source
    ))]
    InvalidTemplateReference {
        source: serde_json::Error,
        name: String,
    },
}
