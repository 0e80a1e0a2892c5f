use models::inventory::InventoryClientError;

use snafu::Snafu;

/// The crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display(
        "Invalid expiry duration '{}', expected a whole number of days: '{}'",
        duration,
        source
    ))]
    Config {
        source: std::num::ParseIntError,
        duration: String,
    },

    #[snafu(display("Unknown output format '{}', expected one of table, yaml, json.", format))]
    UnknownOutputFormat { format: String },

    #[snafu(display("Unable to read cluster state: '{}'", source))]
    Inventory { source: InventoryClientError },

    #[snafu(display("Failed to parse certificate PEM in {}: {}", origin, reason))]
    CertificatePem { origin: String, reason: String },

    #[snafu(display("Failed to parse certificate in {}: {}", origin, reason))]
    Certificate { origin: String, reason: String },

    #[snafu(display("Certificate in {} has an out-of-range expiry date.", origin))]
    CertificateDate { origin: String },

    #[snafu(display("Unable to decode base64 certificate data in {}: '{}'", origin, source))]
    CertificateData {
        source: base64::DecodeError,
        origin: String,
    },

    #[snafu(display("Secret '{}/{}' has no kubeconfig under 'value'.", namespace, name))]
    MissingKubeconfig { namespace: String, name: String },

    #[snafu(display("Unable to parse kubeconfig in Secret '{}/{}': '{}'", namespace, name, source))]
    Kubeconfig {
        source: serde_yaml::Error,
        namespace: String,
        name: String,
    },

    #[snafu(display(
        "Malformed '{}' annotation entry '{}' on Node '{}'.",
        annotation,
        entry,
        node_name
    ))]
    AnnotationEntry {
        annotation: String,
        entry: String,
        node_name: String,
    },

    #[snafu(display(
        "Unable to parse expiry date '{}' of '{}' on Node '{}': '{}'",
        date,
        certificate,
        node_name,
        source
    ))]
    AnnotationDate {
        source: chrono::ParseError,
        date: String,
        certificate: String,
        node_name: String,
    },

    #[snafu(display("Unable to serialize report as YAML: '{}'", source))]
    ReportYaml { source: serde_yaml::Error },

    #[snafu(display("Unable to serialize report as JSON: '{}'", source))]
    ReportJson { source: serde_json::Error },

    #[snafu(display("Unable to write report: '{}'", source))]
    ReportWrite { source: std::io::Error },

    #[snafu(display("No Service Account tokens found in namespace '{}'.", namespace))]
    NoTokens { namespace: String },

    #[snafu(display("{} is not a Service Account Token", name))]
    NotServiceAccountToken { name: String },
}
