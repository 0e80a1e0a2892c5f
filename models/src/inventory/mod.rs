//! Read and delete access to the Secrets, Pods and Nodes inspected by the certificate inventory
//! and the service-account token rotation.
mod client;
mod error;

pub use self::client::*;
pub use self::error::Error as InventoryClientError;

#[cfg(feature = "mockall")]
pub use self::client::MockInventoryClient;

/// Which Secrets to list.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SecretQuery {
    /// Restricts the listing to one namespace. `None` lists across all namespaces.
    pub namespace: Option<String>,
    /// Restricts the listing to Secrets of this `type`.
    pub secret_type: Option<String>,
}

impl SecretQuery {
    pub fn all() -> Self {
        SecretQuery::default()
    }

    pub fn in_namespace<S: Into<String>>(mut self, namespace: S) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn of_type<S: Into<String>>(mut self, secret_type: S) -> Self {
        self.secret_type = Some(secret_type.into());
        self
    }

    /// The field selector for this query, if it filters on anything.
    pub fn field_selector(&self) -> Option<String> {
        self.secret_type
            .as_ref()
            .map(|secret_type| format!("type={}", secret_type))
    }

    /// A human-readable description of where this query looks.
    pub fn scope(&self) -> String {
        match self.namespace.as_ref() {
            Some(ns) => format!("namespace '{}'", ns),
            None => "all namespaces".to_string(),
        }
    }
}
