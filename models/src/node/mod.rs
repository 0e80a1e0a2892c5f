mod client;
mod error;

pub use self::client::*;
pub use self::error::Error as NodeClientError;
use self::error::Result;

use crate::constants::{LABEL_CONTROL_PLANE, NODE_READY_CONDITION};

use k8s_openapi::api::core::v1::Node;
use snafu::{ensure, OptionExt};

use std::collections::BTreeMap;
use std::convert::TryFrom;

#[cfg(feature = "mockall")]
pub use self::client::MockMaintenanceClient;

/// A control-plane node as seen at the start of an in-place renewal pass.
///
/// MasterNodes are read from the cluster and never mutated. Health is not stored here: it is
/// derived from the live `Node` object each time it is needed.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MasterNode {
    name: String,
    labels: BTreeMap<String, String>,
}

impl MasterNode {
    pub fn new<S: Into<String>>(name: S, labels: BTreeMap<String, String>) -> Result<Self> {
        let name = name.into();
        ensure!(
            labels.contains_key(LABEL_CONTROL_PLANE),
            error::NotControlPlaneSnafu {
                node_name: name.clone(),
                label: LABEL_CONTROL_PLANE.to_string(),
            }
        );
        Ok(MasterNode { name, labels })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

impl TryFrom<&Node> for MasterNode {
    type Error = NodeClientError;

    fn try_from(node: &Node) -> Result<Self> {
        let name = node
            .metadata
            .name
            .clone()
            .context(error::MissingNodeNameSnafu)?;
        let labels = node.metadata.labels.clone().unwrap_or_default();
        MasterNode::new(name, labels)
    }
}

/// Returns the label selector matching every control-plane node.
pub fn control_plane_label_selector() -> String {
    LABEL_CONTROL_PLANE.to_string()
}

/// Returns `true` if and only if the node's kubelet reports the `Ready` condition as `"True"`.
pub fn node_is_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|condition| condition.type_ == NODE_READY_CONDITION && condition.status == "True")
        })
        .unwrap_or(false)
}
