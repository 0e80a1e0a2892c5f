//! Read-only certificate expiry inventory and service-account token rotation.
pub mod error;
pub mod expiry;
pub mod kubeconfig;
pub mod report;
pub mod satoken;

pub use crate::expiry::{ExpiryInventory, ExpiryThreshold};
pub use crate::report::{ExpiryReport, OutputFormat};
pub use crate::satoken::{RotatedToken, TokenRotation};
