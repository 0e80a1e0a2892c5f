pub mod error;
pub mod inplace;
pub mod orchestrator;
pub mod poll;
pub mod prober;
pub mod rolling;

pub use crate::inplace::InPlaceRenewal;
pub use crate::orchestrator::{RenewalMode, RenewalOrchestrator, RenewalOutcome, RenewalStrategy};
pub use crate::rolling::{RollingUpdateRenewal, RollingUpdateSummary};
