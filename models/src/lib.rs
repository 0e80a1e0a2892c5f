pub mod capi;
pub mod constants;
pub mod inventory;
pub mod node;
pub mod pod;
pub mod telemetry;
