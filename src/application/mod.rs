pub mod ports;
pub mod services;

pub use services::{EngagementService, RealtimeReconciler, ThreadService};
