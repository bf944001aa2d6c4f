pub mod engagement_service;
pub mod realtime_reconciler;
pub mod thread_service;
pub mod thread_session;

pub use engagement_service::EngagementService;
pub use realtime_reconciler::{RealtimeReconciler, ReconcileOutcome};
pub use thread_service::ThreadService;
pub use thread_session::{ThreadSession, ThreadSnapshot};
