//! Live-runtime supervision for workspace containers.
//!
//! Two unattended components run next to the request path:
//! - [`StopDetector`] watches the runtime event stream and tells the owner of
//!   a container when it died unexpectedly, attributing OOM kills.
//! - [`ResourceReconciler`] periodically removes containers and networks the
//!   control plane no longer knows about.
//!
//! Both only log failures; neither ever brings down its task.

pub mod ledger;
pub mod reconciler;
pub mod stop_detector;

pub use ledger::{WorkspaceInfo, WorkspaceLedger};
pub use reconciler::{start_reconciler_task, ReconcileReport, ResourceReconciler};
pub use stop_detector::{
    AbnormalStopEvent, AbnormalStopHandler, StopDetector, StopDetectorConfig, StopReason,
};
