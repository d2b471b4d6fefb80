//! Post-commit webhook delivery.
//!
//! Lifecycle operations commit first and hand back a [`Dispatch`]. Failures of
//! `initialize`, `save` and `complete` notifications are returned to the
//! caller (the state change stays committed); failures after `reset`,
//! `archive` and `reactivate` are only logged.

use portal_core::lifecycle::Step;
use portal_db::lifecycle::Dispatch;
use portal_events::{DispatchError, LifecycleNotifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy {
    Propagate,
    LogOnly,
}

impl DispatchPolicy {
    pub fn for_step(step: Step) -> Self {
        match step {
            Step::Initialize | Step::Save | Step::Complete { .. } => DispatchPolicy::Propagate,
            Step::Reset { .. } | Step::Archive | Step::Reactivate => DispatchPolicy::LogOnly,
        }
    }
}

/// Send `dispatch` through `notifier`, applying the step's failure policy.
pub async fn deliver(
    notifier: &dyn LifecycleNotifier,
    dispatch: &Dispatch,
) -> Result<(), DispatchError> {
    if dispatch.targets.is_empty() {
        return Ok(());
    }

    match notifier.notify(&dispatch.targets, &dispatch.context).await {
        Ok(()) => Ok(()),
        Err(err) => match DispatchPolicy::for_step(dispatch.step) {
            DispatchPolicy::Propagate => Err(err),
            DispatchPolicy::LogOnly => {
                tracing::warn!(
                    event = %dispatch.context.event,
                    workflow_run_id = dispatch.context.workflow_run_id,
                    error = %err,
                    "Webhook notification failed, state change kept",
                );
                Ok(())
            }
        },
    }
}
