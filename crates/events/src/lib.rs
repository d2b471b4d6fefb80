//! Outbound notifications for run lifecycle transitions.
//!
//! - [`WebhookDispatcher`] posts a submission context to every external
//!   automation workflow bound to a lifecycle event.
//! - [`LifecycleNotifier`] is the seam the HTTP layer depends on, so tests
//!   can record dispatches instead of sending them.

pub mod webhook;

pub use webhook::{DispatchError, LifecycleNotifier, N8nConfig, WebhookDispatcher, WebhookError};
