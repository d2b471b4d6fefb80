//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod form_repo;
pub mod form_submission_repo;
pub mod n8n_workflow_repo;
pub mod process_repo;
pub mod process_run_repo;
pub mod team_repo;
pub mod user_repo;
pub mod workflow_repo;
pub mod workflow_run_repo;

pub use form_repo::FormRepo;
pub use form_submission_repo::FormSubmissionRepo;
pub use n8n_workflow_repo::N8nWorkflowRepo;
pub use process_repo::ProcessRepo;
pub use process_run_repo::ProcessRunRepo;
pub use team_repo::{ScopeOwner, TeamRepo};
pub use user_repo::UserRepo;
pub use workflow_repo::WorkflowRepo;
pub use workflow_run_repo::WorkflowRunRepo;
