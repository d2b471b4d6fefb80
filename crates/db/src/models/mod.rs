pub mod form;
pub mod form_submission;
pub mod n8n_workflow;
pub mod process;
pub mod process_run;
pub mod team;
pub mod user;
pub mod workflow;
pub mod workflow_run;
