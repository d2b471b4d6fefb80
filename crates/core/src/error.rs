//! Domain error taxonomy.
//!
//! Every variant renders the German user-facing message through `Display`.
//! The HTTP layer maps variants to status codes but never rewrites messages.

/// Human-readable entity names used in "nicht gefunden" messages.
pub mod entity {
    pub const WORKFLOW: &str = "Workflow";
    pub const PROCESS: &str = "Prozess";
    pub const WORKFLOW_RUN: &str = "Workflow Ausführung";
    pub const PROCESS_RUN: &str = "Prozess Ausführung";
    pub const FORM: &str = "Formular";
    pub const FORM_SUBMISSION: &str = "Formular Einreichung";
    pub const TEAM: &str = "Team";
    pub const USER: &str = "Benutzer";
    pub const N8N_WORKFLOW: &str = "N8n Workflow";
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} nicht gefunden")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    Precondition(String),

    #[error("Folgende Abhängigkeiten sind nicht abgeschlossen: {}", .0.join(", "))]
    DependencyUnsatisfied(Vec<String>),

    #[error("Konfigurationsfehler: {0}")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    /// Details are for logs only; clients see a generic message.
    #[error("Ein interner Fehler ist aufgetreten")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(entity: &'static str) -> Self {
        CoreError::NotFound { entity }
    }

    pub fn precondition(msg: impl Into<String>) -> Self {
        CoreError::Precondition(msg.into())
    }
}
