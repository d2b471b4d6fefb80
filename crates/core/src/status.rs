//! Status enums mapping to SMALLINT lookup tables.
//!
//! Each variant's discriminant matches the seed data order (1-based) in the
//! corresponding `*_statuses` table.

use serde::{Deserialize, Serialize};

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Resolve a database status ID, `None` for unknown ids.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Lowercase name as seeded in the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Workflow run lifecycle status. `Archived` is kept for rows written
    /// before archiving became the orthogonal `is_archived` flag.
    WorkflowRunStatus {
        Open = 1 => "open",
        Ongoing = 2 => "ongoing",
        Completed = 3 => "completed",
        Archived = 4 => "archived",
    }
}

define_status_enum! {
    /// Process run lifecycle status.
    ProcessRunStatus {
        Open = 1 => "open",
        Ongoing = 2 => "ongoing",
        Completed = 3 => "completed",
    }
}

define_status_enum! {
    /// Standalone form submission status.
    FormSubmissionStatus {
        Ongoing = 1 => "ongoing",
        Submitted = 2 => "submitted",
        Reviewing = 3 => "reviewing",
        Rejected = 4 => "rejected",
        Completed = 5 => "completed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_match_seed_order() {
        assert_eq!(WorkflowRunStatus::Open.id(), 1);
        assert_eq!(WorkflowRunStatus::Archived.id(), 4);
        assert_eq!(ProcessRunStatus::Completed.id(), 3);
        assert_eq!(FormSubmissionStatus::Completed.id(), 5);
    }

    #[test]
    fn from_id_rejects_unknown() {
        assert_eq!(ProcessRunStatus::from_id(2), Some(ProcessRunStatus::Ongoing));
        assert_eq!(ProcessRunStatus::from_id(4), None);
        assert_eq!(WorkflowRunStatus::from_id(0), None);
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&FormSubmissionStatus::Reviewing).unwrap();
        assert_eq!(json, "\"reviewing\"");
        assert_eq!(WorkflowRunStatus::Ongoing.to_string(), "ongoing");
    }
}
