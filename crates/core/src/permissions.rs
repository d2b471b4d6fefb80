//! Evaluation context assembly for permission rules.
//!
//! Rules are authored against team *names*, so every team reference in the
//! context is a name, never an id.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::roles::Role;
use crate::types::{DbId, FormData};

/// The authenticated caller as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Principal {
    pub id: DbId,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Names of the teams the user is a member of.
    pub teams: Vec<String>,
}

impl Principal {
    pub fn is_member_of(&self, team: &str) -> bool {
        self.teams.iter().any(|t| t == team)
    }
}

/// Which entity key the scope is published under in the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Workflow,
    Process,
    Form,
}

impl ScopeKind {
    pub fn key(self) -> &'static str {
        match self {
            ScopeKind::Workflow => "workflow",
            ScopeKind::Process => "process",
            ScopeKind::Form => "form",
        }
    }
}

/// Team assignment of the entity being accessed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityScope {
    pub responsible_team: Option<String>,
    pub teams: Vec<String>,
}

impl EntityScope {
    pub fn new(responsible_team: Option<String>, teams: Vec<String>) -> Self {
        Self {
            responsible_team,
            teams,
        }
    }

    /// Whether the principal belongs to the responsible team or any assigned team.
    pub fn includes(&self, principal: &Principal) -> bool {
        self.responsible_team
            .iter()
            .chain(self.teams.iter())
            .any(|team| principal.is_member_of(team))
    }

    fn to_json(&self) -> Value {
        json!({
            "responsibleTeam": self.responsible_team,
            "teams": self.teams,
        })
    }
}

/// Builder for the JSON object passed to [`crate::rules::Rule::evaluate`].
#[derive(Debug, Clone)]
pub struct PermissionContext {
    user: Value,
    scopes: Vec<(ScopeKind, EntityScope)>,
    data: FormData,
}

impl PermissionContext {
    pub fn new(principal: &Principal) -> Self {
        Self {
            user: json!({
                "id": principal.id,
                "email": principal.email,
                "name": principal.name,
                "role": principal.role.as_str(),
                "teams": principal.teams,
            }),
            scopes: Vec::new(),
            data: FormData::new(),
        }
    }

    pub fn with_scope(mut self, kind: ScopeKind, scope: EntityScope) -> Self {
        self.scopes.retain(|(k, _)| *k != kind);
        self.scopes.push((kind, scope));
        self
    }

    pub fn with_data(mut self, data: FormData) -> Self {
        self.data = data;
        self
    }

    pub fn build(self) -> Value {
        let mut root = Map::new();
        root.insert("user".to_string(), self.user);
        for (kind, scope) in &self.scopes {
            root.insert(kind.key().to_string(), scope.to_json());
        }
        root.insert("data".to_string(), Value::Object(self.data));
        Value::Object(root)
    }
}

/// Shallow right-biased merge of run data: later entries overwrite earlier
/// ones on key collision. Non-object entries are skipped.
///
/// Keys answered in unrelated processes can collide; callers that need to
/// tell them apart must read the individual process run instead.
pub fn merge_data<'a, I>(entries: I) -> FormData
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut merged = FormData::new();
    for entry in entries {
        if let Value::Object(map) = entry {
            for (key, value) in map {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}
