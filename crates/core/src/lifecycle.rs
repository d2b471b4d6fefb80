//! Workflow run / process run state machine -- pure logic, no database access.
//!
//! The persistence layer loads a [`RunSnapshot`] while holding a row lock on
//! the workflow run, asks the snapshot for a plan, writes the plan with
//! conditional updates and then applies it to the snapshot so the post-state
//! can be used for webhook payloads.
//!
//! ```text
//! ProcessRun:   open -> ongoing -> completed
//!                  \______________/  ^   |
//!                                    |   | reset
//!                          ongoing <-+---+
//!
//! WorkflowRun:  open -> ongoing <-> completed      (+ orthogonal is_archived)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{entity, CoreError};
use crate::permissions::merge_data;
use crate::status::{ProcessRunStatus, WorkflowRunStatus};
use crate::types::{DbId, FormData};

pub const MSG_RUN_LOCKED: &str = "Workflow Ausführung ist abgeschlossen oder archiviert";
pub const MSG_ALREADY_COMPLETED: &str = "Prozess ist bereits abgeschlossen";
pub const MSG_NOT_COMPLETED: &str = "Prozess ist nicht abgeschlossen";
pub const MSG_WORKFLOW_INACTIVE: &str = "Workflow ist nicht aktiv";
pub const MSG_WORKFLOW_EMPTY: &str = "Workflow enthält keine ausführbaren Prozesse";
pub const MSG_ALREADY_ARCHIVED: &str = "Workflow Ausführung ist bereits archiviert";
pub const MSG_NOT_ARCHIVED: &str = "Workflow Ausführung ist nicht archiviert";

// ---------------------------------------------------------------------------
// Lifecycle events and webhook bindings
// ---------------------------------------------------------------------------

/// Events external automation workflows can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    Initialize,
    Save,
    Complete,
    Archive,
    Reactivate,
    /// Fired when the last open process of a run is completed.
    Last,
}

impl LifecycleEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::Initialize => "initialize",
            LifecycleEvent::Save => "save",
            LifecycleEvent::Complete => "complete",
            LifecycleEvent::Archive => "archive",
            LifecycleEvent::Reactivate => "reactivate",
            LifecycleEvent::Last => "last",
        }
    }

    /// Whether processes (not only workflows) may bind to this event.
    pub fn allowed_on_process(self) -> bool {
        matches!(
            self,
            LifecycleEvent::Save | LifecycleEvent::Complete | LifecycleEvent::Reactivate
        )
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialize" => Ok(LifecycleEvent::Initialize),
            "save" => Ok(LifecycleEvent::Save),
            "complete" => Ok(LifecycleEvent::Complete),
            "archive" => Ok(LifecycleEvent::Archive),
            "reactivate" => Ok(LifecycleEvent::Reactivate),
            "last" => Ok(LifecycleEvent::Last),
            other => Err(CoreError::Validation(format!("Unbekanntes Ereignis '{other}'"))),
        }
    }
}

/// External workflow ids bound to lifecycle events of one workflow or process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings {
    entries: Vec<(LifecycleEvent, String)>,
}

impl Bindings {
    pub fn new(entries: Vec<(LifecycleEvent, String)>) -> Self {
        Self { entries }
    }

    pub fn ids(&self, event: LifecycleEvent) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(e, _)| *e == event)
            .map(|(_, id)| id.as_str())
    }
}

/// Which lifecycle step produced a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Initialize,
    Save,
    Complete { completes_run: bool },
    Reset { reopens_run: bool },
    Archive,
    Reactivate,
}

impl Step {
    /// Event name reported in the webhook payload.
    pub fn event(self) -> LifecycleEvent {
        match self {
            Step::Initialize => LifecycleEvent::Initialize,
            Step::Save => LifecycleEvent::Save,
            Step::Complete { .. } => LifecycleEvent::Complete,
            Step::Reset { .. } | Step::Reactivate => LifecycleEvent::Reactivate,
            Step::Archive => LifecycleEvent::Archive,
        }
    }
}

/// Collect the external workflow ids to notify for a step, without duplicates.
///
/// Run reactivation re-uses the workflow's `archive` bindings.
pub fn dispatch_targets(step: Step, workflow: &Bindings, process: &Bindings) -> Vec<String> {
    use LifecycleEvent as E;

    let sources: Vec<(&Bindings, E)> = match step {
        Step::Initialize => vec![(workflow, E::Initialize)],
        Step::Save => vec![(process, E::Save), (workflow, E::Save)],
        Step::Complete { completes_run } => {
            let mut s = vec![(process, E::Complete), (workflow, E::Complete)];
            if completes_run {
                s.push((workflow, E::Last));
            }
            s
        }
        Step::Reset { reopens_run } => {
            let mut s = vec![(process, E::Reactivate)];
            if reopens_run {
                s.push((workflow, E::Reactivate));
            }
            s
        }
        Step::Archive | Step::Reactivate => vec![(workflow, E::Archive)],
    };

    let mut targets: Vec<String> = Vec::new();
    for (bindings, event) in sources {
        for id in bindings.ids(event) {
            if !targets.iter().any(|t| t == id) {
                targets.push(id.to_string());
            }
        }
    }
    targets
}

/// Body handed to the external automation engine as `submissionContext`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionContext {
    pub event: LifecycleEvent,
    pub workflow_id: DbId,
    pub workflow_name: String,
    pub workflow_run_id: DbId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_run_id: Option<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    pub user: SubmissionUser,
    pub data: FormData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionUser {
    pub id: DbId,
    pub email: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Initialization
// ---------------------------------------------------------------------------

/// The subset of a process definition relevant to run initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDefinition {
    pub id: DbId,
    pub is_category: bool,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProcessRun {
    pub process_id: DbId,
    pub status: ProcessRunStatus,
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InitializePlan {
    pub run_status: WorkflowRunStatus,
    pub process_runs: Vec<NewProcessRun>,
}

/// Plan a new workflow run.
///
/// One `open` process run is created per live, non-category process. When
/// `seed` is supplied and the workflow names an initializing process, that
/// run starts `ongoing` with the seed as its data, and so does the workflow
/// run.
pub fn plan_initialize(
    is_active: bool,
    initialize_process_id: Option<DbId>,
    processes: &[ProcessDefinition],
    seed: Option<Value>,
) -> Result<InitializePlan, CoreError> {
    if !is_active {
        return Err(CoreError::precondition(MSG_WORKFLOW_INACTIVE));
    }

    let mut seed = seed.filter(|s| !s.is_null());
    let process_runs: Vec<NewProcessRun> = processes
        .iter()
        .filter(|p| !p.is_deleted && !p.is_category)
        .map(|p| {
            let seeded = if Some(p.id) == initialize_process_id {
                seed.take()
            } else {
                None
            };
            NewProcessRun {
                process_id: p.id,
                status: if seeded.is_some() {
                    ProcessRunStatus::Ongoing
                } else {
                    ProcessRunStatus::Open
                },
                data: seeded,
            }
        })
        .collect();

    if process_runs.is_empty() {
        return Err(CoreError::precondition(MSG_WORKFLOW_EMPTY));
    }

    let run_status = if process_runs
        .iter()
        .any(|p| p.status == ProcessRunStatus::Ongoing)
    {
        WorkflowRunStatus::Ongoing
    } else {
        WorkflowRunStatus::Open
    };

    Ok(InitializePlan {
        run_status,
        process_runs,
    })
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub process_id: DbId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRunState {
    pub id: DbId,
    pub process_id: DbId,
    pub process_name: String,
    pub status: ProcessRunStatus,
    pub data: Value,
    pub dependencies: Vec<Dependency>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRunState {
    pub id: DbId,
    pub status: WorkflowRunStatus,
    pub is_archived: bool,
}

impl WorkflowRunState {
    fn is_locked(&self) -> bool {
        self.is_archived
            || matches!(
                self.status,
                WorkflowRunStatus::Completed | WorkflowRunStatus::Archived
            )
    }
}

/// A workflow run together with all of its process runs, ordered by process
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub run: WorkflowRunState,
    pub process_runs: Vec<ProcessRunState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange<S> {
    pub from: S,
    pub to: S,
}

/// New value of a process run's reset text. Every transition rewrites it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetText {
    Clear,
    Set(String),
}

/// Writes required for a save / complete / reset.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRunPlan {
    pub process_run_id: DbId,
    pub process_id: DbId,
    pub process_change: StatusChange<ProcessRunStatus>,
    pub run_change: Option<StatusChange<WorkflowRunStatus>>,
    pub data: Option<Value>,
    pub reset_text: ResetText,
    pub clear_archive: bool,
}

impl ProcessRunPlan {
    pub fn completes_run(&self) -> bool {
        self.run_change
            .is_some_and(|c| c.to == WorkflowRunStatus::Completed)
    }

    /// Whether the parent run was reopened from a completed/archived state.
    pub fn reopens_run(&self) -> bool {
        self.clear_archive
            || self.run_change.is_some_and(|c| {
                matches!(
                    c.from,
                    WorkflowRunStatus::Completed | WorkflowRunStatus::Archived
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveChange {
    Archive { notes: String },
    Clear,
}

/// Writes required for archive / reactivate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub run_change: Option<StatusChange<WorkflowRunStatus>>,
    pub archive: ArchiveChange,
}

impl RunSnapshot {
    pub fn process_run(&self, id: DbId) -> Result<&ProcessRunState, CoreError> {
        self.process_runs
            .iter()
            .find(|pr| pr.id == id)
            .ok_or_else(|| CoreError::not_found(entity::PROCESS_RUN))
    }

    /// Right-biased merge of every process run's data, in process order.
    pub fn merged_data(&self) -> FormData {
        merge_data(self.process_runs.iter().map(|pr| &pr.data))
    }

    /// Names of dependencies that lack a completed process run in this run.
    pub fn unmet_dependencies(&self, process_run: &ProcessRunState) -> Vec<String> {
        process_run
            .dependencies
            .iter()
            .filter(|dep| {
                !self.process_runs.iter().any(|pr| {
                    pr.process_id == dep.process_id && pr.status == ProcessRunStatus::Completed
                })
            })
            .map(|dep| dep.name.clone())
            .collect()
    }

    fn ensure_unlocked(&self) -> Result<(), CoreError> {
        if self.run.is_locked() {
            return Err(CoreError::precondition(MSG_RUN_LOCKED));
        }
        Ok(())
    }

    fn editable(&self, id: DbId) -> Result<&ProcessRunState, CoreError> {
        self.ensure_unlocked()?;
        let pr = self.process_run(id)?;
        if pr.status == ProcessRunStatus::Completed {
            return Err(CoreError::precondition(MSG_ALREADY_COMPLETED));
        }
        let unmet = self.unmet_dependencies(pr);
        if !unmet.is_empty() {
            return Err(CoreError::DependencyUnsatisfied(unmet));
        }
        Ok(pr)
    }

    fn run_change_to(&self, to: WorkflowRunStatus) -> Option<StatusChange<WorkflowRunStatus>> {
        (self.run.status != to).then_some(StatusChange {
            from: self.run.status,
            to,
        })
    }

    /// Plan writing new answers into a process run.
    pub fn plan_save(&self, process_run_id: DbId, data: Value) -> Result<ProcessRunPlan, CoreError> {
        let pr = self.editable(process_run_id)?;
        Ok(ProcessRunPlan {
            process_run_id: pr.id,
            process_id: pr.process_id,
            process_change: StatusChange {
                from: pr.status,
                to: ProcessRunStatus::Ongoing,
            },
            run_change: self.run_change_to(WorkflowRunStatus::Ongoing),
            data: Some(data),
            reset_text: ResetText::Clear,
            clear_archive: false,
        })
    }

    /// Plan completing a process run; completes the workflow run when this is
    /// the last incomplete process run.
    pub fn plan_complete(
        &self,
        process_run_id: DbId,
        data: Option<Value>,
    ) -> Result<ProcessRunPlan, CoreError> {
        let pr = self.editable(process_run_id)?;
        let all_others_completed = self
            .process_runs
            .iter()
            .filter(|other| other.id != pr.id)
            .all(|other| other.status == ProcessRunStatus::Completed);
        let run_target = if all_others_completed {
            WorkflowRunStatus::Completed
        } else {
            WorkflowRunStatus::Ongoing
        };
        Ok(ProcessRunPlan {
            process_run_id: pr.id,
            process_id: pr.process_id,
            process_change: StatusChange {
                from: pr.status,
                to: ProcessRunStatus::Completed,
            },
            run_change: self.run_change_to(run_target),
            data,
            reset_text: ResetText::Clear,
            clear_archive: false,
        })
    }

    /// Plan reopening a completed process run. Reopens the workflow run when
    /// it was completed or archived; siblings are untouched.
    pub fn plan_reset(
        &self,
        process_run_id: DbId,
        reset_text: String,
    ) -> Result<ProcessRunPlan, CoreError> {
        let pr = self.process_run(process_run_id)?;
        if pr.status != ProcessRunStatus::Completed {
            return Err(CoreError::precondition(MSG_NOT_COMPLETED));
        }
        let reopen = self.run.is_locked();
        Ok(ProcessRunPlan {
            process_run_id: pr.id,
            process_id: pr.process_id,
            process_change: StatusChange {
                from: ProcessRunStatus::Completed,
                to: ProcessRunStatus::Ongoing,
            },
            run_change: if reopen {
                self.run_change_to(WorkflowRunStatus::Ongoing)
            } else {
                None
            },
            data: None,
            reset_text: ResetText::Set(reset_text),
            clear_archive: self.run.is_archived,
        })
    }

    /// Plan archiving the run. The status is left untouched.
    pub fn plan_archive(&self, notes: String) -> Result<RunPlan, CoreError> {
        if self.run.is_archived {
            return Err(CoreError::precondition(MSG_ALREADY_ARCHIVED));
        }
        Ok(RunPlan {
            run_change: None,
            archive: ArchiveChange::Archive { notes },
        })
    }

    /// Plan clearing the archive flag. A legacy `archived` status is
    /// restored as `ongoing`.
    pub fn plan_reactivate(&self) -> Result<RunPlan, CoreError> {
        let legacy = self.run.status == WorkflowRunStatus::Archived;
        if !self.run.is_archived && !legacy {
            return Err(CoreError::precondition(MSG_NOT_ARCHIVED));
        }
        Ok(RunPlan {
            run_change: if legacy {
                self.run_change_to(WorkflowRunStatus::Ongoing)
            } else {
                None
            },
            archive: ArchiveChange::Clear,
        })
    }

    /// Reflect a committed process run plan in the snapshot.
    pub fn apply(&mut self, plan: &ProcessRunPlan) {
        if let Some(pr) = self
            .process_runs
            .iter_mut()
            .find(|pr| pr.id == plan.process_run_id)
        {
            pr.status = plan.process_change.to;
            if let Some(data) = &plan.data {
                pr.data = data.clone();
            }
        }
        if let Some(change) = plan.run_change {
            self.run.status = change.to;
        }
        if plan.clear_archive {
            self.run.is_archived = false;
        }
    }

    /// Reflect a committed archive/reactivate plan in the snapshot.
    pub fn apply_run(&mut self, plan: &RunPlan) {
        if let Some(change) = plan.run_change {
            self.run.status = change.to;
        }
        self.run.is_archived = matches!(plan.archive, ArchiveChange::Archive { .. });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn pr(id: DbId, process_id: DbId, name: &str, deps: &[(DbId, &str)]) -> ProcessRunState {
        ProcessRunState {
            id,
            process_id,
            process_name: name.to_string(),
            status: ProcessRunStatus::Open,
            data: json!({}),
            dependencies: deps
                .iter()
                .map(|(pid, n)| Dependency {
                    process_id: *pid,
                    name: n.to_string(),
                })
                .collect(),
        }
    }

    fn snapshot(process_runs: Vec<ProcessRunState>) -> RunSnapshot {
        RunSnapshot {
            run: WorkflowRunState {
                id: 100,
                status: WorkflowRunStatus::Open,
                is_archived: false,
            },
            process_runs,
        }
    }

    /// W with P1 (no deps) and P2 (depends on P1); process runs 11 and 12.
    fn two_step() -> RunSnapshot {
        snapshot(vec![pr(11, 1, "P1", &[]), pr(12, 2, "P2", &[(1, "P1")])])
    }

    fn complete(s: &mut RunSnapshot, id: DbId) -> Result<ProcessRunPlan, CoreError> {
        let plan = s.plan_complete(id, None)?;
        s.apply(&plan);
        Ok(plan)
    }

    fn save(s: &mut RunSnapshot, id: DbId, data: Value) -> Result<ProcessRunPlan, CoreError> {
        let plan = s.plan_save(id, data)?;
        s.apply(&plan);
        Ok(plan)
    }

    fn status_of(s: &RunSnapshot, id: DbId) -> ProcessRunStatus {
        s.process_run(id).unwrap().status
    }

    #[test]
    fn scenario_dependency_then_cascade() {
        let mut s = two_step();

        let err = complete(&mut s, 12).unwrap_err();
        assert!(err.to_string().contains("P1"));
        assert_eq!(status_of(&s, 12), ProcessRunStatus::Open);

        complete(&mut s, 11).unwrap();
        assert_eq!(status_of(&s, 11), ProcessRunStatus::Completed);
        assert_eq!(s.run.status, WorkflowRunStatus::Ongoing);

        let plan = complete(&mut s, 12).unwrap();
        assert!(plan.completes_run());
        assert_eq!(status_of(&s, 12), ProcessRunStatus::Completed);
        assert_eq!(s.run.status, WorkflowRunStatus::Completed);
    }

    #[test]
    fn dependency_error_lists_all_incomplete_names() {
        let s = snapshot(vec![
            pr(11, 1, "Antrag", &[]),
            pr(12, 2, "Prüfung", &[]),
            pr(13, 3, "Freigabe", &[(1, "Antrag"), (2, "Prüfung")]),
        ]);
        assert_matches!(
            s.plan_complete(13, None),
            Err(CoreError::DependencyUnsatisfied(names)) if names == vec!["Antrag".to_string(), "Prüfung".to_string()]
        );
        assert_eq!(
            s.plan_complete(13, None).unwrap_err().to_string(),
            "Folgende Abhängigkeiten sind nicht abgeschlossen: Antrag, Prüfung"
        );
    }

    #[test]
    fn dependency_without_process_run_is_unmet() {
        let s = snapshot(vec![pr(11, 1, "P1", &[(9, "Nachträglich")])]);
        assert_matches!(
            s.plan_complete(11, None),
            Err(CoreError::DependencyUnsatisfied(names)) if names == vec!["Nachträglich".to_string()]
        );
    }

    #[test]
    fn save_is_also_dependency_gated() {
        let s = two_step();
        assert_matches!(
            s.plan_save(12, json!({"x": 1})),
            Err(CoreError::DependencyUnsatisfied(_))
        );
    }

    #[test]
    fn retry_after_dependency_completes_succeeds() {
        let mut s = two_step();
        assert!(complete(&mut s, 12).is_err());
        complete(&mut s, 11).unwrap();
        assert!(complete(&mut s, 12).is_ok());
    }

    #[test]
    fn run_completes_only_on_last_process() {
        let mut s = snapshot((1..=4).map(|i| pr(10 + i, i, &format!("P{i}"), &[])).collect());
        for i in 1..=3 {
            let plan = complete(&mut s, 10 + i).unwrap();
            assert!(!plan.completes_run());
            assert_ne!(s.run.status, WorkflowRunStatus::Completed);
        }
        let plan = complete(&mut s, 14).unwrap();
        assert!(plan.completes_run());
        assert_eq!(s.run.status, WorkflowRunStatus::Completed);
    }

    #[test]
    fn run_not_completed_when_a_process_is_skipped() {
        let mut s = snapshot(vec![pr(11, 1, "A", &[]), pr(12, 2, "B", &[]), pr(13, 3, "C", &[])]);
        complete(&mut s, 11).unwrap();
        save(&mut s, 12, json!({"teil": true})).unwrap();
        complete(&mut s, 13).unwrap();
        assert_eq!(s.run.status, WorkflowRunStatus::Ongoing);
        assert_eq!(status_of(&s, 12), ProcessRunStatus::Ongoing);
    }

    #[test]
    fn completing_twice_is_rejected() {
        let mut s = two_step();
        complete(&mut s, 11).unwrap();
        assert_matches!(
            s.plan_complete(11, None),
            Err(CoreError::Precondition(msg)) if msg == MSG_ALREADY_COMPLETED
        );
        assert_matches!(
            s.plan_save(11, json!({})),
            Err(CoreError::Precondition(msg)) if msg == MSG_ALREADY_COMPLETED
        );
    }

    #[test]
    fn save_moves_process_and_run_to_ongoing() {
        let mut s = two_step();
        let plan = save(&mut s, 11, json!({"a": 1})).unwrap();
        assert_eq!(plan.reset_text, ResetText::Clear);
        assert_eq!(
            plan.run_change,
            Some(StatusChange {
                from: WorkflowRunStatus::Open,
                to: WorkflowRunStatus::Ongoing
            })
        );
        assert_eq!(status_of(&s, 11), ProcessRunStatus::Ongoing);
        assert_eq!(s.run.status, WorkflowRunStatus::Ongoing);

        // Idempotent once ongoing.
        let plan = save(&mut s, 11, json!({"a": 2})).unwrap();
        assert_eq!(plan.run_change, None);
        assert_eq!(s.merged_data()["a"], json!(2));
    }

    #[test]
    fn complete_with_data_writes_answers() {
        let mut s = two_step();
        complete(&mut s, 11).unwrap();
        let plan = s.plan_complete(12, Some(json!({"ok": true}))).unwrap();
        s.apply(&plan);
        assert_eq!(s.process_run(12).unwrap().data, json!({"ok": true}));
    }

    #[test]
    fn reset_reopens_completed_run() {
        let mut s = two_step();
        complete(&mut s, 11).unwrap();
        complete(&mut s, 12).unwrap();
        assert_eq!(s.run.status, WorkflowRunStatus::Completed);

        let plan = s.plan_reset(11, "Bitte korrigieren".into()).unwrap();
        assert!(plan.reopens_run());
        assert_eq!(plan.reset_text, ResetText::Set("Bitte korrigieren".into()));
        s.apply(&plan);

        assert_eq!(s.run.status, WorkflowRunStatus::Ongoing);
        assert_eq!(status_of(&s, 11), ProcessRunStatus::Ongoing);
        // Siblings stay completed.
        assert_eq!(status_of(&s, 12), ProcessRunStatus::Completed);
    }

    #[test]
    fn reset_on_ongoing_run_does_not_touch_run() {
        let mut s = two_step();
        complete(&mut s, 11).unwrap();
        let plan = s.plan_reset(11, String::new()).unwrap();
        assert_eq!(plan.run_change, None);
        assert!(!plan.reopens_run());
    }

    #[test]
    fn reset_requires_completed_process() {
        let s = two_step();
        assert_matches!(
            s.plan_reset(11, String::new()),
            Err(CoreError::Precondition(msg)) if msg == MSG_NOT_COMPLETED
        );
    }

    #[test]
    fn reset_clears_archive_flag() {
        let mut s = two_step();
        complete(&mut s, 11).unwrap();
        let archive = s.plan_archive("Erledigt".into()).unwrap();
        s.apply_run(&archive);

        let plan = s.plan_reset(11, "Neu".into()).unwrap();
        assert!(plan.clear_archive);
        assert!(plan.reopens_run());
        s.apply(&plan);
        assert!(!s.run.is_archived);
        assert_eq!(s.run.status, WorkflowRunStatus::Ongoing);
    }

    #[test]
    fn archived_run_blocks_mutation_until_reactivated() {
        let mut s = two_step();
        save(&mut s, 11, json!({"a": 1})).unwrap();

        let archive = s.plan_archive("Pausiert".into()).unwrap();
        assert_eq!(archive.run_change, None);
        s.apply_run(&archive);
        assert!(s.run.is_archived);
        assert_eq!(s.run.status, WorkflowRunStatus::Ongoing);

        assert_matches!(
            s.plan_save(11, json!({})),
            Err(CoreError::Precondition(msg)) if msg == MSG_RUN_LOCKED
        );
        assert_matches!(
            s.plan_complete(11, None),
            Err(CoreError::Precondition(msg)) if msg == MSG_RUN_LOCKED
        );

        let reactivate = s.plan_reactivate().unwrap();
        s.apply_run(&reactivate);
        assert!(!s.run.is_archived);
        assert!(complete(&mut s, 11).is_ok());
    }

    #[test]
    fn completed_run_blocks_save() {
        let mut s = snapshot(vec![pr(11, 1, "Einzig", &[])]);
        complete(&mut s, 11).unwrap();
        assert_eq!(s.run.status, WorkflowRunStatus::Completed);
        assert_matches!(
            s.plan_save(11, json!({})),
            Err(CoreError::Precondition(msg)) if msg == MSG_RUN_LOCKED
        );
    }

    #[test]
    fn legacy_archived_status_is_locked_and_reactivates_to_ongoing() {
        let mut s = two_step();
        s.run.status = WorkflowRunStatus::Archived;
        assert!(s.plan_save(11, json!({})).is_err());
        let plan = s.plan_reactivate().unwrap();
        assert_eq!(
            plan.run_change,
            Some(StatusChange {
                from: WorkflowRunStatus::Archived,
                to: WorkflowRunStatus::Ongoing
            })
        );
    }

    #[test]
    fn archive_and_reactivate_preconditions() {
        let mut s = two_step();
        assert_matches!(
            s.plan_reactivate(),
            Err(CoreError::Precondition(msg)) if msg == MSG_NOT_ARCHIVED
        );
        let plan = s.plan_archive(String::new()).unwrap();
        s.apply_run(&plan);
        assert_matches!(
            s.plan_archive(String::new()),
            Err(CoreError::Precondition(msg)) if msg == MSG_ALREADY_ARCHIVED
        );
    }

    #[test]
    fn unknown_process_run_is_not_found() {
        let s = two_step();
        assert_eq!(
            s.plan_save(999, json!({})).unwrap_err().to_string(),
            "Prozess Ausführung nicht gefunden"
        );
    }

    #[test]
    fn merged_data_is_right_biased_in_process_order() {
        let mut s = two_step();
        s.process_runs[0].data = json!({"a": 1});
        s.process_runs[1].data = json!({"a": 2, "b": 3});
        assert_eq!(Value::Object(s.merged_data()), json!({"a": 2, "b": 3}));
    }

    // -- initialization ----------------------------------------------------

    fn defs() -> Vec<ProcessDefinition> {
        vec![
            ProcessDefinition { id: 1, is_category: true, is_deleted: false },
            ProcessDefinition { id: 2, is_category: false, is_deleted: false },
            ProcessDefinition { id: 3, is_category: false, is_deleted: true },
            ProcessDefinition { id: 4, is_category: false, is_deleted: false },
        ]
    }

    #[test]
    fn initialize_creates_open_runs_for_live_leaf_processes() {
        let plan = plan_initialize(true, None, &defs(), None).unwrap();
        assert_eq!(plan.run_status, WorkflowRunStatus::Open);
        let ids: Vec<DbId> = plan.process_runs.iter().map(|p| p.process_id).collect();
        assert_eq!(ids, vec![2, 4]);
        assert!(plan
            .process_runs
            .iter()
            .all(|p| p.status == ProcessRunStatus::Open && p.data.is_none()));
    }

    #[test]
    fn initialize_seeds_initializing_process() {
        let plan = plan_initialize(true, Some(4), &defs(), Some(json!({"name": "x"}))).unwrap();
        assert_eq!(plan.run_status, WorkflowRunStatus::Ongoing);
        let seeded = plan.process_runs.iter().find(|p| p.process_id == 4).unwrap();
        assert_eq!(seeded.status, ProcessRunStatus::Ongoing);
        assert_eq!(seeded.data, Some(json!({"name": "x"})));
        let other = plan.process_runs.iter().find(|p| p.process_id == 2).unwrap();
        assert_eq!(other.data, None);
    }

    #[test]
    fn initialize_without_initializing_process_ignores_seed() {
        let plan = plan_initialize(true, None, &defs(), Some(json!({"name": "x"}))).unwrap();
        assert_eq!(plan.run_status, WorkflowRunStatus::Open);
        assert!(plan.process_runs.iter().all(|p| p.data.is_none()));
    }

    #[test]
    fn initialize_rejects_inactive_workflow() {
        assert_matches!(
            plan_initialize(false, None, &defs(), None),
            Err(CoreError::Precondition(msg)) if msg == MSG_WORKFLOW_INACTIVE
        );
    }

    #[test]
    fn initialize_rejects_workflow_without_processes() {
        let only_category = vec![ProcessDefinition { id: 1, is_category: true, is_deleted: false }];
        assert!(plan_initialize(true, None, &only_category, None).is_err());
    }

    // -- dispatch targets --------------------------------------------------

    fn workflow_bindings() -> Bindings {
        Bindings::new(vec![
            (LifecycleEvent::Initialize, "wf-init".into()),
            (LifecycleEvent::Save, "wf-save".into()),
            (LifecycleEvent::Complete, "wf-complete".into()),
            (LifecycleEvent::Last, "wf-last".into()),
            (LifecycleEvent::Archive, "wf-archive".into()),
            (LifecycleEvent::Reactivate, "wf-reactivate".into()),
        ])
    }

    fn process_bindings() -> Bindings {
        Bindings::new(vec![
            (LifecycleEvent::Save, "p-save".into()),
            (LifecycleEvent::Complete, "p-complete".into()),
            (LifecycleEvent::Reactivate, "p-reactivate".into()),
            (LifecycleEvent::Save, "wf-save".into()),
        ])
    }

    #[test]
    fn save_targets_union_without_duplicates() {
        let targets = dispatch_targets(Step::Save, &workflow_bindings(), &process_bindings());
        assert_eq!(targets, vec!["p-save", "wf-save"]);
    }

    #[test]
    fn complete_targets_include_last_only_when_run_completes() {
        let w = workflow_bindings();
        let p = process_bindings();
        assert_eq!(
            dispatch_targets(Step::Complete { completes_run: false }, &w, &p),
            vec!["p-complete", "wf-complete"]
        );
        assert_eq!(
            dispatch_targets(Step::Complete { completes_run: true }, &w, &p),
            vec!["p-complete", "wf-complete", "wf-last"]
        );
    }

    #[test]
    fn reset_targets_include_workflow_only_when_run_reopened() {
        let w = workflow_bindings();
        let p = process_bindings();
        assert_eq!(
            dispatch_targets(Step::Reset { reopens_run: false }, &w, &p),
            vec!["p-reactivate"]
        );
        assert_eq!(
            dispatch_targets(Step::Reset { reopens_run: true }, &w, &p),
            vec!["p-reactivate", "wf-reactivate"]
        );
    }

    #[test]
    fn reactivate_reuses_archive_bindings() {
        let w = workflow_bindings();
        let none = Bindings::default();
        assert_eq!(dispatch_targets(Step::Archive, &w, &none), vec!["wf-archive"]);
        assert_eq!(dispatch_targets(Step::Reactivate, &w, &none), vec!["wf-archive"]);
        assert_eq!(dispatch_targets(Step::Initialize, &w, &none), vec!["wf-init"]);
    }

    #[test]
    fn event_names_parse() {
        assert_eq!("last".parse::<LifecycleEvent>().unwrap(), LifecycleEvent::Last);
        assert!("delete".parse::<LifecycleEvent>().is_err());
        assert!(LifecycleEvent::Reactivate.allowed_on_process());
        assert!(!LifecycleEvent::Initialize.allowed_on_process());
    }

    #[test]
    fn submission_context_serializes_camel_case() {
        let ctx = SubmissionContext {
            event: LifecycleEvent::Save,
            workflow_id: 1,
            workflow_name: "Urlaub".into(),
            workflow_run_id: 2,
            process_run_id: Some(3),
            process_name: None,
            user: SubmissionUser { id: 4, email: "a@b.de".into(), name: "A".into() },
            data: FormData::new(),
            message: None,
        };
        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["event"], "save");
        assert_eq!(json["workflowRunId"], 2);
        assert_eq!(json["processRunId"], 3);
        assert!(json.get("processName").is_none());
        assert!(json.get("message").is_none());
    }
}
