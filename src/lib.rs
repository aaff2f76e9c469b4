//! Prtriage: automated pull request triage.
//!
//! Works out who is currently holding up each pull request by replaying its
//! review history, keeps assignees in line with that, copies labels from
//! the issues a pull request closes, and merges pull requests that are
//! clean. The decision logic is pure; all GitHub traffic goes through the
//! [`Forge`] trait.

pub mod cli;
pub mod github;
pub mod graphql;
pub mod labels;
pub mod merge;
pub mod normalize;
pub mod reconcile;
pub mod resolve;
pub mod triage;
pub mod types;

pub use cli::parse_args;
pub use github::GitHub;
pub use labels::labels_to_copy;
pub use merge::{MergeBlocker, check_mergeable};
pub use normalize::normalize;
pub use reconcile::{AssigneeDelta, reconcile};
pub use resolve::{Resolution, resolve, resolve_events, responsible};
pub use triage::{ApplyReport, apply_tasks, plan_pull_request, plan_triage};
pub use types::{
    DisplayMode, Event, EventKind, Forge, Jobs, MergeMethod, MergePolicy, MergeState, Operation,
    Participant, PullRequest, Repo, RepoError, ResponsibilitySet, Task, TriageResult, TriageSpec,
};
