use std::{collections::BTreeSet, fmt};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A GitHub repository identified by owner and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Repo {
    owner: String,
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    EmptyOwner,
    EmptyName,
    InvalidFormat(String),
    InvalidUrl(String),
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepoError::EmptyOwner => write!(f, "repository owner cannot be empty"),
            RepoError::EmptyName => write!(f, "repository name cannot be empty"),
            RepoError::InvalidFormat(s) => {
                write!(f, "repository must be in format 'owner/repo', got: '{s}'")
            }
            RepoError::InvalidUrl(s) => write!(f, "not a GitHub pull request URL: '{s}'"),
        }
    }
}

impl std::error::Error for RepoError {}

impl Repo {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, RepoError> {
        let owner = owner.into();
        let name = name.into();
        if owner.trim().is_empty() {
            return Err(RepoError::EmptyOwner);
        }
        if name.trim().is_empty() {
            return Err(RepoError::EmptyName);
        }
        Ok(Self { owner, name })
    }

    /// Parses an `owner/repo` slug.
    pub fn parse(slug: &str) -> Result<Self, RepoError> {
        match slug.trim().split('/').collect::<Vec<_>>().as_slice() {
            [owner, name] => Self::new(*owner, *name),
            _ => Err(RepoError::InvalidFormat(slug.to_string())),
        }
    }

    /// Parses `https://github.com/owner/repo[/pull/N]`, returning the PR
    /// number when the URL points at one.
    pub fn parse_url(url_str: &str) -> Result<(Self, Option<u64>), RepoError> {
        let invalid = || RepoError::InvalidUrl(url_str.to_string());
        let url = url::Url::parse(url_str).map_err(|_| invalid())?;
        if url.host_str() != Some("github.com") {
            return Err(invalid());
        }

        let segments: Vec<&str> = url
            .path_segments()
            .ok_or_else(invalid)?
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            [owner, name] => Ok((Self::new(*owner, *name)?, None)),
            [owner, name, "pull", number] => {
                let number = number.parse().map_err(|_| invalid())?;
                Ok((Self::new(*owner, *name)?, Some(number)))
            }
            _ => Err(invalid()),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Repo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A user taking part in a pull request's review.
///
/// Ordering is by login first so that sets of participants iterate in a
/// stable, human-readable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Participant {
    pub login: String,
    pub id: String,
}

impl Participant {
    pub fn new(login: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.login)
    }
}

/// The participants currently expected to act on a pull request.
pub type ResponsibilitySet = BTreeSet<Participant>;

/// What happened in a single review-related timeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    ReviewRequested,
    ReviewRequestRemoved,
    Approved,
    ChangesRequested,
    Dismissed,
    Pending,
    Commented,
    Other(String),
}

impl EventKind {
    /// Maps a GraphQL `PullRequestReviewState` value.
    pub fn from_review_state(state: &str) -> Self {
        match state {
            "APPROVED" => EventKind::Approved,
            "CHANGES_REQUESTED" => EventKind::ChangesRequested,
            "DISMISSED" => EventKind::Dismissed,
            "PENDING" => EventKind::Pending,
            "COMMENTED" => EventKind::Commented,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::ReviewRequested => "REVIEW_REQUESTED",
            EventKind::ReviewRequestRemoved => "REVIEW_REQUEST_REMOVED",
            EventKind::Approved => "APPROVED",
            EventKind::ChangesRequested => "CHANGES_REQUESTED",
            EventKind::Dismissed => "DISMISSED",
            EventKind::Pending => "PENDING",
            EventKind::Commented => "COMMENTED",
            EventKind::Other(state) => state,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalised `(when, what, who)` review event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub when: DateTime<Utc>,
    pub what: EventKind,
    pub who: Participant,
}

/// GitHub's `MergeStateStatus` for a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MergeState {
    Behind,
    Blocked,
    Clean,
    Dirty,
    Draft,
    HasHooks,
    Unstable,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MergeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeState::Behind => "BEHIND",
            MergeState::Blocked => "BLOCKED",
            MergeState::Clean => "CLEAN",
            MergeState::Dirty => "DIRTY",
            MergeState::Draft => "DRAFT",
            MergeState::HasHooks => "HAS_HOOKS",
            MergeState::Unstable => "UNSTABLE",
            MergeState::Unknown => "UNKNOWN",
        }
    }
}

/// How a pull request gets merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMethod {
    #[default]
    Merge,
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

/// A pull request with its complete review history.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub repo: Repo,
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    /// `None` when the author account no longer exists.
    pub author: Option<Participant>,
    pub is_draft: bool,
    pub merge_state: MergeState,
    pub labels: Vec<String>,
    /// Labels of every issue this pull request closes, flattened.
    pub linked_issue_labels: Vec<String>,
    pub events: Vec<Event>,
    pub assignees: BTreeSet<Participant>,
}

impl PullRequest {
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|label| label == name)
    }

    pub fn author_login(&self) -> &str {
        self.author.as_ref().map_or("ghost", |a| a.login.as_str())
    }
}

/// A mutation to perform against a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddAssignees(Vec<Participant>),
    RemoveAssignees(Vec<Participant>),
    AddLabels(Vec<String>),
    Merge(MergeMethod),
}

fn join_logins(participants: &[Participant]) -> String {
    participants
        .iter()
        .map(|p| p.login.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddAssignees(_) => "add-assignees",
            Operation::RemoveAssignees(_) => "remove-assignees",
            Operation::AddLabels(_) => "add-labels",
            Operation::Merge(_) => "merge",
        }
    }

    /// Renders the equivalent `gh` invocation.
    pub fn format_shell_command(&self, pr: &PullRequest) -> String {
        let target = format!("{} --repo {}", pr.number, pr.repo);
        match self {
            Operation::AddAssignees(users) => {
                format!("gh pr edit {target} --add-assignee {}", join_logins(users))
            }
            Operation::RemoveAssignees(users) => {
                format!("gh pr edit {target} --remove-assignee {}", join_logins(users))
            }
            Operation::AddLabels(labels) => {
                format!("gh pr edit {target} --add-label \"{}\"", labels.join(","))
            }
            Operation::Merge(method) => format!("gh pr merge {target} --{}", method.as_str()),
        }
    }
}

/// An operation bound to the pull request it applies to.
#[derive(Debug, Clone)]
pub struct Task {
    pub pr_info: PullRequest,
    pub operation: Operation,
}

/// Which triage jobs to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Jobs {
    pub assign: bool,
    pub copy_labels: bool,
    pub merge: bool,
}

impl Jobs {
    pub fn any(&self) -> bool {
        self.assign || self.copy_labels || self.merge
    }
}

/// Conditions under which a pull request may be merged automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergePolicy {
    pub method: MergeMethod,
    /// When set, only pull requests carrying this label are merged.
    pub required_label: Option<String>,
}

/// Everything a triage run needs, assembled from the command line.
#[derive(Debug, Clone)]
pub struct TriageSpec {
    pub repo: Repo,
    /// Specific pull requests; empty means every open pull request.
    pub prs: Vec<u64>,
    pub exclude: Vec<u64>,
    pub limit: usize,
    pub jobs: Jobs,
    pub merge_policy: MergePolicy,
    pub apply: bool,
    pub concurrency: usize,
}

impl TriageSpec {
    pub fn has_jobs(&self) -> bool {
        self.jobs.any()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMode {
    Normal,
    Quiet,
    Detailed,
}

/// Pull requests considered by a run and the tasks planned for them.
#[derive(Debug)]
pub struct TriageResult {
    pub pull_requests: Vec<PullRequest>,
    pub tasks: Vec<Task>,
}

/// The code-hosting platform: a source of pull requests and a sink for
/// mutations.
///
/// Implementations of `fetch_pull_requests` must return complete review
/// histories or fail; partial data is never acceptable.
#[async_trait]
pub trait Forge {
    async fn fetch_pull_requests(&self, spec: &TriageSpec) -> Result<Vec<PullRequest>>;

    async fn add_assignees(&self, repo: &Repo, number: u64, users: &[Participant]) -> Result<()>;

    async fn remove_assignees(&self, repo: &Repo, number: u64, users: &[Participant])
    -> Result<()>;

    async fn add_labels(&self, repo: &Repo, number: u64, labels: &[String]) -> Result<()>;

    async fn merge(&self, repo: &Repo, number: u64, method: MergeMethod) -> Result<()>;
}
