use crate::types::{MergePolicy, MergeState, PullRequest};

/// Reasons a pull request is held back from auto-merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeBlocker {
    Draft,
    NotClean(MergeState),
    MissingLabel(String),
}

impl std::fmt::Display for MergeBlocker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeBlocker::Draft => write!(f, "pull request is a draft"),
            MergeBlocker::NotClean(state) => write!(f, "merge state is {}", state.as_str()),
            MergeBlocker::MissingLabel(label) => write!(f, "missing label '{label}'"),
        }
    }
}

/// Checks whether `pr` may be merged under `policy`.
pub fn check_mergeable(pr: &PullRequest, policy: &MergePolicy) -> Result<(), MergeBlocker> {
    if pr.is_draft {
        return Err(MergeBlocker::Draft);
    }
    if pr.merge_state != MergeState::Clean {
        return Err(MergeBlocker::NotClean(pr.merge_state));
    }
    if let Some(label) = &policy.required_label {
        if !pr.has_label(label) {
            return Err(MergeBlocker::MissingLabel(label.clone()));
        }
    }
    Ok(())
}
