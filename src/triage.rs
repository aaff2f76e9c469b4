use std::collections::{BTreeMap, HashSet};

use anyhow::Result;
use futures::{StreamExt, stream};
use tracing::{debug, error, info};

use crate::{
    labels::labels_to_copy,
    merge::check_mergeable,
    reconcile::reconcile,
    resolve::resolve,
    types::{Forge, Jobs, MergePolicy, Operation, PullRequest, Task, TriageResult, TriageSpec},
};

/// Fetches pull requests and plans the enabled triage jobs for each.
///
/// Excluded pull requests are dropped before `limit` is applied. Planning
/// is pure: nothing is mutated until the returned tasks are applied.
pub async fn plan_triage<F>(spec: &TriageSpec, forge: &F) -> Result<TriageResult>
where
    F: Forge + Sync,
{
    let excluded: HashSet<u64> = spec.exclude.iter().copied().collect();

    let pull_requests: Vec<PullRequest> = forge
        .fetch_pull_requests(spec)
        .await?
        .into_iter()
        .filter(|pr| !excluded.contains(&pr.number))
        .take(spec.limit)
        .collect();

    let tasks = pull_requests
        .iter()
        .flat_map(|pr| plan_pull_request(pr, &spec.jobs, &spec.merge_policy))
        .collect();

    Ok(TriageResult {
        pull_requests,
        tasks,
    })
}

/// Plans the tasks for a single pull request.
pub fn plan_pull_request(pr: &PullRequest, jobs: &Jobs, merge_policy: &MergePolicy) -> Vec<Task> {
    let mut operations = Vec::new();

    if jobs.assign {
        let resolution = resolve(pr);
        let delta = reconcile(&pr.assignees, resolution.responsible());
        debug!(
            pr = pr.number,
            override_ = resolution.is_override(),
            add = delta.to_add.len(),
            remove = delta.to_remove.len(),
            "resolved responsibility"
        );
        if !delta.to_add.is_empty() {
            operations.push(Operation::AddAssignees(delta.to_add));
        }
        if !delta.to_remove.is_empty() {
            operations.push(Operation::RemoveAssignees(delta.to_remove));
        }
    }

    if jobs.copy_labels {
        let labels = labels_to_copy(&pr.labels, &pr.linked_issue_labels);
        if !labels.is_empty() {
            operations.push(Operation::AddLabels(labels));
        }
    }

    if jobs.merge {
        match check_mergeable(pr, merge_policy) {
            Ok(()) => operations.push(Operation::Merge(merge_policy.method)),
            Err(blocker) => debug!(pr = pr.number, %blocker, "not merging"),
        }
    }

    operations
        .into_iter()
        .map(|operation| Task {
            pr_info: pr.clone(),
            operation,
        })
        .collect()
}

async fn apply_task<F>(task: &Task, forge: &F) -> Result<()>
where
    F: Forge + Sync,
{
    let pr = &task.pr_info;
    match &task.operation {
        Operation::AddAssignees(users) => forge.add_assignees(&pr.repo, pr.number, users).await,
        Operation::RemoveAssignees(users) => {
            forge.remove_assignees(&pr.repo, pr.number, users).await
        }
        Operation::AddLabels(labels) => forge.add_labels(&pr.repo, pr.number, labels).await,
        Operation::Merge(method) => forge.merge(&pr.repo, pr.number, *method).await,
    }
}

/// Outcome of applying a batch of tasks.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: usize,
    pub failed: usize,
}

/// Applies tasks through the forge.
///
/// Tasks for one pull request run in planning order; different pull
/// requests proceed concurrently, at most `concurrency` at a time. A failed
/// task is logged and stops the remaining tasks of its pull request only.
pub async fn apply_tasks<F>(tasks: &[Task], forge: &F, concurrency: usize) -> ApplyReport
where
    F: Forge + Sync,
{
    let mut by_pr: BTreeMap<(String, u64), Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        by_pr
            .entry((task.pr_info.repo.to_string(), task.pr_info.number))
            .or_default()
            .push(task);
    }

    let results: Vec<(usize, usize)> = stream::iter(by_pr.into_values())
        .map(|pr_tasks| async move {
            let mut applied = 0;
            for (index, task) in pr_tasks.iter().enumerate() {
                match apply_task(task, forge).await {
                    Ok(()) => {
                        info!(
                            pr = task.pr_info.number,
                            operation = task.operation.name(),
                            "applied"
                        );
                        applied += 1;
                    }
                    Err(err) => {
                        error!(
                            pr = task.pr_info.number,
                            operation = task.operation.name(),
                            "failed: {err:#}"
                        );
                        return (applied, pr_tasks.len() - index);
                    }
                }
            }
            (applied, 0)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results
        .into_iter()
        .fold(ApplyReport::default(), |mut report, (applied, failed)| {
            report.applied += applied;
            report.failed += failed;
            report
        })
}
