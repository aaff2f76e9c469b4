use std::process::Command;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use octocrab::{Octocrab, params::pulls::MergeMethod as OctoMergeMethod};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    graphql::{
        Connection, GraphQLPullRequest, GraphQLResponse, MAX_PAGES, NodeData, PullRequestsConnection,
        RepositoryData, ReviewRecord, ReviewsPage, SinglePullRequest, TimelinePage,
        TimelineRecord, create_open_pull_requests_query, create_pull_request_query,
        create_reviews_query, create_timeline_query,
    },
    normalize::normalize,
    types::{Event, Forge, MergeMethod, Participant, PullRequest, Repo, TriageSpec},
};

const PAGE_SIZE: usize = 50;

pub fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();
    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

/// GitHub-backed [`Forge`]: GraphQL for reads, REST for mutations.
pub struct GitHub {
    client: Octocrab,
}

impl GitHub {
    pub fn new(client: Octocrab) -> Self {
        Self { client }
    }

    /// Creates an authenticated client using available credentials.
    pub fn from_env() -> Result<Self> {
        let token = get_github_token().context("Failed to obtain GitHub authentication token")?;
        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self::new(client))
    }

    async fn graphql<T: DeserializeOwned>(&self, query: &serde_json::Value) -> Result<T> {
        let response: GraphQLResponse<T> = self
            .client
            .graphql(query)
            .await
            .context("GitHub GraphQL request failed")?;
        Ok(response.data)
    }

    /// Walks every page of a connection. Running out of cursors or pages
    /// before the end is an error: callers never see a truncated list.
    async fn paginate<T, P, Fut>(&self, what: &str, fetch_page: P) -> Result<Vec<T>>
    where
        P: FnMut(Option<String>) -> Fut,
        Fut: std::future::Future<Output = Result<Connection<T>>>,
    {
        self.paginate_up_to(what, usize::MAX, fetch_page).await
    }

    /// Like [`GitHub::paginate`], but stops once `limit` items are in hand.
    async fn paginate_up_to<T, P, Fut>(
        &self,
        what: &str,
        limit: usize,
        mut fetch_page: P,
    ) -> Result<Vec<T>>
    where
        P: FnMut(Option<String>) -> Fut,
        Fut: std::future::Future<Output = Result<Connection<T>>>,
    {
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let connection = fetch_page(after.take()).await?;
            items.extend(connection.nodes);

            if items.len() >= limit || !connection.page_info.has_next_page {
                debug!(what, page, count = items.len(), "pagination complete");
                items.truncate(limit);
                return Ok(items);
            }

            match connection.page_info.end_cursor {
                Some(cursor) => after = Some(cursor),
                None => anyhow::bail!("Incomplete {what}: next page reported without a cursor"),
            }
        }

        anyhow::bail!("Incomplete {what}: more than {MAX_PAGES} pages")
    }

    async fn fetch_timeline(&self, pr_id: &str) -> Result<Vec<TimelineRecord>> {
        self.paginate("timeline", |after| async move {
            let mut query = create_timeline_query();
            query["variables"]["id"] = serde_json::Value::String(pr_id.to_string());
            query["variables"]["after"] = after.map_or(serde_json::Value::Null, Into::into);
            let data: NodeData<TimelinePage> = self.graphql(&query).await?;
            data.node
                .map(|node| node.timeline_items)
                .with_context(|| format!("Pull request {pr_id} disappeared"))
        })
        .await
    }

    async fn fetch_reviews(&self, pr_id: &str) -> Result<Vec<ReviewRecord>> {
        self.paginate("reviews", |after| async move {
            let mut query = create_reviews_query();
            query["variables"]["id"] = serde_json::Value::String(pr_id.to_string());
            query["variables"]["after"] = after.map_or(serde_json::Value::Null, Into::into);
            let data: NodeData<ReviewsPage> = self.graphql(&query).await?;
            data.node
                .map(|node| node.reviews)
                .with_context(|| format!("Pull request {pr_id} disappeared"))
        })
        .await
    }

    async fn list_open_pull_requests(
        &self,
        repo: &Repo,
        limit: usize,
    ) -> Result<Vec<GraphQLPullRequest>> {
        let what = format!("pull request list for {repo}");
        self.paginate_up_to(&what, limit, |after| async move {
            let mut query = create_open_pull_requests_query();
            query["variables"]["owner"] = repo.owner().into();
            query["variables"]["name"] = repo.name().into();
            query["variables"]["first"] = PAGE_SIZE.into();
            query["variables"]["after"] = after.map_or(serde_json::Value::Null, Into::into);

            let data: RepositoryData<PullRequestsConnection> = self.graphql(&query).await?;
            anyhow::Ok(data.repository.pull_requests)
        })
        .await
    }

    async fn fetch_pull_request(&self, repo: &Repo, number: u64) -> Result<GraphQLPullRequest> {
        let mut query = create_pull_request_query();
        query["variables"]["owner"] = repo.owner().into();
        query["variables"]["name"] = repo.name().into();
        query["variables"]["number"] = number.into();

        let data: RepositoryData<SinglePullRequest> = self.graphql(&query).await?;
        data.repository
            .pull_request
            .with_context(|| format!("Pull request {repo}#{number} not found"))
    }

    /// Completes a pull request with its full review history.
    async fn hydrate(&self, repo: &Repo, pr: GraphQLPullRequest) -> Result<PullRequest> {
        ensure_complete(repo, &pr)?;

        let (timeline, reviews) =
            futures::try_join!(self.fetch_timeline(&pr.id), self.fetch_reviews(&pr.id))
                .with_context(|| format!("Failed to fetch history of {repo}#{}", pr.number))?;

        let events = normalize(&timeline, &reviews);
        debug!(pr = pr.number, events = events.len(), "fetched review history");

        Ok(convert_graphql_pr(repo, pr, events))
    }
}

/// Fails when GitHub cut off any of the pull request's inline connections.
fn ensure_complete(repo: &Repo, pr: &GraphQLPullRequest) -> Result<()> {
    if pr.assignees.page_info.has_next_page {
        anyhow::bail!("Pull request {repo}#{} has more than 100 assignees", pr.number);
    }
    if pr.labels.page_info.has_next_page {
        anyhow::bail!("Pull request {repo}#{} has more than 100 labels", pr.number);
    }
    if pr.closing_issues_references.page_info.has_next_page {
        anyhow::bail!("Pull request {repo}#{} closes more than 25 issues", pr.number);
    }
    if let Some(issue) = pr
        .closing_issues_references
        .nodes
        .iter()
        .find(|issue| issue.labels.page_info.has_next_page)
    {
        anyhow::bail!(
            "Issue #{} linked from {repo}#{} has more than 100 labels",
            issue.number,
            pr.number
        );
    }
    Ok(())
}

/// Builds a domain pull request from its GraphQL shape and history.
pub fn convert_graphql_pr(
    repo: &Repo,
    pr: GraphQLPullRequest,
    events: Vec<Event>,
) -> PullRequest {
    PullRequest {
        repo: repo.clone(),
        id: pr.id,
        number: pr.number,
        title: pr.title,
        url: pr.url,
        author: pr.author.as_ref().and_then(|a| a.to_participant()),
        is_draft: pr.is_draft,
        merge_state: pr.merge_state_status,
        labels: pr.labels.nodes.into_iter().map(|l| l.name).collect(),
        linked_issue_labels: pr
            .closing_issues_references
            .nodes
            .into_iter()
            .flat_map(|issue| issue.labels.nodes.into_iter().map(|l| l.name))
            .collect(),
        events,
        assignees: pr
            .assignees
            .nodes
            .into_iter()
            .map(|u| Participant::new(u.login, u.id))
            .collect(),
    }
}

fn logins(users: &[Participant]) -> Vec<&str> {
    users.iter().map(|u| u.login.as_str()).collect()
}

#[async_trait]
impl Forge for GitHub {
    async fn fetch_pull_requests(&self, spec: &TriageSpec) -> Result<Vec<PullRequest>> {
        let repo = &spec.repo;
        let concurrency = spec.concurrency.max(1);

        let raw: Vec<GraphQLPullRequest> = if spec.prs.is_empty() {
            // Over-fetch by the exclusion count so `limit` still holds
            // after excluded pull requests are dropped.
            self.list_open_pull_requests(repo, spec.limit + spec.exclude.len())
                .await?
        } else {
            stream::iter(spec.prs.iter().copied())
                .map(|number| self.fetch_pull_request(repo, number))
                .buffered(concurrency)
                .try_collect()
                .await?
        };

        stream::iter(raw)
            .filter(|pr| std::future::ready(!spec.exclude.contains(&pr.number)))
            .map(|pr| self.hydrate(repo, pr))
            .buffered(concurrency)
            .try_collect()
            .await
    }

    async fn add_assignees(&self, repo: &Repo, number: u64, users: &[Participant]) -> Result<()> {
        self.client
            .issues(repo.owner(), repo.name())
            .add_assignees(number, &logins(users))
            .await
            .with_context(|| format!("Failed to add assignees to {repo}#{number}"))?;
        Ok(())
    }

    async fn remove_assignees(
        &self,
        repo: &Repo,
        number: u64,
        users: &[Participant],
    ) -> Result<()> {
        self.client
            .issues(repo.owner(), repo.name())
            .remove_assignees(number, &logins(users))
            .await
            .with_context(|| format!("Failed to remove assignees from {repo}#{number}"))?;
        Ok(())
    }

    async fn add_labels(&self, repo: &Repo, number: u64, labels: &[String]) -> Result<()> {
        self.client
            .issues(repo.owner(), repo.name())
            .add_labels(number, labels)
            .await
            .with_context(|| format!("Failed to add labels to {repo}#{number}"))?;
        Ok(())
    }

    async fn merge(&self, repo: &Repo, number: u64, method: MergeMethod) -> Result<()> {
        let method = match method {
            MergeMethod::Merge => OctoMergeMethod::Merge,
            MergeMethod::Squash => OctoMergeMethod::Squash,
            MergeMethod::Rebase => OctoMergeMethod::Rebase,
        };
        self.client
            .pulls(repo.owner(), repo.name())
            .merge(number)
            .method(method)
            .send()
            .await
            .with_context(|| format!("Failed to merge {repo}#{number}"))?;
        Ok(())
    }
}
