//! GraphQL documents and response shapes for pull request triage data.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::{MergeState, Participant};

/// Upper bound on pages walked for a single connection before the fetch is
/// treated as incomplete.
pub const MAX_PAGES: usize = 50;

const ACTOR_FIELDS: &str = r#"
    __typename
    login
    ... on Node { id }
"#;

fn pull_request_fields() -> String {
    format!(
        r#"
        id
        number
        title
        url
        isDraft
        mergeStateStatus
        author {{ {ACTOR_FIELDS} }}
        assignees(first: 100) {{
            nodes {{ id login }}
            pageInfo {{ hasNextPage endCursor }}
        }}
        labels(first: 100) {{
            nodes {{ name }}
            pageInfo {{ hasNextPage endCursor }}
        }}
        closingIssuesReferences(first: 25) {{
            nodes {{
                number
                labels(first: 100) {{
                    nodes {{ name }}
                    pageInfo {{ hasNextPage endCursor }}
                }}
            }}
            pageInfo {{ hasNextPage endCursor }}
        }}
        "#
    )
}

/// Lists open pull requests in a repository, oldest first.
pub fn create_open_pull_requests_query() -> serde_json::Value {
    serde_json::json!({
        "query": format!(
            r#"
            query($owner: String!, $name: String!, $first: Int!, $after: String) {{
                repository(owner: $owner, name: $name) {{
                    pullRequests(states: OPEN, first: $first, after: $after, orderBy: {{field: CREATED_AT, direction: ASC}}) {{
                        nodes {{ {} }}
                        pageInfo {{ hasNextPage endCursor }}
                    }}
                }}
            }}
            "#,
            pull_request_fields()
        ),
        "variables": {}
    })
}

/// Fetches one pull request by number.
pub fn create_pull_request_query() -> serde_json::Value {
    serde_json::json!({
        "query": format!(
            r#"
            query($owner: String!, $name: String!, $number: Int!) {{
                repository(owner: $owner, name: $name) {{
                    pullRequest(number: $number) {{ {} }}
                }}
            }}
            "#,
            pull_request_fields()
        ),
        "variables": {}
    })
}

/// Walks one page of a pull request's review-request timeline.
pub fn create_timeline_query() -> serde_json::Value {
    serde_json::json!({
        "query": r#"
            query($id: ID!, $after: String) {
                node(id: $id) {
                    ... on PullRequest {
                        timelineItems(first: 100, after: $after, itemTypes: [REVIEW_REQUESTED_EVENT, REVIEW_REQUEST_REMOVED_EVENT]) {
                            nodes {
                                __typename
                                ... on ReviewRequestedEvent {
                                    createdAt
                                    requestedReviewer {
                                        __typename
                                        ... on User { id login }
                                        ... on Bot { id login }
                                        ... on Mannequin { id login }
                                    }
                                }
                                ... on ReviewRequestRemovedEvent {
                                    createdAt
                                    requestedReviewer {
                                        __typename
                                        ... on User { id login }
                                        ... on Bot { id login }
                                        ... on Mannequin { id login }
                                    }
                                }
                            }
                            pageInfo { hasNextPage endCursor }
                        }
                    }
                }
            }
        "#,
        "variables": {}
    })
}

/// Walks one page of a pull request's formal reviews.
pub fn create_reviews_query() -> serde_json::Value {
    serde_json::json!({
        "query": format!(
            r#"
            query($id: ID!, $after: String) {{
                node(id: $id) {{
                    ... on PullRequest {{
                        reviews(first: 100, after: $after) {{
                            nodes {{
                                state
                                createdAt
                                submittedAt
                                author {{ {ACTOR_FIELDS} }}
                            }}
                            pageInfo {{ hasNextPage endCursor }}
                        }}
                    }}
                }}
            }}
            "#
        ),
        "variables": {}
    })
}

#[derive(Debug, Deserialize)]
pub struct GraphQLResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Connection<T> {
    pub nodes: Vec<T>,
    #[serde(rename = "pageInfo")]
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub struct RepositoryData<T> {
    pub repository: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestsConnection {
    pub pull_requests: Connection<GraphQLPullRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePullRequest {
    pub pull_request: Option<GraphQLPullRequest>,
}

#[derive(Debug, Deserialize)]
pub struct NodeData<T> {
    pub node: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePage {
    pub timeline_items: Connection<TimelineRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewsPage {
    pub reviews: Connection<ReviewRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLPullRequest {
    pub id: String,
    pub number: u64,
    pub title: String,
    pub url: String,
    pub is_draft: bool,
    #[serde(default)]
    pub merge_state_status: MergeState,
    pub author: Option<GraphQLActor>,
    pub assignees: Connection<GraphQLUser>,
    pub labels: Connection<GraphQLLabel>,
    pub closing_issues_references: Connection<GraphQLLinkedIssue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLActor {
    #[serde(rename = "__typename")]
    pub typename: String,
    pub login: String,
    pub id: Option<String>,
}

impl GraphQLActor {
    /// Actors without a node id (deleted accounts) carry no stable identity.
    pub fn to_participant(&self) -> Option<Participant> {
        self.id
            .as_ref()
            .map(|id| Participant::new(self.login.clone(), id.clone()))
    }
}

#[derive(Debug, Deserialize)]
pub struct GraphQLUser {
    pub id: String,
    pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLLabel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct GraphQLLinkedIssue {
    pub number: u64,
    pub labels: Connection<GraphQLLabel>,
}

/// A review-request timeline entry as GitHub returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    #[serde(rename = "__typename")]
    pub typename: String,
    pub created_at: Option<DateTime<Utc>>,
    pub requested_reviewer: Option<RequestedReviewer>,
}

/// Teams have neither `id` nor `login` selected, so both are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestedReviewer {
    #[serde(rename = "__typename")]
    pub typename: String,
    pub id: Option<String>,
    pub login: Option<String>,
}

/// A formal pull request review.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub state: String,
    pub created_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub author: Option<GraphQLActor>,
}
