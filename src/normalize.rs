//! Flattens review-request timeline entries and formal reviews into
//! uniform [`Event`]s.

use tracing::trace;

use crate::{
    graphql::{RequestedReviewer, ReviewRecord, TimelineRecord},
    types::{Event, EventKind, Participant},
};

/// Timeline record kinds that carry review-request information.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineKind {
    ReviewRequested,
    ReviewRequestRemoved,
    Unknown,
}

impl TimelineKind {
    pub fn from_typename(typename: &str) -> Self {
        match typename {
            "ReviewRequestedEvent" => TimelineKind::ReviewRequested,
            "ReviewRequestRemovedEvent" => TimelineKind::ReviewRequestRemoved,
            _ => TimelineKind::Unknown,
        }
    }
}

fn reviewer_participant(reviewer: &RequestedReviewer) -> Option<Participant> {
    match (&reviewer.login, &reviewer.id) {
        (Some(login), Some(id)) => Some(Participant::new(login.clone(), id.clone())),
        _ => None,
    }
}

fn timeline_event(record: &TimelineRecord) -> Option<Event> {
    let what = match TimelineKind::from_typename(&record.typename) {
        TimelineKind::ReviewRequested => EventKind::ReviewRequested,
        TimelineKind::ReviewRequestRemoved => EventKind::ReviewRequestRemoved,
        TimelineKind::Unknown => return None,
    };
    let when = record.created_at?;
    // Team review requests have no user behind them.
    let who = record.requested_reviewer.as_ref().and_then(reviewer_participant)?;
    Some(Event { when, what, who })
}

fn review_event(review: &ReviewRecord) -> Option<Event> {
    let when = review.submitted_at.or(review.created_at)?;
    let who = review.author.as_ref()?.to_participant()?;
    Some(Event {
        when,
        what: EventKind::from_review_state(&review.state),
        who,
    })
}

/// Converts raw records into events, timeline entries first and then
/// reviews, each in retrieval order. Records that cannot be attributed to a
/// user at a point in time are dropped.
pub fn normalize(timeline: &[TimelineRecord], reviews: &[ReviewRecord]) -> Vec<Event> {
    let mut events = Vec::with_capacity(timeline.len() + reviews.len());

    for record in timeline {
        match timeline_event(record) {
            Some(event) => events.push(event),
            None => trace!(typename = %record.typename, "dropping timeline record"),
        }
    }

    for review in reviews {
        match review_event(review) {
            Some(event) => events.push(event),
            None => trace!(state = %review.state, "dropping review without author or time"),
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::graphql::GraphQLActor;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn user(login: &str) -> RequestedReviewer {
        RequestedReviewer {
            typename: "User".to_string(),
            id: Some(format!("U_{login}")),
            login: Some(login.to_string()),
        }
    }

    fn request(typename: &str, minute: u32, reviewer: RequestedReviewer) -> TimelineRecord {
        TimelineRecord {
            typename: typename.to_string(),
            created_at: Some(at(minute)),
            requested_reviewer: Some(reviewer),
        }
    }

    fn review(state: &str, login: Option<&str>, submitted: Option<u32>) -> ReviewRecord {
        ReviewRecord {
            state: state.to_string(),
            created_at: Some(at(0)),
            submitted_at: submitted.map(at),
            author: login.map(|login| GraphQLActor {
                typename: "User".to_string(),
                login: login.to_string(),
                id: Some(format!("U_{login}")),
            }),
        }
    }

    #[test]
    fn test_normalize_review_requests() {
        let timeline = vec![
            request("ReviewRequestedEvent", 1, user("alice")),
            request("ReviewRequestRemovedEvent", 2, user("alice")),
        ];

        let events = normalize(&timeline, &[]);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].what, EventKind::ReviewRequested);
        assert_eq!(events[0].who.login, "alice");
        assert_eq!(events[0].when, at(1));
        assert_eq!(events[1].what, EventKind::ReviewRequestRemoved);
    }

    #[test]
    fn test_normalize_drops_team_requests() {
        let team = RequestedReviewer {
            typename: "Team".to_string(),
            id: None,
            login: None,
        };
        let timeline = vec![request("ReviewRequestedEvent", 1, team)];

        assert!(normalize(&timeline, &[]).is_empty());
    }

    #[test]
    fn test_normalize_drops_unknown_record_kinds() {
        let timeline = vec![request("LabeledEvent", 1, user("alice"))];

        assert!(normalize(&timeline, &[]).is_empty());
    }

    #[test]
    fn test_normalize_reviews() {
        let reviews = vec![
            review("APPROVED", Some("bob"), Some(5)),
            review("CHANGES_REQUESTED", Some("carol"), Some(6)),
            review("SOMETHING_NEW", Some("dave"), Some(7)),
        ];

        let events = normalize(&[], &reviews);

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].what, EventKind::Approved);
        assert_eq!(events[1].what, EventKind::ChangesRequested);
        assert_eq!(
            events[2].what,
            EventKind::Other("SOMETHING_NEW".to_string())
        );
    }

    #[test]
    fn test_normalize_pending_review_uses_creation_time() {
        let reviews = vec![review("PENDING", Some("bob"), None)];

        let events = normalize(&[], &reviews);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].what, EventKind::Pending);
        assert_eq!(events[0].when, at(0));
    }

    #[test]
    fn test_normalize_skips_ghost_reviewers() {
        let reviews = vec![review("APPROVED", None, Some(5))];

        assert!(normalize(&[], &reviews).is_empty());
    }

    #[test]
    fn test_normalize_preserves_timeline_then_review_order() {
        let timeline = vec![request("ReviewRequestedEvent", 9, user("alice"))];
        let reviews = vec![review("COMMENTED", Some("alice"), Some(1))];

        let events = normalize(&timeline, &reviews);

        assert_eq!(events[0].what, EventKind::ReviewRequested);
        assert_eq!(events[1].what, EventKind::Commented);
    }
}
