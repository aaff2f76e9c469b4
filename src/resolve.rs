//! Decides who is currently responsible for moving a pull request forward.
//!
//! Each reviewer's own history is replayed newest-first: the most recent
//! event that says something definite about them wins. An outstanding
//! change request anywhere on the pull request hands it back to the
//! author, regardless of what anyone else is doing.

use std::collections::BTreeMap;

use tracing::debug;

use crate::types::{Event, EventKind, Participant, PullRequest, ResponsibilitySet};

/// Outcome of resolving a pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Union of every reviewer whose own history leaves them responsible.
    Normal(ResponsibilitySet),
    /// A change request redirected the whole pull request; per-reviewer
    /// verdicts were discarded.
    Override(ResponsibilitySet),
}

impl Resolution {
    pub fn responsible(&self) -> &ResponsibilitySet {
        match self {
            Resolution::Normal(set) | Resolution::Override(set) => set,
        }
    }

    pub fn into_responsible(self) -> ResponsibilitySet {
        match self {
            Resolution::Normal(set) | Resolution::Override(set) => set,
        }
    }

    pub fn is_override(&self) -> bool {
        matches!(self, Resolution::Override(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Responsible,
    NotResponsible,
    Override(Participant),
}

/// Replays one participant's events, most recent first.
fn scan_participant(events: &[&Event], author: Option<&Participant>) -> Verdict {
    let mut withdrawn = false;

    for event in events.iter().rev() {
        match &event.what {
            EventKind::ReviewRequested if !withdrawn => return Verdict::Responsible,
            EventKind::Dismissed | EventKind::Pending => return Verdict::Responsible,
            EventKind::ChangesRequested => {
                if let Some(author) = author {
                    return Verdict::Override(author.clone());
                }
            }
            EventKind::Approved => return Verdict::NotResponsible,
            EventKind::ReviewRequestRemoved => withdrawn = true,
            _ => {}
        }
    }

    Verdict::NotResponsible
}

/// Groups events by participant, leaving out the author. Each group keeps
/// the relative order of `events`.
fn partition_by_participant<'a>(
    events: &'a [Event],
    author: Option<&Participant>,
) -> BTreeMap<&'a Participant, Vec<&'a Event>> {
    let mut by_participant: BTreeMap<&Participant, Vec<&Event>> = BTreeMap::new();
    for event in events {
        if author == Some(&event.who) {
            continue;
        }
        by_participant.entry(&event.who).or_default().push(event);
    }
    by_participant
}

/// Resolves responsibility from an event history in any order.
pub fn resolve_events(events: &[Event], author: Option<&Participant>) -> Resolution {
    let mut sorted = events.to_vec();
    // Stable: simultaneous events keep their retrieval order.
    sorted.sort_by_key(|event| event.when);

    let mut responsible = ResponsibilitySet::new();

    for (participant, history) in partition_by_participant(&sorted, author) {
        match scan_participant(&history, author) {
            Verdict::Responsible => {
                responsible.insert(participant.clone());
            }
            Verdict::NotResponsible => {}
            Verdict::Override(author) => {
                debug!(reviewer = %participant, %author, "changes requested, handing back to author");
                return Resolution::Override(ResponsibilitySet::from([author]));
            }
        }
    }

    Resolution::Normal(responsible)
}

/// Resolves responsibility for a pull request from its full event history.
pub fn resolve(pr: &PullRequest) -> Resolution {
    resolve_events(&pr.events, pr.author.as_ref())
}

/// Shorthand for the responsible set of `pr`.
pub fn responsible(pr: &PullRequest) -> ResponsibilitySet {
    resolve(pr).into_responsible()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn user(login: &str) -> Participant {
        Participant::new(login, format!("U_{login}"))
    }

    fn at(t: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, t, 0).unwrap()
    }

    fn ev(what: EventKind, login: &str, t: u32) -> Event {
        Event {
            when: at(t),
            what,
            who: user(login),
        }
    }

    fn set(logins: &[&str]) -> ResponsibilitySet {
        logins.iter().map(|l| user(l)).collect()
    }

    #[test]
    fn test_requested_reviewer_is_responsible() {
        let events = vec![ev(EventKind::ReviewRequested, "alice", 1)];
        let resolution = resolve_events(&events, Some(&user("bob")));
        assert_eq!(resolution, Resolution::Normal(set(&["alice"])));
    }

    #[test]
    fn test_withdrawn_request_is_not_responsible() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::ReviewRequestRemoved, "alice", 2),
        ];
        assert_eq!(
            resolve_events(&events, Some(&user("bob"))),
            Resolution::Normal(set(&[]))
        );
    }

    #[test]
    fn test_approval_closes_chain() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::Approved, "alice", 2),
        ];
        assert_eq!(
            resolve_events(&events, Some(&user("bob"))),
            Resolution::Normal(set(&[]))
        );
    }

    #[test]
    fn test_changes_requested_overrides_to_author() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::ChangesRequested, "bob", 2),
        ];
        assert_eq!(
            resolve_events(&events, Some(&user("carol"))),
            Resolution::Override(set(&["carol"]))
        );
    }

    #[test]
    fn test_pending_review_is_responsible() {
        let events = vec![ev(EventKind::Pending, "alice", 1)];
        assert_eq!(
            resolve_events(&events, Some(&user("bob"))).into_responsible(),
            set(&["alice"])
        );
    }

    #[test]
    fn test_dismissed_review_is_responsible() {
        let events = vec![
            ev(EventKind::Approved, "alice", 1),
            ev(EventKind::Dismissed, "alice", 2),
        ];
        assert_eq!(
            resolve_events(&events, None).into_responsible(),
            set(&["alice"])
        );
    }

    #[test]
    fn test_rerequest_after_withdrawal_is_responsible() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::ReviewRequestRemoved, "alice", 2),
            ev(EventKind::ReviewRequested, "alice", 3),
        ];
        assert_eq!(
            resolve_events(&events, None).into_responsible(),
            set(&["alice"])
        );
    }

    #[test]
    fn test_withdrawal_covers_every_earlier_request() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::ReviewRequested, "alice", 2),
            ev(EventKind::ReviewRequestRemoved, "alice", 3),
        ];
        assert!(resolve_events(&events, None).responsible().is_empty());
    }

    #[test]
    fn test_withdrawal_does_not_hide_pending_review() {
        let events = vec![
            ev(EventKind::Pending, "alice", 1),
            ev(EventKind::ReviewRequestRemoved, "alice", 2),
        ];
        assert_eq!(
            resolve_events(&events, None).into_responsible(),
            set(&["alice"])
        );
    }

    #[test]
    fn test_comments_are_transparent() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::Commented, "alice", 2),
            ev(EventKind::Other("FUTURE_STATE".to_string()), "alice", 3),
        ];
        assert_eq!(
            resolve_events(&events, None).into_responsible(),
            set(&["alice"])
        );
    }

    #[test]
    fn test_approval_after_changes_requested_avoids_override() {
        let events = vec![
            ev(EventKind::ChangesRequested, "alice", 1),
            ev(EventKind::Approved, "alice", 2),
            ev(EventKind::ReviewRequested, "dave", 3),
        ];
        assert_eq!(
            resolve_events(&events, Some(&user("carol"))),
            Resolution::Normal(set(&["dave"]))
        );
    }

    #[test]
    fn test_override_ignores_other_reviewers_approvals() {
        let events = vec![
            ev(EventKind::ChangesRequested, "alice", 1),
            ev(EventKind::Approved, "bob", 2),
            ev(EventKind::Pending, "dave", 3),
        ];
        let resolution = resolve_events(&events, Some(&user("carol")));
        assert!(resolution.is_override());
        assert_eq!(resolution.into_responsible(), set(&["carol"]));
    }

    #[test]
    fn test_changes_requested_without_author_keeps_scanning() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::ChangesRequested, "alice", 2),
            ev(EventKind::ChangesRequested, "bob", 3),
        ];
        assert_eq!(
            resolve_events(&events, None),
            Resolution::Normal(set(&["alice"]))
        );
    }

    #[test]
    fn test_author_excluded_from_normal_path() {
        let events = vec![
            ev(EventKind::ReviewRequested, "carol", 1),
            ev(EventKind::Pending, "carol", 2),
            ev(EventKind::ReviewRequested, "alice", 3),
        ];
        assert_eq!(
            resolve_events(&events, Some(&user("carol"))),
            Resolution::Normal(set(&["alice"]))
        );
    }

    #[test]
    fn test_author_changes_request_does_not_override() {
        let events = vec![ev(EventKind::ChangesRequested, "carol", 1)];
        assert_eq!(
            resolve_events(&events, Some(&user("carol"))),
            Resolution::Normal(set(&[]))
        );
    }

    #[test]
    fn test_events_sorted_before_scanning() {
        let events = vec![
            ev(EventKind::ReviewRequestRemoved, "alice", 5),
            ev(EventKind::ReviewRequested, "alice", 1),
        ];
        assert!(resolve_events(&events, None).responsible().is_empty());

        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 5),
            ev(EventKind::ReviewRequestRemoved, "alice", 1),
        ];
        assert_eq!(
            resolve_events(&events, None).into_responsible(),
            set(&["alice"])
        );
    }

    #[test]
    fn test_ties_keep_retrieval_order() {
        // Same timestamp: the later-retrieved approval counts as more recent.
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::Approved, "alice", 1),
        ];
        assert!(resolve_events(&events, None).responsible().is_empty());

        let events = vec![
            ev(EventKind::Approved, "alice", 1),
            ev(EventKind::ReviewRequested, "alice", 1),
        ];
        assert_eq!(
            resolve_events(&events, None).into_responsible(),
            set(&["alice"])
        );
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let events = vec![
            ev(EventKind::ReviewRequested, "alice", 1),
            ev(EventKind::ReviewRequested, "bob", 2),
            ev(EventKind::Approved, "bob", 3),
            ev(EventKind::Dismissed, "dave", 4),
        ];
        let first = resolve_events(&events, Some(&user("carol")));
        let second = resolve_events(&events, Some(&user("carol")));
        assert_eq!(first, second);
        assert_eq!(first.into_responsible(), set(&["alice", "dave"]));
    }
}
