use std::collections::BTreeSet;

/// Labels found on linked issues that the pull request does not carry yet,
/// sorted and deduplicated.
pub fn labels_to_copy(pr_labels: &[String], linked_issue_labels: &[String]) -> Vec<String> {
    let existing: BTreeSet<&str> = pr_labels.iter().map(String::as_str).collect();
    linked_issue_labels
        .iter()
        .map(String::as_str)
        .filter(|label| !existing.contains(label))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
