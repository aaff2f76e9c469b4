use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use prtriage::{DisplayMode, Participant, PullRequest, Resolution, Task, resolve};

const TABLE_HEADERS: &[&str] = &["URL", "AUTHOR", "ASSIGNEES", "RESPONSIBLE", "MERGE", "TITLE"];
const COLUMN_SEPARATOR: &str = "  ";

fn format_relative_time(time: DateTime<Utc>) -> String {
    use chrono_humanize::HumanTime;
    HumanTime::from(time).to_string()
}

fn format_participants<'a>(participants: impl IntoIterator<Item = &'a Participant>) -> String {
    let logins: Vec<&str> = participants.into_iter().map(|p| p.login.as_str()).collect();
    if logins.is_empty() {
        "-".to_string()
    } else {
        logins.join(",")
    }
}

fn format_resolution(resolution: &Resolution) -> String {
    let names = format_participants(resolution.responsible());
    if resolution.is_override() {
        format!("{names} (changes requested)")
    } else {
        names
    }
}

fn pr_to_table_row(pr: &PullRequest) -> Vec<String> {
    vec![
        pr.url.clone(),
        pr.author_login().to_string(),
        format_participants(&pr.assignees),
        format_resolution(&resolve(pr)),
        if pr.is_draft {
            "DRAFT".to_string()
        } else {
            pr.merge_state.as_str().to_string()
        },
        pr.title.clone(),
    ]
}

fn display_prs_quiet<W: Write>(prs: &[PullRequest], writer: &mut W) -> Result<()> {
    for pr in prs {
        writeln!(writer, "{}", pr.number)?;
    }
    Ok(())
}

fn display_prs_table<W: Write>(prs: &[PullRequest], writer: &mut W) -> Result<()> {
    let rows: Vec<Vec<String>> = prs.iter().map(pr_to_table_row).collect();

    let mut widths: Vec<usize> = TABLE_HEADERS.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let format_row = |cells: &[String]| -> String {
        let last = cells.len() - 1;
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if i == last {
                    cell.clone()
                } else {
                    format!("{cell:<width$}", width = widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join(COLUMN_SEPARATOR)
    };

    let headers: Vec<String> = TABLE_HEADERS.iter().map(|h| h.to_string()).collect();
    writeln!(writer, "{}", format_row(&headers))?;
    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    writeln!(writer, "{}", format_row(&separator))?;
    for row in &rows {
        writeln!(writer, "{}", format_row(row))?;
    }
    Ok(())
}

fn display_prs_detailed<W: Write>(prs: &[PullRequest], writer: &mut W) -> Result<()> {
    for (index, pr) in prs.iter().enumerate() {
        if index > 0 {
            writeln!(writer)?;
        }
        let resolution = resolve(pr);

        writeln!(writer, "● {}", pr.url)?;
        writeln!(writer, "├─Title: {} ({})", pr.title, pr.author_login())?;
        writeln!(writer, "├─PR #{}", pr.number)?;
        writeln!(writer, "├─Merge state: {}", pr.merge_state.as_str())?;
        writeln!(writer, "├─Assignees: {}", format_participants(&pr.assignees))?;
        writeln!(writer, "├─Responsible: {}", format_resolution(&resolution))?;

        if !pr.labels.is_empty() {
            writeln!(writer, "├─Labels")?;
            for (i, label) in pr.labels.iter().enumerate() {
                let branch = if i + 1 == pr.labels.len() { "└─" } else { "├─" };
                writeln!(writer, "│ {branch}{label}")?;
            }
        }

        let mut events = pr.events.clone();
        events.sort_by_key(|event| event.when);
        if events.is_empty() {
            writeln!(writer, "└─Reviews: none")?;
        } else {
            writeln!(writer, "└─Reviews")?;
            for (i, event) in events.iter().enumerate() {
                let branch = if i + 1 == events.len() { "└─" } else { "├─" };
                writeln!(
                    writer,
                    "  {branch}{} {} ({})",
                    event.who,
                    event.what,
                    format_relative_time(event.when)
                )?;
            }
        }
    }
    Ok(())
}

pub fn display_prs<W: Write>(prs: &[PullRequest], mode: &DisplayMode, writer: &mut W) -> Result<()> {
    match mode {
        DisplayMode::Quiet => display_prs_quiet(prs, writer),
        DisplayMode::Detailed => display_prs_detailed(prs, writer),
        DisplayMode::Normal => display_prs_table(prs, writer),
    }
}

pub fn output_shell_commands<W: Write>(tasks: &[Task], writer: &mut W) -> Result<()> {
    for task in tasks {
        let command = task.operation.format_shell_command(&task.pr_info);
        writeln!(writer, "{command}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{TimeZone, Utc};
    use prtriage::{Event, EventKind, MergeMethod, MergeState, Operation, Repo};

    use super::*;

    fn user(login: &str) -> Participant {
        Participant::new(login, format!("U_{login}"))
    }

    fn create_test_pr_data() -> Vec<PullRequest> {
        let base_time = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();

        vec![PullRequest {
            repo: Repo::new("owner", "repo").unwrap(),
            id: "PR_101".to_string(),
            number: 101,
            title: "Add authentication system".to_string(),
            url: "https://github.com/owner/repo/pull/101".to_string(),
            author: Some(user("alice")),
            is_draft: false,
            merge_state: MergeState::Blocked,
            labels: vec!["enhancement".to_string(), "security".to_string()],
            linked_issue_labels: vec![],
            events: vec![
                Event {
                    when: base_time,
                    what: EventKind::ReviewRequested,
                    who: user("bob"),
                },
                Event {
                    when: base_time + chrono::Duration::hours(1),
                    what: EventKind::ReviewRequested,
                    who: user("carol"),
                },
                Event {
                    when: base_time + chrono::Duration::hours(2),
                    what: EventKind::Approved,
                    who: user("carol"),
                },
            ],
            assignees: BTreeSet::from([user("carol")]),
        }]
    }

    #[test]
    fn test_display_table_mode() {
        let prs = create_test_pr_data();
        let mut output = Vec::new();

        display_prs(&prs, &DisplayMode::Normal, &mut output).unwrap();

        let result = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("URL"));
        assert!(lines[0].contains("RESPONSIBLE"));
        assert!(lines[1].starts_with("---"));
        assert!(lines[2].contains("https://github.com/owner/repo/pull/101"));
        assert!(lines[2].contains("alice"));
        assert!(lines[2].contains("carol"));
        assert!(lines[2].contains("bob"));
        assert!(lines[2].contains("BLOCKED"));
        assert!(lines[2].ends_with("Add authentication system"));
    }

    #[test]
    fn test_display_quiet_mode() {
        let prs = create_test_pr_data();
        let mut output = Vec::new();

        display_prs(&prs, &DisplayMode::Quiet, &mut output).unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "101\n");
    }

    #[test]
    fn test_display_detailed_mode() {
        let prs = create_test_pr_data();
        let mut output = Vec::new();

        display_prs(&prs, &DisplayMode::Detailed, &mut output).unwrap();

        let result = String::from_utf8(output).unwrap();
        assert!(result.contains("● https://github.com/owner/repo/pull/101"));
        assert!(result.contains("├─Title: Add authentication system (alice)"));
        assert!(result.contains("├─Assignees: carol"));
        assert!(result.contains("├─Responsible: bob"));
        assert!(result.contains("│ └─security"));
        assert!(result.contains("└─Reviews"));
        assert!(result.contains("bob REVIEW_REQUESTED"));
        assert!(result.contains("carol APPROVED"));
    }

    #[test]
    fn test_display_override_is_marked() {
        let mut prs = create_test_pr_data();
        prs[0].events.push(Event {
            when: Utc.with_ymd_and_hms(2024, 1, 16, 10, 0, 0).unwrap(),
            what: EventKind::ChangesRequested,
            who: user("bob"),
        });
        let mut output = Vec::new();

        display_prs(&prs, &DisplayMode::Detailed, &mut output).unwrap();

        let result = String::from_utf8(output).unwrap();
        assert!(result.contains("├─Responsible: alice (changes requested)"));
    }

    #[test]
    fn test_empty_pr_list() {
        let mut output = Vec::new();

        display_prs(&[], &DisplayMode::Normal, &mut output).unwrap();

        let result = String::from_utf8(output).unwrap();
        assert!(result.contains("URL"));
        assert!(result.contains("TITLE"));
        assert!(result.contains("----"));
        assert!(!result.contains("101"));
    }

    #[test]
    fn test_output_shell_commands() {
        let pr = create_test_pr_data().remove(0);
        let tasks = vec![
            Task {
                pr_info: pr.clone(),
                operation: Operation::AddAssignees(vec![user("bob"), user("dave")]),
            },
            Task {
                pr_info: pr.clone(),
                operation: Operation::RemoveAssignees(vec![user("carol")]),
            },
            Task {
                pr_info: pr.clone(),
                operation: Operation::AddLabels(vec!["area/auth".to_string(), "bug".to_string()]),
            },
            Task {
                pr_info: pr,
                operation: Operation::Merge(MergeMethod::Squash),
            },
        ];
        let mut output = Vec::new();

        output_shell_commands(&tasks, &mut output).unwrap();

        let result = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = result.lines().collect();
        assert_eq!(
            lines,
            vec![
                "gh pr edit 101 --repo owner/repo --add-assignee bob,dave",
                "gh pr edit 101 --repo owner/repo --remove-assignee carol",
                "gh pr edit 101 --repo owner/repo --add-label \"area/auth,bug\"",
                "gh pr merge 101 --repo owner/repo --squash",
            ]
        );
    }
}
