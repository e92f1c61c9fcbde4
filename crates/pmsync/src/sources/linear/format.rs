use super::client::{LinearComment, LinearIssue, Named};
use crate::utils::time::date_part;

/// 没有数字部分的 identifier 排到最后
pub const NO_NUMERIC_ID: u64 = 1_000_000_000_000;

/// 取 identifier 中最后一个含数字的片段（按 `-` / `_` 拆分）的数字
///
/// `ENG-504` → 504，`ops_v2` → 2，`DRAFT` → `NO_NUMERIC_ID`
pub fn numeric_identifier(identifier: &str) -> u64 {
    identifier
        .split(['-', '_'])
        .rev()
        .find_map(|part| {
            let digits: String = part
                .chars()
                .skip_while(|c| !c.is_ascii_digit())
                .take_while(|c| c.is_ascii_digit())
                .collect();
            if digits.is_empty() {
                None
            } else {
                Some(digits.parse().unwrap_or(NO_NUMERIC_ID))
            }
        })
        .unwrap_or(NO_NUMERIC_ID)
}

fn name_of(named: &Option<Named>) -> Option<&str> {
    named.as_ref().and_then(|n| n.name.as_deref())
}

fn format_priority(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// 渲染单个 issue 为 markdown
pub fn format_issue(issue: &LinearIssue, comments: &[LinearComment]) -> String {
    let mut out = format!("# {}: {}\n", issue.identifier, issue.title);

    let mut metadata: Vec<String> = Vec::new();
    if let Some(state) = name_of(&issue.state) {
        metadata.push(format!("**Status:** {}", state));
    }
    if let Some(labels) = &issue.labels {
        let names: Vec<&str> = labels.nodes.iter().filter_map(|l| l.name.as_deref()).collect();
        if !names.is_empty() {
            metadata.push(format!("**Labels:** {}", names.join(", ")));
        }
    }
    if let Some(priority) = issue.priority {
        metadata.push(format!("**Priority:** {}", format_priority(priority)));
    }
    if let Some(assignee) = name_of(&issue.assignee) {
        metadata.push(format!("**Assignee:** {}", assignee));
    }
    if let Some(creator) = name_of(&issue.creator) {
        metadata.push(format!("**Created By:** {}", creator));
    }
    if let Some(created) = issue.created_at.as_deref() {
        metadata.push(format!("**Created:** {}", date_part(created)));
    }
    if let Some(updated) = issue.updated_at.as_deref() {
        metadata.push(format!("**Updated:** {}", date_part(updated)));
    }
    if let Some(due) = issue.due_date.as_deref() {
        metadata.push(format!("**Due Date:** {}", date_part(due)));
    }
    if let Some(team) = name_of(&issue.team) {
        metadata.push(format!("**Team:** {}", team));
    }
    if let Some(cycle) = name_of(&issue.cycle) {
        metadata.push(format!("**Cycle:** {}", cycle));
    }
    if let Some(project) = name_of(&issue.project) {
        metadata.push(format!("**Project:** {}", project));
    }
    if let Some(url) = issue.url.as_deref() {
        metadata.push(format!("**Linear URL:** {}", url));
    }
    if let Some(branch) = issue.branch_name.as_deref() {
        metadata.push(format!("**Git Branch:** {}", branch));
    }
    if !metadata.is_empty() {
        out.push_str(&metadata.join(" "));
        out.push('\n');
    }

    out.push_str("\n## Description\n\n");
    match issue.description.as_deref().filter(|d| !d.is_empty()) {
        Some(description) => {
            out.push_str(description);
            out.push('\n');
        }
        None => out.push_str("_No description provided._\n"),
    }

    out.push_str("\n## Comments\n\n");
    if comments.is_empty() {
        out.push_str("_No comments yet._\n");
    } else {
        for comment in comments {
            let author = comment
                .user
                .as_ref()
                .and_then(|u| u.name.as_deref())
                .unwrap_or("Unknown");
            let created = comment.created_at.as_deref().map(date_part).unwrap_or("");
            out.push_str(&format!("### {} - {}\n\n", author, created));
            out.push_str(comment.body.as_deref().unwrap_or(""));
            out.push_str("\n\n");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn issue(value: serde_json::Value) -> LinearIssue {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn numeric_identifier_uses_the_last_numbered_part() {
        assert_eq!(numeric_identifier("ENG-504"), 504);
        assert_eq!(numeric_identifier("ops_v2"), 2);
        assert_eq!(numeric_identifier("A-12-rc"), 12);
        assert_eq!(numeric_identifier("DRAFT"), NO_NUMERIC_ID);
        assert_eq!(numeric_identifier(""), NO_NUMERIC_ID);
    }

    #[test]
    fn full_issue_renders_every_metadata_field() {
        let issue = issue(json!({
            "id": "uuid-1",
            "identifier": "ENG-7",
            "title": "Fix login",
            "description": "Steps to reproduce",
            "url": "https://linear.app/acme/issue/ENG-7",
            "state": { "name": "In Progress" },
            "priority": 2,
            "assignee": { "name": "Sam" },
            "creator": { "name": "Alex" },
            "createdAt": "2024-04-01T09:00:00.000Z",
            "updatedAt": "2024-05-01T09:00:00.000Z",
            "dueDate": "2024-05-10",
            "team": { "name": "Engineering" },
            "cycle": { "name": "Cycle 4" },
            "project": { "name": "Auth" },
            "branchName": "sam/eng-7-fix-login",
            "labels": { "nodes": [{ "name": "bug" }, { "name": "p1" }] }
        }));
        let comments: Vec<LinearComment> = serde_json::from_value(json!([
            { "body": "On it", "createdAt": "2024-04-02T10:00:00Z", "user": { "name": "Sam" } },
            { "body": null, "createdAt": null, "user": null }
        ]))
        .unwrap();

        let text = format_issue(&issue, &comments);
        assert_eq!(
            text,
            "# ENG-7: Fix login\n\
             **Status:** In Progress **Labels:** bug, p1 **Priority:** 2 **Assignee:** Sam \
             **Created By:** Alex **Created:** 2024-04-01 **Updated:** 2024-05-01 **Due Date:** 2024-05-10 \
             **Team:** Engineering **Cycle:** Cycle 4 **Project:** Auth \
             **Linear URL:** https://linear.app/acme/issue/ENG-7 **Git Branch:** sam/eng-7-fix-login\n\
             \n## Description\n\nSteps to reproduce\n\
             \n## Comments\n\n### Sam - 2024-04-02\n\nOn it\n\n### Unknown - \n\n\n\n"
        );
    }

    #[test]
    fn sparse_issue_uses_placeholders() {
        let issue = issue(json!({ "id": "uuid-2", "identifier": "ENG-8", "title": "Empty", "cycle": { "name": null } }));
        let text = format_issue(&issue, &[]);
        assert_eq!(
            text,
            "# ENG-8: Empty\n\n## Description\n\n_No description provided._\n\n## Comments\n\n_No comments yet._\n"
        );
    }
}
