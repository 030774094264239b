//! GitHub pull request plugin, backed by the `gh` CLI.

use async_trait::async_trait;
use quill_core::ToolError;
use quill_core::plugin::{ParamType, Plugin, PluginOutput, PluginParameter, arg_opt_str, arg_u64};
use serde_json::{Value, json};
use std::str::FromStr;

use crate::process::{CommandOutput, run_program};

const VIEW_FIELDS: &str = "number,title,body,author,state,url,additions,deletions,\
                           baseRefName,headRefName,createdAt,updatedAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrAction {
    View,
    Diff,
    Files,
    Comments,
    Checks,
}

impl FromStr for PrAction {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Self::View),
            "diff" => Ok(Self::Diff),
            "files" => Ok(Self::Files),
            "comments" => Ok(Self::Comments),
            "checks" => Ok(Self::Checks),
            other => Err(ToolError::Rejected(format!(
                "Unknown action: {other}. Valid actions are: view, diff, files, comments, checks"
            ))),
        }
    }
}

/// Which PR a command targets. Empty means "the current branch's PR".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrRef {
    pub number: Option<u64>,
    pub repo: Option<String>,
}

impl PrRef {
    fn from_args(args: &Value) -> Self {
        Self {
            number: arg_u64(args, "pr_number").filter(|n| *n > 0),
            repo: arg_opt_str(args, "repo").map(String::from),
        }
    }

    /// Build `gh pr <sub> [number] [--repo r] <extra..>`.
    pub fn command(&self, sub: &str, extra: &[&str]) -> Vec<String> {
        let mut args = vec!["pr".to_string(), sub.to_string()];
        if let Some(n) = self.number {
            args.push(n.to_string());
        }
        if let Some(repo) = &self.repo {
            args.push("--repo".into());
            args.push(repo.clone());
        }
        args.extend(extra.iter().map(|s| s.to_string()));
        args
    }

    fn label(&self) -> String {
        match self.number {
            Some(n) => format!("PR #{n}"),
            None => "current PR".into(),
        }
    }
}

pub struct GithubPrPlugin;

impl GithubPrPlugin {
    async fn gh_available(&self) -> bool {
        matches!(run_program("gh", &["--version".to_string()]).await, Ok(o) if o.success())
    }

    async fn gh(&self, args: Vec<String>) -> Result<CommandOutput, ToolError> {
        run_program("gh", &args)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "github_pr".into(),
                reason: e.to_string(),
            })
    }

    async fn gh_json(&self, args: Vec<String>) -> Result<Value, ToolError> {
        let out = self.gh(args).await?;
        if !out.success() {
            return Err(ToolError::Rejected(out.stderr.trim().to_string()));
        }
        parse_json(&out.stdout)
    }

    async fn run(&self, arguments: &Value) -> Result<Value, ToolError> {
        let action: PrAction = arguments["action"].as_str().unwrap_or("").parse()?;
        let pr = PrRef::from_args(arguments);

        if !self.gh_available().await {
            return Err(ToolError::Rejected(
                "GitHub CLI (gh) is not installed. Install it from https://cli.github.com/".into(),
            ));
        }

        match action {
            PrAction::View => {
                let raw = self.gh_json(pr.command("view", &["--json", VIEW_FIELDS])).await?;
                Ok(summarize_view(&raw))
            }
            PrAction::Diff => {
                let out = self.gh(pr.command("diff", &[])).await?;
                if !out.success() {
                    return Err(ToolError::Rejected(out.stderr.trim().to_string()));
                }
                Ok(json!({ "diff": out.stdout }))
            }
            PrAction::Files => {
                let raw = self.gh_json(pr.command("view", &["--json", "files"])).await?;
                Ok(summarize_files(&raw))
            }
            PrAction::Comments => {
                let raw = self
                    .gh_json(pr.command("view", &["--json", "comments,reviews"]))
                    .await?;
                Ok(summarize_comments(&raw))
            }
            PrAction::Checks => {
                let out = self
                    .gh(pr.command("checks", &["--json", "name,state,conclusion,description"]))
                    .await?;
                // gh exits 1 when any check failed but still prints the JSON.
                if !out.success() && out.stdout.trim().is_empty() {
                    return Err(ToolError::Rejected(out.stderr.trim().to_string()));
                }
                Ok(summarize_checks(&parse_json(&out.stdout)?))
            }
        }
    }
}

fn parse_json(stdout: &str) -> Result<Value, ToolError> {
    serde_json::from_str(stdout).map_err(|e| ToolError::ExecutionFailed {
        tool_name: "github_pr".into(),
        reason: format!("unexpected gh output: {e}"),
    })
}

/// `author` is `{login}` in gh output; fall back to whatever is there.
fn author(v: &Value) -> Value {
    v["author"]
        .get("login")
        .cloned()
        .unwrap_or_else(|| v["author"].clone())
}

fn items<'a>(v: &'a Value, key: &str) -> &'a [Value] {
    v[key].as_array().map(Vec::as_slice).unwrap_or(&[])
}

pub fn summarize_view(pr: &Value) -> Value {
    json!({
        "pr": {
            "number": pr["number"],
            "title": pr["title"],
            "body": pr["body"],
            "author": author(pr),
            "state": pr["state"],
            "url": pr["url"],
            "additions": pr["additions"],
            "deletions": pr["deletions"],
            "base": pr["baseRefName"],
            "head": pr["headRefName"],
            "createdAt": pr["createdAt"],
            "updatedAt": pr["updatedAt"],
        }
    })
}

pub fn summarize_files(raw: &Value) -> Value {
    let files: Vec<Value> = items(raw, "files")
        .iter()
        .map(|f| json!({ "path": f["path"], "additions": f["additions"], "deletions": f["deletions"] }))
        .collect();
    let total = |key: &str| -> u64 { files.iter().filter_map(|f| f[key].as_u64()).sum() };
    json!({
        "count": files.len(),
        "totalAdditions": total("additions"),
        "totalDeletions": total("deletions"),
        "files": files,
    })
}

pub fn summarize_comments(raw: &Value) -> Value {
    let comments: Vec<Value> = items(raw, "comments")
        .iter()
        .map(|c| json!({ "author": author(c), "body": c["body"], "createdAt": c["createdAt"] }))
        .collect();
    let reviews: Vec<Value> = items(raw, "reviews")
        .iter()
        .map(|r| {
            json!({
                "author": author(r),
                "state": r["state"],
                "body": r["body"],
                "createdAt": r["submittedAt"],
            })
        })
        .collect();
    json!({
        "commentCount": comments.len(),
        "reviewCount": reviews.len(),
        "comments": comments,
        "reviews": reviews,
    })
}

pub fn summarize_checks(raw: &Value) -> Value {
    let checks = raw.as_array().map(Vec::as_slice).unwrap_or(&[]);
    let count = |pred: fn(&Value) -> bool| checks.iter().filter(|c| pred(c)).count();
    let summary = json!({
        "total": checks.len(),
        "passed": count(|c| c["conclusion"] == "success"),
        "failed": count(|c| c["conclusion"] == "failure"),
        "pending": count(|c| c["state"] == "pending" || c["state"] == "queued"),
    });
    let checks: Vec<Value> = checks
        .iter()
        .map(|c| {
            json!({
                "name": c["name"],
                "state": c["state"],
                "conclusion": c["conclusion"],
                "description": c["description"],
            })
        })
        .collect();
    json!({ "checks": checks, "summary": summary })
}

#[async_trait]
impl Plugin for GithubPrPlugin {
    fn name(&self) -> &str {
        "github_pr"
    }

    fn description(&self) -> &str {
        "Interact with GitHub Pull Requests using the gh CLI. Supports viewing PR details, \
         diffs, changed files, comments, and CI status."
    }

    fn parameters(&self) -> Vec<PluginParameter> {
        vec![
            PluginParameter::required(
                "action",
                ParamType::String,
                "The action to perform: \"view\" (PR metadata), \"diff\" (full diff), \
                 \"files\" (changed files), \"comments\" (review comments), \"checks\" (CI status)",
            ),
            PluginParameter::optional(
                "pr_number",
                ParamType::Integer,
                "The PR number. If omitted, uses the current branch's PR.",
            ),
            PluginParameter::optional(
                "repo",
                ParamType::String,
                "Repository in owner/repo format. Defaults to current repository.",
            ),
        ]
    }

    fn describe_running(&self, args: &Value) -> String {
        let action = args["action"].as_str().unwrap_or("");
        format!("Fetching {action} for {}", PrRef::from_args(args).label())
    }

    fn describe_completed(&self, args: &Value, output: &PluginOutput) -> String {
        let action = args["action"].as_str().unwrap_or("");
        let label = PrRef::from_args(args).label();
        if output.success {
            format!("Fetched {action} for {label}")
        } else {
            format!("Failed to fetch {action} for {label}")
        }
    }

    async fn execute(&self, arguments: Value) -> PluginOutput {
        PluginOutput::from_result(self.run(&arguments).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_action_is_rejected_before_gh_runs() {
        let output = GithubPrPlugin
            .execute(json!({"action": "merge", "pr_number": 7}))
            .await;
        assert!(!output.success);
        assert_eq!(
            output.error.as_deref(),
            Some("Unknown action: merge. Valid actions are: view, diff, files, comments, checks")
        );
    }

    #[test]
    fn command_includes_number_and_repo() {
        let pr = PrRef {
            number: Some(42),
            repo: Some("quill-agent/quill".into()),
        };
        assert_eq!(
            pr.command("view", &["--json", "files"]),
            vec!["pr", "view", "42", "--repo", "quill-agent/quill", "--json", "files"]
        );
        assert_eq!(PrRef::default().command("diff", &[]), vec!["pr", "diff"]);
    }

    #[test]
    fn files_summary_totals() {
        let raw = json!({"files": [
            {"path": "a.rs", "additions": 10, "deletions": 2},
            {"path": "b.rs", "additions": 5, "deletions": 0},
        ]});
        let summary = summarize_files(&raw);
        assert_eq!(summary["count"], 2);
        assert_eq!(summary["totalAdditions"], 15);
        assert_eq!(summary["totalDeletions"], 2);
    }

    #[test]
    fn checks_summary_counts() {
        let raw = json!([
            {"name": "build", "state": "completed", "conclusion": "success"},
            {"name": "lint", "state": "completed", "conclusion": "failure"},
            {"name": "e2e", "state": "queued", "conclusion": null},
        ]);
        let summary = &summarize_checks(&raw)["summary"];
        assert_eq!(summary["total"], 3);
        assert_eq!(summary["passed"], 1);
        assert_eq!(summary["failed"], 1);
        assert_eq!(summary["pending"], 1);
    }

    #[test]
    fn view_flattens_author_login() {
        let raw = json!({"number": 3, "title": "Fix", "author": {"login": "octocat"}, "baseRefName": "main"});
        let view = summarize_view(&raw);
        assert_eq!(view["pr"]["author"], "octocat");
        assert_eq!(view["pr"]["base"], "main");
    }

    #[test]
    fn comments_use_review_submission_time() {
        let raw = json!({
            "comments": [{"author": {"login": "a"}, "body": "hi", "createdAt": "t1"}],
            "reviews": [{"author": {"login": "b"}, "state": "APPROVED", "body": "", "submittedAt": "t2"}],
        });
        let summary = summarize_comments(&raw);
        assert_eq!(summary["commentCount"], 1);
        assert_eq!(summary["reviews"][0]["createdAt"], "t2");
    }

    #[test]
    fn progress_labels() {
        let args = json!({"action": "diff", "pr_number": 12});
        assert_eq!(GithubPrPlugin.describe_running(&args), "Fetching diff for PR #12");
        let args = json!({"action": "checks"});
        assert_eq!(
            GithubPrPlugin.describe_completed(&args, &PluginOutput::ok(Value::Null)),
            "Fetched checks for current PR"
        );
    }
}
