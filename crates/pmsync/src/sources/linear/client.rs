//! Linear GraphQL 客户端

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::{HttpClientConfig, LinearConfig};
use crate::error::{PmSyncError, Result};
use crate::http::{ApiHttpClient, AuthScheme};
use crate::utils::format_iso_timestamp;

/// 每页 issue 数
const PAGE_SIZE: u32 = 100;

const ISSUE_FIELDS: &str = "
                id
                identifier
                title
                description
                url
                state { name }
                priority
                assignee { name }
                creator { name }
                createdAt
                updatedAt
                dueDate
                team { name }
                cycle { name }
                project { name }
                branchName
                labels { nodes { name } }";

const TEAMS_QUERY: &str = "
    query GetTeams {
        teams {
            nodes {
                id
                name
            }
        }
    }";

const COMMENTS_QUERY: &str = "
    query GetComments($issueId: String!) {
        issue(id: $issueId) {
            comments {
                nodes {
                    body
                    createdAt
                    user {
                        name
                    }
                }
            }
        }
    }";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Nodes<T> {
    pub nodes: Vec<T>,
}

impl<T> Default for Nodes<T> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

/// Linear issue
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearIssue {
    pub id: String,
    pub identifier: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub state: Option<Named>,
    pub priority: Option<f64>,
    pub assignee: Option<Named>,
    pub creator: Option<Named>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub due_date: Option<String>,
    pub team: Option<Named>,
    pub cycle: Option<Named>,
    pub project: Option<Named>,
    pub branch_name: Option<String>,
    pub labels: Option<Nodes<Named>>,
}

/// issue 评论
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinearComment {
    pub body: Option<String>,
    pub created_at: Option<String>,
    pub user: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IssueConnection {
    page_info: PageInfo,
    nodes: Vec<LinearIssue>,
}

#[derive(Debug, Deserialize)]
struct IssuesData {
    issues: IssueConnection,
}

#[derive(Debug, Deserialize)]
struct Team {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TeamsData {
    teams: Nodes<Team>,
}

#[derive(Debug, Deserialize)]
struct CommentsIssue {
    comments: Option<Nodes<LinearComment>>,
}

#[derive(Debug, Deserialize)]
struct CommentsData {
    issue: Option<CommentsIssue>,
}

pub struct LinearClient {
    http: ApiHttpClient,
}

impl LinearClient {
    pub fn new(config: &LinearConfig, http: &HttpClientConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| PmSyncError::Configuration("LINEAR_API_KEY is not set.".to_string()))?;
        let http = ApiHttpClient::new(http, config.api_url.clone(), AuthScheme::Raw(api_key))?;
        Ok(Self { http })
    }

    pub fn from_http(http: ApiHttpClient) -> Self {
        Self { http }
    }

    /// 执行 GraphQL 请求；响应里带 `errors` 时视为失败
    async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Option<Value>) -> Result<T> {
        let mut payload = json!({ "query": query });
        if let Some(vars) = variables {
            payload["variables"] = vars;
        }

        let response: GraphQlResponse<T> = self.http.post_json("", &payload).await?;
        if let Some(errors) = response.errors {
            return Err(PmSyncError::Api(errors.to_string()));
        }
        response
            .data
            .ok_or_else(|| PmSyncError::Api("GraphQL response has no data".to_string()))
    }

    /// 按团队名查 team id
    pub async fn team_id(&self, team_name: &str) -> Result<String> {
        let data: TeamsData = self.graphql(TEAMS_QUERY, None).await?;
        data.teams
            .nodes
            .into_iter()
            .find(|team| team.name == team_name)
            .map(|team| team.id)
            .ok_or_else(|| {
                PmSyncError::Configuration(format!("Could not find team named '{}'", team_name))
            })
    }

    /// 拉取 `updated_after` 之后修改过的 issue
    pub async fn issues_updated_since(
        &self,
        team_id: &str,
        updated_after: &DateTime<Utc>,
    ) -> Result<Vec<LinearIssue>> {
        let query = format!(
            "
    query IssuesUpdatedSince($teamId: ID!, $updatedAfter: DateTimeOrDuration!, $after: String) {{
        issues(
            filter: {{
                team: {{ id: {{ eq: $teamId }} }}
                updatedAt: {{ gt: $updatedAfter }}
            }}
            orderBy: updatedAt
            first: {}
            after: $after
        ) {{
            pageInfo {{
                hasNextPage
                endCursor
            }}
            nodes {{{}
            }}
        }}
    }}",
            PAGE_SIZE, ISSUE_FIELDS
        );
        let variables = json!({
            "teamId": team_id,
            "updatedAfter": format_iso_timestamp(updated_after),
        });
        self.paginate_issues(&query, variables).await
    }

    /// 拉取团队全部 issue
    pub async fn all_issues(&self, team_id: &str) -> Result<Vec<LinearIssue>> {
        let query = format!(
            "
    query TeamIssues($teamId: ID!, $after: String) {{
        issues(
            filter: {{ team: {{ id: {{ eq: $teamId }} }} }}
            first: {}
            after: $after
        ) {{
            pageInfo {{
                hasNextPage
                endCursor
            }}
            nodes {{{}
            }}
        }}
    }}",
            PAGE_SIZE, ISSUE_FIELDS
        );
        self.paginate_issues(&query, json!({ "teamId": team_id })).await
    }

    async fn paginate_issues(&self, query: &str, mut variables: Value) -> Result<Vec<LinearIssue>> {
        let mut issues = Vec::new();
        variables["after"] = Value::Null;

        loop {
            let data: IssuesData = self.graphql(query, Some(variables.clone())).await?;
            let page = data.issues;
            issues.extend(page.nodes);
            debug!("Linear issues 已拉取 {} 条", issues.len());
            match (page.page_info.has_next_page, page.page_info.end_cursor) {
                (true, Some(cursor)) => variables["after"] = Value::String(cursor),
                _ => break,
            }
        }

        info!("Linear issues 拉取完成: {} 条", issues.len());
        Ok(issues)
    }

    /// 拉取 issue 评论；失败时记录警告并返回空列表
    pub async fn comments(&self, issue_id: &str) -> Vec<LinearComment> {
        let result: Result<CommentsData> = self
            .graphql(COMMENTS_QUERY, Some(json!({ "issueId": issue_id })))
            .await;
        match result {
            Ok(data) => data
                .issue
                .and_then(|issue| issue.comments)
                .map(|c| c.nodes)
                .unwrap_or_default(),
            Err(e) => {
                warn!("⚠️ 拉取 {} 的评论失败: {}", issue_id, e);
                Vec::new()
            }
        }
    }
}
