//! Issue-tracker REST client behind the jira commands.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Connection settings for the tracker's REST API.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub base_url: String,
    pub token: String,
    /// Project issues are created under.
    pub project_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedIssue {
    pub key: String,
    pub browse_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSummary {
    pub key: String,
    pub summary: String,
}

#[async_trait]
pub trait TrackerClient: Send + Sync {
    async fn create_issue(
        &self,
        summary: &str,
        description: &str,
        issue_type: &str,
    ) -> Result<CreatedIssue>;

    /// Open stories in `project` that still have no size estimate.
    async fn search_unsized(&self, project: &str) -> Result<Vec<IssueSummary>>;
}

pub struct HttpTrackerClient {
    client: reqwest::Client,
    config: TrackerConfig,
}

#[derive(Serialize)]
struct CreateIssueRequest<'a> {
    fields: IssueFields<'a>,
}

#[derive(Serialize)]
struct IssueFields<'a> {
    project: ProjectRef<'a>,
    summary: &'a str,
    description: &'a str,
    #[serde(rename = "issuetype")]
    issue_type: IssueTypeRef<'a>,
}

#[derive(Serialize)]
struct ProjectRef<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct IssueTypeRef<'a> {
    name: &'a str,
}

#[derive(Deserialize)]
struct CreateIssueResponse {
    key: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    jql: String,
    fields: [&'a str; 1],
    #[serde(rename = "maxResults")]
    max_results: u32,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Deserialize)]
struct SearchIssue {
    key: String,
    #[serde(default)]
    fields: SearchIssueFields,
}

#[derive(Deserialize, Default)]
struct SearchIssueFields {
    #[serde(default)]
    summary: String,
}

impl HttpTrackerClient {
    pub fn new(config: TrackerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{key}", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl TrackerClient for HttpTrackerClient {
    async fn create_issue(
        &self,
        summary: &str,
        description: &str,
        issue_type: &str,
    ) -> Result<CreatedIssue> {
        let request = CreateIssueRequest {
            fields: IssueFields {
                project: ProjectRef {
                    key: &self.config.project_key,
                },
                summary,
                description,
                issue_type: IssueTypeRef { name: issue_type },
            },
        };
        let response = self
            .client
            .post(self.api_url("/rest/api/2/issue"))
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await
            .context("sending issue create request")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("issue create failed with status {status}: {body}");
        }
        let created: CreateIssueResponse = response
            .json()
            .await
            .context("decoding issue create response")?;
        let browse_url = self.browse_url(&created.key);
        Ok(CreatedIssue {
            key: created.key,
            browse_url,
        })
    }

    async fn search_unsized(&self, project: &str) -> Result<Vec<IssueSummary>> {
        let request = SearchRequest {
            jql: format!(
                "project = {project} AND issuetype = Story AND \"Story Points\" is EMPTY \
                 AND statusCategory != Done ORDER BY created ASC"
            ),
            fields: ["summary"],
            max_results: 100,
        };
        let response = self
            .client
            .post(self.api_url("/rest/api/2/search"))
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await
            .context("sending issue search request")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("issue search failed with status {status}: {body}");
        }
        let found: SearchResponse = response
            .json()
            .await
            .context("decoding issue search response")?;
        Ok(found
            .issues
            .into_iter()
            .map(|issue| IssueSummary {
                key: issue.key,
                summary: issue.fields.summary,
            })
            .collect())
    }
}
