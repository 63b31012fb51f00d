#![allow(async_fn_in_trait)]

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use tracing::instrument;
use url::Url;

use super::github_curl::GithubCurlClient;

const PULL_REQUEST_QUERY: &str = "\
query($owner: String!, $name: String!, $number: Int!) {
  repository(owner: $owner, name: $name) {
    pullRequest(number: $number) {
      state
      maintainerCanModify
      viewerDidAuthor
      headRefOid
      headRef { name repository { url nameWithOwner } }
      baseRef { name repository { url nameWithOwner } }
    }
  }
}";

// -----------------------------------------------------------------------------
// GithubOps trait

/// Operations the checkout workflow needs from GitHub.
#[cfg_attr(test, automock)]
pub trait GithubOps {
    /// Fetch the metadata of a pull request in the configured repository.
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestMetadata>;
}

// -----------------------------------------------------------------------------
// Types

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryRef {
    pub url: String,
    pub name_with_owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BranchRef {
    pub name: String,
    pub repository: RepositoryRef,
}

/// Snapshot of a pull request as returned by the GraphQL API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestMetadata {
    pub state: PullRequestState,
    pub maintainer_can_modify: bool,
    pub viewer_did_author: bool,
    pub head_ref_oid: String,
    pub head_ref: BranchRef,
    pub base_ref: BranchRef,
}

#[derive(Debug, Serialize)]
struct GraphqlRequest<'a> {
    query: &'a str,
    variables: PullRequestVariables<'a>,
}

#[derive(Debug, Serialize)]
struct PullRequestVariables<'a> {
    owner: &'a str,
    name: &'a str,
    number: u64,
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<ResponseData>,
    #[serde(default)]
    errors: Vec<GraphqlError>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    repository: Option<RepositoryData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryData {
    pull_request: Option<PullRequestMetadata>,
}

// -----------------------------------------------------------------------------
// GithubClient

/// Client to interact with the GitHub GraphQL API.
pub struct GithubClient {
    owner: String,
    repo: String,
    graphql_url: String,
    http_client: GithubCurlClient,
}

impl GithubClient {
    /// Create a client for the repository behind `remote_url`.
    pub fn new(token: String, api_url: &str, remote_url: &str) -> Result<Self> {
        let (owner, repo) = parse_owner_and_repo(remote_url)?;
        let graphql_url = format!("{}/graphql", api_url.trim_end_matches('/'));

        Ok(Self {
            owner,
            repo,
            graphql_url,
            http_client: GithubCurlClient::new(token),
        })
    }
}

impl GithubOps for GithubClient {
    #[instrument(skip_all, fields(number = number))]
    async fn get_pull_request(&self, number: u64) -> Result<PullRequestMetadata> {
        let body = pull_request_request_body(&self.owner, &self.repo, number)?;
        let response = self.http_client.post(&self.graphql_url, &body).await?;
        parse_pull_request_response(&response, number)
    }
}

fn pull_request_request_body(owner: &str, name: &str, number: u64) -> Result<String> {
    let request = GraphqlRequest {
        query: PULL_REQUEST_QUERY,
        variables: PullRequestVariables {
            owner,
            name,
            number,
        },
    };
    Ok(serde_json::to_string(&request)?)
}

/// Validate a GraphQL response against the pull request schema.
fn parse_pull_request_response(response: &str, number: u64) -> Result<PullRequestMetadata> {
    let response: GraphqlResponse = serde_json::from_str(response)
        .context("Unexpected response shape from GitHub pull request query")?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        bail!("GitHub GraphQL error: {}", messages.join("; "));
    }

    response
        .data
        .and_then(|data| data.repository)
        .and_then(|repository| repository.pull_request)
        .with_context(|| format!("Pull request #{} not found", number))
}

/// Parse the owner and repository name from a git remote URL.
///
/// Accepts scp-like ssh (`git@github.com:owner/repo.git`) as well as `ssh://`
/// and `https://` URLs.
pub fn parse_owner_and_repo(remote_url: &str) -> Result<(String, String)> {
    let path = if remote_url.contains("://") {
        let url = Url::parse(remote_url)
            .with_context(|| format!("Invalid git remote URL: {}", remote_url))?;
        url.path().trim_start_matches('/').to_string()
    } else if let Some((_, path)) = remote_url.split_once(':') {
        path.to_string()
    } else {
        bail!("Remote URL is not a GitHub URL: {}", remote_url);
    };

    let path = path.trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);
    let mut split = path.split('/');
    let owner = split
        .next()
        .filter(|s| !s.is_empty())
        .context("Could not parse owner from GitHub URL")?
        .to_string();
    let repo = split
        .next()
        .filter(|s| !s.is_empty())
        .context("Could not parse repo from GitHub URL")?
        .to_string();
    if split.next().is_some() {
        bail!("Remote URL is not a GitHub repository URL: {}", remote_url);
    }

    Ok((owner, repo))
}
