//! Clients for the external systems a pull request checkout touches.
//!
//! - [`git`]: Local git operations (status, fetch, detached checkout, leased push)
//! - [`github`]: Pull request metadata via the GitHub GraphQL API
//! - [`github_curl`]: Curl-based HTTP transport for GitHub API requests
//!
//! The git and GitHub clients sit behind traits so the checkout workflow can be
//! tested against mocks.

pub mod git;
pub mod github;
pub mod github_curl;
