use std::fmt;

use anyhow::Context;
use anyhow::anyhow;
use tracing::info;
use tracing::instrument;
use tracing::warn;
use url::Url;

use crate::App;
use crate::clients::git::GitOps;
use crate::clients::github::GithubOps;
use crate::clients::github::PullRequestState;
use crate::error::CheckoutError;

/// Options for [`App::checkout_pull_request_locally`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutOptions {
    /// Check out the PR even if its branch cannot be pushed back to.
    pub allow_if_maintainer_cannot_modify: bool,
}

/// A pull request checked out at its head commit in a detached state.
///
/// Created by [`App::checkout_pull_request_locally`]. Holds everything needed
/// to push the (possibly amended) HEAD back to the PR branch or to return to
/// the branch or revision that was checked out beforehand.
pub struct CheckoutSession<'a, G: GitOps> {
    git: &'a G,
    previous_branch_or_revision: String,
    /// Head repository URL with the token as username.
    head_url: String,
    head_branch: String,
    head_sha: String,
    /// `<head branch>:<head sha>` as passed to `--force-with-lease`.
    lease: String,
}

impl<G: GitOps, H: GithubOps> App<G, H> {
    /// Check out the head of a pull request in a detached state.
    ///
    /// 1. Fail if the working tree has uncommitted changes.
    /// 2. Record the current branch (or revision, if detached) to return to.
    /// 3. Fetch the PR metadata from GitHub.
    /// 4. Fail if the PR branch could not be pushed back to, unless the
    ///    current user authored it or the caller opted out of the check.
    /// 5. Fetch the head branch from the head repository and check out
    ///    FETCH_HEAD detached. If either step fails, force-checkout the
    ///    recorded position before returning the error.
    #[instrument(skip_all, fields(pr_number = pr_number))]
    pub async fn checkout_pull_request_locally(
        &self,
        pr_number: u64,
        token: &str,
        options: CheckoutOptions,
    ) -> Result<CheckoutSession<'_, G>, CheckoutError> {
        if self.git.has_uncommitted_changes().await? {
            return Err(CheckoutError::UnexpectedLocalChanges);
        }

        let previous_branch_or_revision = self.git.current_branch_or_revision().await?;

        let pr = self.gh.get_pull_request(pr_number).await?;
        if pr.state != PullRequestState::Open {
            warn!(state = ?pr.state, "PR #{} is not open", pr_number);
        }

        if !pr.maintainer_can_modify
            && !pr.viewer_did_author
            && !options.allow_if_maintainer_cannot_modify
        {
            return Err(CheckoutError::MaintainerModifyAccess { pr_number });
        }

        let head_url = authenticated_url(&pr.head_ref.repository.url, token)?;
        let head_branch = pr.head_ref.name;
        let head_sha = pr.head_ref_oid;

        info!(
            repository = %pr.head_ref.repository.name_with_owner,
            branch = %head_branch,
            sha = %head_sha,
            "Checking out PR #{}",
            pr_number
        );

        if let Err(err) = self.fetch_and_checkout(&head_url, &head_branch).await {
            let rollback = self.git.checkout(&previous_branch_or_revision, true).await;
            if let Err(rollback_err) = rollback {
                warn!(
                    "Failed to restore {}: {:#}",
                    previous_branch_or_revision, rollback_err
                );
            }
            return Err(err.into());
        }

        let lease = format!("{}:{}", head_branch, head_sha);

        Ok(CheckoutSession {
            git: &self.git,
            previous_branch_or_revision,
            head_url,
            head_branch,
            head_sha,
            lease,
        })
    }

    async fn fetch_and_checkout(&self, url: &str, branch: &str) -> anyhow::Result<()> {
        self.git.fetch(url, branch).await?;
        self.git.checkout_detached("FETCH_HEAD").await
    }
}

impl<G: GitOps> CheckoutSession<'_, G> {
    /// Push HEAD to the PR branch, unless the branch moved since the checkout.
    #[instrument(skip_all, fields(branch = %self.head_branch))]
    pub async fn push_to_upstream(&self) -> Result<bool, CheckoutError> {
        self.git
            .push_with_lease(&self.head_url, &self.head_branch, &self.lease)
            .await?;
        Ok(true)
    }

    /// Force-checkout the branch or revision recorded before the checkout.
    #[instrument(skip_all, fields(target = %self.previous_branch_or_revision))]
    pub async fn reset_git_state(&self) -> bool {
        match self
            .git
            .checkout(&self.previous_branch_or_revision, true)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    "Failed to restore {}: {:#}",
                    self.previous_branch_or_revision, err
                );
                false
            }
        }
    }

    pub fn previous_branch_or_revision(&self) -> &str {
        &self.previous_branch_or_revision
    }

    pub fn head_branch(&self) -> &str {
        &self.head_branch
    }

    pub fn head_sha(&self) -> &str {
        &self.head_sha
    }

    pub fn lease(&self) -> &str {
        &self.lease
    }
}

// Leaves out the authenticated URL so the token never ends up in logs.
impl<G: GitOps> fmt::Debug for CheckoutSession<'_, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutSession")
            .field(
                "previous_branch_or_revision",
                &self.previous_branch_or_revision,
            )
            .field("head_branch", &self.head_branch)
            .field("head_sha", &self.head_sha)
            .field("lease", &self.lease)
            .finish_non_exhaustive()
    }
}

/// Embed `token` as the username of an https clone URL.
fn authenticated_url(url: &str, token: &str) -> anyhow::Result<String> {
    let mut url =
        Url::parse(url).with_context(|| format!("Invalid head repository URL: {}", url))?;
    url.set_username(token)
        .map_err(|()| anyhow!("Cannot add credentials to URL: {}", url))?;
    Ok(url.to_string())
}
