#![allow(async_fn_in_trait)]

use std::path;
use std::process::Output;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;
use tracing::instrument;

// -----------------------------------------------------------------------------
// GitOps trait

/// Operations the checkout workflow needs from git.
#[cfg_attr(test, automock)]
pub trait GitOps {
    /// Whether tracked files have staged or unstaged modifications.
    async fn has_uncommitted_changes(&self) -> Result<bool>;

    /// The current branch name, or the commit id when HEAD is detached.
    async fn current_branch_or_revision(&self) -> Result<String>;

    /// Fetch `refspec` from `url` into FETCH_HEAD without touching local branches.
    async fn fetch(&self, url: &str, refspec: &str) -> Result<()>;

    async fn checkout_detached(&self, revision: &str) -> Result<()>;

    /// Check out `revision`, discarding local modifications when `force` is set.
    async fn checkout(&self, revision: &str, force: bool) -> Result<()>;

    /// Push HEAD to `branch` on `url`, only if the remote branch still matches `lease`.
    async fn push_with_lease(&self, url: &str, branch: &str, lease: &str) -> Result<()>;
}

// -----------------------------------------------------------------------------
// GitClient

/// Git client.
pub struct GitClient {
    path: path::PathBuf,
}

impl GitClient {
    pub fn new(path: path::PathBuf) -> Self {
        Self { path }
    }

    /// URL configured for the named remote.
    pub async fn remote_url(&self, remote: &str) -> Result<String> {
        let key = format!("remote.{}.url", remote);
        self.run(&["config", "--get", &key])
            .await
            .with_context(|| format!("No git remote '{}' configured", remote))
    }

    async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(command = %args.first().unwrap_or(&""), "running git");
        Command::new("git")
            .current_dir(&self.path)
            .args(args)
            .output()
            .await
            .context("Failed to execute git command")
    }

    /// Run git, failing with its stderr on a non-zero exit. Returns trimmed stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;

        if !output.status.success() {
            bail!(
                "git command failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8(output.stdout)?.trim().to_string())
    }
}

impl GitOps for GitClient {
    #[instrument(skip_all)]
    async fn has_uncommitted_changes(&self) -> Result<bool> {
        let status = self
            .run(&["status", "--porcelain", "--untracked-files=no"])
            .await?;
        Ok(!status.is_empty())
    }

    #[instrument(skip_all)]
    async fn current_branch_or_revision(&self) -> Result<String> {
        let branch = self.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;

        // `--abbrev-ref` prints "HEAD" when detached
        if branch == "HEAD" {
            return self.run(&["rev-parse", "HEAD"]).await;
        }

        Ok(branch)
    }

    #[instrument(skip_all, fields(refspec = %refspec))]
    async fn fetch(&self, url: &str, refspec: &str) -> Result<()> {
        self.run(&["fetch", "-q", url, refspec]).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(revision = %revision))]
    async fn checkout_detached(&self, revision: &str) -> Result<()> {
        self.run(&["checkout", "--detach", revision]).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(revision = %revision, force = force))]
    async fn checkout(&self, revision: &str, force: bool) -> Result<()> {
        let mut args = vec!["checkout", revision];
        if force {
            args.push("--force");
        }
        self.run(&args).await?;
        Ok(())
    }

    #[instrument(skip_all, fields(branch = %branch, lease = %lease))]
    async fn push_with_lease(&self, url: &str, branch: &str, lease: &str) -> Result<()> {
        let refspec = format!("HEAD:{}", branch);
        let lease_arg = format!("--force-with-lease={}", lease);
        self.run(&["push", url, &refspec, &lease_arg]).await?;
        Ok(())
    }
}
