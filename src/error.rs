use thiserror::Error;

/// Errors returned by the pull request checkout workflow.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The working tree has uncommitted changes.
    #[error("Unable to check out PR: there are uncommitted changes in the working tree")]
    UnexpectedLocalChanges,

    /// The PR does not allow maintainers to push to its branch.
    #[error(
        "PR #{pr_number} does not allow maintainers to modify its branch, so changes could not be pushed back"
    )]
    MaintainerModifyAccess { pr_number: u64 },

    /// A git command, GitHub request or response validation failed.
    #[error(transparent)]
    Command(#[from] anyhow::Error),
}
