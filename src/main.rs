use std::io::Write as _;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use clap::Parser;
use colored::Colorize;
use pr_checkout::App;
use pr_checkout::CheckoutOptions;
use pr_checkout::Config;
use pr_checkout::clients::git::GitClient;
use pr_checkout::clients::github::GithubClient;
use tokio::process::Command;
use tracing::level_filters::LevelFilter;
use tracing::warn;

#[derive(Parser)]
#[command(name = "pr-checkout")]
#[command(about = "Check out a GitHub pull request locally and optionally push changes back to it", long_about = None)]
pub struct Cli {
    /// Pull request number
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    pub pr_number: u64,

    /// Check out the PR even if maintainers cannot push to its branch
    #[arg(long)]
    pub allow_if_maintainer_cannot_modify: bool,

    /// Shell command to run on the checkout. If it succeeds, HEAD is pushed
    /// back to the PR branch. The previous branch is restored afterwards.
    #[arg(long, value_name = "CMD")]
    pub exec: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    let cli = Cli::parse();

    let config = Config::load()?;
    let path = std::env::current_dir()?;
    let git = GitClient::new(path.clone());
    let remote_url = git.remote_url(&config.remote).await?;
    let gh = GithubClient::new(
        config.github_token.clone(),
        &config.github_api_url,
        &remote_url,
    )?;
    let app = App::new(git, gh);

    let options = CheckoutOptions {
        allow_if_maintainer_cannot_modify: cli.allow_if_maintainer_cannot_modify,
    };
    let session = app
        .checkout_pull_request_locally(cli.pr_number, &config.github_token, options)
        .await?;

    let stdout = &mut std::io::stdout();
    writeln!(
        stdout,
        "{} PR #{} ({} at {})",
        "Checked out".green(),
        cli.pr_number,
        session.head_branch().cyan(),
        session.head_sha().dimmed()
    )?;

    let Some(exec) = cli.exec else {
        writeln!(
            stdout,
            "Return to your previous state with: git checkout {}",
            session.previous_branch_or_revision()
        )?;
        return Ok(());
    };

    let status = Command::new("sh")
        .args(["-c", &exec])
        .current_dir(&path)
        .status()
        .await
        .context("Failed to execute command")?;

    if !status.success() {
        session.reset_git_state().await;
        bail!("Command failed ({}); nothing was pushed", status);
    }

    if let Err(err) = session.push_to_upstream().await {
        session.reset_git_state().await;
        return Err(err.into());
    }
    writeln!(
        stdout,
        "{} {}",
        "Pushed to".green(),
        session.head_branch().cyan()
    )?;

    if !session.reset_git_state().await {
        warn!(
            "Could not restore {}",
            session.previous_branch_or_revision()
        );
    }

    Ok(())
}

fn setup_logging() -> Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
