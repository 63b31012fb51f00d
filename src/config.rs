use anyhow::Context;
use anyhow::Result;

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_REMOTE: &str = "origin";

#[derive(Debug, Clone)]
pub struct Config {
    pub github_token: String,
    pub github_api_url: String,
    /// Remote whose URL identifies the GitHub repository.
    pub remote: String,
}

impl Config {
    /// Load config from the environment and .git/config
    pub fn load() -> Result<Self> {
        let github_token = token_from_env(|key| std::env::var(key).ok())
            .or_else(|| git_config_get("prCheckout.githubToken"))
            .context(
                "No GitHub token found. Set GITHUB_TOKEN or run \
                 'git config prCheckout.githubToken <token>'.",
            )?;

        let github_api_url = git_config_get("prCheckout.githubApiUrl")
            .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string());
        let remote =
            git_config_get("prCheckout.remote").unwrap_or_else(|| DEFAULT_REMOTE.to_string());

        Ok(Self {
            github_token,
            github_api_url,
            remote,
        })
    }

    /// Create a new config with explicit values (useful for tests)
    pub fn new(github_token: String) -> Self {
        Self {
            github_token,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

/// First non-blank token from GITHUB_TOKEN or GH_TOKEN.
fn token_from_env(var: impl Fn(&str) -> Option<String>) -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN"]
        .into_iter()
        .filter_map(var)
        .map(|token| token.trim().to_string())
        .find(|token| !token.is_empty())
}

fn git_config_get(key: &str) -> Option<String> {
    let output = std::process::Command::new("git")
        .args(["config", "--get", key])
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let value = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!value.is_empty()).then_some(value)
}
