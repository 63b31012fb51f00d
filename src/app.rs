use crate::clients::git::GitOps;
use crate::clients::github::GithubOps;

pub struct App<G: GitOps, H: GithubOps> {
    pub git: G,
    pub gh: H,
}

impl<G: GitOps, H: GithubOps> App<G, H> {
    pub fn new(git: G, gh: H) -> Self {
        Self { git, gh }
    }
}
