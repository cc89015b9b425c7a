//! Publishing dataset snapshots to a version-control remote

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use sekai_protocol::Region;

use crate::error::{MasterError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Nothing was staged
    NoChanges,
    /// A commit was created and pushed
    Pushed,
}

/// Receives each region whose dataset advanced
#[async_trait]
pub trait DatasetPublisher: Send + Sync {
    async fn publish(&self, region: Region, data_version: &str) -> Result<PublishOutcome>;
}

/// Identity and credentials used for commits and pushes
#[derive(Debug, Clone)]
pub struct GitIdentity {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Exported as `http_proxy`/`https_proxy` for the push
    pub proxy: Option<String>,
}

/// Commits and pushes a region's repository with the `git` executable
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repositories: BTreeMap<Region, PathBuf>,
    identity: GitIdentity,
}

impl GitPublisher {
    pub const fn new(repositories: BTreeMap<Region, PathBuf>, identity: GitIdentity) -> Self {
        Self {
            repositories,
            identity,
        }
    }

    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let mut command = Command::new("git");
        command
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(proxy) = &self.identity.proxy {
            command.env("http_proxy", proxy).env("https_proxy", proxy);
        }

        let output = command.output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(MasterError::Git {
                command: args.first().copied().unwrap_or_default().to_string(),
                stderr: redact(
                    String::from_utf8_lossy(&output.stderr).trim(),
                    &self.identity.password,
                ),
            })
        }
    }

    /// `git diff --cached --quiet` exits 1 when something is staged
    async fn has_staged_changes(&self, dir: &Path) -> Result<bool> {
        let status = Command::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(dir)
            .stdin(Stdio::null())
            .status()
            .await?;
        match status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(MasterError::Git {
                command: "diff".to_string(),
                stderr: format!("exited with {status}"),
            }),
        }
    }

    async fn push(&self, dir: &Path) -> Result<()> {
        let branch = self.git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let original = self.git(dir, &["remote", "get-url", "origin"]).await?;
        let authenticated =
            authenticated_url(&original, &self.identity.username, &self.identity.password);

        self.git(dir, &["remote", "set-url", "origin", &authenticated])
            .await?;
        let refspec = format!("{branch}:{branch}");
        let pushed = self.git(dir, &["push", "origin", &refspec]).await;

        // restore even when the push failed
        let restored = self
            .git(dir, &["remote", "set-url", "origin", &original])
            .await;
        pushed?;
        restored?;
        Ok(())
    }
}

#[async_trait]
impl DatasetPublisher for GitPublisher {
    async fn publish(&self, region: Region, data_version: &str) -> Result<PublishOutcome> {
        let dir = self
            .repositories
            .get(&region)
            .ok_or(MasterError::NoRepository(region))?;

        self.git(dir, &["add", "-A"]).await?;
        if !self.has_staged_changes(dir).await? {
            info!("{} repository has no changes to commit", region.tag());
            return Ok(PublishOutcome::NoChanges);
        }

        let name = format!("user.name={}", self.identity.username);
        let email = format!("user.email={}", self.identity.email);
        let message = format!("master data version {data_version}");
        self.git(dir, &["-c", &name, "-c", &email, "commit", "-m", &message])
            .await?;

        if let Err(e) = self.push(dir).await {
            warn!("{} push failed: {}", region.tag(), e);
            return Err(e);
        }
        info!("{} pushed master data version {}", region.tag(), data_version);
        Ok(PublishOutcome::Pushed)
    }
}

/// Embed credentials into an HTTP(S) remote URL, replacing any present.
/// Other URL forms are returned unchanged.
pub fn authenticated_url(original: &str, username: &str, password: &str) -> String {
    match url::Url::parse(original) {
        Ok(mut url) if matches!(url.scheme(), "http" | "https") => {
            if url.set_username(username).is_err() || url.set_password(Some(password)).is_err() {
                return original.to_string();
            }
            url.to_string()
        }
        _ => original.to_string(),
    }
}

fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "***")
    }
}
