//! Git resolver: reads one file at a branch, commit, or default branch tip

use std::collections::BTreeMap;

use async_trait::async_trait;
use resolution_common::LABEL_KEY_RESOLVER_TYPE;
use resolution_framework::{
    Labels, Params, ResolveContext, ResolvedResource, Resolver, ResolverError,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::GitError;
use crate::fetch::{fetch_file, ResolvedGitResource};
use crate::params::GitParams;

/// Resolver name used in status messages
pub const GIT_RESOLVER_NAME: &str = "Git";

/// Value of the resolver-type label for git requests
pub const LABEL_VALUE_GIT_RESOLVER_TYPE: &str = "git";

/// Annotation carrying the commit the content was read from
pub const ANNOTATION_KEY_COMMIT: &str = "git.resolution.dev/commit";

/// Annotation carrying the repository URL
pub const ANNOTATION_KEY_URL: &str = "git.resolution.dev/url";

/// Annotation carrying the file path
pub const ANNOTATION_KEY_PATH: &str = "git.resolution.dev/path";

/// Resolver fetching files from git remotes
#[derive(Clone, Copy, Debug, Default)]
pub struct GitResolver;

impl GitResolver {
    /// Create a git resolver
    pub fn new() -> Self {
        Self
    }

    /// Fetch the file described by `params`
    ///
    /// The git work runs on the blocking pool. Cancelling `cancel` returns
    /// [`GitError::Cancelled`] right away and makes the background work stop
    /// at its next checkpoint.
    #[instrument(skip(self, params, cancel), fields(url = %params.url, path = %params.path))]
    pub async fn resolve_git(
        &self,
        params: GitParams,
        cancel: CancellationToken,
    ) -> Result<ResolvedGitResource, GitError> {
        let worker_cancel = cancel.clone();
        let work = tokio::task::spawn_blocking(move || fetch_file(&params, &worker_cancel));

        tokio::select! {
            joined = work => joined.map_err(|e| GitError::Internal(e.to_string()))?,
            _ = cancel.cancelled() => {
                debug!("git resolution cancelled");
                Err(GitError::Cancelled)
            }
        }
    }
}

#[async_trait]
impl Resolver for GitResolver {
    fn name(&self) -> &str {
        GIT_RESOLVER_NAME
    }

    fn selector(&self) -> Labels {
        BTreeMap::from([(
            LABEL_KEY_RESOLVER_TYPE.to_string(),
            LABEL_VALUE_GIT_RESOLVER_TYPE.to_string(),
        )])
    }

    fn validate_params(&self, params: &Params) -> Result<(), ResolverError> {
        GitParams::from_params(params)?;
        Ok(())
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext,
        params: &Params,
    ) -> Result<ResolvedResource, ResolverError> {
        let params = GitParams::from_params(params)?;
        let url = params.url.clone();
        let path = params.path.clone();

        let resolved = self
            .resolve_git(params, ctx.cancellation().clone())
            .await?;

        info!(%url, %path, commit = %resolved.commit, "resolved git resource");
        Ok(ResolvedResource::new(resolved.content)
            .with_annotation(ANNOTATION_KEY_COMMIT, resolved.commit)
            .with_annotation(ANNOTATION_KEY_URL, url)
            .with_annotation(ANNOTATION_KEY_PATH, path))
    }
}
