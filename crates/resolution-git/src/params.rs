//! Git resolver parameters

use resolution_framework::Params;

use crate::error::GitError;

/// Repository URL to fetch from
pub const URL_PARAM: &str = "url";

/// File path relative to the repository root
pub const PATH_PARAM: &str = "path";

/// Exact (or unambiguously abbreviated) commit id
pub const COMMIT_PARAM: &str = "commit";

/// Branch name; the remote's default branch when neither this nor commit is set
pub const BRANCH_PARAM: &str = "branch";

/// Which revision of the repository to read
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Revision {
    /// Tip of the remote's default branch
    DefaultBranch,
    /// Tip of a named branch
    Branch(String),
    /// A specific commit
    Commit(String),
}

/// Validated git resolver parameters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GitParams {
    /// Remote URL
    pub url: String,
    /// Repository-relative file path
    pub path: String,
    /// Revision to read the file at
    pub revision: Revision,
}

impl GitParams {
    /// Parse and validate request params
    ///
    /// `url` and `path` are required; `commit` and `branch` are mutually
    /// exclusive.
    pub fn from_params(params: &Params) -> Result<Self, GitError> {
        let url = required(params, URL_PARAM)?;
        let path = required(params, PATH_PARAM)?;

        let revision = match (params.get(COMMIT_PARAM), params.get(BRANCH_PARAM)) {
            (Some(_), Some(_)) => {
                return Err(GitError::InvalidParams(format!(
                    "supplied both {COMMIT_PARAM:?} and {BRANCH_PARAM:?}"
                )))
            }
            (Some(commit), None) if !commit.is_empty() => Revision::Commit(commit.clone()),
            (None, Some(branch)) if !branch.is_empty() => {
                let branch = branch.strip_prefix("refs/heads/").unwrap_or(branch);
                Revision::Branch(branch.to_string())
            }
            _ => Revision::DefaultBranch,
        };

        Ok(Self {
            url,
            path,
            revision,
        })
    }
}

fn required(params: &Params, key: &str) -> Result<String, GitError> {
    match params.get(key) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(GitError::InvalidParams(format!(
            "missing required git resolver param {key:?}"
        ))),
    }
}
