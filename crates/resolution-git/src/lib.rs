//! Git resolver backend
//!
//! Resolves `(url, path, [branch | commit])` to the exact bytes of one file
//! plus the full id of the commit they were read from. Each resolution fetches
//! into its own temporary bare repository.

#![deny(missing_docs)]

pub mod error;
mod fetch;
pub mod params;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use error::GitError;
pub use fetch::ResolvedGitResource;
pub use params::{GitParams, Revision, BRANCH_PARAM, COMMIT_PARAM, PATH_PARAM, URL_PARAM};
pub use resolver::{
    GitResolver, ANNOTATION_KEY_COMMIT, ANNOTATION_KEY_PATH, ANNOTATION_KEY_URL,
    GIT_RESOLVER_NAME, LABEL_VALUE_GIT_RESOLVER_TYPE,
};
