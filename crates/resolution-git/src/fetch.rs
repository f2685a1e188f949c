//! Blocking git work: list remote refs, fetch, and read one blob
//!
//! Every call gets its own temporary bare repository, so concurrent
//! resolutions of the same remote never share a working tree or object store.
//! The cancellation token is checked between steps and from the progress
//! callbacks, which abort an in-flight fetch. The connect handshake itself is
//! only bounded by the transport; a token cancelled while it runs is honored
//! as soon as the handshake returns.

use std::collections::BTreeMap;
use std::path::Path;

use git2::{AutotagOption, Direction, FetchOptions, ObjectType, Oid, Remote, RemoteCallbacks, Repository};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::GitError;
use crate::params::{GitParams, Revision};

/// Content of one file at an exact commit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedGitResource {
    /// Raw file bytes
    pub content: Vec<u8>,
    /// Full lowercase hex id of the commit the content was read from
    pub commit: String,
}

/// Refs advertised by the remote
struct RemoteRefs {
    heads: BTreeMap<String, Oid>,
    default_branch: Option<String>,
}

/// Fetch `params.path` at `params.revision` from `params.url`
pub(crate) fn fetch_file(
    params: &GitParams,
    cancel: &CancellationToken,
) -> Result<ResolvedGitResource, GitError> {
    let scratch = tempfile::Builder::new().prefix("git-resolver-").tempdir()?;
    let repo = Repository::init_bare(scratch.path()).map_err(GitError::Clone)?;
    let mut remote = repo.remote_anonymous(&params.url).map_err(GitError::Clone)?;

    check_cancelled(cancel)?;
    let refs = list_remote(&mut remote, cancel)?;
    check_cancelled(cancel)?;

    let commit_id = match &params.revision {
        Revision::Commit(commit) => {
            fetch(
                &mut remote,
                &["+refs/heads/*:refs/remotes/origin/*", "+refs/tags/*:refs/tags/*"],
                cancel,
            )?;
            find_commit(&repo, commit)?
        }
        Revision::Branch(branch) => fetch_branch(&repo, &mut remote, &refs, branch, cancel)?,
        Revision::DefaultBranch => {
            let branch = refs
                .default_branch
                .clone()
                .ok_or_else(|| GitError::RefNotFound("HEAD".to_string()))?;
            fetch_branch(&repo, &mut remote, &refs, &branch, cancel)?
        }
    };

    check_cancelled(cancel)?;
    let content = read_blob(&repo, commit_id, &params.path)?;

    debug!(commit = %commit_id, bytes = content.len(), "read file from repository");
    Ok(ResolvedGitResource {
        content,
        commit: commit_id.to_string(),
    })
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), GitError> {
    if cancel.is_cancelled() {
        Err(GitError::Cancelled)
    } else {
        Ok(())
    }
}

/// Connect once to read the advertised branch heads and default branch
fn list_remote(
    remote: &mut Remote<'_>,
    cancel: &CancellationToken,
) -> Result<RemoteRefs, GitError> {
    let connection = remote
        .connect_auth(Direction::Fetch, Some(cancellable_callbacks(cancel)), None)
        .map_err(|e| cancelled_or(cancel, e))?;
    check_cancelled(cancel)?;

    let advertised = connection.list().map_err(GitError::Clone)?;
    let heads: BTreeMap<String, Oid> = advertised
        .iter()
        .filter(|head| head.name().starts_with("refs/heads/"))
        .map(|head| (head.name().to_string(), head.oid()))
        .collect();
    let head_oid = advertised
        .iter()
        .find(|head| head.name() == "HEAD")
        .map(|head| head.oid());

    let default_branch = connection
        .default_branch()
        .ok()
        .and_then(|buf| buf.as_str().map(str::to_string))
        .or_else(|| {
            // transports that omit the HEAD symref: pick a branch at HEAD
            let oid = head_oid?;
            heads
                .iter()
                .find(|(_, head)| **head == oid)
                .map(|(name, _)| name.clone())
        })
        .map(|name| name.trim_start_matches("refs/heads/").to_string());

    Ok(RemoteRefs {
        heads,
        default_branch,
    })
}

fn fetch_branch(
    repo: &Repository,
    remote: &mut Remote<'_>,
    refs: &RemoteRefs,
    branch: &str,
    cancel: &CancellationToken,
) -> Result<Oid, GitError> {
    let remote_ref = format!("refs/heads/{branch}");
    if !refs.heads.contains_key(&remote_ref) {
        return Err(GitError::RefNotFound(remote_ref));
    }

    let tracking_ref = format!("refs/remotes/origin/{branch}");
    fetch(remote, &[format!("+{remote_ref}:{tracking_ref}").as_str()], cancel)?;

    let commit = repo
        .find_reference(&tracking_ref)
        .and_then(|r| r.peel_to_commit())
        .map_err(GitError::Checkout)?;
    Ok(commit.id())
}

/// Callbacks that abort the transfer once `cancel` fires
fn cancellable_callbacks(cancel: &CancellationToken) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|_progress| !cancel.is_cancelled());
    callbacks.sideband_progress(|_data| !cancel.is_cancelled());
    callbacks
}

fn cancelled_or(cancel: &CancellationToken, err: git2::Error) -> GitError {
    if cancel.is_cancelled() {
        GitError::Cancelled
    } else {
        GitError::Clone(err)
    }
}

fn fetch(
    remote: &mut Remote<'_>,
    refspecs: &[&str],
    cancel: &CancellationToken,
) -> Result<(), GitError> {
    let mut options = FetchOptions::new();
    options
        .remote_callbacks(cancellable_callbacks(cancel))
        .download_tags(AutotagOption::None);

    remote
        .fetch(refspecs, Some(&mut options), None)
        .map_err(|e| cancelled_or(cancel, e))
}

/// Resolve a full or abbreviated hex commit id in the fetched history
fn find_commit(repo: &Repository, commit: &str) -> Result<Oid, GitError> {
    if commit.is_empty() || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(GitError::ObjectNotFound);
    }

    repo.find_commit_by_prefix(commit)
        .map(|c| c.id())
        .map_err(|_| GitError::ObjectNotFound)
}

fn read_blob(repo: &Repository, commit_id: Oid, path: &str) -> Result<Vec<u8>, GitError> {
    let commit = repo
        .find_commit(commit_id)
        .map_err(|_| GitError::ObjectNotFound)?;
    let tree = commit.tree().map_err(GitError::Checkout)?;

    let lookup = path.trim_start_matches('/');
    let entry = tree
        .get_path(Path::new(lookup))
        .map_err(|_| GitError::FileNotFound(path.to_string()))?;
    if entry.kind() != Some(ObjectType::Blob) {
        return Err(GitError::FileNotFound(path.to_string()));
    }

    let blob = repo.find_blob(entry.id()).map_err(GitError::Checkout)?;
    Ok(blob.content().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{create_repo, CommitForRepo};

    fn params(url: &str, path: &str, revision: Revision) -> GitParams {
        GitParams {
            url: url.to_string(),
            path: path.to_string(),
            revision,
        }
    }

    #[test]
    fn reads_nested_file_at_default_branch() {
        let repo = create_repo(&[CommitForRepo::new("foo/bar", "somefile", "some content")]);

        let resolved = fetch_file(
            &params(&repo.url(), "foo/bar/somefile", Revision::DefaultBranch),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(resolved.content, b"some content");
        assert_eq!(resolved.commit, repo.head_of("main"));
    }

    #[test]
    fn directory_path_is_not_found() {
        let repo = create_repo(&[CommitForRepo::new("foo/bar", "somefile", "some content")]);

        let err = fetch_file(
            &params(&repo.url(), "foo/bar", Revision::DefaultBranch),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert_eq!(err.to_string(), r#"error opening file "foo/bar": file does not exist"#);
    }

    #[test]
    fn abbreviated_commit_resolves_to_full_id() {
        let repo = create_repo(&[
            CommitForRepo::new("", "somefile", "some content"),
            CommitForRepo::new("", "somefile", "different content"),
        ]);
        let first = repo.commits[0].to_string();

        let resolved = fetch_file(
            &params(&repo.url(), "somefile", Revision::Commit(first[..12].to_string())),
            &CancellationToken::new(),
        )
        .unwrap();

        assert_eq!(resolved.content, b"some content");
        assert_eq!(resolved.commit, first);
    }

    #[test]
    fn non_hex_commit_is_object_not_found() {
        let repo = create_repo(&[CommitForRepo::new("", "somefile", "some content")]);

        let err = fetch_file(
            &params(&repo.url(), "somefile", Revision::Commit("main".to_string())),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, GitError::ObjectNotFound));
    }

    #[test]
    fn cancelled_token_stops_before_fetching() {
        let repo = create_repo(&[CommitForRepo::new("", "somefile", "some content")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = fetch_file(
            &params(&repo.url(), "somefile", Revision::DefaultBranch),
            &cancel,
        )
        .unwrap_err();

        assert!(matches!(err, GitError::Cancelled));
    }

    #[test]
    fn listing_refs_reports_default_branch() {
        let repo = create_repo(&[
            CommitForRepo::new("", "somefile", "some content").on_branch("other-branch"),
        ]);
        let scratch = tempfile::tempdir().unwrap();
        let local = Repository::init_bare(scratch.path()).unwrap();
        let mut remote = local.remote_anonymous(&repo.url()).unwrap();

        let refs = list_remote(&mut remote, &CancellationToken::new()).unwrap();

        assert_eq!(refs.default_branch.as_deref(), Some("main"));
        assert!(refs.heads.contains_key("refs/heads/other-branch"));
    }

    #[test]
    fn listing_refs_honors_cancellation_after_connect() {
        let repo = create_repo(&[CommitForRepo::new("", "somefile", "some content")]);
        let scratch = tempfile::tempdir().unwrap();
        let local = Repository::init_bare(scratch.path()).unwrap();
        let mut remote = local.remote_anonymous(&repo.url()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = list_remote(&mut remote, &cancel);

        assert!(matches!(result, Err(GitError::Cancelled)));
    }

    #[test]
    fn unreachable_remote_is_clone_error() {
        let missing = tempfile::tempdir().unwrap();
        let url = missing.path().join("nope").to_string_lossy().into_owned();

        let err = fetch_file(
            &params(&url, "somefile", Revision::DefaultBranch),
            &CancellationToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, GitError::Clone(_)));
        assert!(err.to_string().starts_with("clone error: "));
    }
}
