//! Throwaway repositories for git resolver tests

use git2::{IndexEntry, IndexTime, Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

/// One file written in its own commit
pub struct CommitForRepo {
    pub dir: &'static str,
    pub filename: &'static str,
    pub content: &'static str,
    pub branch: Option<&'static str>,
}

impl CommitForRepo {
    pub fn new(dir: &'static str, filename: &'static str, content: &'static str) -> Self {
        Self {
            dir,
            filename,
            content,
            branch: None,
        }
    }

    pub fn on_branch(mut self, branch: &'static str) -> Self {
        self.branch = Some(branch);
        self
    }

    fn path(&self) -> String {
        if self.dir.is_empty() {
            self.filename.to_string()
        } else {
            format!("{}/{}", self.dir, self.filename)
        }
    }
}

/// A repository on disk plus the ids of the commits written into it
pub struct TestRepo {
    dir: TempDir,
    pub commits: Vec<Oid>,
}

impl TestRepo {
    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn head_of(&self, branch: &str) -> String {
        let repo = Repository::open(self.dir.path()).unwrap();
        let commit = repo
            .find_reference(&format!("refs/heads/{branch}"))
            .unwrap()
            .peel_to_commit()
            .unwrap()
            .id();
        commit.to_string()
    }
}

/// Create a repository with default branch `main`, a README commit, and then
/// one commit per entry. Branches other than `main` fork from the README
/// commit the first time they are used.
pub fn create_repo(commits: &[CommitForRepo]) -> TestRepo {
    let dir = tempfile::tempdir().unwrap();
    let mut opts = RepositoryInitOptions::new();
    opts.initial_head("main");
    let repo = Repository::init_opts(dir.path(), &opts).unwrap();

    let start = commit_file(&repo, "refs/heads/main", None, "README", "This is a test repo");

    let mut ids = Vec::new();
    for commit in commits {
        let refname = format!("refs/heads/{}", commit.branch.unwrap_or("main"));
        let parent = repo
            .find_reference(&refname)
            .ok()
            .and_then(|r| r.target())
            .unwrap_or(start);
        ids.push(commit_file(
            &repo,
            &refname,
            Some(parent),
            &commit.path(),
            commit.content,
        ));
    }

    TestRepo { dir, commits: ids }
}

fn commit_file(
    repo: &Repository,
    refname: &str,
    parent: Option<Oid>,
    path: &str,
    content: &str,
) -> Oid {
    let signature = Signature::now("Someone", "someone@example.com").unwrap();
    let parent = parent.map(|id| repo.find_commit(id).unwrap());

    let mut index = repo.index().unwrap();
    index.clear().unwrap();
    if let Some(parent) = &parent {
        index.read_tree(&parent.tree().unwrap()).unwrap();
    }

    let entry = IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: content.len() as u32,
        id: Oid::zero(),
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    };
    index.add_frombuffer(&entry, content.as_bytes()).unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let parents: Vec<_> = parent.iter().collect();
    repo.commit(
        Some(refname),
        &signature,
        &signature,
        &format!("add {path}"),
        &tree,
        &parents,
    )
    .unwrap()
}
