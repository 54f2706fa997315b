//! engine::projects
//!
//! Project lifecycle: create, initialise, inspect, update, delete, and the
//! per-user active project.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::{debug, info, warn};

use super::model::{ProjectDetails, ProjectList, ProjectSource, ProjectSpec, ProjectUpdate};
use super::{open_project, with_timeout, Engine, EngineError};
use crate::core::registry::{Project, Remote};
use crate::core::types::{BranchName, ProjectName, RemoteName, UserId, UtcTimestamp};
use crate::git::{CommitInfo, Credentials, Git, Transfer};
use crate::secrets::remote_key;

const INITIAL_COMMIT_MESSAGE: &str = "Create project files";

/// Files every initialised project starts with.
fn default_files(project: &Project) -> BTreeMap<String, String> {
    let mut readme = format!("# {}\n", project.name);
    if !project.description.trim().is_empty() {
        readme.push('\n');
        readme.push_str(project.description.trim());
        readme.push('\n');
    }
    BTreeMap::from([
        ("README.md".to_string(), readme),
        (".gitignore".to_string(), "*.backup\n".to_string()),
    ])
}

/// Write the default files overlaid with `extra` and commit them.
///
/// Refuses a repository that already has commits or files.
fn seed(
    git: &Git,
    project: &Project,
    extra: BTreeMap<String, String>,
) -> Result<CommitInfo, EngineError> {
    if !git.is_empty()? || git.worktree_has_files()? {
        return Err(EngineError::NotEmpty(project.name.clone()));
    }

    let mut files = default_files(project);
    files.extend(extra);
    for (path, content) in &files {
        git.write_worktree_file(path, content.as_bytes())?;
    }
    let paths: Vec<String> = files.into_keys().collect();
    git.stage(&paths)?;
    let oid = git.commit(INITIAL_COMMIT_MESSAGE)?;
    Ok(git.commit_info(&oid)?)
}

fn dir_has_entries(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

fn remove_tree(path: &Path) {
    if let Err(e) = fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove project directory");
        }
    }
}

impl Engine {
    /// All projects, ordered by name, plus `user`'s active project.
    pub async fn list_projects(&self, user: &UserId) -> Result<ProjectList, EngineError> {
        let projects = self.registry.list()?;
        let active = self.tracker.active_name(user).await?;
        debug!(user = %user, count = projects.len(), "listed projects");
        Ok(ProjectList { projects, active })
    }

    /// Create a project and its repository.
    ///
    /// The registry entry is written only once the repository exists, so a
    /// failed clone leaves nothing behind.
    pub async fn create_project(
        &self,
        user: &UserId,
        spec: ProjectSpec,
    ) -> Result<Project, EngineError> {
        let name = spec.name.clone();
        if self.registry.contains(&name)? {
            return Err(EngineError::AlreadyExists(format!("project '{name}'")));
        }
        let path = self.paths.project_dir(&name);
        if dir_has_entries(&path) {
            return Err(EngineError::AlreadyExists(format!(
                "directory '{}'",
                path.display()
            )));
        }

        let mut project = Project {
            name: name.clone(),
            description: spec.description,
            path: path.clone(),
            created_at: UtcTimestamp::now(),
            remotes: Vec::new(),
        };

        let built = match spec.source {
            ProjectSource::Empty => self.build_local(&project, None).await,
            ProjectSource::Template { files } => self.build_local(&project, Some(files)).await,
            ProjectSource::Clone {
                url,
                credentials,
                branch,
            } => self.build_clone(&project, url, credentials, branch).await,
        };
        project.remotes = match built {
            Ok(remotes) => remotes,
            Err(e) => {
                warn!(user = %user, project = %name, error = %e, "project creation failed");
                remove_tree(&path);
                return Err(e);
            }
        };

        let auth_keys: Vec<String> = project
            .remotes
            .iter()
            .filter_map(|r| r.auth.clone())
            .collect();
        match self.registry.insert(project) {
            Ok(project) => {
                info!(
                    user = %user,
                    project = %name,
                    remotes = project.remotes.len(),
                    "project created"
                );
                Ok(project)
            }
            Err(e) => {
                remove_tree(&path);
                for key in auth_keys {
                    self.secrets.delete(&key)?;
                }
                Err(e.into())
            }
        }
    }

    /// Init the repository, optionally with an initial commit.
    async fn build_local(
        &self,
        project: &Project,
        files: Option<BTreeMap<String, String>>,
    ) -> Result<Vec<Remote>, EngineError> {
        let branch = BranchName::new(self.config.default_branch())?;
        let identity = self.identity();
        let project = project.clone();
        let name = project.name.clone();
        self.serializer
            .run_exclusive(&name, move || {
                fs::create_dir_all(&project.path).map_err(|e| {
                    EngineError::StorageUnavailable(format!("{}: {e}", project.path.display()))
                })?;
                Git::init(&project.path, &branch)?;
                if let Some(files) = files {
                    let git = open_project(&project, identity)?;
                    seed(&git, &project, files)?;
                }
                Ok::<_, EngineError>(Vec::new())
            })
            .await?
    }

    /// Clone `url`, recording it as the `origin` remote.
    async fn build_clone(
        &self,
        project: &Project,
        url: String,
        credentials: Option<Credentials>,
        branch: Option<BranchName>,
    ) -> Result<Vec<Remote>, EngineError> {
        super::sync::validate_url(&url)?;
        let origin = RemoteName::new("origin")?;
        let transfer = Transfer {
            credentials: credentials.clone(),
            ..Transfer::default()
        };
        let cancel = transfer.cancel.clone();
        let path = project.path.clone();
        let parent = self.paths.projects_dir();
        let clone_url = url.clone();

        let task = async {
            self.serializer
                .run_exclusive(&project.name, move || {
                    fs::create_dir_all(&parent).map_err(|e| {
                        EngineError::StorageUnavailable(format!("{}: {e}", parent.display()))
                    })?;
                    Git::clone_from(&clone_url, &path, branch.as_ref(), &transfer)?;
                    Ok::<_, EngineError>(())
                })
                .await?
        };
        with_timeout(
            &project.name,
            "clone",
            self.config.network_timeout(),
            cancel,
            task,
        )
        .await?;

        let auth = match credentials {
            Some(credentials) => {
                let key = remote_key(&project.name, &origin);
                self.secrets.set(&key, &credentials.to_secret())?;
                Some(key)
            }
            None => None,
        };
        Ok(vec![Remote {
            name: origin,
            url,
            auth,
        }])
    }

    /// Give an empty project its initial commit: the default files
    /// overlaid with `files`.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotEmpty`] if the project has commits or files
    pub async fn initialise_project(
        &self,
        user: &UserId,
        name: &ProjectName,
        files: BTreeMap<String, String>,
    ) -> Result<CommitInfo, EngineError> {
        let commit = self
            .exclusive(name, move |git, project| seed(git, project, files))
            .await?;
        info!(user = %user, project = %name, commit = %commit.oid.short(7), "project initialised");
        Ok(commit)
    }

    /// Project metadata with its current branch and HEAD.
    pub async fn get_project(
        &self,
        user: &UserId,
        name: &ProjectName,
    ) -> Result<ProjectDetails, EngineError> {
        let active = self.tracker.active_name(user).await?.as_ref() == Some(name);
        self.shared(name, move |git, project| {
            Ok(ProjectDetails {
                project: project.clone(),
                branch: git.current_branch()?.map(String::from),
                head: git.try_head_oid()?,
                active,
            })
        })
        .await
    }

    /// Update a project's metadata.
    pub async fn update_project(
        &self,
        user: &UserId,
        name: &ProjectName,
        update: ProjectUpdate,
    ) -> Result<Project, EngineError> {
        let project = self.registry.update(name, |project| {
            if let Some(description) = update.description {
                project.description = description;
            }
        })?;
        info!(user = %user, project = %name, "project updated");
        Ok(project)
    }

    /// Delete a project, its working tree and its stored credentials.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ActiveProjectBusy`] if it is `user`'s active project,
    ///   or some user has it active while an operation holds its lock
    pub async fn delete_project(&self, user: &UserId, name: &ProjectName) -> Result<(), EngineError> {
        let project = self.registry.get(name)?;

        if self.tracker.active_name(user).await?.as_ref() == Some(name) {
            return Err(EngineError::ActiveProjectBusy(name.clone()));
        }
        let users = self.tracker.users_of(name)?;
        if !users.is_empty() && self.serializer.is_busy(name) {
            return Err(EngineError::ActiveProjectBusy(name.clone()));
        }

        let registry = self.registry.clone();
        let target = name.clone();
        let removed = self
            .serializer
            .run_exclusive(name, move || {
                let removed = registry.remove(&target)?;
                remove_tree(&removed.path);
                Ok::<_, EngineError>(removed)
            })
            .await??;

        for key in removed.remotes.iter().filter_map(|r| r.auth.as_deref()) {
            self.secrets.delete(key)?;
        }
        self.serializer.forget(name);
        info!(
            user = %user,
            project = %name,
            path = %project.path.display(),
            cleared_active = users.len(),
            "project deleted"
        );
        Ok(())
    }

    /// `user`'s active project, if any.
    pub async fn get_active_project(&self, user: &UserId) -> Result<Option<Project>, EngineError> {
        Ok(self.tracker.get(user).await?)
    }

    /// Make `name` `user`'s active project.
    pub async fn set_active_project(
        &self,
        user: &UserId,
        name: &ProjectName,
    ) -> Result<Project, EngineError> {
        Ok(self.tracker.set(user, name).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn project(description: &str) -> Project {
        Project {
            name: ProjectName::new("demo").unwrap(),
            description: description.to_string(),
            path: PathBuf::from("/tmp/demo"),
            created_at: UtcTimestamp::now(),
            remotes: Vec::new(),
        }
    }

    #[test]
    fn readme_mentions_description() {
        let files = default_files(&project("A flow project"));
        assert_eq!(files["README.md"], "# demo\n\nA flow project\n");
        assert!(files.contains_key(".gitignore"));

        let files = default_files(&project("  "));
        assert_eq!(files["README.md"], "# demo\n");
    }
}
