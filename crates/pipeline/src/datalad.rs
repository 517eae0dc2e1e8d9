//! DataLad dataset handling through the `datalad` and `git` CLIs.
//!
//! Every dataset lives in a RIA store. Tasks clone it into a scratch
//! directory, change it, save and push, then remove the clone.

use std::path::{Path, PathBuf};

use autobids_core::naming::{ria_alias, ria_clone_url, DatasetType};
use autobids_core::process::{CommandError, CommandOutput, CommandRunner, CommandSpec};
use autobids_core::types::{DbId, Timestamp};
use autobids_db::models::dataset::DataladDataset;
use autobids_db::repositories::DataladDatasetRepo;
use chrono::DateTime;
use sqlx::PgPool;

use crate::config::ToolConfig;
use crate::error::PipelineError;

/// Runs DataLad operations through a [`CommandRunner`].
pub struct Datalad<'a, R> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> Datalad<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, CommandError> {
        let program = spec.program.clone();
        tracing::debug!(command = %spec.command_line(), "Running");
        self.runner.run(spec).await?.check(&program)
    }

    fn datalad() -> CommandSpec {
        CommandSpec::new("datalad")
    }

    fn git(path: &Path) -> CommandSpec {
        CommandSpec::new("git").arg("-C").arg(path.to_string_lossy())
    }

    /// Create a dataset at `path` with an `origin` sibling in the RIA store.
    pub async fn create_ria_dataset(
        &self,
        path: &Path,
        alias: &str,
        ria_url: &str,
    ) -> Result<(), CommandError> {
        let path_str = path.to_string_lossy();
        self.run(Self::datalad().args(["create", "-c", "text2git"]).arg(path_str.as_ref()))
            .await?;
        self.run(
            Self::datalad()
                .args(["create-sibling-ria", "-s", "origin", "--alias", alias, "--new-store-ok"])
                .args(["-d", path_str.as_ref(), ria_url]),
        )
        .await?;
        self.push(path).await
    }

    /// Clone an aliased dataset into `parent/alias` and return its path.
    pub async fn clone_dataset(
        &self,
        ria_url: &str,
        alias: &str,
        parent: &Path,
    ) -> Result<PathBuf, CommandError> {
        let path = parent.join(alias);
        tracing::info!(path = %path.display(), alias, "Cloning dataset");
        self.run(
            Self::datalad()
                .arg("clone")
                .arg(ria_clone_url(ria_url, alias))
                .arg(path.to_string_lossy()),
        )
        .await?;
        Ok(path)
    }

    /// Fetch annexed content, either one file or the whole dataset.
    pub async fn get(&self, dataset: &Path, file: Option<&Path>) -> Result<(), CommandError> {
        let mut spec = Self::datalad()
            .args(["get", "-d"])
            .arg(dataset.to_string_lossy());
        if let Some(file) = file {
            spec = spec.arg(file.to_string_lossy());
        }
        self.run(spec).await.map(|_| ())
    }

    pub async fn save(&self, dataset: &Path, message: &str) -> Result<(), CommandError> {
        self.run(
            Self::datalad()
                .args(["save", "-d"])
                .arg(dataset.to_string_lossy())
                .args(["-m", message]),
        )
        .await
        .map(|_| ())
    }

    /// Mark the local clone dead and push everything to `origin`.
    pub async fn push(&self, dataset: &Path) -> Result<(), CommandError> {
        self.run(Self::git(dataset).args(["annex", "dead", "here"]))
            .await?;
        self.run(
            Self::datalad()
                .args(["push", "-d"])
                .arg(dataset.to_string_lossy())
                .args(["--data", "anything", "--to", "origin"]),
        )
        .await
        .map(|_| ())
    }

    /// Save the dataset's changes and push them back to the RIA store.
    pub async fn finalize(&self, dataset: &Path, message: &str) -> Result<(), CommandError> {
        self.save(dataset, message).await?;
        self.push(dataset).await
    }

    /// Remove a file from the dataset and push the removal.
    pub async fn remove_file(
        &self,
        dataset: &Path,
        file_name: &str,
        message: &str,
    ) -> Result<(), CommandError> {
        let target = dataset.join(file_name);
        tracing::info!(path = %target.display(), "Removing file from dataset");
        self.run(
            Self::datalad()
                .args(["remove", "-d"])
                .arg(dataset.to_string_lossy())
                .args(["-m", message])
                .arg(target.to_string_lossy()),
        )
        .await?;
        self.push(dataset).await
    }

    /// Delete a local clone. Failures are logged, not returned.
    pub async fn remove_clone(&self, dataset: &Path) {
        let result = self
            .run(
                Self::datalad()
                    .args(["remove", "-d"])
                    .arg(dataset.to_string_lossy())
                    .args(["--reckless", "modification"]),
            )
            .await;
        if let Err(e) = result {
            tracing::warn!(path = %dataset.display(), error = %e, "Failed to remove dataset clone");
        }
    }

    /// Commit hash of the clone's HEAD.
    pub async fn hexsha(&self, dataset: &Path) -> Result<String, CommandError> {
        let output = self.run(Self::git(dataset).args(["rev-parse", "HEAD"])).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Commit time of the clone's HEAD.
    pub async fn commit_datetime(&self, dataset: &Path) -> Result<Timestamp, PipelineError> {
        let output = self
            .run(Self::git(dataset).args(["log", "-1", "--format=%cI"]))
            .await?;
        let raw = output.stdout.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.to_utc())
            .map_err(|e| PipelineError::Config(format!("Unparseable commit date {raw:?}: {e}")))
    }
}

/// Fetch a study's dataset record, creating the dataset in the RIA store
/// first if it does not exist yet.
pub async fn ensure_dataset_exists<R: CommandRunner>(
    pool: &PgPool,
    datalad: &Datalad<'_, R>,
    config: &ToolConfig,
    study_id: DbId,
    dataset_type: DatasetType,
    custom_ria_url: Option<&str>,
) -> Result<DataladDataset, PipelineError> {
    if let Some(existing) = DataladDatasetRepo::find(pool, study_id, dataset_type).await? {
        return Ok(existing);
    }

    let alias = ria_alias(study_id, dataset_type);
    let scratch = tempfile::tempdir_in(&config.cfmm2tar_download_dir)?;
    let path = scratch.path().join(&alias);
    tracing::info!(study_id, alias = %alias, "Creating dataset in RIA store");
    datalad
        .create_ria_dataset(&path, &alias, config.ria_url(custom_ria_url))
        .await?;
    datalad.remove_clone(&path).await;

    let (dataset, _) =
        DataladDatasetRepo::ensure(pool, study_id, dataset_type, custom_ria_url).await?;
    Ok(dataset)
}
