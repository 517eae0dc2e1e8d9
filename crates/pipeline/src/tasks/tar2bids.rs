//! Conversion of retrieved tar files into the study's raw BIDS dataset.

use std::path::Path;

use autobids_core::filesystem::{DirTree, DATASET_IGNORE};
use autobids_core::naming::DatasetType;
use autobids_core::process::CommandRunner;
use autobids_core::tar2bids::Tar2bidsArgs;
use autobids_core::types::DbId;
use autobids_db::models::dataset::DataladDataset;
use autobids_db::models::output::Cfmm2tarOutput;
use autobids_db::models::study::Study;
use autobids_db::repositories::{
    Cfmm2tarOutputRepo, DataladDatasetRepo, StudyRepo, Tar2bidsOutputRepo,
};
use autobids_events::messages;

use super::{launch_task, Pipeline, TaskContext, TaskPayload};
use crate::bids::merge_datasets;
use crate::datalad::ensure_dataset_exists;
use crate::error::PipelineError;

/// Name of the custom `.bidsignore` written for tar2bids.
const BIDSIGNORE_FILE: &str = "bidsignore";

/// Scratch directories for one tar2bids run.
struct Workspace {
    bids_dir: tempfile::TempDir,
    temp_dir: tempfile::TempDir,
    download_dir: tempfile::TempDir,
}

impl Workspace {
    fn incoming(&self) -> std::path::PathBuf {
        self.bids_dir.path().join("incoming")
    }

    fn existing(&self) -> std::path::PathBuf {
        self.bids_dir.path().join("existing")
    }
}

impl<R: CommandRunner> Pipeline<R> {
    pub(super) async fn find_unprocessed_tar_files(
        &self,
        ctx: &TaskContext<'_>,
        study_id: DbId,
    ) -> Result<(), PipelineError> {
        let raw = DataladDatasetRepo::find(&self.pool, study_id, DatasetType::RawData).await?;
        let unprocessed =
            Cfmm2tarOutputRepo::list_not_in_dataset(&self.pool, study_id, raw.map(|d| d.id))
                .await?;

        if unprocessed.is_empty() {
            tracing::info!(study_id, "All tar files already converted");
        } else {
            launch_task(
                &self.pool,
                &TaskPayload::RunTar2bids {
                    study_id,
                    tar_file_ids: unprocessed.iter().map(|o| o.id).collect(),
                },
                "tar2bids run for all new tar files",
                ctx.user_id,
            )
            .await?;
        }
        ctx.set_progress(100).await?;
        Ok(())
    }

    pub(super) async fn run_tar2bids(
        &self,
        ctx: &TaskContext<'_>,
        study_id: DbId,
        tar_file_ids: &[DbId],
    ) -> Result<(), PipelineError> {
        ctx.set_progress(0).await?;
        let study = self.load_study(study_id).await?;
        let outputs = Cfmm2tarOutputRepo::list_by_ids(&self.pool, study_id, tar_file_ids).await?;
        let tar_files: Vec<String> = outputs.iter().map(|o| o.tar_file.clone()).collect();

        let datalad = self.datalad();
        let custom_ria_url = study.custom_ria_url.as_deref();
        let dataset_tar = ensure_dataset_exists(
            &self.pool,
            &datalad,
            &self.config,
            study_id,
            DatasetType::SourceData,
            custom_ria_url,
        )
        .await?;
        let dataset_bids = ensure_dataset_exists(
            &self.pool,
            &datalad,
            &self.config,
            study_id,
            DatasetType::RawData,
            custom_ria_url,
        )
        .await?;

        let workspace = Workspace {
            bids_dir: tempfile::tempdir_in(&self.config.tar2bids_download_dir)?,
            temp_dir: tempfile::tempdir_in(&self.config.tar2bids_temp_dir)?,
            download_dir: tempfile::tempdir_in(&self.config.cfmm2tar_download_dir)?,
        };
        let bidsignore = match &study.custom_bidsignore {
            Some(contents) => {
                let path = workspace.bids_dir.path().join(BIDSIGNORE_FILE);
                std::fs::write(&path, contents)?;
                Some(path.to_string_lossy().into_owned())
            }
            None => None,
        };

        tracing::info!(study_id, tar_files = outputs.len(), "Running tar2bids");
        for (done, tar_out) in outputs.iter().enumerate() {
            let tar_path = match self
                .convert_tar_file(ctx, &study, &dataset_tar, tar_out, &workspace, bidsignore.clone())
                .await?
            {
                Ok(tar_path) => tar_path,
                Err(error) => {
                    self.notify(messages::tar2bids_failed(&tar_files, &error)).await;
                    return Ok(());
                }
            };
            self.merge_into_raw(&study, &dataset_bids, tar_out, &workspace, &tar_path)
                .await?;

            let percent = ((done + 1) * 100 / outputs.len()).min(99);
            ctx.set_progress(percent as i16).await?;
        }

        let ids: Vec<DbId> = outputs.iter().map(|o| o.id).collect();
        Tar2bidsOutputRepo::create(&self.pool, study_id, None, &study.heuristic, &ids).await?;
        ctx.set_progress(100).await?;
        if !outputs.is_empty() {
            self.notify(messages::tar2bids_succeeded(&tar_files)).await;
        }
        Ok(())
    }

    /// Run tar2bids on one tar file into the workspace's `incoming` dir.
    ///
    /// The inner `Err` carries the tar2bids failure after it has been
    /// recorded on the task; the task must then stop.
    async fn convert_tar_file(
        &self,
        ctx: &TaskContext<'_>,
        study: &Study,
        dataset_tar: &DataladDataset,
        tar_out: &Cfmm2tarOutput,
        workspace: &Workspace,
        bidsignore: Option<String>,
    ) -> Result<Result<String, String>, PipelineError> {
        let datalad = self.datalad();
        let path_tar = datalad
            .clone_dataset(
                self.config.ria_url(dataset_tar.custom_ria_url.as_deref()),
                &dataset_tar.ria_alias,
                workspace.download_dir.path(),
            )
            .await?;
        let tar_path = path_tar.join(&tar_out.tar_file);
        let incoming = workspace.incoming();

        let converted = async {
            datalad.get(&path_tar, Some(&tar_path)).await?;
            let args = Tar2bidsArgs {
                tar_files: vec![tar_path.to_string_lossy().into_owned()],
                output_dir: incoming.to_string_lossy().into_owned(),
                patient_str: Some(study.subj_expr.clone()),
                heuristic: Some(study.heuristic.clone()),
                temp_dir: Some(workspace.temp_dir.path().to_string_lossy().into_owned()),
                bidsignore,
                deface: study.deface,
            };
            let image = self.config.tar2bids_image(study.tar2bids_img.as_deref());
            Ok::<_, PipelineError>(self.dcm4che().run_tar2bids(&image, &args).await)
        }
        .await;
        datalad.remove_clone(&path_tar).await;

        match converted? {
            Ok(log) => {
                ctx.append_log(&log).await?;
                Ok(Ok(tar_path.to_string_lossy().into_owned()))
            }
            Err(e) => {
                let error = e.to_string();
                tracing::error!(study_id = study.id, tar_file = %tar_out.tar_file, error = %error, "tar2bids failed");
                ctx.set_error(&error).await?;
                ctx.append_log(&error).await?;
                ctx.append_log("Dataset contents:\n").await?;
                ctx.append_log(&render_tree(&incoming)).await?;
                Ok(Err(error))
            }
        }
    }

    /// Merge `incoming` into the raw dataset, push it, and record the
    /// conversion.
    async fn merge_into_raw(
        &self,
        study: &Study,
        dataset_bids: &DataladDataset,
        tar_out: &Cfmm2tarOutput,
        workspace: &Workspace,
        tar_path: &str,
    ) -> Result<(), PipelineError> {
        let datalad = self.datalad();
        let existing = workspace.existing();
        std::fs::create_dir_all(&existing)?;
        let path_bids = datalad
            .clone_dataset(
                self.config.ria_url(dataset_bids.custom_ria_url.as_deref()),
                &dataset_bids.ria_alias,
                &existing,
            )
            .await?;

        let merged = async {
            let incoming = workspace.incoming();
            merge_datasets(&incoming, &path_bids)?;
            std::fs::remove_dir_all(&incoming)?;
            datalad
                .finalize(&path_bids, &format!("Ran tar2bids on tar file {tar_path}"))
                .await?;
            let content = DirTree::from_path(&path_bids, &DATASET_IGNORE)?;
            Ok::<_, PipelineError>(serde_json::to_value(content)?)
        }
        .await;
        datalad.remove_clone(&path_bids).await;

        let content = merged?;
        StudyRepo::set_dataset_content(&self.pool, study.id, Some(&content)).await?;
        Cfmm2tarOutputRepo::link_dataset(&self.pool, tar_out.id, dataset_bids.id).await?;
        Ok(())
    }
}

/// `tree`-style listing of a directory for the task log.
fn render_tree(path: &Path) -> String {
    match DirTree::from_path(path, &DATASET_IGNORE) {
        Ok(tree) => tree.render().join("\n"),
        Err(_) => String::new(),
    }
}
