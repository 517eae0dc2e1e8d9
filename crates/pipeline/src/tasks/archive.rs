//! Zip archival of a study's raw dataset to the archive host.

use std::path::PathBuf;

use autobids_core::naming::{archive_file_name, DatasetType};
use autobids_core::process::CommandRunner;
use autobids_core::types::DbId;
use autobids_db::models::dataset::DataladDataset;
use autobids_db::repositories::DatasetArchiveRepo;

use super::{Pipeline, TaskContext};
use crate::archive::{zip_dataset, ArchiveTarget};
use crate::datalad::ensure_dataset_exists;
use crate::error::PipelineError;

impl<R: CommandRunner> Pipeline<R> {
    pub(super) async fn archive_raw_data(
        &self,
        ctx: &TaskContext<'_>,
        study_id: DbId,
    ) -> Result<(), PipelineError> {
        ctx.set_progress(0).await?;
        let study = self.load_study(study_id).await?;
        if study.custom_ria_url.is_some() || study.dataset_content.is_none() {
            tracing::info!(study_id, "Nothing to archive");
            ctx.set_progress(100).await?;
            return Ok(());
        }
        let target = ArchiveTarget::parse(
            &self.config.archive_base_url,
            self.config.archive_ssh_port,
            &self.config.archive_ssh_key,
        )?;

        let datalad = self.datalad();
        let dataset_raw = ensure_dataset_exists(
            &self.pool,
            &datalad,
            &self.config,
            study_id,
            DatasetType::RawData,
            None,
        )
        .await?;

        let scratch = tempfile::tempdir_in(&self.config.tar2bids_download_dir)?;
        let path = datalad
            .clone_dataset(
                self.config.ria_url(dataset_raw.custom_ria_url.as_deref()),
                &dataset_raw.ria_alias,
                scratch.path(),
            )
            .await?;
        let result = self.archive_clone(&dataset_raw, &target, path.clone()).await;
        datalad.remove_clone(&path).await;
        result?;

        ctx.set_progress(100).await?;
        Ok(())
    }

    async fn archive_clone(
        &self,
        dataset: &DataladDataset,
        target: &ArchiveTarget,
        path: PathBuf,
    ) -> Result<(), PipelineError> {
        let datalad = self.datalad();
        let hexsha = datalad.hexsha(&path).await?;
        let latest = DatasetArchiveRepo::latest_for_dataset(&self.pool, dataset.id).await?;
        if latest.as_ref().is_some_and(|a| a.dataset_hexsha == hexsha) {
            tracing::info!(study_id = dataset.study_id, hexsha = %hexsha, "Archive up to date");
            return Ok(());
        }

        datalad.get(&path, None).await?;
        let commit_datetime = datalad.commit_datetime(&path).await?;
        let archive_name = archive_file_name(
            &dataset.ria_alias,
            &commit_datetime.format("%Y%m%d").to_string(),
            &hexsha,
        );
        let archive_dir = tempfile::tempdir_in(&self.config.tar2bids_download_dir)?;
        let archive_path = archive_dir.path().join(&archive_name);

        let (src, dest) = (path.clone(), archive_path.clone());
        tokio::task::spawn_blocking(move || zip_dataset(&src, &dest))
            .await
            .map_err(|e| PipelineError::Io(std::io::Error::other(e)))??;
        tracing::info!(archive = %archive_path.display(), "Dataset zipped");

        for spec in [
            target.mkdir(&dataset.ria_alias),
            target.upload(&archive_path, &dataset.ria_alias),
            target.prune(&dataset.ria_alias, &archive_name),
        ] {
            let program = spec.program.clone();
            self.runner.run(spec).await?.check(&program)?;
        }

        DatasetArchiveRepo::create(
            &self.pool,
            dataset.id,
            latest.map(|a| a.id),
            &hexsha,
            commit_datetime,
        )
        .await?;
        tracing::info!(study_id = dataset.study_id, archive = %archive_name, "Archive uploaded");
        Ok(())
    }
}
