//! Retrieval of DICOM studies into the study's source dataset.

use std::collections::HashSet;
use std::path::Path;

use autobids_core::cfmm2tar::{parse_tar_file_date, Cfmm2tarArgs, RetrievedStudy};
use autobids_core::naming::DatasetType;
use autobids_core::process::CommandRunner;
use autobids_core::types::DbId;
use autobids_db::models::dataset::DataladDataset;
use autobids_db::models::output::{Cfmm2tarOutput, NewCfmm2tarOutput};
use autobids_db::models::study::Study;
use autobids_db::repositories::{
    Cfmm2tarOutputRepo, DataladDatasetRepo, ExplicitPatientRepo, PrincipalRepo, StudyRepo,
};
use autobids_events::messages;

use super::{file_name, launch_task, DownloadTarget, Pipeline, TaskContext, TaskPayload};
use crate::datalad::ensure_dataset_exists;
use crate::error::PipelineError;
use crate::records::get_study_records;

impl<R: CommandRunner> Pipeline<R> {
    pub(super) async fn load_study(&self, study_id: DbId) -> Result<Study, PipelineError> {
        StudyRepo::find_by_id(&self.pool, study_id)
            .await?
            .ok_or(PipelineError::NotFound {
                entity: "Study",
                id: study_id,
            })
    }

    /// DICOM studies of a study that have no tar file yet.
    pub async fn find_studies_to_download(
        &self,
        study: &Study,
        explicit_scans: Option<Vec<DownloadTarget>>,
    ) -> Result<Vec<DownloadTarget>, PipelineError> {
        let existing: HashSet<String> = Cfmm2tarOutputRepo::uids_for_study(&self.pool, study.id)
            .await?
            .into_iter()
            .map(|uid| uid.trim().to_string())
            .collect();

        let candidates = match explicit_scans {
            Some(scans) => scans,
            None => {
                let explicit = ExplicitPatientRepo::list_for_study(&self.pool, study.id, None).await?;
                let description = study.description();
                get_study_records(&self.dcm4che(), study, &explicit, None, Some(&description))
                    .await?
                    .into_iter()
                    .map(|record| DownloadTarget {
                        study_instance_uid: record.study_uid,
                        patient_name: record.patient_name,
                    })
                    .collect()
            }
        };
        Ok(candidates
            .into_iter()
            .filter(|target| !existing.contains(target.study_instance_uid.trim()))
            .collect())
    }

    pub(super) async fn check_tar_files(
        &self,
        ctx: &TaskContext<'_>,
        study_id: DbId,
        explicit_scans: Option<Vec<DownloadTarget>>,
    ) -> Result<(), PipelineError> {
        let study = self.load_study(study_id).await?;
        let targets = self.find_studies_to_download(&study, explicit_scans).await?;

        if targets.is_empty() {
            tracing::info!(study_id, "No new DICOM studies to retrieve");
        } else {
            let names: Vec<&str> = targets.iter().map(|t| t.patient_name.as_str()).collect();
            let description = format!("Get tar files {} in study {study_id}", names.join(", "));
            launch_task(
                &self.pool,
                &TaskPayload::RunCfmm2tar { study_id, targets },
                &description,
                ctx.user_id,
            )
            .await?;
        }
        ctx.set_progress(100).await?;
        Ok(())
    }

    pub(super) async fn run_cfmm2tar(
        &self,
        ctx: &TaskContext<'_>,
        study_id: DbId,
        targets: &[DownloadTarget],
    ) -> Result<(), PipelineError> {
        ctx.set_progress(0).await?;
        let study = self.load_study(study_id).await?;
        let patient_names: Vec<String> = targets.iter().map(|t| t.patient_name.clone()).collect();
        tracing::info!(study_id, patients = ?patient_names, "Running cfmm2tar");

        let datalad = self.datalad();
        let dataset = ensure_dataset_exists(
            &self.pool,
            &datalad,
            &self.config,
            study.id,
            DatasetType::SourceData,
            study.custom_ria_url.as_deref(),
        )
        .await?;

        let mut errors = Vec::new();
        for (done, target) in targets.iter().enumerate() {
            let scratch = tempfile::tempdir_in(&self.config.cfmm2tar_download_dir)?;
            let path = datalad
                .clone_dataset(
                    self.config.ria_url(dataset.custom_ria_url.as_deref()),
                    &dataset.ria_alias,
                    scratch.path(),
                )
                .await?;
            let result = self
                .retrieve_target(ctx, &study, &dataset, &path, target, &mut errors)
                .await;
            datalad.remove_clone(&path).await;
            result?;

            let percent = ((done + 1) * 100 / targets.len()).min(99);
            ctx.set_progress(percent as i16).await?;
        }

        if !targets.is_empty() {
            self.notify(messages::cfmm2tar_results(study.id, &patient_names, &errors))
                .await;
        }
        if errors.is_empty() {
            ctx.set_progress(100).await?;
        } else {
            ctx.set_error(&errors.join("\n")).await?;
        }
        Ok(())
    }

    /// Remove a tar file from the study's source dataset and delete its
    /// record.
    pub async fn delete_tar_file(&self, output: &Cfmm2tarOutput) -> Result<(), PipelineError> {
        match DataladDatasetRepo::find(&self.pool, output.study_id, DatasetType::SourceData).await? {
            Some(dataset) => {
                let datalad = self.datalad();
                let scratch = tempfile::tempdir_in(&self.config.cfmm2tar_download_dir)?;
                let path = datalad
                    .clone_dataset(
                        self.config.ria_url(dataset.custom_ria_url.as_deref()),
                        &dataset.ria_alias,
                        scratch.path(),
                    )
                    .await?;
                let result = datalad
                    .remove_file(&path, &output.tar_file, &format!("Remove {}", output.tar_file))
                    .await;
                datalad.remove_clone(&path).await;
                result?;
            }
            None => tracing::warn!(
                study_id = output.study_id,
                tar_file = %output.tar_file,
                "No source dataset, deleting record only",
            ),
        }
        Cfmm2tarOutputRepo::delete(&self.pool, output.id).await?;
        tracing::info!(study_id = output.study_id, tar_file = %output.tar_file, "Deleted tar file");
        Ok(())
    }

    /// Replace the stored PI names with those found on the DICOM server.
    pub async fn refresh_principals(&self) -> Result<Vec<String>, PipelineError> {
        let names = self.dcm4che().get_all_pi_names().await?;
        PrincipalRepo::replace_all(&self.pool, &names).await?;
        tracing::info!(count = names.len(), "Updated principal names");
        Ok(names)
    }

    /// Retrieve one target into the cloned source dataset at `path`.
    ///
    /// cfmm2tar and file name problems are collected in `errors`; dataset
    /// and database failures abort the task.
    async fn retrieve_target(
        &self,
        ctx: &TaskContext<'_>,
        study: &Study,
        dataset: &DataladDataset,
        path: &Path,
        target: &DownloadTarget,
        errors: &mut Vec<String>,
    ) -> Result<(), PipelineError> {
        let args = cfmm2tar_args(study, path, target);
        let (retrieved, log) = match self.dcm4che().run_cfmm2tar_with_retries(&args).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(study_id = study.id, patient_name = %target.patient_name, error = %e, "cfmm2tar failed");
                errors.push(e.to_string());
                return Ok(());
            }
        };
        ctx.append_log(&log).await?;
        tracing::info!(
            study_id = study.id,
            patient_name = %target.patient_name,
            retrieved = retrieved.len(),
            "cfmm2tar finished",
        );

        if retrieved.is_empty() {
            errors.push(format!(
                "No cfmm2tar results parsed for target {}. Check the stderr for more information.",
                target.patient_name
            ));
            return Ok(());
        }

        let mut outputs = Vec::with_capacity(retrieved.len());
        for study_file in &retrieved {
            let uid = take_uid(study_file)?.unwrap_or_else(|| target.study_instance_uid.clone());
            outputs.push((file_name(&study_file.tar_file), uid));
        }

        self.datalad().finalize(path, "Add new tar file.").await?;

        for (tar_file, uid) in outputs {
            let Some(scan_date) = parse_tar_file_date(&tar_file) else {
                errors.push(format!("Output {tar_file} could not be parsed."));
                continue;
            };
            Cfmm2tarOutputRepo::create(
                &self.pool,
                &NewCfmm2tarOutput {
                    study_id: study.id,
                    tar_file,
                    uid: uid.trim().to_string(),
                    scan_date,
                },
                dataset.id,
            )
            .await?;
        }
        Ok(())
    }
}

/// cfmm2tar arguments for one target.
///
/// A known StudyInstanceUID is searched directly. Otherwise the search is
/// by PatientName within the study's `PI^Project` description.
fn cfmm2tar_args(study: &Study, out_dir: &Path, target: &DownloadTarget) -> Cfmm2tarArgs {
    let uid = target.study_instance_uid.trim();
    Cfmm2tarArgs {
        out_dir: out_dir.to_string_lossy().into_owned(),
        study_instance_uid: (!uid.is_empty()).then(|| uid.to_string()),
        date_str: None,
        patient_name: Some(target.patient_name.clone()),
        project: uid.is_empty().then(|| study.description()),
    }
}

/// Read and delete the uid file written beside a tar file.
fn take_uid(study_file: &RetrievedStudy) -> Result<Option<String>, PipelineError> {
    let Some(uid_file) = &study_file.uid_file else {
        return Ok(None);
    };
    let uid = std::fs::read_to_string(uid_file)?;
    std::fs::remove_file(uid_file)?;
    Ok(Some(uid.trim().to_string()))
}
