//! DICOM record lookup for a study.
//!
//! A study's records are the DICOM studies it explicitly includes by
//! StudyInstanceUID plus whatever its search parameters match, minus the
//! ones it explicitly excludes.

use std::collections::{BTreeSet, HashSet};

use autobids_core::dicom::{
    organize_flat_responses, rearrange_response, Dcm4cheError, DicomQueryAttributes, PatientInfo,
    StudyMetadata, ATTRIBUTES_QUERIED,
};
use autobids_core::process::CommandRunner;
use autobids_core::study::patient_name_matches;
use autobids_db::models::explicit_patient::ExplicitPatient;
use autobids_db::models::study::Study;
use chrono::NaiveDate;

use crate::dcm4che::{Dcm4cheClient, SERIES_LEVEL};

/// Records for explicitly included StudyInstanceUIDs.
pub async fn get_inclusion_records<R: CommandRunner>(
    client: &Dcm4cheClient<'_, R>,
    uids_included: &[String],
) -> Result<Vec<StudyMetadata>, Dcm4cheError> {
    if uids_included.is_empty() {
        return Ok(Vec::new());
    }
    let responses = rearrange_response(
        client
            .query_single_study(
                &ATTRIBUTES_QUERIED,
                &DicomQueryAttributes::by_uids(uids_included.to_vec()),
                SERIES_LEVEL,
            )
            .await?,
    );
    let patient_info = responses
        .iter()
        .map(PatientInfo::from_response)
        .collect::<Result<BTreeSet<_>, _>>()?;
    organize_flat_responses(&responses, patient_info)
}

/// Records matched by the study's search parameters.
///
/// Without an explicit `date`, retrospective studies search their
/// retrospective date range.
pub async fn get_description_records<R: CommandRunner>(
    client: &Dcm4cheClient<'_, R>,
    study: &Study,
    uids_excluded: &HashSet<String>,
    date: Option<NaiveDate>,
    description: Option<&str>,
) -> Result<Vec<StudyMetadata>, Dcm4cheError> {
    let (start, end) = if date.is_none() && study.retrospective_data {
        (study.retrospective_start, study.retrospective_end)
    } else {
        (None, None)
    };
    let attributes = DicomQueryAttributes {
        study_description: description.map(str::to_string),
        study_date: date,
        patient_name: Some(study.patient_str.clone()),
        study_instance_uids: Vec::new(),
        date_range_start: start,
        date_range_end: end,
    };
    let responses = rearrange_response(
        client
            .query_single_study(&ATTRIBUTES_QUERIED, &attributes, SERIES_LEVEL)
            .await?,
    );

    let mut patient_info = BTreeSet::new();
    for response in &responses {
        let info = PatientInfo::from_response(response)?;
        if patient_name_matches(study.patient_name_re.as_deref(), &info.patient_name)
            && !uids_excluded.contains(&info.study_uid)
        {
            patient_info.insert(info);
        }
    }
    organize_flat_responses(&responses, patient_info)
}

/// Inclusion records followed by search records not already included.
pub async fn get_study_records<R: CommandRunner>(
    client: &Dcm4cheClient<'_, R>,
    study: &Study,
    explicit_patients: &[ExplicitPatient],
    date: Option<NaiveDate>,
    description: Option<&str>,
) -> Result<Vec<StudyMetadata>, Dcm4cheError> {
    let uids_included: Vec<String> = explicit_patients
        .iter()
        .filter(|p| p.included)
        .map(|p| p.study_instance_uid.clone())
        .collect();
    let uids_excluded: HashSet<String> = explicit_patients
        .iter()
        .filter(|p| !p.included)
        .map(|p| p.study_instance_uid.clone())
        .collect();

    let mut records = get_inclusion_records(client, &uids_included).await?;
    let found = get_description_records(client, study, &uids_excluded, date, description).await?;
    records.extend(
        found
            .into_iter()
            .filter(|record| !uids_included.contains(&record.study_uid)),
    );
    Ok(records)
}
