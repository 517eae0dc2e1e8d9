//! DICOM query modelling for `findscu` (dcm4che).
//!
//! Queries are issued with `-J`, which makes findscu write one DICOM JSON
//! model document per matched record. This module builds the argument
//! vectors, parses those documents back into flat attribute lists, and
//! groups series-level responses into per-study metadata.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::process::CommandError;

/// Tags requested for every study lookup.
pub const ATTRIBUTES_QUERIED: [&str; 7] = [
    "0020000D", // StudyInstanceUID
    "00100010", // PatientName
    "0008103E", // SeriesDescription
    "00200011", // SeriesNumber
    "00200010", // StudyID
    "00100020", // PatientID
    "00100040", // PatientSex
];

/// Tag/keyword pairs this portal needs to resolve. The JSON model carries
/// tags only, so keywords are looked up here.
const KNOWN_TAGS: [(&str, &str); 9] = [
    ("0020000D", "StudyInstanceUID"),
    ("00100010", "PatientName"),
    ("0008103E", "SeriesDescription"),
    ("00200011", "SeriesNumber"),
    ("00200010", "StudyID"),
    ("00100020", "PatientID"),
    ("00100040", "PatientSex"),
    ("00081030", "StudyDescription"),
    ("00080020", "StudyDate"),
];

/// StudyDescriptions look like `[Khan^NeuroAnalytics]`.
static PI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*\[([\w ]+)\^[\w ]+\].*").expect("valid regex"));

/// Stderr noise emitted by every JVM started in the tool containers.
pub const JAVA_OPTIONS_NOISE: &str = "Picked up _JAVA_OPTIONS: -Xmx2048m\n";

#[derive(Debug, thiserror::Error)]
pub enum Dcm4cheError {
    #[error("Invalid DICOM query: {0}")]
    InvalidQuery(String),

    #[error("Missing expected output field {0} in findscu output")]
    MissingField(String),

    #[error("Malformed findscu output: {0}")]
    Malformed(String),

    #[error("No PIs accessible.")]
    NoPis,

    #[error("Non-zero exit status from findscu.")]
    Failed,

    #[error(transparent)]
    Command(#[from] CommandError),
}

// ---------------------------------------------------------------------------
// Query attributes
// ---------------------------------------------------------------------------

/// Matching keys for a C-FIND request. At least one must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DicomQueryAttributes {
    /// `PI^Project` StudyDescription to match.
    pub study_description: Option<String>,
    pub study_date: Option<NaiveDate>,
    pub patient_name: Option<String>,
    pub study_instance_uids: Vec<String>,
    /// Inclusive start of a StudyDate range.
    pub date_range_start: Option<NaiveDate>,
    /// Inclusive end of a StudyDate range.
    pub date_range_end: Option<NaiveDate>,
}

impl DicomQueryAttributes {
    pub fn by_uids(uids: Vec<String>) -> Self {
        Self {
            study_instance_uids: uids,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), Dcm4cheError> {
        if self.study_description.is_none()
            && self.study_date.is_none()
            && self.patient_name.is_none()
            && self.study_instance_uids.is_empty()
            && self.date_range_start.is_none()
            && self.date_range_end.is_none()
        {
            return Err(Dcm4cheError::InvalidQuery(
                "You must specify at least one of study_description, study_date, or patient_name"
                    .into(),
            ));
        }
        if self.study_date.is_some()
            && (self.date_range_start.is_some() || self.date_range_end.is_some())
        {
            return Err(Dcm4cheError::InvalidQuery(
                "You may not define both study_date and either of date_range_start or \
                 date_range_end. Choose only one way to filter StudyDate."
                    .into(),
            ));
        }
        Ok(())
    }

    /// `-m Key=Value` matching arguments for findscu.
    pub fn matching_args(&self, uid_wildcard: bool) -> Vec<String> {
        let mut args = Vec::new();
        let mut push = |key: &str, value: String| {
            args.push("-m".to_string());
            args.push(format!("{key}={value}"));
        };

        if let Some(description) = &self.study_description {
            push("StudyDescription", description.clone());
        }
        if let Some(date) = self.study_date {
            push("StudyDate", date.format("%Y%m%d").to_string());
        } else if self.date_range_start.is_some() || self.date_range_end.is_some() {
            let fmt = |d: Option<NaiveDate>| {
                d.map(|d| d.format("%Y%m%d").to_string()).unwrap_or_default()
            };
            push(
                "StudyDate",
                format!("{}-{}", fmt(self.date_range_start), fmt(self.date_range_end)),
            );
        }
        if let Some(name) = &self.patient_name {
            push("PatientName", name.clone());
        }
        if !self.study_instance_uids.is_empty() {
            push("StudyInstanceUID", self.study_instance_uids.join("\\\\"));
        } else if uid_wildcard {
            push("StudyInstanceUID", "*".to_string());
        }
        args
    }
}

// ---------------------------------------------------------------------------
// findscu invocation
// ---------------------------------------------------------------------------

/// Connection and credentials for the DICOM server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindscuConnection {
    /// `AET@host:port` string passed to `--connect`.
    pub connect: String,
    pub username: String,
    pub password: String,
    pub use_tls: bool,
}

impl FindscuConnection {
    pub fn base_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "findscu".into(),
            "--bind".into(),
            "DEFAULT".into(),
            "--connect".into(),
            self.connect.clone(),
            "--accept-timeout".into(),
            "10000".into(),
            "--user".into(),
            self.username.clone(),
            "--user-pass".into(),
            self.password.clone(),
        ];
        if self.use_tls {
            args.push("--tls-aes".into());
        }
        args
    }

    /// Arguments listing every StudyDescription visible to the account.
    pub fn pi_query_args(&self) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(["-r".to_string(), "StudyDescription".to_string()]);
        args
    }

    /// Arguments for a query writing one JSON document per match to `out_dir`.
    pub fn study_query_args(
        &self,
        output_fields: &[&str],
        attributes: &DicomQueryAttributes,
        retrieve_level: &str,
        uid_wildcard: bool,
        out_dir: &str,
    ) -> Vec<String> {
        let mut args = self.base_args();
        args.extend(attributes.matching_args(uid_wildcard));
        for field in output_fields {
            args.push("-r".into());
            args.push((*field).to_string());
        }
        args.extend([
            "-L".to_string(),
            retrieve_level.to_string(),
            "--out-dir".to_string(),
            out_dir.to_string(),
            "--out-file".to_string(),
            "000.json".to_string(),
            "-J".to_string(),
        ]);
        args
    }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// One attribute of a findscu match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DicomAttribute {
    /// `XXXX,XXXX`
    pub tag_code: String,
    pub tag_name: String,
    pub tag_value: String,
}

/// The leading 8-hex-digit tag of `field`, if it starts with one.
fn hex_tag(field: &str) -> Option<&str> {
    field
        .get(..8)
        .filter(|tag| tag.chars().all(|c| c.is_ascii_hexdigit()))
}

fn resolve_field(field: &str) -> Result<(String, &'static str), Dcm4cheError> {
    if let Some(tag) = hex_tag(field) {
        let tag = tag.to_ascii_uppercase();
        KNOWN_TAGS
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(t, k)| (t.to_string(), *k))
            .ok_or(Dcm4cheError::MissingField(tag))
    } else {
        KNOWN_TAGS
            .iter()
            .find(|(_, k)| *k == field)
            .map(|(t, k)| (t.to_string(), *k))
            .ok_or_else(|| Dcm4cheError::MissingField(field.to_string()))
    }
}

/// Pull the requested fields out of one DICOM JSON model document.
///
/// Person names yield their first non-empty component group (normally
/// `Alphabetic`). Attributes present without a `Value` yield `""`.
pub fn parse_findscu_json(
    document: &Value,
    output_fields: &[&str],
) -> Result<Vec<DicomAttribute>, Dcm4cheError> {
    let object = document
        .as_object()
        .ok_or_else(|| Dcm4cheError::Malformed("document is not a JSON object".into()))?;

    output_fields
        .iter()
        .map(|field| {
            let (tag, keyword) = resolve_field(field)?;
            let attribute = object
                .get(&tag)
                .ok_or_else(|| Dcm4cheError::MissingField(field.to_string()))?;
            let vr = attribute.get("vr").and_then(Value::as_str).unwrap_or("");
            let first = attribute
                .get("Value")
                .and_then(Value::as_array)
                .and_then(|values| values.first());

            let value = if vr == "PN" {
                let name = first.ok_or_else(|| {
                    Dcm4cheError::Malformed(format!("Found PN attribute with no text: {tag}"))
                })?;
                ["Alphabetic", "Ideographic", "Phonetic"]
                    .iter()
                    .find_map(|group| name.get(*group).and_then(Value::as_str))
                    .map(str::to_string)
                    .ok_or_else(|| {
                        Dcm4cheError::Malformed(format!("Found PN attribute with no text: {tag}"))
                    })?
            } else {
                match first {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                }
            };

            Ok(DicomAttribute {
                tag_code: format!("{},{}", &tag[0..4], &tag[4..8]),
                tag_name: keyword.to_string(),
                tag_value: value,
            })
        })
        .collect()
}

/// Flatten each response into a keyword → value map.
pub fn rearrange_response(responses: Vec<Vec<DicomAttribute>>) -> Vec<HashMap<String, String>> {
    responses
        .into_iter()
        .map(|attributes| {
            attributes
                .into_iter()
                .map(|a| (a.tag_name, a.tag_value))
                .collect()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Study grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesMetadata {
    pub number: i32,
    pub description: String,
}

/// A scan session and its series, as shown to users before download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudyMetadata {
    pub patient_name: String,
    pub patient_id: String,
    pub patient_sex: String,
    pub study_id: String,
    pub study_uid: String,
    pub series: Vec<SeriesMetadata>,
}

/// Patient-level identity of one StudyInstanceUID.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatientInfo {
    pub patient_id: String,
    pub patient_name: String,
    pub patient_sex: String,
    pub study_id: String,
    pub study_uid: String,
}

fn field<'a>(response: &'a HashMap<String, String>, key: &str) -> Result<&'a str, Dcm4cheError> {
    response
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| Dcm4cheError::MissingField(key.to_string()))
}

impl PatientInfo {
    pub fn from_response(response: &HashMap<String, String>) -> Result<Self, Dcm4cheError> {
        Ok(Self {
            patient_id: field(response, "PatientID")?.to_string(),
            patient_name: field(response, "PatientName")?.to_string(),
            patient_sex: field(response, "PatientSex")?.to_string(),
            study_id: field(response, "StudyID")?.to_string(),
            study_uid: field(response, "StudyInstanceUID")?.to_string(),
        })
    }
}

/// Group series-level responses under the studies in `patient_info`.
pub fn organize_flat_responses(
    responses: &[HashMap<String, String>],
    patient_info: BTreeSet<PatientInfo>,
) -> Result<Vec<StudyMetadata>, Dcm4cheError> {
    patient_info
        .into_iter()
        .map(|info| {
            let mut series = Vec::new();
            for response in responses {
                if field(response, "StudyInstanceUID")? != info.study_uid {
                    continue;
                }
                let raw_number = field(response, "SeriesNumber")?;
                let number = raw_number.trim().parse::<i32>().map_err(|_| {
                    Dcm4cheError::Malformed(format!("invalid SeriesNumber {raw_number:?}"))
                })?;
                series.push(SeriesMetadata {
                    number,
                    description: field(response, "SeriesDescription")?.to_string(),
                });
            }
            series.sort_by_key(|s| s.number);
            Ok(StudyMetadata {
                patient_name: info.patient_name,
                patient_id: info.patient_id,
                patient_sex: info.patient_sex,
                study_id: info.study_id,
                study_uid: info.study_uid,
                series,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// PI discovery
// ---------------------------------------------------------------------------

/// Extract PI names from `findscu -r StudyDescription` output.
///
/// Returns the sorted, de-duplicated PI names minus `blacklist`.
pub fn extract_pi_names(stdout: &str, blacklist: &[String]) -> Result<Vec<String>, Dcm4cheError> {
    let pis: BTreeSet<String> = stdout
        .lines()
        .filter(|line| line.contains("StudyDescription"))
        .filter_map(|line| PI_RE.captures(line))
        .map(|caps| caps[1].to_string())
        .filter(|pi| !blacklist.contains(pi))
        .collect();

    if pis.is_empty() {
        return Err(Dcm4cheError::NoPis);
    }
    Ok(pis.into_iter().collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
