//! Study request validation and reporting (CSV export labels).

use chrono::NaiveDate;
use serde::Deserialize;
use validator::Validate;

use crate::error::CoreError;

/* --------------------------------------------------------------------------
   Constants
   -------------------------------------------------------------------------- */

/// Submitter career stages accepted on the request form.
pub const VALID_STATUSES: &[&str] = &[
    "undergraduate",
    "graduate",
    "staff",
    "post-doc",
    "faculty",
    "other",
];

/// Scanner identifiers: `type1` is the 3T, `type2` the 7T.
pub const VALID_SCANNERS: &[&str] = &["type1", "type2"];

/// Familiarity answers are the strings "1" through "5".
pub const FAMILIARITY_LEVELS: &[&str] = &["1", "2", "3", "4", "5"];

/// Principal choice meaning "use `principal_other` instead".
pub const PRINCIPAL_OTHER: &str = "Other";

pub const DEFAULT_HEURISTIC: &str = "cfmm_base.py";
pub const DEFAULT_PATIENT_STR: &str = "*";
pub const DEFAULT_SUBJ_EXPR: &str = "*_{subject}";

/* --------------------------------------------------------------------------
   Request
   -------------------------------------------------------------------------- */

/// A new study request as submitted by a researcher.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StudyRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    pub status: String,
    pub scanner: String,
    #[validate(range(min = 1, message = "must be at least 1"))]
    pub scan_number: i32,
    /// Longitudinal or multi-session.
    #[serde(default)]
    pub study_type: bool,
    pub familiarity_bids: String,
    pub familiarity_bidsapp: String,
    pub familiarity_python: String,
    pub familiarity_linux: String,
    pub familiarity_bash: String,
    pub familiarity_hpc: String,
    pub familiarity_openneuro: String,
    pub familiarity_cbrain: String,
    pub principal: String,
    pub principal_other: Option<String>,
    #[validate(length(min = 1, message = "project_name is required"))]
    pub project_name: String,
    pub dataset_name: Option<String>,
    pub sample_date: Option<NaiveDate>,
    #[serde(default)]
    pub retrospective_data: bool,
    pub retrospective_start: Option<NaiveDate>,
    /// Left empty when conversion is ongoing.
    pub retrospective_end: Option<NaiveDate>,
    #[serde(default)]
    pub consent: bool,
    pub comment: Option<String>,
}

impl StudyRequest {
    /// Run field validators plus the cross-field rules.
    pub fn check(&self) -> Result<(), CoreError> {
        self.validate()?;
        validate_choice("status", &self.status, VALID_STATUSES)?;
        validate_choice("scanner", &self.scanner, VALID_SCANNERS)?;
        for (field, value) in self.familiarities() {
            validate_choice(field, value, FAMILIARITY_LEVELS)?;
        }
        self.resolved_principal()?;
        if self.retrospective_data {
            validate_retrospective_range(self.retrospective_start, self.retrospective_end)?;
        }
        if !self.consent {
            return Err(CoreError::Validation("consent is required".into()));
        }
        Ok(())
    }

    fn familiarities(&self) -> [(&'static str, &str); 8] {
        [
            ("familiarity_bids", &self.familiarity_bids),
            ("familiarity_bidsapp", &self.familiarity_bidsapp),
            ("familiarity_python", &self.familiarity_python),
            ("familiarity_linux", &self.familiarity_linux),
            ("familiarity_bash", &self.familiarity_bash),
            ("familiarity_hpc", &self.familiarity_hpc),
            ("familiarity_openneuro", &self.familiarity_openneuro),
            ("familiarity_cbrain", &self.familiarity_cbrain),
        ]
    }

    /// The PI identifier, taking `principal_other` when "Other" was picked.
    pub fn resolved_principal(&self) -> Result<String, CoreError> {
        let principal = if self.principal == PRINCIPAL_OTHER {
            self.principal_other.as_deref().unwrap_or("").trim()
        } else {
            self.principal.trim()
        };
        if principal.is_empty() {
            return Err(CoreError::Validation(
                "principal (or principal_other) is required".into(),
            ));
        }
        Ok(principal.to_string())
    }

    /// Empty dataset names fall back to the project name.
    pub fn resolved_dataset_name(&self) -> String {
        match self.dataset_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.project_name.clone(),
        }
    }

    /// Retrospective dates are only kept when retrospective data was declared.
    pub fn retrospective_range(&self) -> (Option<NaiveDate>, Option<NaiveDate>) {
        if self.retrospective_data {
            (self.retrospective_start, self.retrospective_end)
        } else {
            (None, None)
        }
    }
}

/* --------------------------------------------------------------------------
   Validation functions
   -------------------------------------------------------------------------- */

pub fn validate_choice(field: &str, value: &str, allowed: &[&str]) -> Result<(), CoreError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Invalid {field} '{value}'. Must be one of: {}",
            allowed.join(", ")
        )))
    }
}

pub fn validate_retrospective_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), CoreError> {
    let Some(start) = start else {
        return Err(CoreError::Validation(
            "retrospective_start is required for retrospective data".into(),
        ));
    };
    if let Some(end) = end {
        if end < start {
            return Err(CoreError::Validation(
                "retrospective_end must not be before retrospective_start".into(),
            ));
        }
    }
    Ok(())
}

/// Check that a patient-name filter compiles before storing it.
pub fn validate_patient_name_re(pattern: &str) -> Result<(), CoreError> {
    regex::Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| CoreError::Validation(format!("Invalid patient_name_re: {e}")))
}

/// Full-string match of a PatientName against an optional filter.
pub fn patient_name_matches(pattern: Option<&str>, patient_name: &str) -> bool {
    let Some(pattern) = pattern else {
        return true;
    };
    match regex::Regex::new(&format!("^(?:{pattern})$")) {
        Ok(re) => re.is_match(patient_name),
        Err(_) => false,
    }
}

/* --------------------------------------------------------------------------
   Report labels
   -------------------------------------------------------------------------- */

pub const REPORT_HEADER: [&str; 23] = [
    "Submitter Name",
    "Submitter Email",
    "Status",
    "Scanner",
    "Number of Scans",
    "Study Type",
    "Bids Familiarity",
    "Bids App Familiarity",
    "Python Familiarity",
    "Linux Familiarity",
    "Bash Familiarity",
    "HPC Familiarity",
    "OPENNEURO Familiarity",
    "CBRAIN Familiarity",
    "Principal",
    "Project Name",
    "Dataset Name",
    "Sample Date",
    "Retrospective Data",
    "Retrospective Data Start Date",
    "Retrospective Data End Date",
    "Consent",
    "Comment",
];

pub fn scanner_label(scanner: &str) -> &'static str {
    if scanner == "type1" {
        "3T"
    } else {
        "7T"
    }
}

pub fn familiarity_label(level: &str) -> &'static str {
    match level {
        "1" => "Not familiar at all",
        "2" => "Have heard of it",
        "3" => "Have used it before",
        "4" => "Used it regularly",
        "5" => "I consider myself an expert",
        _ => "",
    }
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}

/// Upper-case the first character, e.g. `post-doc` → `Post-doc`.
pub fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Submitter answers of one study, borrowed for the CSV report.
#[derive(Debug, Clone)]
pub struct ReportRow<'a> {
    pub submitter_name: &'a str,
    pub submitter_email: &'a str,
    pub status: &'a str,
    pub scanner: &'a str,
    pub scan_number: i32,
    pub study_type: bool,
    /// bids, bidsapp, python, linux, bash, hpc, openneuro, cbrain.
    pub familiarity: [&'a str; 8],
    pub principal: &'a str,
    pub project_name: &'a str,
    pub dataset_name: &'a str,
    pub sample_date: Option<NaiveDate>,
    pub retrospective_data: bool,
    pub retrospective_start: Option<NaiveDate>,
    pub retrospective_end: Option<NaiveDate>,
    pub consent: bool,
    pub comment: &'a str,
}

impl ReportRow<'_> {
    pub fn to_record(&self) -> Vec<String> {
        let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        let mut record = vec![
            self.submitter_name.to_string(),
            self.submitter_email.to_string(),
            capitalize(self.status),
            scanner_label(self.scanner).to_string(),
            self.scan_number.to_string(),
            yes_no(self.study_type).to_string(),
        ];
        record.extend(self.familiarity.iter().map(|f| familiarity_label(f).to_string()));
        record.extend([
            self.principal.to_string(),
            self.project_name.to_string(),
            self.dataset_name.to_string(),
            date(self.sample_date),
            yes_no(self.retrospective_data).to_string(),
            date(self.retrospective_start),
            date(self.retrospective_end),
            yes_no(self.consent).to_string(),
            self.comment.to_string(),
        ]);
        record
    }
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render the report header followed by one line per row (CRLF line ends).
pub fn render_report_csv(rows: &[ReportRow<'_>]) -> String {
    let mut out = String::new();
    let mut push_record = |fields: &[String]| {
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push_str("\r\n");
    };
    let header: Vec<String> = REPORT_HEADER.iter().map(|h| h.to_string()).collect();
    push_record(&header);
    for row in rows {
        push_record(&row.to_record());
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
