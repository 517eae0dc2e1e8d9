//! Subject and body builders for portal emails.

/// A plain-text email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
}

/// Sent to administrators when a study request is submitted.
pub fn new_study_submitted(submitter_name: &str, submitter_email: &str) -> EmailMessage {
    EmailMessage {
        subject: format!("A new request has been submitted by {submitter_name} {submitter_email}"),
        body: "A new request has been submitted. Please login to see the submitter's response"
            .to_string(),
    }
}

/// Sent when a user launches a cfmm2tar check for a study.
pub fn cfmm2tar_submitted(description: &str, user_email: &str) -> EmailMessage {
    EmailMessage {
        subject: format!("A Cfmm2tar run for {description} has been submitted by {user_email}."),
        body: format!("A Cfmm2tar run for {description} has been submitted."),
    }
}

/// Sent when a user launches tar2bids for a study.
pub fn tar2bids_submitted(description: &str, user_email: &str) -> EmailMessage {
    EmailMessage {
        subject: format!("A Tar2bids run for {description} has been submitted by {user_email}"),
        body: format!("A Tar2bids run for {description} has been submitted."),
    }
}

/// Summary of a cfmm2tar run: the targets attempted and any errors.
pub fn cfmm2tar_results(study_id: i64, patient_names: &[String], errors: &[String]) -> EmailMessage {
    let mut lines = vec![format!(
        "Attempted to download the following tar files for study {study_id}:"
    )];
    lines.extend(patient_names.iter().map(|name| format!("PatientName: {name}")));
    lines.push("\nErrors:\n".to_string());
    lines.extend(errors.iter().cloned());
    EmailMessage {
        subject: "New cfmm2tar run".to_string(),
        body: lines.join("\n"),
    }
}

/// Sent after tar2bids converted every requested tar file.
pub fn tar2bids_succeeded(tar_files: &[String]) -> EmailMessage {
    let mut lines = vec!["Tar2bids successfully run for tar files:".to_string()];
    lines.extend(tar_files.iter().cloned());
    EmailMessage {
        subject: "Successful tar2bids run.".to_string(),
        body: lines.join("\n"),
    }
}

/// Sent when any tar2bids run in a batch fails.
pub fn tar2bids_failed(tar_files: &[String], error: &str) -> EmailMessage {
    let mut lines = vec!["Tar2bids failed for tar files:".to_string()];
    lines.extend(tar_files.iter().cloned());
    lines.push(
        "Note: Some of the tar2bids runs may have completed. \
         This email is sent if any of them fail."
            .to_string(),
    );
    lines.push("Error:".to_string());
    lines.push(error.to_string());
    EmailMessage {
        subject: "Failed tar2bids run".to_string(),
        body: lines.join("\n"),
    }
}
