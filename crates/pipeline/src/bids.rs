//! Merging freshly converted BIDS output into an existing dataset.

use std::path::Path;

use autobids_core::filesystem::DATASET_IGNORE;

/// File whose rows are merged instead of overwritten.
const PARTICIPANTS_TSV: &str = "participants.tsv";

/// Copy every file under `incoming` into `existing`, overwriting files
/// with the same relative path.
///
/// `participants.tsv` is merged: rows keep the existing order, and rows
/// for participants not yet listed are appended. If the headers differ the
/// incoming table replaces the existing one.
pub fn merge_datasets(incoming: &Path, existing: &Path) -> std::io::Result<()> {
    merge_dir(incoming, existing, true)
}

fn merge_dir(src: &Path, dest: &Path, top_level: bool) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let name = entry.file_name();
        if DATASET_IGNORE.iter().any(|ignored| name == *ignored) {
            continue;
        }
        let from = entry.path();
        let to = dest.join(&name);
        if entry.file_type()?.is_dir() {
            merge_dir(&from, &to, false)?;
        } else if top_level && name == PARTICIPANTS_TSV && to.exists() {
            let merged = merge_participants(
                &std::fs::read_to_string(&to)?,
                &std::fs::read_to_string(&from)?,
            );
            replace_file(&to, merged.as_bytes())?;
        } else {
            unlink(&to)?;
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

/// Remove whatever sits at `path` so annexed symlinks are replaced rather
/// than written through.
fn unlink(path: &Path) -> std::io::Result<()> {
    if path.symlink_metadata().is_ok() {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    unlink(path)?;
    std::fs::write(path, contents)
}

fn merge_participants(existing: &str, incoming: &str) -> String {
    let mut existing_lines = existing.lines().filter(|l| !l.trim().is_empty());
    let mut incoming_lines = incoming.lines().filter(|l| !l.trim().is_empty());
    let (Some(existing_header), Some(incoming_header)) =
        (existing_lines.next(), incoming_lines.next())
    else {
        return incoming.to_string();
    };
    if existing_header != incoming_header {
        return incoming.to_string();
    }

    let mut rows: Vec<&str> = existing_lines.collect();
    for row in incoming_lines {
        let id = participant_id(row);
        if !rows.iter().any(|r| participant_id(r) == id) {
            rows.push(row);
        }
    }

    let mut merged = String::from(existing_header);
    merged.push('\n');
    for row in rows {
        merged.push_str(row);
        merged.push('\n');
    }
    merged
}

fn participant_id(row: &str) -> &str {
    row.split('\t').next().unwrap_or(row)
}
