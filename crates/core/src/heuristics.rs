//! Heuristic and tar2bids image choices offered in study configuration.

use std::path::Path;

use serde::Serialize;

/// Heuristics bundled inside the tar2bids container image.
pub const DEFAULT_HEURISTICS: [&str; 12] = [
    "cfmm_baron.py",
    "cfmm_base.py",
    "cfmm_bold_rest.py",
    "cfmm_bruker.py",
    "cfmm_PS_PRC_3T.py",
    "clinicalDBS.py",
    "cmrr_ANNA_OBJCAT_MTL_3T.py",
    "EPL14A_GE_3T.py",
    "EPL14B_3T.py",
    "GEvSE.py",
    "Kohler_HcECT.py",
    "Menon_CogMS.py",
];

/// A selectable option: the stored value and its display label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

fn file_names(dir: &Path) -> Vec<(String, String)> {
    // A missing directory just means nothing has been deployed there yet.
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .map(|entry| {
            (
                entry.path().to_string_lossy().into_owned(),
                entry.file_name().to_string_lossy().into_owned(),
            )
        })
        .collect()
}

fn sort_by_label(choices: &mut [Choice]) {
    choices.sort_by_key(|c| c.label.to_lowercase());
}

/// Container heuristics plus every file in the cloned heuristic directory.
///
/// Git heuristics are stored by full path so tar2bids can find them through
/// the bind mount.
pub fn available_heuristics(git_heuristic_dir: &Path) -> Vec<Choice> {
    let mut choices: Vec<Choice> = file_names(git_heuristic_dir)
        .into_iter()
        .map(|(path, name)| Choice {
            value: path,
            label: format!("{name} (git)"),
        })
        .chain(DEFAULT_HEURISTICS.iter().map(|h| Choice {
            value: h.to_string(),
            label: format!("{h} (container)"),
        }))
        .collect();
    sort_by_label(&mut choices);
    choices
}

/// Every tar2bids image file in `image_dir`.
pub fn available_tar2bids_images(image_dir: &Path) -> Vec<Choice> {
    let mut choices: Vec<Choice> = file_names(image_dir)
        .into_iter()
        .map(|(_, name)| Choice {
            value: name.clone(),
            label: name,
        })
        .collect();
    sort_by_label(&mut choices);
    choices
}
