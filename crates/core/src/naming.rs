//! Naming conventions for DataLad datasets in the RIA store.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Kind of dataset a study owns in the RIA store.
///
/// Discriminants match `datalad_datasets.dataset_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum DatasetType {
    SourceData = 1,
    RawData = 2,
    DerivedData = 3,
}

impl DatasetType {
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::SourceData),
            2 => Some(Self::RawData),
            3 => Some(Self::DerivedData),
            _ => None,
        }
    }

    /// Suffix used in the RIA alias.
    pub fn alias_suffix(self) -> &'static str {
        match self {
            Self::SourceData => "sourcedata",
            Self::RawData => "rawdata",
            Self::DerivedData => "deriveddata",
        }
    }
}

/// RIA alias for a study's dataset, e.g. `study-12_rawdata`.
pub fn ria_alias(study_id: DbId, dataset_type: DatasetType) -> String {
    format!("study-{study_id}_{}", dataset_type.alias_suffix())
}

/// Clone source for an aliased dataset: `<ria_url>#~<alias>`.
pub fn ria_clone_url(ria_url: &str, alias: &str) -> String {
    format!("{ria_url}#~{alias}")
}

/// Remote file name of an archived dataset snapshot.
pub fn archive_file_name(alias: &str, commit_date: &str, hexsha: &str) -> String {
    let short = &hexsha[..hexsha.len().min(7)];
    format!("{alias}_{commit_date}_{short}.zip")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_per_dataset_type() {
        assert_eq!(ria_alias(3, DatasetType::SourceData), "study-3_sourcedata");
        assert_eq!(ria_alias(3, DatasetType::RawData), "study-3_rawdata");
        assert_eq!(ria_alias(41, DatasetType::DerivedData), "study-41_deriveddata");
    }

    #[test]
    fn dataset_type_id_roundtrip() {
        for ty in [
            DatasetType::SourceData,
            DatasetType::RawData,
            DatasetType::DerivedData,
        ] {
            assert_eq!(DatasetType::from_id(ty.id()), Some(ty));
        }
        assert_eq!(DatasetType::from_id(9), None);
    }

    #[test]
    fn clone_url_uses_alias_fragment() {
        assert_eq!(
            ria_clone_url("ria+ssh://host/store", "study-1_rawdata"),
            "ria+ssh://host/store#~study-1_rawdata"
        );
    }

    #[test]
    fn archive_name_shortens_hexsha() {
        assert_eq!(
            archive_file_name("study-1_rawdata", "2024-02-03", "abcdef0123456789"),
            "study-1_rawdata_2024-02-03_abcdef0.zip"
        );
    }
}
