//! Principal investigator names discovered on the DICOM server.

use autobids_core::types::DbId;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `principals` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Principal {
    pub id: DbId,
    pub name: String,
}
