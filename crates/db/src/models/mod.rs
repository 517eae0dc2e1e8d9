//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - `Deserialize` DTOs for inserts and updates where the API accepts them

pub mod dataset;
pub mod explicit_patient;
pub mod notification;
pub mod output;
pub mod principal;
pub mod status;
pub mod study;
pub mod task;
pub mod user;
