//! Shared fixtures for repository tests.

use autobids_db::models::study::{CreateStudy, Study};
use autobids_db::models::user::{CreateUser, User};
use autobids_db::repositories::{StudyRepo, UserRepo};
use sqlx::PgPool;

pub fn new_study(principal: &str, project: &str) -> CreateStudy {
    CreateStudy {
        submitter_name: "Jane Doe".to_string(),
        submitter_email: "jane@example.com".to_string(),
        status: "faculty".to_string(),
        scanner: "type2".to_string(),
        scan_number: 10,
        study_type: true,
        familiarity: std::array::from_fn(|_| "3".to_string()),
        principal: principal.to_string(),
        project_name: project.to_string(),
        dataset_name: project.to_lowercase(),
        sample_date: None,
        retrospective_data: false,
        retrospective_start: None,
        retrospective_end: None,
        consent: true,
        comment: None,
    }
}

pub async fn create_study(pool: &PgPool, principal: &str, project: &str) -> Study {
    StudyRepo::create(pool, &new_study(principal, project))
        .await
        .unwrap()
}

pub async fn create_user(pool: &PgPool, email: &str, is_admin: bool) -> User {
    UserRepo::create(
        pool,
        &CreateUser {
            email: email.to_string(),
            password_hash: "not-a-real-hash".to_string(),
            is_admin,
        },
    )
    .await
    .unwrap()
}
