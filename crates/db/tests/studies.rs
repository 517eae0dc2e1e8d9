//! Study, access control, explicit patient and principal repositories.

mod common;

use assert_matches::assert_matches;
use autobids_db::models::explicit_patient::NewExplicitPatient;
use autobids_db::repositories::{
    ExplicitPatientRepo, GlobusUsernameRepo, PrincipalRepo, StudyRepo, UserRepo,
};
use common::{create_study, create_user, new_study};
use sqlx::PgPool;

fn patient(uid: &str) -> NewExplicitPatient {
    NewExplicitPatient {
        study_instance_uid: uid.to_string(),
        patient_name: Some("Khan^P001".to_string()),
        dicom_study_id: Some("1".to_string()),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_study_defaults(pool: PgPool) {
    let study = create_study(&pool, "Khan", "Neuro").await;
    assert!(!study.active);
    assert_eq!(study.heuristic, "cfmm_base.py");
    assert_eq!(study.patient_str, "*");
    assert_eq!(study.subj_expr, "*_{subject}");
    assert!(!study.deface);
    assert_eq!(study.description(), "Khan^Neuro");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_principal_project_rejected(pool: PgPool) {
    create_study(&pool, "Khan", "Neuro").await;
    let err = StudyRepo::create(&pool, &new_study("Khan", "Neuro"))
        .await
        .unwrap_err();
    assert_matches!(err, sqlx::Error::Database(ref db)
        if db.constraint() == Some("uq_studies_principal_project"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_visibility_follows_access(pool: PgPool) {
    let study = create_study(&pool, "Khan", "Neuro").await;
    let other = create_study(&pool, "Palaniyappan", "Psych").await;
    let user = create_user(&pool, "user@example.com", false).await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    assert!(StudyRepo::find_visible(&pool, study.id, user.id, false)
        .await
        .unwrap()
        .is_none());
    assert_eq!(
        StudyRepo::list_visible(&pool, admin.id, true).await.unwrap().len(),
        2
    );

    StudyRepo::grant_access(&pool, study.id, user.id).await.unwrap();
    StudyRepo::grant_access(&pool, study.id, user.id).await.unwrap();
    let visible = StudyRepo::list_visible(&pool, user.id, false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, study.id);
    assert!(StudyRepo::find_visible(&pool, other.id, user.id, false)
        .await
        .unwrap()
        .is_none());

    let authorized = UserRepo::list_for_study(&pool, study.id).await.unwrap();
    assert_eq!(authorized.len(), 1);

    assert!(StudyRepo::revoke_access(&pool, study.id, user.id).await.unwrap());
    assert!(!StudyRepo::revoke_access(&pool, study.id, user.id).await.unwrap());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_set_authorized_users_replaces(pool: PgPool) {
    let study = create_study(&pool, "Khan", "Neuro").await;
    let a = create_user(&pool, "a@example.com", false).await;
    let b = create_user(&pool, "b@example.com", false).await;

    StudyRepo::grant_access(&pool, study.id, a.id).await.unwrap();
    StudyRepo::set_authorized_users(&pool, study.id, &[b.id, 9999])
        .await
        .unwrap();

    let ids: Vec<i64> = UserRepo::list_for_study(&pool, study.id)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.id)
        .collect();
    assert_eq!(ids, vec![b.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_exclude_replaces_and_include_skips(pool: PgPool) {
    let study = create_study(&pool, "Khan", "Neuro").await;

    let included = ExplicitPatientRepo::include(&pool, study.id, &patient("1.2.3"))
        .await
        .unwrap();
    assert!(included.is_some_and(|p| p.included));

    // Including again is a no-op.
    assert!(ExplicitPatientRepo::include(&pool, study.id, &patient("1.2.3"))
        .await
        .unwrap()
        .is_none());

    // Excluding flips the existing record.
    let excluded = ExplicitPatientRepo::exclude(&pool, study.id, &patient("1.2.3"))
        .await
        .unwrap();
    assert!(!excluded.included);

    let all = ExplicitPatientRepo::list_for_study(&pool, study.id, None)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
    assert!(ExplicitPatientRepo::list_for_study(&pool, study.id, Some(true))
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_retain_drops_unlisted(pool: PgPool) {
    let study = create_study(&pool, "Khan", "Neuro").await;
    ExplicitPatientRepo::include(&pool, study.id, &patient("1.1")).await.unwrap();
    ExplicitPatientRepo::include(&pool, study.id, &patient("1.2")).await.unwrap();
    ExplicitPatientRepo::exclude(&pool, study.id, &patient("2.1")).await.unwrap();

    let removed = ExplicitPatientRepo::retain(&pool, study.id, &["1.2".to_string()], &[])
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let left = ExplicitPatientRepo::list_for_study(&pool, study.id, None)
        .await
        .unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].study_instance_uid, "1.2");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_principals_replaced(pool: PgPool) {
    PrincipalRepo::replace_all(&pool, &["Khan".into(), "Lau".into()])
        .await
        .unwrap();
    let inserted = PrincipalRepo::replace_all(&pool, &["Menon".into(), "Menon".into()])
        .await
        .unwrap();
    assert_eq!(inserted, 1);
    let names: Vec<String> = PrincipalRepo::list(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Menon"]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_globus_usernames_replaced(pool: PgPool) {
    let study = create_study(&pool, "Khan", "Neuro").await;
    GlobusUsernameRepo::replace_for_study(&pool, study.id, &["b@globusid.org".into()])
        .await
        .unwrap();
    GlobusUsernameRepo::replace_for_study(
        &pool,
        study.id,
        &["z@globusid.org".into(), "a@globusid.org".into()],
    )
    .await
    .unwrap();
    assert_eq!(
        GlobusUsernameRepo::list_for_study(&pool, study.id).await.unwrap(),
        vec!["a@globusid.org", "z@globusid.org"]
    );
}
