//! HTTP-level tests for study requests, configuration and job launching.

mod common;

use autobids_core::naming::DatasetType;
use autobids_db::models::output::NewCfmm2tarOutput;
use autobids_db::repositories::{
    Cfmm2tarOutputRepo, DataladDatasetRepo, ExplicitPatientRepo, GlobusUsernameRepo, StudyRepo,
};
use axum::http::{header, StatusCode};
use chrono::NaiveDate;
use common::{
    body_bytes, body_json, create_user, delete_auth, delete_json_auth, get_auth, post_json,
    post_json_auth, put_json_auth, study_request, submit_study, token_for,
};
use serde_json::json;
use sqlx::PgPool;

/// A complete config update body for a study.
fn config_body() -> serde_json::Value {
    json!({
        "principal": "Khan",
        "project_name": "Neuro",
        "dataset_name": "neuro",
        "retrospective_data": false,
        "heuristic": "cfmm_base.py",
        "subj_expr": "*_{subject}",
        "patient_str": "*"
    })
}

/// [`config_body`] plus the fields only admins may change.
fn admin_config_body() -> serde_json::Value {
    let mut body = config_body();
    body["active"] = json!(true);
    body["deface"] = json!(true);
    body
}

/// A tar file recorded in the study's source dataset.
async fn record_tar_file(pool: &PgPool, study_id: i64, name: &str) -> i64 {
    let (dataset, _) = DataladDatasetRepo::ensure(pool, study_id, DatasetType::SourceData, None)
        .await
        .unwrap();
    Cfmm2tarOutputRepo::create(
        pool,
        &NewCfmm2tarOutput {
            study_id,
            tar_file: name.to_string(),
            uid: format!("1.2.3.{name}"),
            scan_date: NaiveDate::from_ymd_opt(2023, 4, 5).unwrap(),
        },
        dataset.id,
    )
    .await
    .unwrap()
    .id
}

// ---------------------------------------------------------------------------
// Submission and listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_submit_study_is_public(pool: PgPool) {
    let app = common::build_test_app(pool.clone());
    let response = post_json(app, "/api/v1/studies", study_request("Khan", "Neuro")).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["principal"], "Khan");
    assert_eq!(json["data"]["dataset_name"], "Neuro");
    assert_eq!(json["data"]["active"], false);
    assert_eq!(json["data"]["heuristic"], "cfmm_base.py");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_submit_duplicate_study_conflicts(pool: PgPool) {
    submit_study(&pool, "Khan", "Neuro").await;
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/studies", study_request("Khan", "Neuro")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_submit_study_requires_consent(pool: PgPool) {
    let mut body = study_request("Khan", "Neuro");
    body["consent"] = json!(false);
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/studies", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_submit_study_with_other_principal(pool: PgPool) {
    let mut body = study_request("Other", "Neuro");
    body["principal_other"] = json!("Newcomer");
    let app = common::build_test_app(pool);
    let response = post_json(app, "/api/v1/studies", body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(body_json(response).await["data"]["principal"], "Newcomer");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_studies_by_visibility(pool: PgPool) {
    let first = submit_study(&pool, "Khan", "Neuro").await;
    submit_study(&pool, "Menon", "Cog").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let user = create_user(&pool, "user@example.com", false).await;
    StudyRepo::grant_access(&pool, first, user.id).await.unwrap();

    let app = common::build_test_app(pool.clone());
    let json = body_json(get_auth(app, "/api/v1/studies", &token_for(&admin)).await).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 2);

    let app = common::build_test_app(pool);
    let json = body_json(get_auth(app, "/api/v1/studies", &token_for(&user)).await).await;
    let studies = json["data"].as_array().unwrap();
    assert_eq!(studies.len(), 1);
    assert_eq!(studies[0]["id"], first);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_list_studies_requires_auth(pool: PgPool) {
    let app = common::build_test_app(pool);
    let response = common::get(app, "/api/v1/studies").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_study_report_csv(pool: PgPool) {
    submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, "/api/v1/studies/report.csv", &token_for(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv; charset=utf-8"
    );
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    let lines: Vec<&str> = body.split("\r\n").filter(|l| !l.is_empty()).collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Submitter Name,Submitter Email"));
    assert!(lines[1].starts_with("Jane Researcher,jane@example.org,Faculty"));
}

// ---------------------------------------------------------------------------
// Study detail and access hiding
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unauthorized_study_is_hidden(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let user = create_user(&pool, "user@example.com", false).await;
    let token = token_for(&user);

    for uri in [
        format!("/api/v1/studies/{id}"),
        format!("/api/v1/studies/{id}/demographics"),
        format!("/api/v1/studies/{id}/config"),
        format!("/api/v1/studies/{id}/tasks"),
    ] {
        let app = common::build_test_app(pool.clone());
        let response = get_auth(app, &uri, &token).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_study_detail(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let tar_id = record_tar_file(&pool, id, "Khan_Neuro_20230405_sub01.tar").await;
    let user = create_user(&pool, "user@example.com", false).await;
    StudyRepo::grant_access(&pool, id, user.id).await.unwrap();

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/v1/studies/{id}"), &token_for(&user)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["id"], id);
    assert_eq!(data["project_name"], "Neuro");
    assert_eq!(data["tasks"], json!([]));
    assert_eq!(data["cfmm2tar_outputs"][0]["id"], tar_id);
    assert_eq!(data["unprocessed_tar_file_ids"], json!([tar_id]));
    assert_eq!(data["tar2bids_outputs"], json!([]));
    assert!(data["dataset_tree"].is_null());
    assert_eq!(data["cfmm2tar_in_progress"], false);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_demographics(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/v1/studies/{id}/demographics"),
        &token_for(&admin),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["submitter_name"], "Jane Researcher");
    assert_eq!(json["data"]["familiarity_bash"], "5");
    assert!(json["data"].get("heuristic").is_none());
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_get_config_lists_choices(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/v1/studies/{id}/config"), &token_for(&admin)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];
    assert_eq!(data["heuristic"], "cfmm_base.py");
    assert_eq!(
        data["available_heuristics"].as_array().unwrap().len(),
        autobids_core::heuristics::DEFAULT_HEURISTICS.len()
    );
    assert_eq!(data["available_images"], json!([]));
    assert_eq!(data["included"], json!([]));
    assert_eq!(data["users_authorized"], json!([]));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_config_as_admin(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let user = create_user(&pool, "user@example.com", false).await;

    let mut body = admin_config_body();
    body["users_authorized"] = json!([user.id]);
    body["globus_usernames"] = json!(["jane@globusid.org", "  "]);
    body["patient_name_re"] = json!("");

    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/studies/{id}/config"),
        &token_for(&admin),
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["active"], true);
    assert_eq!(json["data"]["deface"], true);
    assert!(json["data"]["patient_name_re"].is_null());
    assert_eq!(json["data"]["users_authorized"][0]["id"], user.id);
    assert_eq!(json["data"]["globus_usernames"], json!(["jane@globusid.org"]));

    let study = StudyRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(study.dataset_name, "neuro");
    assert_eq!(
        GlobusUsernameRepo::list_for_study(&pool, id).await.unwrap(),
        vec!["jane@globusid.org".to_string()]
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_config_users_authorized_admin_only(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let user = create_user(&pool, "user@example.com", false).await;
    StudyRepo::grant_access(&pool, id, user.id).await.unwrap();

    let mut body = config_body();
    body["users_authorized"] = json!([]);
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(
        app,
        &format!("/api/v1/studies/{id}/config"),
        &token_for(&user),
        body,
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let app = common::build_test_app(pool);
    let response = put_json_auth(
        app,
        &format!("/api/v1/studies/{id}/config"),
        &token_for(&user),
        config_body(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_config_admin_fields_forbidden_for_users(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let user = create_user(&pool, "user@example.com", false).await;
    StudyRepo::grant_access(&pool, id, user.id).await.unwrap();
    let token = token_for(&user);

    for (field, value) in [
        ("custom_ria_url", json!("ria+ssh://elsewhere.example.org/store")),
        ("active", json!(true)),
        ("deface", json!(true)),
        ("custom_bidsignore", json!("*.log")),
    ] {
        let mut body = config_body();
        body[field] = value;
        let app = common::build_test_app(pool.clone());
        let response =
            put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, body).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN, "{field}");
        assert!(body_json(response).await["error"]
            .as_str()
            .unwrap()
            .contains(field));
    }

    let study = StudyRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(!study.active);
    assert!(!study.deface);
    assert_eq!(study.custom_ria_url, None);
    assert_eq!(study.custom_bidsignore, None);

    // Echoing the stored values back is not a change.
    let mut body = config_body();
    body["active"] = json!(false);
    body["deface"] = json!(false);
    body["custom_ria_url"] = json!("");
    let app = common::build_test_app(pool);
    let response = put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, body).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_config_omitted_admin_fields_keep_values(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let token = token_for(&admin);

    let mut body = admin_config_body();
    body["custom_ria_url"] = json!("ria+ssh://store.example.org/ria");
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, body).await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool.clone());
    let response =
        put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, config_body()).await;
    assert_eq!(response.status(), StatusCode::OK);

    let study = StudyRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert!(study.active);
    assert!(study.deface);
    assert_eq!(
        study.custom_ria_url.as_deref(),
        Some("ria+ssh://store.example.org/ria")
    );

    let mut body = config_body();
    body["custom_ria_url"] = json!("");
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let study = StudyRepo::find_by_id(&pool, id).await.unwrap().unwrap();
    assert_eq!(study.custom_ria_url, None);
    assert!(study.active);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_config_rejects_unknown_heuristic_and_image(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let token = token_for(&admin);

    let mut body = config_body();
    body["heuristic"] = json!("not_a_heuristic.py");
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut body = config_body();
    body["tar2bids_img"] = json!("missing.sif");
    let app = common::build_test_app(pool);
    let response = put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_update_config_prunes_explicit_patients(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let token = token_for(&admin);

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/studies/{id}/exclusions"),
        &token,
        json!({
            "excluded": [{ "study_instance_uid": "1.1" }, { "study_instance_uid": "1.2" }],
            "included": [{ "study_instance_uid": "2.1", "patient_name": "Khan^Sub01" }]
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 3);

    let mut body = config_body();
    body["excluded_uids"] = json!(["1.2"]);
    let app = common::build_test_app(pool.clone());
    let response = put_json_auth(app, &format!("/api/v1/studies/{id}/config"), &token, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["excluded"][0]["study_instance_uid"], "1.2");
    assert_eq!(json["data"]["excluded"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"]["included"][0]["study_instance_uid"], "2.1");

    let remaining = ExplicitPatientRepo::list_for_study(&pool, id, None).await.unwrap();
    assert_eq!(remaining.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_exclusion_overrides_inclusion(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let token = token_for(&admin);
    let uri = format!("/api/v1/studies/{id}/exclusions");

    let app = common::build_test_app(pool.clone());
    post_json_auth(
        app,
        &uri,
        &token,
        json!({ "included": [{ "study_instance_uid": "3.1" }] }),
    )
    .await;
    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &uri,
        &token,
        json!({ "excluded": [{ "study_instance_uid": "3.1" }] }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["included"], false);

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        &uri,
        &token,
        json!({ "excluded": [{ "study_instance_uid": " " }] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// DICOM queries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_dicom_query_by_date_needs_sample_date(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let token = token_for(&admin);

    for method in ["both", "date"] {
        let app = common::build_test_app(pool.clone());
        let response =
            get_auth(app, &format!("/api/v1/studies/{id}/dicom/{method}"), &token).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_dicom_query_unknown_method(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool);
    let response = get_auth(
        app,
        &format!("/api/v1/studies/{id}/dicom/everything"),
        &token_for(&admin),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_launch_cfmm2tar_conflicts_while_in_progress(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let user = create_user(&pool, "user@example.com", false).await;
    StudyRepo::grant_access(&pool, id, user.id).await.unwrap();
    let token = token_for(&user);
    let uri = format!("/api/v1/studies/{id}/cfmm2tar");

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["task_type"], "check_tar_files");
    assert_eq!(json["data"]["status"], "pending");
    let task_id = json["data"]["id"].as_i64().unwrap();

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let app = common::build_test_app(pool.clone());
    let response = get_auth(app, &format!("/api/v1/tasks/{task_id}"), &token).await;
    assert_eq!(response.status(), StatusCode::OK);

    let app = common::build_test_app(pool.clone());
    let json = body_json(get_auth(app, &format!("/api/v1/studies/{id}/tasks"), &token).await).await;
    assert_eq!(json["data"][0]["id"], task_id);

    let stranger = create_user(&pool, "stranger@example.com", false).await;
    let app = common::build_test_app(pool);
    let response = get_auth(app, &format!("/api/v1/tasks/{task_id}"), &token_for(&stranger)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_launch_cfmm2tar_with_explicit_scans(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &format!("/api/v1/studies/{id}/cfmm2tar"),
        &token_for(&admin),
        json!({ "explicit_scans": [
            { "study_instance_uid": "1.2.3", "patient_name": "Khan^Neuro^Sub01" }
        ]}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let task_id = body_json(response).await["data"]["id"].as_i64().unwrap();
    let task = autobids_db::repositories::TaskRepo::find_by_id(&pool, task_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        task.parameters["explicit_scans"][0]["study_instance_uid"],
        "1.2.3"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_launch_tar2bids(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let other = submit_study(&pool, "Menon", "Cog").await;
    let foreign_tar = record_tar_file(&pool, other, "Menon_Cog_20230405_a.tar").await;
    let own_tar = record_tar_file(&pool, id, "Khan_Neuro_20230405_a.tar").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let token = token_for(&admin);
    let uri = format!("/api/v1/studies/{id}/tar2bids");

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, &token, json!({ "tar_file_ids": [foreign_tar] })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(
        app,
        &uri,
        &token,
        json!({ "tar_file_ids": [own_tar, foreign_tar] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["task_type"], "run_tar2bids");

    let app = common::build_test_app(pool);
    let response = post_json_auth(app, &uri, &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_launch_tar2bids_for_unprocessed(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool);
    let response = post_json_auth(
        app,
        &format!("/api/v1/studies/{id}/tar2bids"),
        &token_for(&admin),
        json!({}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(
        body_json(response).await["data"]["task_type"],
        "find_unprocessed_tar_files"
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_tar2bids_outputs(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool);
    let response = delete_json_auth(
        app,
        &format!("/api/v1/studies/{id}/tar2bids"),
        &token_for(&admin),
        json!({ "ids": [12345] }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["deleted"], 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_cfmm2tar_output_of_other_study(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let other = submit_study(&pool, "Menon", "Cog").await;
    let foreign_tar = record_tar_file(&pool, other, "Menon_Cog_20230405_a.tar").await;
    let admin = create_user(&pool, "admin@example.com", true).await;

    let app = common::build_test_app(pool.clone());
    let response = delete_auth(
        app,
        &format!("/api/v1/studies/{id}/cfmm2tar/{foreign_tar}"),
        &token_for(&admin),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(Cfmm2tarOutputRepo::find_by_id(&pool, foreign_tar)
        .await
        .unwrap()
        .is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_launch_archive_conflicts_while_in_progress(pool: PgPool) {
    let id = submit_study(&pool, "Khan", "Neuro").await;
    let admin = create_user(&pool, "admin@example.com", true).await;
    let token = token_for(&admin);
    let uri = format!("/api/v1/studies/{id}/archive");

    let app = common::build_test_app(pool.clone());
    let response = post_json_auth(app, &uri, &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(body_json(response).await["data"]["task_type"], "archive_raw_data");

    let app = common::build_test_app(pool);
    let response = post_json_auth(app, &uri, &token, json!({})).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
