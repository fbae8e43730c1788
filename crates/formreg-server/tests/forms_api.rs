// SPDX-License-Identifier: Apache-2.0

mod support;

use serde_json::{json, Value};
use support::{client, spawn_server, TEST_TOKEN};

#[tokio::test]
async fn create_fetch_and_conflict_roundtrip() {
    let server = spawn_server().await;
    let http = client();

    let body = json!({
        "id": "11111111-1111-4111-8111-111111111111",
        "version": "1",
        "ministry_id": "CITZ",
        "title": "Change of Address",
        "form_id": "coa",
        "data": {"items": [{"type": "text", "key": "street"}]}
    });
    let resp = http
        .post(server.url("/api/forms"))
        .bearer_auth(TEST_TOKEN)
        .json(&body)
        .send()
        .await
        .expect("create form");
    assert_eq!(resp.status().as_u16(), 201);
    let created: Value = resp.json().await.expect("created body");
    assert_eq!(created["id"], "11111111-1111-4111-8111-111111111111");

    let resp = http
        .get(server.url("/api/forms/11111111-1111-4111-8111-111111111111"))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("fetch form");
    assert_eq!(resp.status().as_u16(), 200);
    let form: Value = resp.json().await.expect("form body");
    assert_eq!(form["title"], "Change of Address");
    assert_eq!(form["deployed_to"], "");
    assert_eq!(form["data"], json!([{"type": "text", "key": "street"}]));

    // Same id again is a conflict.
    let resp = http
        .post(server.url("/api/forms"))
        .bearer_auth(TEST_TOKEN)
        .json(&body)
        .send()
        .await
        .expect("duplicate create");
    assert_eq!(resp.status().as_u16(), 409);
    let err: Value = resp.json().await.expect("conflict body");
    assert_eq!(err["error"]["code"], "conflict");
    assert_eq!(
        err["error"]["details"]["id"],
        "11111111-1111-4111-8111-111111111111"
    );
}

#[tokio::test]
async fn unknown_form_lookups_answer_not_found() {
    let server = spawn_server().await;
    let http = client();

    let resp = http
        .get(server.url("/api/forms/ghost"))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("fetch missing form");
    assert_eq!(resp.status().as_u16(), 404);

    let resp = http
        .get(server.url("/api/forms-list"))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("list empty registry");
    assert_eq!(resp.status().as_u16(), 404);

    let resp = http
        .get(server.url("/api/forms/form_id/ghost"))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("resolve missing form");
    assert_eq!(resp.status().as_u16(), 404);
}

async fn create_version(server: &support::TestServer, id: &str, version: &str) {
    let http = client();
    let resp = http
        .post(server.url("/api/forms"))
        .bearer_auth(TEST_TOKEN)
        .json(&json!({
            "id": id,
            "version": version,
            "title": format!("Intake v{version}"),
            "form_id": "intake",
            "data": []
        }))
        .send()
        .await
        .expect("create version");
    assert_eq!(resp.status().as_u16(), 201);
}

async fn deploy(server: &support::TestServer, id: &str, environment: &str) -> u16 {
    client()
        .put(server.url("/api/forms/update"))
        .bearer_auth(TEST_TOKEN)
        .json(&json!({
            "form_id": "intake",
            "id": id,
            "deployed_to": environment
        }))
        .send()
        .await
        .expect("deployment update")
        .status()
        .as_u16()
}

async fn resolve_intake(server: &support::TestServer) -> Value {
    let resp = client()
        .get(server.url("/api/forms/form_id/intake"))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("resolve intake");
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.expect("resolved body")
}

#[tokio::test]
async fn deployment_tag_is_exclusive_per_environment() {
    let server = spawn_server().await;
    create_version(&server, "v1", "1").await;
    create_version(&server, "v2", "2").await;

    assert_eq!(deploy(&server, "v1", "prod").await, 200);
    assert_eq!(deploy(&server, "v2", "prod").await, 200);

    let resp = client()
        .get(server.url("/api/forms-list"))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("list forms");
    let forms: Vec<Value> = resp.json().await.expect("list body");
    let prod: Vec<_> = forms
        .iter()
        .filter(|f| f["deployed_to"] == "prod")
        .collect();
    assert_eq!(prod.len(), 1, "exactly one prod version per form");
    assert_eq!(prod[0]["id"], "v2");
}

#[tokio::test]
async fn resolution_prefers_highest_deployment_priority() {
    let server = spawn_server().await;
    create_version(&server, "v1", "1").await;
    create_version(&server, "v2", "2").await;
    create_version(&server, "v3", "3").await;

    // Nothing deployed: latest numeric version wins.
    assert_eq!(resolve_intake(&server).await["id"], "v3");

    assert_eq!(deploy(&server, "v1", "prod").await, 200);
    assert_eq!(deploy(&server, "v2", "test").await, 200);
    // prod beats test and beats the newer undeployed version
    assert_eq!(resolve_intake(&server).await["id"], "v1");

    assert_eq!(deploy(&server, "v1", "").await, 200);
    assert_eq!(resolve_intake(&server).await["id"], "v2");
}

#[tokio::test]
async fn deployment_update_validates_environment_and_target() {
    let server = spawn_server().await;
    create_version(&server, "v1", "1").await;

    assert_eq!(deploy(&server, "v1", "staging").await, 400);
    assert_eq!(deploy(&server, "ghost", "prod").await, 404);
}

#[tokio::test]
async fn malformed_update_bodies_stay_inside_the_error_envelope() {
    let server = spawn_server().await;

    let resp = client()
        .put(server.url("/api/forms/update"))
        .bearer_auth(TEST_TOKEN)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("broken json body");
    assert_eq!(resp.status().as_u16(), 400);
    let err: Value = resp.json().await.expect("error body");
    assert_eq!(err["error"]["code"], "invalid_payload");

    let resp = client()
        .put(server.url("/api/forms/update"))
        .bearer_auth(TEST_TOKEN)
        .json(&json!({
            "form_id": "intake",
            "id": "v1",
            "deployed_to": "prod",
            "surprise": true
        }))
        .send()
        .await
        .expect("body with unknown field");
    assert_eq!(resp.status().as_u16(), 400);
    let err: Value = resp.json().await.expect("error body");
    assert_eq!(err["error"]["code"], "invalid_payload");
}

#[tokio::test]
async fn nested_formversion_payload_is_accepted() {
    let server = spawn_server().await;
    let resp = client()
        .post(server.url("/api/forms"))
        .bearer_auth(TEST_TOKEN)
        .json(&json!({
            "formversion": {
                "version": "4",
                "name": "Budget Intake",
                "form_id": "budget",
                "elements": [{"type": "header"}],
                "data": {"updated_at": "2026-04-01T12:00:00Z"}
            }
        }))
        .send()
        .await
        .expect("create nested payload");
    assert_eq!(resp.status().as_u16(), 201);
    let created: Value = resp.json().await.expect("created body");
    let id = created["id"].as_str().expect("generated id").to_string();

    let resp = client()
        .get(server.url(&format!("/api/forms/{id}")))
        .bearer_auth(TEST_TOKEN)
        .send()
        .await
        .expect("fetch created");
    let form: Value = resp.json().await.expect("form body");
    assert_eq!(form["title"], "Budget Intake");
    assert_eq!(form["last_modified"], "2026-04-01T12:00:00Z");
    assert_eq!(form["data"], json!([{"type": "header"}]));
}
