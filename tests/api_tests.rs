mod common;

use common::TestContext;
use gazette::{
    create_router,
    models::{ArticleKind, PermissionLevel},
    repository::Repository,
};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub struct TestApp {
    pub address: String,
    pub ctx: TestContext,
    pub client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }
}

async fn spawn_app() -> TestApp {
    let ctx = TestContext::new();
    let router = create_router(ctx.state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp {
        address,
        ctx,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api/health")).send().await.expect("req fail");

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "Alive");
}

#[tokio::test]
async fn test_unknown_endpoint_is_json_404() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api/nope")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Unknown endpoint." }));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api-docs/openapi.json")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let doc: Value = response.json().await.unwrap();
    assert!(doc["paths"]["/api/article"].is_object());
    assert!(doc["components"]["securitySchemes"]["bearer"].is_object());
}

#[tokio::test]
async fn test_register_login_checklogin_flow() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(app.url("/api/auth/register"))
        .json(&json!({ "email": "ada@gazette.test", "password": "password123", "name": "Ada" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ada@gazette.test", "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let jwt = response.json::<Value>().await.unwrap()["jwt"]
        .as_str()
        .unwrap()
        .to_string();

    let profile: Value = app
        .client
        .get(app.url("/api/auth/checklogin"))
        .bearer_auth(&jwt)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile["id"], "ada@gazette.test");
    assert_eq!(profile["name"], "Ada");
    assert_eq!(profile["permissionLevel"], 0);
    assert!(profile.get("passwordHash").is_none());
}

#[tokio::test]
async fn test_bad_login_is_401_with_message() {
    let app = spawn_app().await;
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": "ghost@gazette.test", "password": "whatever1" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid credentials.");
}

#[tokio::test]
async fn test_tier_gates() {
    let app = spawn_app().await;
    app.ctx.user("reader@gazette.test", PermissionLevel::User).await;
    app.ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let reader = app.ctx.bearer("reader@gazette.test").await;
    let writer = app.ctx.bearer("writer@gazette.test").await;

    // Authenticated tier without identity.
    let response = app.client.get(app.url("/api/auth/checklogin")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Writer tier.
    let response = app.client.post(app.url("/api/article")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let response = app
        .client
        .post(app.url("/api/article"))
        .header("authorization", &reader)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = app
        .client
        .post(app.url("/api/article"))
        .header("authorization", &writer)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(response.headers().contains_key("location"));

    // Admin tier.
    let response = app
        .client
        .post(app.url("/api/label"))
        .header("authorization", &writer)
        .json(&json!({ "name": "News", "backgroundColor": "#000", "textColor": "#fff" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Public reads stay open on a path shared with gated methods.
    let response = app.client.get(app.url("/api/article")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = app.client.get(app.url("/api/label")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_hidden_article_and_gated_content_over_http() {
    let app = spawn_app().await;
    app.ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    app.ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let writer = app.ctx.bearer("writer@gazette.test").await;
    let reader = app.ctx.bearer("reader@gazette.test").await;

    let draft = app.ctx.article("writer@gazette.test", ArticleKind::Open, "Draft", false).await;
    let response = app.client.get(app.url(&format!("/api/article/{draft}"))).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let closed = app.ctx.article("writer@gazette.test", ArticleKind::Closed, "Closed", true).await;
    for (query, text) in [("", "Free part. "), ("?closed", "Paid part.")] {
        let response = app
            .client
            .patch(app.url(&format!("/api/article/{closed}/content{query}")))
            .header("authorization", &writer)
            .header("content-type", "text/markdown")
            .body(text)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    let anonymous = app
        .client
        .get(app.url(&format!("/api/article/{closed}/content")))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::OK);
    assert!(anonymous.headers()["content-type"].to_str().unwrap().starts_with("text/markdown"));
    assert_eq!(anonymous.text().await.unwrap(), "Free part. ");

    let member = app
        .client
        .get(app.url(&format!("/api/article/{closed}/content")))
        .header("authorization", &reader)
        .send()
        .await
        .unwrap();
    assert_eq!(member.text().await.unwrap(), "Free part. Paid part.");

    let article = app.ctx.repo.get_article(closed).await.unwrap().unwrap();
    assert_eq!(article.info.views, 2);
}

#[tokio::test]
async fn test_upload_requires_image_content_type() {
    let app = spawn_app().await;
    app.ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let writer = app.ctx.bearer("writer@gazette.test").await;

    let response = app
        .client
        .post(app.url("/api/file?name=notes"))
        .header("authorization", &writer)
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let response = app
        .client
        .post(app.url("/api/file?name=pixel"))
        .header("authorization", &writer)
        .header("content-type", "image/png")
        .body(vec![0x89, b'P', b'N', b'G'])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created: Value = response.json().await.unwrap();
    let id = created["id"].as_str().unwrap();

    let download = app.client.get(app.url(&format!("/api/file/{id}"))).send().await.unwrap();
    assert_eq!(download.status(), StatusCode::OK);
    assert_eq!(download.headers()["content-type"], "image/png");
    assert_eq!(download.bytes().await.unwrap().as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_default_avatar_is_public() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/api/file/default")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/svg+xml");
}

#[tokio::test]
async fn test_comments_over_http() {
    let app = spawn_app().await;
    app.ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    app.ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let reader = app.ctx.bearer("reader@gazette.test").await;
    let id = app.ctx.article("writer@gazette.test", ArticleKind::Open, "Open", true).await;

    let response = app
        .client
        .post(app.url(&format!("/api/article/{id}/comments")))
        .json(&json!({ "text": "Anonymous?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .post(app.url(&format!("/api/article/{id}/comments")))
        .header("authorization", &reader)
        .json(&json!({ "text": "Signed in." }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let list: Value = app
        .client
        .get(app.url(&format!("/api/article/{id}/comments")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["comments"][0]["content"], "Signed in.");
    assert_eq!(list["comments"][0]["user"]["id"], "reader@gazette.test");
}

#[tokio::test]
async fn test_extractor_rejections_render_as_json() {
    let app = spawn_app().await;

    // Unparsable query value.
    let response = app.client.get(app.url("/api/article?page=abc")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));

    // Non-UUID path id.
    let response = app.client.get(app.url("/api/article/not-a-uuid")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].is_string());

    // Malformed JSON body.
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .header("content-type", "application/json")
        .body("{\"email\": ")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].is_string());

    // Well-formed JSON of the wrong shape is a 400 too.
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({ "email": 42 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].is_string());

    // Missing content type keeps its 415.
    let response = app
        .client
        .post(app.url("/api/auth/login"))
        .body("{}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json().await.unwrap();
    assert!(body["message"].is_string());
}
