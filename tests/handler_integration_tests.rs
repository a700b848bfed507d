mod common;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
};
use common::TestContext;
use gazette::{
    auth::Viewer,
    error::AppError,
    handlers,
    models::{
        ArticleKind, AuthLoginRequest, AuthRegisterRequest, ChangeAuthorRequest, ContentQuery,
        CreateArticleQuery, CreateCommentRequest, CreateFileQuery, LabelRequest, ListArticlesQuery,
        ListFilesQuery, ListUsersQuery, PermissionLevel, UpdateArticleRequest,
        UpdatePermissionLevelRequest, UpdateUserRequest,
    },
    repository::Repository,
    storage::MemoryBlobStore,
};
use uuid::Uuid;

fn image_headers(mime: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(mime).unwrap());
    headers
}

fn label(name: &str) -> LabelRequest {
    LabelRequest {
        name: name.to_string(),
        background_color: "#000000".to_string(),
        text_color: "#ffffff".to_string(),
    }
}

fn unweighted() -> ListArticlesQuery {
    ListArticlesQuery {
        random_modifier: Some(0.0),
        ..Default::default()
    }
}

// --- Auth ---

#[tokio::test]
async fn test_register_then_login() {
    let ctx = TestContext::new();

    let (status, Json(body)) = handlers::auth::register(
        State(ctx.state.clone()),
        Json(AuthRegisterRequest {
            email: "ada@gazette.test".to_string(),
            password: "password123".to_string(),
            name: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.email, "ada@gazette.test");

    let user = ctx.stored_user("ada@gazette.test").await;
    assert_eq!(user.permission_level, PermissionLevel::User);
    assert_eq!(user.name, "ada");

    let (status, Json(login)) = handlers::auth::login(
        State(ctx.state.clone()),
        Json(AuthLoginRequest {
            email: "ada@gazette.test".to_string(),
            password: "password123".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(!login.jwt.is_empty());
}

#[tokio::test]
async fn test_register_duplicate_is_conflict() {
    let ctx = TestContext::new();
    ctx.user("ada@gazette.test", PermissionLevel::User).await;

    let result = handlers::auth::register(
        State(ctx.state.clone()),
        Json(AuthRegisterRequest {
            email: "ada@gazette.test".to_string(),
            password: "password123".to_string(),
            name: None,
        }),
    )
    .await;
    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_login_failures_look_the_same() {
    let ctx = TestContext::new();
    ctx.user("ada@gazette.test", PermissionLevel::User).await;

    for (email, password) in [
        ("ada@gazette.test", "wrong-password"),
        ("nobody@gazette.test", common::PASSWORD),
    ] {
        let result = handlers::auth::login(
            State(ctx.state.clone()),
            Json(AuthLoginRequest {
                email: email.to_string(),
                password: password.to_string(),
            }),
        )
        .await;
        assert!(matches!(result, Err(AppError::InvalidCredentials)));
    }
}

// --- Articles ---

#[tokio::test]
async fn test_create_article_is_hidden_and_located() {
    let ctx = TestContext::new();
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;

    let (status, [(name, location)], Json(body)) = handlers::articles::create_article(
        writer,
        State(ctx.state.clone()),
        Query(CreateArticleQuery {
            closed: Some(String::new()),
        }),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(name, header::LOCATION);
    assert_eq!(location, format!("http://localhost:3000/api/article/{}", body.id));

    let article = ctx.repo.get_article(body.id).await.unwrap().unwrap();
    assert_eq!(article.info.kind, ArticleKind::Closed);
    assert!(!article.info.visible);
    assert_eq!(article.info.author.id, "writer@gazette.test");
}

#[tokio::test]
async fn test_hidden_article_is_not_found_for_readers() {
    let ctx = TestContext::new();
    ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let id = ctx.article("writer@gazette.test", ArticleKind::Open, "Draft", false).await;

    for viewer in [Viewer::anonymous(), Viewer(Some(reader))] {
        let result =
            handlers::articles::get_article(viewer, State(ctx.state.clone()), Path(id)).await;
        assert!(matches!(result, Err(AppError::NotFound { kind: "Article", .. })));
    }

    let peer = ctx.user("peer@gazette.test", PermissionLevel::Writer).await;
    let Json(info) =
        handlers::articles::get_article(Viewer(Some(peer)), State(ctx.state.clone()), Path(id))
            .await
            .unwrap();
    assert_eq!(info.title, "Draft");
}

#[tokio::test]
async fn test_list_articles_filters_by_viewer() {
    let ctx = TestContext::new();
    ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let editor = ctx.user("editor@gazette.test", PermissionLevel::Writer).await;
    ctx.article("writer@gazette.test", ArticleKind::Open, "Public", true).await;
    ctx.article("writer@gazette.test", ArticleKind::Open, "Draft", false).await;

    let titles = |viewer: Viewer| {
        let state = ctx.state.clone();
        async move {
            let Json(list) =
                handlers::articles::list_articles(viewer, State(state), Query(unweighted()))
                    .await
                    .unwrap();
            let mut titles: Vec<String> = list.articles.into_iter().map(|a| a.title).collect();
            titles.sort();
            titles
        }
    };

    assert_eq!(titles(Viewer::anonymous()).await, vec!["Public"]);
    assert_eq!(titles(Viewer(Some(reader))).await, vec!["Public"]);
    assert_eq!(titles(Viewer(Some(editor))).await, vec!["Draft", "Public"]);
}

#[tokio::test]
async fn test_list_articles_rejects_bad_paging() {
    let ctx = TestContext::new();
    let query = ListArticlesQuery {
        length: Some(0),
        ..Default::default()
    };
    let result = handlers::articles::list_articles(
        Viewer::anonymous(),
        State(ctx.state.clone()),
        Query(query),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_gated_content_and_view_counting() {
    let ctx = TestContext::new();
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let id = ctx.article("writer@gazette.test", ArticleKind::Closed, "Paywalled", true).await;

    for (gated, text) in [(None, "Teaser. "), (Some(String::new()), "Members only.")] {
        let status = handlers::articles::update_article_content(
            writer.clone(),
            State(ctx.state.clone()),
            Path(id),
            Query(ContentQuery { closed: gated }),
            text.to_string(),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let read = |viewer: Viewer| {
        let state = ctx.state.clone();
        async move {
            let response = handlers::articles::get_article_content(viewer, State(state), Path(id))
                .await
                .unwrap()
                .into_response();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
            String::from_utf8(bytes.to_vec()).unwrap()
        }
    };

    assert_eq!(read(Viewer::anonymous()).await, "Teaser. ");
    assert_eq!(read(Viewer(Some(reader))).await, "Teaser. Members only.");

    let article = ctx.repo.get_article(id).await.unwrap().unwrap();
    assert_eq!(article.info.views, 2);
}

#[tokio::test]
async fn test_update_article_validates_references() {
    let ctx = TestContext::new();
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let id = ctx.article("writer@gazette.test", ArticleKind::Open, "Title", false).await;
    let science = ctx.repo.create_label(label("Science")).await.unwrap();

    let unknown_label = UpdateArticleRequest {
        labels: Some(vec![Uuid::new_v4()]),
        ..Default::default()
    };
    let result = handlers::articles::update_article(
        writer.clone(),
        State(ctx.state.clone()),
        Path(id),
        Json(unknown_label),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let missing_image = UpdateArticleRequest {
        main_image: Some(Some(Uuid::new_v4())),
        ..Default::default()
    };
    let result = handlers::articles::update_article(
        writer.clone(),
        State(ctx.state.clone()),
        Path(id),
        Json(missing_image),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let Json(info) = handlers::articles::update_article(
        writer,
        State(ctx.state.clone()),
        Path(id),
        Json(UpdateArticleRequest {
            title: Some("  Fresh title ".to_string()),
            labels: Some(vec![science.id, science.id]),
            visible: Some(true),
            main_image: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(info.title, "Fresh title");
    assert!(info.visible);
    assert_eq!(info.labels, vec![science]);
}

#[tokio::test]
async fn test_only_author_or_admin_edits() {
    let ctx = TestContext::new();
    ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let peer = ctx.user("peer@gazette.test", PermissionLevel::Writer).await;
    let admin = ctx.user("admin@gazette.test", PermissionLevel::Admin).await;
    let id = ctx.article("writer@gazette.test", ArticleKind::Open, "Mine", true).await;

    let result = handlers::articles::delete_article(peer, State(ctx.state.clone()), Path(id)).await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    let status = handlers::articles::delete_article(admin, State(ctx.state.clone()), Path(id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.repo.get_article(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_change_author_requires_writer_target() {
    let ctx = TestContext::new();
    ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    ctx.user("other@gazette.test", PermissionLevel::Writer).await;
    ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let admin = ctx.user("admin@gazette.test", PermissionLevel::Admin).await;
    let id = ctx.article("writer@gazette.test", ArticleKind::Open, "Handover", true).await;

    let change = |author: &str| Json(ChangeAuthorRequest { author: author.to_string() });

    let result = handlers::articles::change_author(
        admin.clone(),
        State(ctx.state.clone()),
        Path(id),
        change("reader@gazette.test"),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));

    let result = handlers::articles::change_author(
        admin.clone(),
        State(ctx.state.clone()),
        Path(id),
        change("ghost@gazette.test"),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound { kind: "User", .. })));

    let Json(info) = handlers::articles::change_author(
        admin,
        State(ctx.state.clone()),
        Path(id),
        change("other@gazette.test"),
    )
    .await
    .unwrap();
    assert_eq!(info.author.id, "other@gazette.test");
}

// --- Comments ---

#[tokio::test]
async fn test_comment_lifecycle() {
    let ctx = TestContext::new();
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let stranger = ctx.user("stranger@gazette.test", PermissionLevel::User).await;
    let id = ctx.article("writer@gazette.test", ArticleKind::Open, "Discuss", true).await;

    let (status, Json(comment)) = handlers::comments::add_comment(
        reader.clone(),
        State(ctx.state.clone()),
        Path(id),
        Json(CreateCommentRequest {
            text: "  First!  ".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment.content, "First!");
    assert_eq!(comment.user.id, "reader@gazette.test");

    let Json(list) =
        handlers::comments::list_comments(Viewer::anonymous(), State(ctx.state.clone()), Path(id))
            .await
            .unwrap();
    assert_eq!(list.comments, vec![comment.clone()]);

    let result = handlers::comments::delete_comment(
        stranger,
        State(ctx.state.clone()),
        Path((id, comment.id)),
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    // The article's author moderates its comments.
    let status =
        handlers::comments::delete_comment(writer, State(ctx.state.clone()), Path((id, comment.id)))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.repo.list_comments(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cannot_comment_on_hidden_article() {
    let ctx = TestContext::new();
    ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let id = ctx.article("writer@gazette.test", ArticleKind::Open, "Draft", false).await;

    let result = handlers::comments::add_comment(
        reader,
        State(ctx.state.clone()),
        Path(id),
        Json(CreateCommentRequest {
            text: "Hello".to_string(),
        }),
    )
    .await;
    assert!(matches!(result, Err(AppError::NotFound { .. })));
}

// --- Labels ---

#[tokio::test]
async fn test_label_crud() {
    let ctx = TestContext::new();
    let admin = ctx.user("admin@gazette.test", PermissionLevel::Admin).await;

    let (status, _, Json(created)) = handlers::labels::create_label(
        admin.clone(),
        State(ctx.state.clone()),
        Json(label("Sports")),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);

    let duplicate = handlers::labels::create_label(
        admin.clone(),
        State(ctx.state.clone()),
        Json(label("Sports")),
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let Json(updated) = handlers::labels::update_label(
        admin.clone(),
        State(ctx.state.clone()),
        Path(created.id),
        Json(label("Football")),
    )
    .await
    .unwrap();
    assert_eq!(updated.name, "Football");

    let Json(all) = handlers::labels::list_labels(State(ctx.state.clone())).await.unwrap();
    assert_eq!(all.labels, vec![updated]);

    // Padded values are stored trimmed, so they collide with the bare name.
    let padded = handlers::labels::create_label(
        admin.clone(),
        State(ctx.state.clone()),
        Json(label(" Football ")),
    )
    .await;
    assert!(matches!(padded, Err(AppError::Conflict(_))));

    let (_, _, Json(world)) = handlers::labels::create_label(
        admin.clone(),
        State(ctx.state.clone()),
        Json(LabelRequest {
            name: "  World\t".to_string(),
            background_color: " #37474f ".to_string(),
            text_color: "#ffffff\n".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(world.name, "World");
    assert_eq!(world.background_color, "#37474f");
    assert_eq!(world.text_color, "#ffffff");
    ctx.repo.delete_label(world.id).await.unwrap();

    let status =
        handlers::labels::delete_label(admin.clone(), State(ctx.state.clone()), Path(created.id))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    let again =
        handlers::labels::delete_label(admin, State(ctx.state.clone()), Path(created.id)).await;
    assert!(matches!(again, Err(AppError::NotFound { kind: "Label", .. })));
}

// --- Files ---

#[tokio::test]
async fn test_upload_and_replace_file() {
    let ctx = TestContext::new();
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let peer = ctx.user("peer@gazette.test", PermissionLevel::Writer).await;

    let (status, _, Json(created)) = handlers::files::upload_file(
        writer.clone(),
        State(ctx.state.clone()),
        Query(CreateFileQuery {
            name: "cover".to_string(),
        }),
        image_headers("image/png"),
        Bytes::from_static(b"png-bytes"),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created.size, 9);
    assert_eq!(ctx.blobs.len().await, 1);

    let forbidden = handlers::files::replace_file(
        peer,
        State(ctx.state.clone()),
        Path(created.id),
        image_headers("image/jpeg"),
        Bytes::from_static(b"jpg"),
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let Json(info) = handlers::files::replace_file(
        writer.clone(),
        State(ctx.state.clone()),
        Path(created.id),
        image_headers("image/jpeg; charset=binary"),
        Bytes::from_static(b"jpg"),
    )
    .await
    .unwrap();
    assert_eq!(info.id, created.id);
    assert_eq!(info.mime_type, "image/jpeg");
    assert_eq!(info.size, 3);

    let Json(mine) = handlers::files::list_files(
        writer,
        State(ctx.state.clone()),
        Query(ListFilesQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(mine.count, 1);
}

#[tokio::test]
async fn test_upload_rejects_non_images() {
    let ctx = TestContext::new();
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;

    let result = handlers::files::upload_file(
        writer.clone(),
        State(ctx.state.clone()),
        Query(CreateFileQuery {
            name: "notes".to_string(),
        }),
        image_headers("text/plain"),
        Bytes::from_static(b"hello"),
    )
    .await;
    assert!(matches!(result, Err(AppError::UnsupportedMediaType(_))));

    let result = handlers::files::upload_file(
        writer,
        State(ctx.state.clone()),
        Query(CreateFileQuery {
            name: "empty".to_string(),
        }),
        image_headers("image/png"),
        Bytes::new(),
    )
    .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
    assert!(ctx.blobs.is_empty().await);
}

#[tokio::test]
async fn test_blob_failure_rolls_back_record() {
    let ctx = TestContext::with_blobs(MemoryBlobStore::new_failing());
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;

    let result = handlers::files::upload_file(
        writer.clone(),
        State(ctx.state.clone()),
        Query(CreateFileQuery {
            name: "cover".to_string(),
        }),
        image_headers("image/png"),
        Bytes::from_static(b"png"),
    )
    .await;
    assert!(matches!(result, Err(AppError::Storage(_))));

    let (files, count) = ctx
        .repo
        .list_files(&writer.id, gazette::models::Page::new(None, None).unwrap())
        .await
        .unwrap();
    assert!(files.is_empty());
    assert_eq!(count, 0);
}

// --- Users ---

#[tokio::test]
async fn test_avatar_replacement_removes_previous_file() {
    let ctx = TestContext::new();
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;

    let upload = |bytes: &'static [u8]| {
        handlers::users::upload_avatar(
            reader.clone(),
            State(ctx.state.clone()),
            Path(reader.id.clone()),
            image_headers("image/png"),
            Bytes::from_static(bytes),
        )
    };

    let (_, _, Json(first)) = upload(b"one").await.unwrap();
    let (_, _, Json(second)) = upload(b"two").await.unwrap();

    assert!(ctx.repo.get_file(first.id).await.unwrap().is_none());
    assert_eq!(ctx.blobs.len().await, 1);
    assert_eq!(ctx.stored_user(&reader.id).await.avatar, Some(second.id));

    let status = handlers::users::delete_avatar(
        reader.clone(),
        State(ctx.state.clone()),
        Path(reader.id.clone()),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(ctx.stored_user(&reader.id).await.avatar.is_none());
    assert!(ctx.blobs.is_empty().await);
}

#[tokio::test]
async fn test_avatar_falls_back_to_default() {
    let ctx = TestContext::new();
    ctx.user("reader@gazette.test", PermissionLevel::User).await;

    let response = handlers::users::get_avatar(
        State(ctx.state.clone()),
        Path("reader@gazette.test".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/svg+xml");
}

#[tokio::test]
async fn test_user_management_rights() {
    let ctx = TestContext::new();
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let other = ctx.user("other@gazette.test", PermissionLevel::User).await;
    let admin = ctx.user("admin@gazette.test", PermissionLevel::Admin).await;

    let rename = |name: &str| Json(UpdateUserRequest { name: name.to_string() });

    let result = handlers::users::update_user(
        other,
        State(ctx.state.clone()),
        Path(reader.id.clone()),
        rename("Hacked"),
    )
    .await;
    assert!(matches!(result, Err(AppError::Forbidden)));

    let Json(info) = handlers::users::update_user(
        reader.clone(),
        State(ctx.state.clone()),
        Path(reader.id.clone()),
        rename("  Reader One "),
    )
    .await
    .unwrap();
    assert_eq!(info.name, "Reader One");

    let Json(promoted) = handlers::users::update_permission_level(
        admin.clone(),
        State(ctx.state.clone()),
        Path(reader.id.clone()),
        Json(UpdatePermissionLevelRequest { permission_level: 1 }),
    )
    .await
    .unwrap();
    assert_eq!(promoted.permission_level, PermissionLevel::Writer);

    let too_high = handlers::users::update_permission_level(
        admin.clone(),
        State(ctx.state.clone()),
        Path(reader.id.clone()),
        Json(UpdatePermissionLevelRequest { permission_level: 2 }),
    )
    .await;
    assert!(matches!(too_high, Err(AppError::Forbidden)));

    let invalid = handlers::users::update_permission_level(
        admin.clone(),
        State(ctx.state.clone()),
        Path(reader.id.clone()),
        Json(UpdatePermissionLevelRequest { permission_level: 9 }),
    )
    .await;
    assert!(matches!(invalid, Err(AppError::BadRequest(_))));

    let Json(writers) = handlers::users::list_users(
        admin,
        State(ctx.state.clone()),
        Query(ListUsersQuery {
            min_permission_level: Some(1),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(writers.count, 2);
}

#[tokio::test]
async fn test_delete_user_purges_content_and_blobs() {
    let ctx = TestContext::new();
    let writer = ctx.user("writer@gazette.test", PermissionLevel::Writer).await;
    let reader = ctx.user("reader@gazette.test", PermissionLevel::User).await;
    let admin = ctx.user("admin@gazette.test", PermissionLevel::Admin).await;

    let (_, _, Json(file)) = handlers::files::upload_file(
        writer.clone(),
        State(ctx.state.clone()),
        Query(CreateFileQuery {
            name: "cover".to_string(),
        }),
        image_headers("image/png"),
        Bytes::from_static(b"png"),
    )
    .await
    .unwrap();
    let id = ctx.article(&writer.id, ArticleKind::Open, "Soon gone", true).await;
    ctx.repo.add_comment(id, &reader.id, "Nice").await.unwrap();

    let forbidden = handlers::users::delete_user(
        reader.clone(),
        State(ctx.state.clone()),
        Path(writer.id.clone()),
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let status =
        handlers::users::delete_user(admin, State(ctx.state.clone()), Path(writer.id.clone()))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    assert!(ctx.repo.get_user(&writer.id).await.unwrap().is_none());
    assert!(ctx.repo.get_file(file.id).await.unwrap().is_none());
    assert!(ctx.repo.get_article(id).await.unwrap().is_none());
    assert!(ctx.repo.list_comments(id).await.unwrap().is_empty());
    assert!(ctx.blobs.is_empty().await);
}
