#![allow(dead_code)]

use gazette::{
    AppState,
    auth::{self, AuthUser},
    config::AppConfig,
    models::{ArticleKind, NewUser, PermissionLevel, UpdateArticleRequest, User},
    repository::{MemoryRepository, Repository, RepositoryState},
    storage::{BlobState, MemoryBlobStore},
};
use std::sync::Arc;
use uuid::Uuid;

pub const PASSWORD: &str = "correct-horse";

/// TestContext
///
/// An `AppState` backed by the in-memory repository and blob store, with
/// typed handles kept for direct inspection.
pub struct TestContext {
    pub state: AppState,
    pub repo: Arc<MemoryRepository>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_blobs(MemoryBlobStore::new())
    }

    pub fn with_blobs(blobs: MemoryBlobStore) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let blobs = Arc::new(blobs);
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            blobs: blobs.clone() as BlobState,
            config: AppConfig::default(),
        };
        Self { state, repo, blobs }
    }

    /// Creates an account with the shared test password.
    pub async fn user(&self, email: &str, level: PermissionLevel) -> AuthUser {
        let password_hash = auth::hash_password(PASSWORD.to_string())
            .await
            .expect("hashing");
        let user = self
            .repo
            .create_user(NewUser {
                id: email.to_string(),
                password_hash,
                name: email.split('@').next().unwrap_or_default().to_string(),
                permission_level: level,
            })
            .await
            .expect("create user");
        AuthUser::from(&user)
    }

    pub async fn stored_user(&self, email: &str) -> User {
        self.repo
            .get_user(email)
            .await
            .expect("repo")
            .expect("user exists")
    }

    /// `Authorization` header value for the given account.
    pub async fn bearer(&self, email: &str) -> String {
        let user = self.stored_user(email).await;
        let token = auth::issue_token(&user, &self.state.config).expect("token");
        format!("Bearer {token}")
    }

    /// Creates an article with a title and visibility in one go.
    pub async fn article(
        &self,
        author: &str,
        kind: ArticleKind,
        title: &str,
        visible: bool,
    ) -> Uuid {
        let id = self
            .repo
            .create_article(author, kind)
            .await
            .expect("create article");
        self.repo
            .update_article(
                id,
                &UpdateArticleRequest {
                    title: Some(title.to_string()),
                    visible: Some(visible),
                    ..Default::default()
                },
            )
            .await
            .expect("update article");
        id
    }
}
