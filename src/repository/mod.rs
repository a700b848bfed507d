use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    access::VisibilityScope,
    error::AppError,
    models::{
        Article, ArticleInfo, ArticleKind, Comment, ContentSection, FileInfo, Label, LabelRequest,
        NewFile, NewUser, Page, PermissionLevel, UpdateArticleRequest, User,
    },
    ranking::RankingWeights,
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

pub type RepoResult<T> = Result<T, AppError>;

/// ArticleQuery
///
/// Everything the ranked listing needs: who may see what, optional author and
/// label filters, the page window and the score weights.
#[derive(Debug, Clone)]
pub struct ArticleQuery {
    pub scope: VisibilityScope,
    pub author: Option<String>,
    /// Match articles carrying any of these labels. Empty means no label filter.
    pub labels: Vec<Uuid>,
    pub page: Page,
    pub weights: RankingWeights,
}

/// Repository Trait
///
/// The contract for all persistence operations. Handlers talk to `Arc<dyn Repository>`
/// and never to a concrete database. Permission decisions are NOT made here; the
/// caller resolves them through `access` before reading or writing.
///
/// **Send + Sync + async_trait** make the trait object shareable across Axum's
/// task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: &str) -> RepoResult<Option<User>>;
    // Fails with 409 if the address is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    // Ordered by address. Returns the page and the total matching count.
    async fn list_users(
        &self,
        min_level: Option<PermissionLevel>,
        page: Page,
    ) -> RepoResult<(Vec<User>, i64)>;
    async fn update_user_name(&self, id: &str, name: &str) -> RepoResult<Option<User>>;
    async fn set_permission_level(
        &self,
        id: &str,
        level: PermissionLevel,
    ) -> RepoResult<Option<User>>;
    async fn set_avatar(&self, id: &str, avatar: Option<Uuid>) -> RepoResult<Option<User>>;
    // Cascades to the user's articles, comments and file records.
    async fn delete_user(&self, id: &str) -> RepoResult<bool>;

    // --- Files ---
    async fn create_file(&self, file: NewFile) -> RepoResult<FileInfo>;
    async fn get_file(&self, id: Uuid) -> RepoResult<Option<FileInfo>>;
    // Newest first. Returns the page and the owner's total file count.
    async fn list_files(&self, owner: &str, page: Page) -> RepoResult<(Vec<FileInfo>, i64)>;
    async fn file_ids_owned_by(&self, owner: &str) -> RepoResult<Vec<Uuid>>;
    // Records replaced bytes: new content type and size.
    async fn update_file(
        &self,
        id: Uuid,
        mime_type: &str,
        size: i64,
    ) -> RepoResult<Option<FileInfo>>;
    async fn delete_file(&self, id: Uuid) -> RepoResult<bool>;

    // --- Labels ---
    // Ordered by name.
    async fn list_labels(&self) -> RepoResult<Vec<Label>>;
    async fn create_label(&self, label: LabelRequest) -> RepoResult<Label>;
    async fn update_label(&self, id: Uuid, label: LabelRequest) -> RepoResult<Option<Label>>;
    // Also detaches the label from every article.
    async fn delete_label(&self, id: Uuid) -> RepoResult<bool>;

    // --- Articles ---
    async fn create_article(&self, author: &str, kind: ArticleKind) -> RepoResult<Uuid>;
    async fn get_article(&self, id: Uuid) -> RepoResult<Option<Article>>;
    // Ranked by score, highest first. Every entry carries its `score`.
    async fn list_articles(&self, query: &ArticleQuery) -> RepoResult<Vec<ArticleInfo>>;
    // Applies the present fields of the patch. Label ids must already be validated.
    async fn update_article(&self, id: Uuid, patch: &UpdateArticleRequest) -> RepoResult<bool>;
    // Returns false if the article is missing or has no such section.
    async fn set_article_content(
        &self,
        id: Uuid,
        section: ContentSection,
        text: &str,
    ) -> RepoResult<bool>;
    async fn set_article_author(&self, id: Uuid, author: &str) -> RepoResult<bool>;
    async fn record_view(&self, id: Uuid) -> RepoResult<()>;
    // Cascades to comments and label links.
    async fn delete_article(&self, id: Uuid) -> RepoResult<bool>;

    // --- Comments ---
    // Oldest first.
    async fn list_comments(&self, article_id: Uuid) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, article_id: Uuid, comment_id: Uuid) -> RepoResult<Option<Comment>>;
    async fn add_comment(&self, article_id: Uuid, author: &str, text: &str) -> RepoResult<Comment>;
    async fn delete_comment(&self, comment_id: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
