use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ArticleQuery, RepoResult, Repository};
use crate::{
    error::AppError,
    models::{
        Article, ArticleBody, ArticleInfo, ArticleKind, Comment, ContentSection, FileInfo, Label,
        LabelRequest, NewFile, NewUser, Page, PermissionLevel, UpdateArticleRequest, User,
    },
    ranking,
};

struct StoredArticle {
    id: Uuid,
    title: String,
    author: String,
    visible: bool,
    main_image: Option<Uuid>,
    views: i64,
    labels: Vec<Uuid>,
    body: ArticleBody,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct StoredComment {
    id: Uuid,
    article_id: Uuid,
    author: String,
    text: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    users: HashMap<String, User>,
    files: HashMap<Uuid, FileInfo>,
    labels: HashMap<Uuid, Label>,
    articles: HashMap<Uuid, StoredArticle>,
    // Insertion order doubles as the tie-breaker for equal timestamps.
    comments: Vec<StoredComment>,
}

impl Store {
    fn missing_reference() -> AppError {
        AppError::BadRequest("Referenced resource does not exist.".to_string())
    }

    fn article_info(&self, article: &StoredArticle, score: Option<f64>) -> RepoResult<ArticleInfo> {
        let author = self
            .users
            .get(&article.author)
            .ok_or_else(|| AppError::Internal(format!("article {} has no author", article.id)))?;

        let mut labels: Vec<Label> = article
            .labels
            .iter()
            .filter_map(|id| self.labels.get(id).cloned())
            .collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ArticleInfo {
            id: article.id,
            title: article.title.clone(),
            author: author.info(),
            kind: article.body.kind(),
            visible: article.visible,
            labels,
            main_image: article.main_image,
            views: article.views,
            created_at: article.created_at,
            updated_at: article.updated_at,
            score,
        })
    }

    fn comment(&self, comment: &StoredComment) -> RepoResult<Comment> {
        let author = self
            .users
            .get(&comment.author)
            .ok_or_else(|| AppError::Internal(format!("comment {} has no author", comment.id)))?;
        Ok(Comment {
            id: comment.id,
            user: author.info(),
            content: comment.text.clone(),
            created_at: comment.created_at,
        })
    }

    /// Nulls every reference to a removed file, like `ON DELETE SET NULL`.
    fn detach_file(&mut self, file_id: Uuid) {
        for user in self.users.values_mut() {
            if user.avatar == Some(file_id) {
                user.avatar = None;
            }
        }
        for article in self.articles.values_mut() {
            if article.main_image == Some(file_id) {
                article.main_image = None;
            }
        }
    }

    fn ensure_label_name_free(&self, name: &str, except: Option<Uuid>) -> RepoResult<()> {
        let taken = self
            .labels
            .values()
            .any(|label| label.name == name && Some(label.id) != except);
        if taken {
            return Err(AppError::Conflict(
                "A label with this name already exists.".to_string(),
            ));
        }
        Ok(())
    }
}

fn window<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

/// MemoryRepository
///
/// An in-process `Repository` with the same referential rules as the SQL schema
/// (unique keys, cascades, `SET NULL` references). Used by the test suite and
/// for running the API without a database.
#[derive(Default)]
pub struct MemoryRepository {
    store: RwLock<Store>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves an article's creation time, so ranking by age can be exercised.
    pub async fn backdate_article(&self, id: Uuid, created_at: DateTime<Utc>) -> bool {
        let mut store = self.store.write().await;
        match store.articles.get_mut(&id) {
            Some(article) => {
                article.created_at = created_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    // --- Users ---

    async fn get_user(&self, id: &str) -> RepoResult<Option<User>> {
        Ok(self.store.read().await.users.get(id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        if store.users.contains_key(&user.id) {
            return Err(AppError::Conflict("E-mail is already in use.".to_string()));
        }
        let user = User {
            id: user.id,
            password_hash: user.password_hash,
            name: user.name,
            permission_level: user.permission_level,
            avatar: None,
            created_at: Utc::now(),
        };
        store.users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn list_users(
        &self,
        min_level: Option<PermissionLevel>,
        page: Page,
    ) -> RepoResult<(Vec<User>, i64)> {
        let min_level = min_level.unwrap_or_default();
        let store = self.store.read().await;

        let mut users: Vec<User> = store
            .users
            .values()
            .filter(|user| user.permission_level >= min_level)
            .cloned()
            .collect();
        users.sort_by(|a, b| a.id.cmp(&b.id));

        let count = users.len() as i64;
        Ok((window(users, page), count))
    }

    async fn update_user_name(&self, id: &str, name: &str) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(id).map(|user| {
            user.name = name.to_string();
            user.clone()
        }))
    }

    async fn set_permission_level(
        &self,
        id: &str,
        level: PermissionLevel,
    ) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        Ok(store.users.get_mut(id).map(|user| {
            user.permission_level = level;
            user.clone()
        }))
    }

    async fn set_avatar(&self, id: &str, avatar: Option<Uuid>) -> RepoResult<Option<User>> {
        let mut store = self.store.write().await;
        if let Some(file_id) = avatar {
            if !store.files.contains_key(&file_id) {
                return Err(Store::missing_reference());
            }
        }
        Ok(store.users.get_mut(id).map(|user| {
            user.avatar = avatar;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: &str) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.users.remove(id).is_none() {
            return Ok(false);
        }

        let owned_files: Vec<Uuid> = store
            .files
            .values()
            .filter(|file| file.owner == id)
            .map(|file| file.id)
            .collect();
        for file_id in owned_files {
            store.files.remove(&file_id);
            store.detach_file(file_id);
        }

        store.articles.retain(|_, article| article.author != id);
        let Store {
            articles, comments, ..
        } = &mut *store;
        comments
            .retain(|comment| comment.author != id && articles.contains_key(&comment.article_id));

        Ok(true)
    }

    // --- Files ---

    async fn create_file(&self, file: NewFile) -> RepoResult<FileInfo> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(&file.owner) {
            return Err(Store::missing_reference());
        }
        if store.files.contains_key(&file.id) {
            return Err(AppError::Conflict("Resource already exists.".to_string()));
        }
        let now = Utc::now();
        let info = FileInfo {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            owner: file.owner,
            size: file.size,
            created_at: now,
            updated_at: now,
        };
        store.files.insert(info.id, info.clone());
        Ok(info)
    }

    async fn get_file(&self, id: Uuid) -> RepoResult<Option<FileInfo>> {
        Ok(self.store.read().await.files.get(&id).cloned())
    }

    async fn list_files(&self, owner: &str, page: Page) -> RepoResult<(Vec<FileInfo>, i64)> {
        let store = self.store.read().await;
        let mut files: Vec<FileInfo> = store
            .files
            .values()
            .filter(|file| file.owner == owner)
            .cloned()
            .collect();
        files.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let count = files.len() as i64;
        Ok((window(files, page), count))
    }

    async fn file_ids_owned_by(&self, owner: &str) -> RepoResult<Vec<Uuid>> {
        let store = self.store.read().await;
        Ok(store
            .files
            .values()
            .filter(|file| file.owner == owner)
            .map(|file| file.id)
            .collect())
    }

    async fn update_file(
        &self,
        id: Uuid,
        mime_type: &str,
        size: i64,
    ) -> RepoResult<Option<FileInfo>> {
        let mut store = self.store.write().await;
        Ok(store.files.get_mut(&id).map(|file| {
            file.mime_type = mime_type.to_string();
            file.size = size;
            file.updated_at = Utc::now();
            file.clone()
        }))
    }

    async fn delete_file(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.files.remove(&id).is_none() {
            return Ok(false);
        }
        store.detach_file(id);
        Ok(true)
    }

    // --- Labels ---

    async fn list_labels(&self) -> RepoResult<Vec<Label>> {
        let store = self.store.read().await;
        let mut labels: Vec<Label> = store.labels.values().cloned().collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(labels)
    }

    async fn create_label(&self, label: LabelRequest) -> RepoResult<Label> {
        let mut store = self.store.write().await;
        store.ensure_label_name_free(&label.name, None)?;
        let label = Label {
            id: Uuid::new_v4(),
            name: label.name,
            background_color: label.background_color,
            text_color: label.text_color,
        };
        store.labels.insert(label.id, label.clone());
        Ok(label)
    }

    async fn update_label(&self, id: Uuid, label: LabelRequest) -> RepoResult<Option<Label>> {
        let mut store = self.store.write().await;
        if !store.labels.contains_key(&id) {
            return Ok(None);
        }
        store.ensure_label_name_free(&label.name, Some(id))?;
        let updated = Label {
            id,
            name: label.name,
            background_color: label.background_color,
            text_color: label.text_color,
        };
        store.labels.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_label(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.labels.remove(&id).is_none() {
            return Ok(false);
        }
        for article in store.articles.values_mut() {
            article.labels.retain(|label| *label != id);
        }
        Ok(true)
    }

    // --- Articles ---

    async fn create_article(&self, author: &str, kind: ArticleKind) -> RepoResult<Uuid> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(author) {
            return Err(Store::missing_reference());
        }
        let now = Utc::now();
        let id = Uuid::new_v4();
        store.articles.insert(
            id,
            StoredArticle {
                id,
                title: String::new(),
                author: author.to_string(),
                visible: false,
                main_image: None,
                views: 0,
                labels: vec![],
                body: ArticleBody::empty(kind),
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn get_article(&self, id: Uuid) -> RepoResult<Option<Article>> {
        let store = self.store.read().await;
        let Some(article) = store.articles.get(&id) else {
            return Ok(None);
        };
        Ok(Some(Article {
            info: store.article_info(article, None)?,
            body: article.body.clone(),
        }))
    }

    async fn list_articles(&self, query: &ArticleQuery) -> RepoResult<Vec<ArticleInfo>> {
        let store = self.store.read().await;
        let now = Utc::now();

        let mut ranked = Vec::new();
        for article in store.articles.values() {
            if !query.scope.admits(article.visible, &article.author) {
                continue;
            }
            if query.author.as_deref().is_some_and(|author| author != article.author) {
                continue;
            }
            if !query.labels.is_empty()
                && !article.labels.iter().any(|l| query.labels.contains(l))
            {
                continue;
            }
            let score = ranking::score(
                &query.weights,
                ranking::age_in_hours(article.created_at, now),
                article.views,
                rand::random::<f64>(),
            );
            ranked.push(store.article_info(article, Some(score))?);
        }

        ranked.sort_by(|a, b| {
            let (a, b) = (a.score.unwrap_or_default(), b.score.unwrap_or_default());
            b.total_cmp(&a)
        });
        Ok(window(ranked, query.page))
    }

    async fn update_article(&self, id: Uuid, patch: &UpdateArticleRequest) -> RepoResult<bool> {
        let mut store = self.store.write().await;

        if let Some(Some(image)) = patch.main_image {
            if !store.files.contains_key(&image) {
                return Err(Store::missing_reference());
            }
        }
        if let Some(labels) = &patch.labels {
            if labels.iter().any(|label| !store.labels.contains_key(label)) {
                return Err(Store::missing_reference());
            }
        }

        let Some(article) = store.articles.get_mut(&id) else {
            return Ok(false);
        };
        if let Some(title) = &patch.title {
            article.title = title.clone();
        }
        if let Some(visible) = patch.visible {
            article.visible = visible;
        }
        if let Some(main_image) = patch.main_image {
            article.main_image = main_image;
        }
        if let Some(labels) = &patch.labels {
            let mut unique = Vec::with_capacity(labels.len());
            for label in labels {
                if !unique.contains(label) {
                    unique.push(*label);
                }
            }
            article.labels = unique;
        }
        article.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_article_content(
        &self,
        id: Uuid,
        section: ContentSection,
        text: &str,
    ) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let Some(article) = store.articles.get_mut(&id) else {
            return Ok(false);
        };
        if !article.body.replace(section, text.to_string()) {
            return Ok(false);
        }
        article.updated_at = Utc::now();
        Ok(true)
    }

    async fn set_article_author(&self, id: Uuid, author: &str) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if !store.users.contains_key(author) {
            return Err(Store::missing_reference());
        }
        let Some(article) = store.articles.get_mut(&id) else {
            return Ok(false);
        };
        article.author = author.to_string();
        article.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_view(&self, id: Uuid) -> RepoResult<()> {
        let mut store = self.store.write().await;
        if let Some(article) = store.articles.get_mut(&id) {
            article.views += 1;
        }
        Ok(())
    }

    async fn delete_article(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.articles.remove(&id).is_none() {
            return Ok(false);
        }
        store.comments.retain(|comment| comment.article_id != id);
        Ok(true)
    }

    // --- Comments ---

    async fn list_comments(&self, article_id: Uuid) -> RepoResult<Vec<Comment>> {
        let store = self.store.read().await;
        let mut comments: Vec<&StoredComment> = store
            .comments
            .iter()
            .filter(|comment| comment.article_id == article_id)
            .collect();
        comments.sort_by_key(|comment| comment.created_at);
        comments.into_iter().map(|c| store.comment(c)).collect()
    }

    async fn get_comment(&self, article_id: Uuid, comment_id: Uuid) -> RepoResult<Option<Comment>> {
        let store = self.store.read().await;
        store
            .comments
            .iter()
            .find(|comment| comment.id == comment_id && comment.article_id == article_id)
            .map(|comment| store.comment(comment))
            .transpose()
    }

    async fn add_comment(&self, article_id: Uuid, author: &str, text: &str) -> RepoResult<Comment> {
        let mut store = self.store.write().await;
        if !store.articles.contains_key(&article_id) || !store.users.contains_key(author) {
            return Err(Store::missing_reference());
        }
        let comment = StoredComment {
            id: Uuid::new_v4(),
            article_id,
            author: author.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        let rendered = store.comment(&comment)?;
        store.comments.push(comment);
        Ok(rendered)
    }

    async fn delete_comment(&self, comment_id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let before = store.comments.len();
        store.comments.retain(|comment| comment.id != comment_id);
        Ok(store.comments.len() != before)
    }
}
