use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, query_builder::QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::{ArticleQuery, RepoResult, Repository};
use crate::{
    access::VisibilityScope,
    error::AppError,
    models::{
        Article, ArticleBody, ArticleInfo, ArticleKind, Comment, ContentSection, FileInfo, Label,
        LabelRequest, NewFile, NewUser, Page, PermissionLevel, UpdateArticleRequest, User,
        UserInfo,
    },
};

const UNIQUE_VIOLATION: &str = "23505";

const USER_COLUMNS: &str = "email, password_hash, name, permission_level, avatar_id, created_at";

const FILE_COLUMNS: &str = "id, name, mime_type, owner, size, created_at, updated_at";

const ARTICLE_INFO_COLUMNS: &str = r#"
    a.id, a.kind, a.title, a.visible, a.main_image, a.views, a.created_at, a.updated_at,
    u.email AS author_email, u.name AS author_name,
    u.permission_level AS author_level, u.avatar_id AS author_avatar
"#;

const COMMENT_COLUMNS: &str = r#"
    c.id, c.text, c.created_at,
    u.email AS author_email, u.name AS author_name,
    u.permission_level AS author_level, u.avatar_id AS author_avatar
"#;

// --- Row types ---
//
// Permission levels and article kinds are stored as SMALLINT / TEXT and decoded
// here, so a corrupted row surfaces as a 500 instead of a panic.

#[derive(FromRow)]
struct UserRow {
    email: String,
    password_hash: String,
    name: String,
    permission_level: i16,
    avatar_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.email,
            password_hash: row.password_hash,
            name: row.name,
            permission_level: PermissionLevel::try_from(row.permission_level)
                .map_err(AppError::Internal)?,
            avatar: row.avatar_id,
            created_at: row.created_at,
        })
    }
}

/// The author columns joined onto articles and comments.
#[derive(FromRow)]
struct AuthorColumns {
    author_email: String,
    author_name: String,
    author_level: i16,
    author_avatar: Option<Uuid>,
}

impl TryFrom<AuthorColumns> for UserInfo {
    type Error = AppError;

    fn try_from(row: AuthorColumns) -> Result<Self, Self::Error> {
        Ok(UserInfo {
            id: row.author_email,
            name: row.author_name,
            permission_level: PermissionLevel::try_from(row.author_level)
                .map_err(AppError::Internal)?,
            avatar: row.author_avatar,
        })
    }
}

#[derive(FromRow)]
struct ArticleInfoRow {
    id: Uuid,
    kind: String,
    title: String,
    visible: bool,
    main_image: Option<Uuid>,
    views: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[sqlx(flatten)]
    author: AuthorColumns,
    #[sqlx(default)]
    score: Option<f64>,
}

impl ArticleInfoRow {
    fn into_info(self, labels: Vec<Label>) -> RepoResult<ArticleInfo> {
        Ok(ArticleInfo {
            id: self.id,
            title: self.title,
            author: UserInfo::try_from(self.author)?,
            kind: self.kind.parse::<ArticleKind>().map_err(AppError::Internal)?,
            visible: self.visible,
            labels,
            main_image: self.main_image,
            views: self.views,
            created_at: self.created_at,
            updated_at: self.updated_at,
            score: self.score,
        })
    }
}

#[derive(FromRow)]
struct ArticleRow {
    #[sqlx(flatten)]
    info: ArticleInfoRow,
    content: Option<String>,
    open_content: Option<String>,
    closed_content: Option<String>,
}

#[derive(FromRow)]
struct ArticleLabelRow {
    article_id: Uuid,
    #[sqlx(flatten)]
    label: Label,
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    text: String,
    created_at: DateTime<Utc>,
    #[sqlx(flatten)]
    author: AuthorColumns,
}

impl TryFrom<CommentRow> for Comment {
    type Error = AppError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Comment {
            id: row.id,
            user: UserInfo::try_from(row.author)?,
            content: row.text,
            created_at: row.created_at,
        })
    }
}

/// Turns a unique-key violation into a 409 with a readable message.
fn conflict_on_unique(e: sqlx::Error, message: &str) -> AppError {
    let is_unique = e
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION);
    if is_unique {
        AppError::Conflict(message.to_string())
    } else {
        AppError::Database(e)
    }
}

fn section_column(section: ContentSection) -> (&'static str, ArticleKind) {
    match section {
        ContentSection::Full => ("content", ArticleKind::Open),
        ContentSection::Teaser => ("open_content", ArticleKind::Closed),
        ContentSection::Gated => ("closed_content", ArticleKind::Closed),
    }
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Queries are checked at
/// runtime (`query_as::<_, Row>`) and built with `QueryBuilder` where filters are optional.
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Labels of the given articles, grouped by article id and ordered by name.
    async fn labels_for(&self, article_ids: &[Uuid]) -> RepoResult<HashMap<Uuid, Vec<Label>>> {
        if article_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ArticleLabelRow>(
            r#"
            SELECT al.article_id, l.id, l.name, l.background_color, l.text_color
            FROM article_labels al
            JOIN labels l ON l.id = al.label_id
            WHERE al.article_id = ANY($1)
            ORDER BY l.name
            "#,
        )
        .bind(article_ids.to_vec())
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<Label>> = HashMap::new();
        for row in rows {
            grouped.entry(row.article_id).or_default().push(row.label);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users ---

    async fn get_user(&self, id: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let sql = format!(
            "INSERT INTO users (email, password_hash, name, permission_level) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.id)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(user.permission_level.as_i16())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, "E-mail is already in use."))?;
        User::try_from(row)
    }

    async fn list_users(
        &self,
        min_level: Option<PermissionLevel>,
        page: Page,
    ) -> RepoResult<(Vec<User>, i64)> {
        let min_level = min_level.unwrap_or_default().as_i16();

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE permission_level >= $1 \
             ORDER BY email OFFSET $2 LIMIT $3"
        );
        let users = sqlx::query_as::<_, UserRow>(&sql)
            .bind(min_level)
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect::<RepoResult<Vec<_>>>()?;

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE permission_level >= $1")
                .bind(min_level)
                .fetch_one(&self.pool)
                .await?;

        Ok((users, count))
    }

    async fn update_user_name(&self, id: &str, name: &str) -> RepoResult<Option<User>> {
        let sql = format!("UPDATE users SET name = $2 WHERE email = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn set_permission_level(
        &self,
        id: &str,
        level: PermissionLevel,
    ) -> RepoResult<Option<User>> {
        let sql = format!(
            "UPDATE users SET permission_level = $2 WHERE email = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(level.as_i16())
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn set_avatar(&self, id: &str, avatar: Option<Uuid>) -> RepoResult<Option<User>> {
        let sql =
            format!("UPDATE users SET avatar_id = $2 WHERE email = $1 RETURNING {USER_COLUMNS}");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(avatar)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn delete_user(&self, id: &str) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Files ---

    async fn create_file(&self, file: NewFile) -> RepoResult<FileInfo> {
        let sql = format!(
            "INSERT INTO files (id, name, mime_type, owner, size) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {FILE_COLUMNS}"
        );
        let info = sqlx::query_as::<_, FileInfo>(&sql)
            .bind(file.id)
            .bind(&file.name)
            .bind(&file.mime_type)
            .bind(&file.owner)
            .bind(file.size)
            .fetch_one(&self.pool)
            .await?;
        Ok(info)
    }

    async fn get_file(&self, id: Uuid) -> RepoResult<Option<FileInfo>> {
        let sql = format!("SELECT {FILE_COLUMNS} FROM files WHERE id = $1");
        let info = sqlx::query_as::<_, FileInfo>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(info)
    }

    async fn list_files(&self, owner: &str, page: Page) -> RepoResult<(Vec<FileInfo>, i64)> {
        let sql = format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE owner = $1 \
             ORDER BY created_at DESC, id OFFSET $2 LIMIT $3"
        );
        let files = sqlx::query_as::<_, FileInfo>(&sql)
            .bind(owner)
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE owner = $1")
            .bind(owner)
            .fetch_one(&self.pool)
            .await?;

        Ok((files, count))
    }

    async fn file_ids_owned_by(&self, owner: &str) -> RepoResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM files WHERE owner = $1")
            .bind(owner)
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn update_file(
        &self,
        id: Uuid,
        mime_type: &str,
        size: i64,
    ) -> RepoResult<Option<FileInfo>> {
        let sql = format!(
            "UPDATE files SET mime_type = $2, size = $3, updated_at = NOW() \
             WHERE id = $1 RETURNING {FILE_COLUMNS}"
        );
        let info = sqlx::query_as::<_, FileInfo>(&sql)
            .bind(id)
            .bind(mime_type)
            .bind(size)
            .fetch_optional(&self.pool)
            .await?;
        Ok(info)
    }

    async fn delete_file(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Labels ---

    async fn list_labels(&self) -> RepoResult<Vec<Label>> {
        let labels = sqlx::query_as::<_, Label>(
            "SELECT id, name, background_color, text_color FROM labels ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }

    async fn create_label(&self, label: LabelRequest) -> RepoResult<Label> {
        sqlx::query_as::<_, Label>(
            r#"
            INSERT INTO labels (id, name, background_color, text_color)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, background_color, text_color
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&label.name)
        .bind(&label.background_color)
        .bind(&label.text_color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "A label with this name already exists."))
    }

    async fn update_label(&self, id: Uuid, label: LabelRequest) -> RepoResult<Option<Label>> {
        sqlx::query_as::<_, Label>(
            r#"
            UPDATE labels SET name = $2, background_color = $3, text_color = $4
            WHERE id = $1
            RETURNING id, name, background_color, text_color
            "#,
        )
        .bind(id)
        .bind(&label.name)
        .bind(&label.background_color)
        .bind(&label.text_color)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "A label with this name already exists."))
    }

    async fn delete_label(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM labels WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Articles ---

    async fn create_article(&self, author: &str, kind: ArticleKind) -> RepoResult<Uuid> {
        let id = Uuid::new_v4();
        let (content, open_content, closed_content) = match kind {
            ArticleKind::Open => (Some(""), None, None),
            ArticleKind::Closed => (None, Some(""), Some("")),
        };

        sqlx::query(
            r#"
            INSERT INTO articles (id, kind, author, content, open_content, closed_content)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(id)
        .bind(kind.as_str())
        .bind(author)
        .bind(content)
        .bind(open_content)
        .bind(closed_content)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn get_article(&self, id: Uuid) -> RepoResult<Option<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_INFO_COLUMNS}, a.content, a.open_content, a.closed_content \
             FROM articles a JOIN users u ON u.email = a.author WHERE a.id = $1"
        );
        let Some(row) = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let labels = self.labels_for(&[id]).await?.remove(&id).unwrap_or_default();
        let info = row.info.into_info(labels)?;

        let body = match info.kind {
            ArticleKind::Open => ArticleBody::Open {
                content: row.content.unwrap_or_default(),
            },
            ArticleKind::Closed => ArticleBody::Closed {
                open_content: row.open_content.unwrap_or_default(),
                closed_content: row.closed_content.unwrap_or_default(),
            },
        };

        Ok(Some(Article { info, body }))
    }

    /// list_articles
    ///
    /// Scores every candidate in SQL with the same formula as `ranking::score`:
    /// `recency / max(floor(age_hours), 1) + views / views_weight + random() * jitter`.
    /// Filters are appended with `push_bind`, so no caller input reaches the SQL text.
    async fn list_articles(&self, query: &ArticleQuery) -> RepoResult<Vec<ArticleInfo>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT ");
        builder.push(ARTICLE_INFO_COLUMNS);
        builder.push(", (");
        builder.push_bind(query.weights.recency);
        builder.push("::float8 / GREATEST(FLOOR(EXTRACT(EPOCH FROM (NOW() - a.created_at))");
        builder.push(" / 3600), 1)::float8");
        builder.push(" + a.views::float8 / ");
        builder.push_bind(query.weights.views);
        builder.push("::float8 + RANDOM() * ");
        builder.push_bind(query.weights.jitter);
        builder.push("::float8) AS score");
        builder.push(" FROM articles a JOIN users u ON u.email = a.author WHERE TRUE");

        match &query.scope {
            VisibilityScope::PublicOnly => {
                builder.push(" AND a.visible");
            }
            VisibilityScope::PublicOrAuthoredBy(user) => {
                builder.push(" AND (a.visible OR a.author = ");
                builder.push_bind(user.clone());
                builder.push(")");
            }
            VisibilityScope::Everything => {}
        }

        if let Some(author) = &query.author {
            builder.push(" AND a.author = ");
            builder.push_bind(author.clone());
        }

        if !query.labels.is_empty() {
            builder.push(" AND EXISTS (SELECT 1 FROM article_labels al");
            builder.push(" WHERE al.article_id = a.id AND al.label_id = ANY(");
            builder.push_bind(query.labels.clone());
            builder.push("))");
        }

        builder.push(" ORDER BY score DESC OFFSET ");
        builder.push_bind(query.page.offset);
        builder.push(" LIMIT ");
        builder.push_bind(query.page.limit);

        let rows = builder
            .build_query_as::<ArticleInfoRow>()
            .fetch_all(&self.pool)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut labels = self.labels_for(&ids).await?;

        rows.into_iter()
            .map(|row| {
                let article_labels = labels.remove(&row.id).unwrap_or_default();
                row.into_info(article_labels)
            })
            .collect()
    }

    /// update_article
    ///
    /// Scalar fields use COALESCE for partial updates. A present `labels` list
    /// replaces the article's links inside the same transaction.
    async fn update_article(&self, id: Uuid, patch: &UpdateArticleRequest) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE articles SET
                title = COALESCE($2, title),
                visible = COALESCE($3, visible),
                main_image = CASE WHEN $4 THEN $5 ELSE main_image END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.visible)
        .bind(patch.main_image.is_some())
        .bind(patch.main_image.flatten())
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if !updated {
            return Ok(false);
        }

        if let Some(labels) = &patch.labels {
            sqlx::query("DELETE FROM article_labels WHERE article_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            if !labels.is_empty() {
                sqlx::query(
                    r#"
                    INSERT INTO article_labels (article_id, label_id)
                    SELECT $1, label_id FROM UNNEST($2::uuid[]) AS label_id
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(id)
                .bind(labels.clone())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(true)
    }

    async fn set_article_content(
        &self,
        id: Uuid,
        section: ContentSection,
        text: &str,
    ) -> RepoResult<bool> {
        // The column name comes from a closed enum, never from input.
        let (column, kind) = section_column(section);
        let sql = format!(
            "UPDATE articles SET {column} = $2, updated_at = NOW() WHERE id = $1 AND kind = $3"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(text)
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_article_author(&self, id: Uuid, author: &str) -> RepoResult<bool> {
        let result =
            sqlx::query("UPDATE articles SET author = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(author)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_view(&self, id: Uuid) -> RepoResult<()> {
        sqlx::query("UPDATE articles SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_article(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- Comments ---

    async fn list_comments(&self, article_id: Uuid) -> RepoResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON u.email = c.author \
             WHERE c.article_id = $1 ORDER BY c.created_at, c.id"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(article_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Comment::try_from)
            .collect()
    }

    async fn get_comment(&self, article_id: Uuid, comment_id: Uuid) -> RepoResult<Option<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON u.email = c.author \
             WHERE c.article_id = $1 AND c.id = $2"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(article_id)
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?
            .map(Comment::try_from)
            .transpose()
    }

    /// add_comment
    ///
    /// Inserts and returns the comment joined with its author in one round trip.
    async fn add_comment(&self, article_id: Uuid, author: &str, text: &str) -> RepoResult<Comment> {
        let sql = format!(
            r#"
            WITH c AS (
                INSERT INTO comments (id, article_id, author, text)
                VALUES ($1, $2, $3, $4)
                RETURNING id, author, text, created_at
            )
            SELECT {COMMENT_COLUMNS} FROM c JOIN users u ON u.email = c.author
            "#
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(article_id)
            .bind(author)
            .bind(text)
            .fetch_one(&self.pool)
            .await?;
        Comment::try_from(row)
    }

    async fn delete_comment(&self, comment_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(comment_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
