use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::AppError;

// --- Permission Levels ---

/// PermissionLevel
///
/// Ordinal role gating endpoint access. Comparisons use the declaration order,
/// so `PermissionLevel::Writer >= PermissionLevel::User` holds. Serialized as
/// its number (0..=3) on the wire and stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PermissionLevel {
    #[default]
    User = 0,
    Writer = 1,
    Admin = 2,
    Superadmin = 3,
}

impl PermissionLevel {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl TryFrom<u8> for PermissionLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PermissionLevel::User),
            1 => Ok(PermissionLevel::Writer),
            2 => Ok(PermissionLevel::Admin),
            3 => Ok(PermissionLevel::Superadmin),
            other => Err(format!("Unknown permission level {other}.")),
        }
    }
}

impl TryFrom<i16> for PermissionLevel {
    type Error = String;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map_err(|_| format!("Unknown permission level {value}."))
            .and_then(PermissionLevel::try_from)
    }
}

impl From<PermissionLevel> for u8 {
    fn from(level: PermissionLevel) -> Self {
        level as u8
    }
}

// --- Users ---

/// User
///
/// The persisted account. The e-mail address is the primary key. Never
/// serialized: `password_hash` must not leave the server, use [`UserInfo`].
#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub password_hash: String,
    pub name: String,
    pub permission_level: PermissionLevel,
    pub avatar: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            permission_level: self.permission_level,
            avatar: self.avatar,
        }
    }
}

/// UserInfo
///
/// Public projection of a user, embedded as `author` / `user` in articles and comments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    #[ts(type = "number")]
    #[schema(value_type = u8)]
    pub permission_level: PermissionLevel,
    pub avatar: Option<Uuid>,
}

/// Insert payload for a new account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: String,
    pub password_hash: String,
    pub name: String,
    pub permission_level: PermissionLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthRegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    #[ts(optional)]
    pub name: Option<String>,
}

impl AuthRegisterRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if !is_valid_email(&self.email) {
            return Err(AppError::BadRequest("email must be a valid email".to_string()));
        }
        let length = self.password.chars().count();
        if !(8..=20).contains(&length) {
            return Err(AppError::BadRequest(
                "password must be between 8 and 20 characters".to_string(),
            ));
        }
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        Ok(())
    }

    /// The display name to store: the given one, or the local part of the address.
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.email.split('@').next().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthRegisterResponse {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthLoginRequest {
    pub email: String,
    pub password: String,
}

impl AuthLoginRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.is_empty() {
            return Err(AppError::BadRequest("email is a required field".to_string()));
        }
        if self.password.is_empty() {
            return Err(AppError::BadRequest("password is a required field".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthLoginResponse {
    pub jwt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateUserRequest {
    pub name: String,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_name(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePermissionLevelRequest {
    pub permission_level: u8,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    /// Only return users at or above this level.
    pub min_permission_level: Option<u8>,
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListUsersResponse {
    pub users: Vec<UserInfo>,
    pub count: i64,
}

// --- Labels ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Label {
    pub id: Uuid,
    pub name: String,
    pub background_color: String,
    pub text_color: String,
}

/// LabelRequest
///
/// Payload for both creating and updating a label. All fields are required.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LabelRequest {
    pub name: String,
    pub background_color: String,
    pub text_color: String,
}

impl LabelRequest {
    /// Strips surrounding whitespace so `" News "` and `"News"` are one name.
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            background_color: self.background_color.trim().to_string(),
            text_color: self.text_color.trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        for (field, value) in [
            ("name", &self.name),
            ("backgroundColor", &self.background_color),
            ("textColor", &self.text_color),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::BadRequest(format!("{field} is a required field")));
            }
            if value.chars().count() > 64 {
                return Err(AppError::BadRequest(format!(
                    "{field} must be at most 64 characters"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListLabelsResponse {
    pub labels: Vec<Label>,
}

// --- Files ---

/// FileInfo
///
/// Metadata of a stored blob. The bytes themselves live in the configured `BlobStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct FileInfo {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub owner: String,
    pub size: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub owner: String,
    pub size: i64,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreateFileQuery {
    /// Display name of the uploaded file.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateFileResponse {
    pub id: Uuid,
    pub size: i64,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListFilesQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListFilesResponse {
    pub files: Vec<FileInfo>,
    pub count: i64,
}

// --- Articles ---

/// ArticleKind
///
/// The discriminator stored in the `kind` column and sent as `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ArticleKind {
    Open,
    Closed,
}

impl ArticleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleKind::Open => "open",
            ArticleKind::Closed => "closed",
        }
    }
}

impl fmt::Display for ArticleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ArticleKind::Open),
            "closed" => Ok(ArticleKind::Closed),
            other => Err(format!("unknown article kind '{other}'")),
        }
    }
}

/// ContentSection
///
/// Addresses one text column of an article body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSection {
    /// The whole body of an open article.
    Full,
    /// The public teaser of a closed article.
    Teaser,
    /// The part of a closed article reserved for signed-in readers.
    Gated,
}

/// ArticleBody
///
/// The discriminated content of an article. Open articles have a single body;
/// closed articles split into a public teaser and a gated remainder.
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleBody {
    Open {
        content: String,
    },
    Closed {
        open_content: String,
        closed_content: String,
    },
}

impl ArticleBody {
    pub fn empty(kind: ArticleKind) -> Self {
        match kind {
            ArticleKind::Open => ArticleBody::Open {
                content: String::new(),
            },
            ArticleKind::Closed => ArticleBody::Closed {
                open_content: String::new(),
                closed_content: String::new(),
            },
        }
    }

    pub fn kind(&self) -> ArticleKind {
        match self {
            ArticleBody::Open { .. } => ArticleKind::Open,
            ArticleBody::Closed { .. } => ArticleKind::Closed,
        }
    }

    /// The markdown a reader receives. The gated part of a closed article is
    /// appended only when `include_gated` is set.
    pub fn render(&self, include_gated: bool) -> String {
        match self {
            ArticleBody::Open { content } => content.clone(),
            ArticleBody::Closed {
                open_content,
                closed_content,
            } => {
                if include_gated {
                    format!("{open_content}{closed_content}")
                } else {
                    open_content.clone()
                }
            }
        }
    }

    /// The section a content update writes to. Open articles ignore the flag.
    pub fn section_for(kind: ArticleKind, gated: bool) -> ContentSection {
        match (kind, gated) {
            (ArticleKind::Open, _) => ContentSection::Full,
            (ArticleKind::Closed, true) => ContentSection::Gated,
            (ArticleKind::Closed, false) => ContentSection::Teaser,
        }
    }

    /// Replaces one section. Returns false if the section does not exist on this kind.
    pub fn replace(&mut self, section: ContentSection, text: String) -> bool {
        match (self, section) {
            (ArticleBody::Open { content }, ContentSection::Full) => *content = text,
            (ArticleBody::Closed { open_content, .. }, ContentSection::Teaser) => {
                *open_content = text
            }
            (ArticleBody::Closed { closed_content, .. }, ContentSection::Gated) => {
                *closed_content = text
            }
            _ => return false,
        }
        true
    }
}

/// ArticleInfo
///
/// Metadata of an article as returned by the API, with author and labels resolved.
/// `score` is only present in ranked listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ArticleInfo {
    pub id: Uuid,
    pub title: String,
    pub author: UserInfo,
    #[serde(rename = "type")]
    pub kind: ArticleKind,
    pub visible: bool,
    pub labels: Vec<Label>,
    pub main_image: Option<Uuid>,
    pub views: i64,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub score: Option<f64>,
}

/// Article
///
/// A fully loaded article: metadata plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub info: ArticleInfo,
    pub body: ArticleBody,
}

impl Article {
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn author_id(&self) -> &str {
        &self.info.author.id
    }

    pub fn visible(&self) -> bool {
        self.info.visible
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreateArticleQuery {
    /// Create a closed (gated) article. Any value except `false`/`0` counts as set.
    pub closed: Option<String>,
}

impl CreateArticleQuery {
    pub fn kind(&self) -> ArticleKind {
        if query_flag(self.closed.as_deref()) {
            ArticleKind::Closed
        } else {
            ArticleKind::Open
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ContentQuery {
    /// Target the gated section of a closed article.
    pub closed: Option<String>,
}

impl ContentQuery {
    pub fn gated(&self) -> bool {
        query_flag(self.closed.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateArticleResponse {
    pub id: Uuid,
}

/// UpdateArticleRequest
///
/// Partial update. `mainImage: null` clears the image, an absent field leaves it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateArticleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub labels: Option<Vec<Uuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub visible: Option<bool>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(type = "string | null")]
    #[schema(value_type = Option<Uuid>)]
    pub main_image: Option<Option<Uuid>>,
}

impl UpdateArticleRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(AppError::BadRequest("title must be at least 1 characters".to_string()));
            }
            if title.chars().count() > 200 {
                return Err(AppError::BadRequest(
                    "title must be at most 200 characters".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ChangeAuthorRequest {
    pub author: String,
}

/// ListArticlesQuery
///
/// Query string of the ranked listing. Unset modifiers fall back to `RankingWeights::default()`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(rename_all = "camelCase")]
pub struct ListArticlesQuery {
    pub page: Option<u32>,
    pub length: Option<u32>,
    /// Comma-separated label ids; an article matches if it carries any of them.
    pub labels: Option<String>,
    /// Only articles written by this user.
    pub author: Option<String>,
    pub date_diff_modifier: Option<f64>,
    pub views_modifier: Option<f64>,
    pub random_modifier: Option<f64>,
}

impl ListArticlesQuery {
    pub fn label_ids(&self) -> Result<Vec<Uuid>, AppError> {
        let Some(raw) = self.labels.as_deref() else {
            return Ok(vec![]);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                Uuid::parse_str(s)
                    .map_err(|_| AppError::BadRequest(format!("'{s}' is not a valid label id")))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListArticlesResponse {
    pub articles: Vec<ArticleInfo>,
}

// --- Comments ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub user: UserInfo,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub text: String,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.text.trim().is_empty() {
            return Err(AppError::BadRequest("text must be at least 1 characters".to_string()));
        }
        if self.text.chars().count() > 5000 {
            return Err(AppError::BadRequest("text must be at most 5000 characters".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListCommentsResponse {
    pub comments: Vec<Comment>,
}

// --- Paging ---

/// Page
///
/// A validated offset/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: i64,
    pub limit: i64,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 20;
    pub const MAX_SIZE: u32 = 100;

    pub fn new(page: Option<u32>, size: Option<u32>) -> Result<Self, AppError> {
        let size = size.unwrap_or(Self::DEFAULT_SIZE);
        if size == 0 || size > Self::MAX_SIZE {
            return Err(AppError::BadRequest(format!(
                "page size must be between 1 and {}",
                Self::MAX_SIZE
            )));
        }
        let page = page.unwrap_or(0);
        Ok(Self {
            offset: i64::from(page) * i64::from(size),
            limit: i64::from(size),
        })
    }
}

// --- Helpers ---

/// Presence-style query flag: `?closed`, `?closed=1`, `?closed=true` are set,
/// `?closed=false` and `?closed=0` are not.
fn query_flag(raw: Option<&str>) -> bool {
    match raw {
        None => false,
        Some(value) => !matches!(value.trim().to_ascii_lowercase().as_str(), "false" | "0"),
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("name must be at least 1 characters".to_string()));
    }
    if name.chars().count() > 100 {
        return Err(AppError::BadRequest("name must be at most 100 characters".to_string()));
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}
