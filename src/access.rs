//! Permission policy.
//!
//! Every read/write decision about articles, comments, files and accounts is a
//! pure function of the caller's identity and the target record, so handlers and
//! repositories share one definition of who may do what. Route tiers (see
//! `routes`) only enforce a minimum level; ownership rules live here.

use crate::{
    auth::AuthUser,
    models::{Article, Comment, FileInfo, PermissionLevel, User},
};

/// VisibilityScope
///
/// Which articles a listing may include, derived from the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Only `visible = true` articles.
    PublicOnly,
    /// Visible articles plus hidden ones authored by the given user.
    PublicOrAuthoredBy(String),
    /// No visibility filter.
    Everything,
}

impl VisibilityScope {
    pub fn admits(&self, visible: bool, author: &str) -> bool {
        match self {
            VisibilityScope::PublicOnly => visible,
            VisibilityScope::PublicOrAuthoredBy(user) => visible || user == author,
            VisibilityScope::Everything => true,
        }
    }
}

/// Hidden articles are drafts: their author and the editorial staff (Writer+) see them.
pub fn listing_scope(viewer: Option<&AuthUser>) -> VisibilityScope {
    match viewer {
        None => VisibilityScope::PublicOnly,
        Some(user) if user.level >= PermissionLevel::Writer => VisibilityScope::Everything,
        Some(user) => VisibilityScope::PublicOrAuthoredBy(user.id.clone()),
    }
}

pub fn can_view_article(viewer: Option<&AuthUser>, article: &Article) -> bool {
    listing_scope(viewer).admits(article.visible(), article.author_id())
}

/// The gated section of a closed article is for signed-in readers only.
pub fn can_read_gated_content(viewer: Option<&AuthUser>) -> bool {
    viewer.is_some()
}

pub fn can_edit_article(user: &AuthUser, article: &Article) -> bool {
    user.level >= PermissionLevel::Admin || user.id == article.author_id()
}

pub fn can_change_author(user: &AuthUser) -> bool {
    user.level >= PermissionLevel::Admin
}

/// Only accounts that may publish can receive an article.
pub fn can_own_articles(user: &User) -> bool {
    user.permission_level >= PermissionLevel::Writer
}

pub fn can_comment(viewer: Option<&AuthUser>, article: &Article) -> bool {
    viewer.is_some() && can_view_article(viewer, article)
}

pub fn can_delete_comment(user: &AuthUser, comment: &Comment, article: &Article) -> bool {
    user.level >= PermissionLevel::Admin
        || user.id == comment.user.id
        || user.id == article.author_id()
}

pub fn can_manage_file(user: &AuthUser, file: &FileInfo) -> bool {
    user.level >= PermissionLevel::Admin || user.id == file.owner
}

/// Profile changes and deletion: oneself, or someone strictly above the target.
pub fn can_manage_user(actor: &AuthUser, target: &User) -> bool {
    actor.id == target.id || actor.level > target.permission_level
}

/// The superadmin account is provisioned from configuration and is permanent.
pub fn can_delete_user(actor: &AuthUser, target: &User) -> bool {
    target.permission_level != PermissionLevel::Superadmin && can_manage_user(actor, target)
}

/// can_assign_level
///
/// An admin may move an account below themself to any level below their own.
/// Nobody changes their own level, and `Superadmin` is never granted.
pub fn can_assign_level(actor: &AuthUser, target: &User, new_level: PermissionLevel) -> bool {
    actor.level >= PermissionLevel::Admin
        && actor.id != target.id
        && actor.level > target.permission_level
        && new_level < actor.level
        && new_level != PermissionLevel::Superadmin
}
