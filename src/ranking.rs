//! Article ranking.
//!
//! `score = recency / age_hours + views / views_weight + jitter * U[0, 1)`
//!
//! Fresh articles get a large recency term that decays hyperbolically, popular
//! articles gain linearly with their view count, and the random term shuffles
//! articles with similar scores between requests. The Postgres repository
//! evaluates the same formula in SQL; [`score`] is the reference used by the
//! in-memory repository and by tests.

use chrono::{DateTime, Utc};

use crate::{error::AppError, models::ListArticlesQuery};

/// RankingWeights
///
/// The three modifiers of the score formula, as accepted on the listing query string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    /// Numerator of the recency term (`dateDiffModifier`).
    pub recency: f64,
    /// Divisor of the view count (`viewsModifier`). Must be positive.
    pub views: f64,
    /// Amplitude of the random term (`randomModifier`).
    pub jitter: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            recency: 100.0,
            views: 100.0,
            jitter: 2.0,
        }
    }
}

impl RankingWeights {
    pub fn from_query(query: &ListArticlesQuery) -> Result<Self, AppError> {
        let defaults = Self::default();
        let weights = Self {
            recency: query.date_diff_modifier.unwrap_or(defaults.recency),
            views: query.views_modifier.unwrap_or(defaults.views),
            jitter: query.random_modifier.unwrap_or(defaults.jitter),
        };
        weights.validate()?;
        Ok(weights)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let all_finite = [self.recency, self.views, self.jitter]
            .iter()
            .all(|w| w.is_finite());
        if !all_finite {
            return Err(AppError::BadRequest(
                "ranking modifiers must be finite numbers".to_string(),
            ));
        }
        if self.views <= 0.0 {
            return Err(AppError::BadRequest("viewsModifier must be greater than 0".to_string()));
        }
        if self.recency < 0.0 || self.jitter < 0.0 {
            return Err(AppError::BadRequest(
                "dateDiffModifier and randomModifier must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Whole hours between creation and `now`, never less than one.
pub fn age_in_hours(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - created_at).num_hours();
    hours.max(1) as f64
}

/// score
///
/// `jitter_sample` is expected in `[0, 1)`.
pub fn score(weights: &RankingWeights, age_hours: f64, views: i64, jitter_sample: f64) -> f64 {
    weights.recency / age_hours.max(1.0)
        + views as f64 / weights.views
        + jitter_sample * weights.jitter
}
