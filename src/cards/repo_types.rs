use sqlx::FromRow;
use time::OffsetDateTime;

use crate::db::PageParams;

#[derive(Debug, Clone, FromRow)]
pub struct CardRow {
    pub activities_no: String,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub marked: Option<OffsetDateTime>, // null = not completed
    pub marked_status: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewCard {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub marked: Option<OffsetDateTime>,
    pub marked_status: Option<String>,
}

/// `None` title/content keep the stored value.
#[derive(Debug, Clone)]
pub struct CardChanges {
    pub activities_no: String,
    pub author_id: i64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub marked: Option<OffsetDateTime>,
    pub marked_status: Option<String>,
}

/// Listing filter. `author_id <= 0` lists every author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CardsParam {
    pub author_id: i64,
    pub page: PageParams,
}

/// Sequence number following `existing` stored cards.
pub fn next_sequence(existing: i64) -> i64 {
    existing.max(0) + 1
}

pub fn format_activities_no(seq: i64) -> String {
    format!("AC-{seq:04}")
}
