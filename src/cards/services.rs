use anyhow::Context;
use sqlx::PgPool;
use time::{
    format_description::FormatItem, macros::format_description, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};
use tracing::{info, warn};

use crate::{
    cards::{
        dto::{Card, CardsPage, CreateCardRequest, UpdateCardRequest},
        repo_types::{CardChanges, CardRow, CardsParam, NewCard},
    },
    db::{exec_tx, PageParams, Repository},
    error::AppError,
};

/// Wire format of every card timestamp, interpreted as UTC.
const DATETIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Blank or missing input means "not marked".
pub(crate) fn parse_marked(raw: Option<&str>) -> Result<Option<OffsetDateTime>, AppError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let parsed = PrimitiveDateTime::parse(raw, DATETIME_FORMAT).map_err(|e| {
        AppError::Validation(format!(
            "invalid date format for marked, expected YYYY-MM-DD HH:MM:SS: {e}"
        ))
    })?;
    Ok(Some(parsed.assume_utc()))
}

pub(crate) fn format_timestamp(ts: OffsetDateTime) -> Result<String, AppError> {
    let formatted = ts
        .to_offset(UtcOffset::UTC)
        .format(DATETIME_FORMAT)
        .context("format card timestamp")?;
    Ok(formatted)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn require_author(author_id: i64) -> Result<(), AppError> {
    if author_id <= 0 {
        return Err(AppError::NotFound(format!("author id {author_id}")));
    }
    Ok(())
}

pub(crate) fn to_card(row: CardRow) -> Result<Card, AppError> {
    Ok(Card {
        marked: row.marked.map(format_timestamp).transpose()?,
        created_at: format_timestamp(row.created_at)?,
        updated_at: format_timestamp(row.updated_at)?,
        deleted_at: row.deleted_at.map(format_timestamp).transpose()?,
        activities_no: row.activities_no,
        title: row.title,
        content: row.content,
        author_id: row.author_id,
        marked_status: row.marked_status,
    })
}

/// A card is marked at most once; after that it is read-only.
pub(crate) fn ensure_unmarked(card: &CardRow) -> Result<(), AppError> {
    if card.marked.is_some() {
        warn!(activities_no = %card.activities_no, "update of marked card rejected");
        return Err(AppError::Conflict(format!(
            "card number {} can't update data that's already marked",
            card.activities_no
        )));
    }
    Ok(())
}

/// Relative URL of a listing page, carrying the author filter along.
pub(crate) fn page_link(author_id: i64, page: PageParams) -> String {
    let mut link = format!("/card?page={}&size={}", page.page, page.size);
    if author_id > 0 {
        link.push_str(&format!("&author_id={author_id}"));
    }
    link
}

pub async fn create_card(
    db: &PgPool,
    author_id: i64,
    req: CreateCardRequest,
) -> Result<Card, AppError> {
    require_author(author_id)?;
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }
    let new = NewCard {
        author_id,
        title,
        content: req.content,
        marked: parse_marked(req.marked.as_deref())?,
        marked_status: non_blank(req.marked_status),
    };

    let row = exec_tx(db, move |mut repo| Box::pin(async move { repo.create_card(new).await }))
        .await?;
    info!(activities_no = %row.activities_no, author_id, "card created");
    to_card(row)
}

/// Rejects cards that are already marked.
pub async fn update_card(
    db: &PgPool,
    author_id: i64,
    req: UpdateCardRequest,
) -> Result<(), AppError> {
    require_author(author_id)?;
    let activities_no = req.activities_no.trim().to_string();
    if activities_no.is_empty() {
        return Err(AppError::NotFound("card activities no".into()));
    }
    let marked = parse_marked(req.marked.as_deref())?;
    let changes = CardChanges {
        activities_no,
        author_id,
        title: req.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()),
        content: req.content,
        marked,
        marked_status: non_blank(req.marked_status),
    };

    exec_tx(db, move |repo| {
        Box::pin(async move {
            let mut repo = repo.for_update();
            let current = repo
                .check_card(&changes.activities_no, author_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "card {} from author id {author_id}",
                        changes.activities_no
                    ))
                })?;

            ensure_unmarked(&current)?;
            repo.update_card(changes).await?;
            Ok(())
        })
    })
    .await?;
    Ok(())
}

pub async fn get_all_cards(db: &PgPool, param: CardsParam) -> Result<CardsPage, AppError> {
    let param = CardsParam {
        page: param.page.normalized(),
        ..param
    };

    let mut conn = db.acquire().await?;
    let (rows, total) = Repository::new(&mut *conn).get_cards(param).await?;
    let data = rows.into_iter().map(to_card).collect::<Result<Vec<_>, _>>()?;

    let page = param.page;
    let next = page
        .has_next(total)
        .then(|| page_link(param.author_id, PageParams::new(page.page + 1, page.size)));
    let prev = page
        .has_prev()
        .then(|| page_link(param.author_id, PageParams::new(page.page - 1, page.size)));

    Ok(CardsPage {
        next,
        prev,
        total,
        data,
    })
}

pub async fn get_card(db: &PgPool, author_id: i64, activities_no: &str) -> Result<Card, AppError> {
    let mut conn = db.acquire().await?;
    let row = Repository::new(&mut *conn)
        .check_card(activities_no, author_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("card {activities_no}")))?;
    to_card(row)
}

/// Soft delete; the row stays and keeps its number.
pub async fn delete_card(db: &PgPool, author_id: i64, activities_no: &str) -> Result<(), AppError> {
    require_author(author_id)?;
    let mut conn = db.acquire().await?;
    let deleted = Repository::new(&mut *conn)
        .soft_delete_card(activities_no, author_id)
        .await?;
    if !deleted {
        return Err(AppError::NotFound(format!(
            "card {activities_no} from author id {author_id}"
        )));
    }
    info!(activities_no, author_id, "card deleted");
    Ok(())
}
