use sqlx::{Postgres, QueryBuilder};
use tracing::debug;

use crate::{
    cards::repo_types::{
        format_activities_no, next_sequence, CardChanges, CardRow, CardsParam, NewCard,
    },
    db::{push_pagination, Repository},
    error::AppError,
};

const CARD_COLUMNS: &str = "activities_no, author_id, title, content, marked, marked_status, \
                            created_at, updated_at, deleted_at";

fn push_card_filters(builder: &mut QueryBuilder<'_, Postgres>, param: &CardsParam) {
    builder.push(" WHERE deleted_at IS NULL");
    if param.author_id > 0 {
        builder.push(" AND author_id = ").push_bind(param.author_id);
    }
}

/// `COUNT(*)` over the same rows `list_query` pages through.
pub(crate) fn count_query(param: &CardsParam) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM cards");
    push_card_filters(&mut builder, param);
    builder
}

pub(crate) fn list_query(param: &CardsParam) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!("SELECT {CARD_COLUMNS} FROM cards"));
    push_card_filters(&mut builder, param);
    builder.push(" ORDER BY created_at, activities_no");
    push_pagination(&mut builder, param.page.normalized());
    builder
}

impl Repository<'_> {
    /// Numbers the card from the count of all stored rows, soft-deleted ones
    /// included. Must run inside a transaction; the table lock is held until commit.
    pub async fn create_card(&mut self, new: NewCard) -> Result<CardRow, AppError> {
        sqlx::query("LOCK TABLE cards IN SHARE ROW EXCLUSIVE MODE")
            .execute(self.conn())
            .await?;
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cards")
            .fetch_one(self.conn())
            .await?;
        let activities_no = format_activities_no(next_sequence(existing));

        let card = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            INSERT INTO cards (activities_no, author_id, title, content, marked, marked_status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(&activities_no)
        .bind(new.author_id)
        .bind(new.title)
        .bind(new.content)
        .bind(new.marked)
        .bind(new.marked_status)
        .fetch_one(self.conn())
        .await?;
        debug!(%activities_no, author_id = card.author_id, "card inserted");
        Ok(card)
    }

    /// Live card owned by `author_id`.
    pub async fn check_card(
        &mut self,
        activities_no: &str,
        author_id: i64,
    ) -> Result<Option<CardRow>, AppError> {
        let query = self.select_query(&format!(
            "SELECT {CARD_COLUMNS} FROM cards \
             WHERE activities_no = $1 AND author_id = $2 AND deleted_at IS NULL"
        ));
        let card = sqlx::query_as::<_, CardRow>(&query)
            .bind(activities_no)
            .bind(author_id)
            .fetch_optional(self.conn())
            .await?;
        Ok(card)
    }

    pub async fn update_card(&mut self, changes: CardChanges) -> Result<CardRow, AppError> {
        let card = sqlx::query_as::<_, CardRow>(&format!(
            r#"
            UPDATE cards
               SET title = COALESCE($3, title),
                   content = COALESCE($4, content),
                   marked = $5,
                   marked_status = $6,
                   updated_at = now()
             WHERE activities_no = $1 AND author_id = $2 AND deleted_at IS NULL
            RETURNING {CARD_COLUMNS}
            "#
        ))
        .bind(&changes.activities_no)
        .bind(changes.author_id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(changes.marked)
        .bind(changes.marked_status)
        .fetch_optional(self.conn())
        .await?;
        card.ok_or_else(|| AppError::NotFound(format!("card {}", changes.activities_no)))
    }

    /// One page of live cards plus the unpaginated total.
    pub async fn get_cards(&mut self, param: CardsParam) -> Result<(Vec<CardRow>, i64), AppError> {
        let total: i64 = count_query(&param)
            .build_query_scalar()
            .fetch_one(self.conn())
            .await?;
        let rows = list_query(&param)
            .build_query_as::<CardRow>()
            .fetch_all(self.conn())
            .await?;
        debug!(author_id = param.author_id, total, returned = rows.len(), "get_cards");
        Ok((rows, total))
    }

    /// Returns `false` when no live card matched.
    pub async fn soft_delete_card(
        &mut self,
        activities_no: &str,
        author_id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE cards
               SET deleted_at = now(), updated_at = now()
             WHERE activities_no = $1 AND author_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(activities_no)
        .bind(author_id)
        .execute(self.conn())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PageParams;

    #[test]
    fn count_query_for_all_authors() {
        let param = CardsParam::default();
        assert_eq!(
            count_query(&param).sql(),
            "SELECT COUNT(*) FROM cards WHERE deleted_at IS NULL"
        );
    }

    #[test]
    fn count_and_list_share_the_author_filter() {
        let param = CardsParam {
            author_id: 3,
            page: PageParams::new(2, 5),
        };
        assert_eq!(
            count_query(&param).sql(),
            "SELECT COUNT(*) FROM cards WHERE deleted_at IS NULL AND author_id = $1"
        );
        let list = list_query(&param);
        let sql = list.sql();
        assert!(sql.starts_with("SELECT activities_no, author_id, title"));
        assert!(sql.ends_with(
            "WHERE deleted_at IS NULL AND author_id = $1 \
             ORDER BY created_at, activities_no LIMIT $2 OFFSET $3"
        ));
    }

    #[test]
    fn list_query_applies_page_defaults() {
        let param = CardsParam {
            author_id: 0,
            page: PageParams::new(0, 0),
        };
        assert!(list_query(&param)
            .sql()
            .ends_with("ORDER BY created_at, activities_no LIMIT $1"));
    }
}
