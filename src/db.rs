use futures::future::BoxFuture;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, error};

use crate::error::AppError;

/// Repository bound to one connection, either pooled or inside a transaction.
///
/// Query methods live next to their domain (`auth::repo`, `cards::repo`).
pub struct Repository<'c> {
    conn: &'c mut PgConnection,
    for_update: bool,
}

impl<'c> Repository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self {
            conn,
            for_update: false,
        }
    }

    /// Row-level reads issued from now on take `FOR UPDATE` locks.
    /// Only meaningful inside a transaction.
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        &mut *self.conn
    }

    /// Appends the lock clause to a single-row select when in for-update mode.
    pub(crate) fn select_query(&self, query: &str) -> String {
        if self.for_update {
            format!("{query} FOR UPDATE")
        } else {
            query.to_string()
        }
    }
}

/// Runs `f` inside a transaction: commit on `Ok`, roll back on `Err`.
///
/// The closure receives a transaction-bound [`Repository`] and must return a
/// boxed future, e.g. `|mut repo| Box::pin(async move { repo.create_user(..).await })`.
pub async fn exec_tx<T, F>(pool: &PgPool, f: F) -> Result<T, AppError>
where
    F: for<'c> FnOnce(Repository<'c>) -> BoxFuture<'c, Result<T, AppError>>,
{
    let mut tx = pool.begin().await?;
    let result = f(Repository::new(&mut *tx)).await;

    match result {
        Ok(value) => {
            tx.commit().await?;
            debug!("transaction committed");
            Ok(value)
        }
        Err(err) => {
            if let Err(rb_err) = tx.rollback().await {
                error!(error = %err, rollback_error = %rb_err, "transaction rollback failed");
            } else {
                debug!(error = %err, "transaction rolled back");
            }
            Err(err)
        }
    }
}

/// One page of a listing, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: i64,
    pub size: i64,
}

impl PageParams {
    pub const DEFAULT_PAGE: i64 = 1;
    pub const DEFAULT_SIZE: i64 = 10;
    pub const MAX_SIZE: i64 = 100;

    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    /// Non-positive values fall back to the defaults; size is capped.
    pub fn normalized(self) -> Self {
        let page = if self.page <= 0 {
            Self::DEFAULT_PAGE
        } else {
            self.page
        };
        let size = if self.size <= 0 {
            Self::DEFAULT_SIZE
        } else {
            self.size.min(Self::MAX_SIZE)
        };
        Self { page, size }
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.size)
    }

    pub fn has_next(&self, total: i64) -> bool {
        self.page.saturating_mul(self.size) < total
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PAGE, Self::DEFAULT_SIZE)
    }
}

/// Appends `LIMIT`/`OFFSET` for an already normalized page.
pub fn push_pagination(builder: &mut QueryBuilder<'_, Postgres>, page: PageParams) {
    builder.push(" LIMIT ").push_bind(page.limit());
    if page.offset() > 0 {
        builder.push(" OFFSET ").push_bind(page.offset());
    }
}
