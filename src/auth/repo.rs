use tracing::debug;

use crate::auth::repo_types::{NewUser, User};
use crate::db::Repository;
use crate::error::AppError;

const USER_COLUMNS: &str = "id, name, email, password_hash, created_at, updated_at";

impl Repository<'_> {
    /// Find a user by (normalized) email.
    pub async fn check_user(&mut self, email: &str) -> Result<Option<User>, AppError> {
        let query =
            self.select_query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"));
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.conn())
            .await?;
        debug!(email, found = user.is_some(), "check_user");
        Ok(user)
    }

    pub async fn find_user(&mut self, id: i64) -> Result<Option<User>, AppError> {
        let query = self.select_query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"));
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.conn())
            .await?;
        Ok(user)
    }

    pub async fn create_user(&mut self, new: NewUser) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (name, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.name)
        .bind(new.email)
        .bind(new.password_hash)
        .fetch_one(self.conn())
        .await?;
        Ok(user)
    }
}
