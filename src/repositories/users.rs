// src/repositories/users.rs

use sqlx::PgPool;

use crate::models::user::User;

pub(crate) const COLUMNS: &str = "id, name, email, register_number, department, year, role";

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}
