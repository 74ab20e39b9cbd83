//! Sample data generator.
//!
//! Creates a `sample_users` table in a SQLite file and fills it with
//! generated users, giving the copy path something realistic to move.

use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{Sqlite, SqliteConnectOptions, SqlitePoolOptions};
use sqlx::QueryBuilder;
use tracing::info;

use crate::error::{CopyError, Result};

/// Name of the generated table.
pub const SAMPLE_TABLE: &str = "sample_users";

/// Rows per generated insert statement.
const SAMPLE_BATCH_SIZE: u64 = 100;

const CREATE_SAMPLE_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS "sample_users" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "name" TEXT NOT NULL,
    "email" TEXT NOT NULL UNIQUE,
    "age" INTEGER NOT NULL,
    "active" BOOLEAN NOT NULL DEFAULT 1,
    "created_at" DATETIME NOT NULL,
    "updated_at" DATETIME NOT NULL
)"#;

/// One generated user; `n` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SampleUser {
    name: String,
    email: String,
    age: i64,
    active: bool,
}

impl SampleUser {
    fn generate(n: u64) -> Self {
        let i = n - 1;
        Self {
            name: format!("User {}", n),
            email: format!("user{}@example.com", n),
            age: 20 + (i % 40) as i64,
            active: i % 2 == 0,
        }
    }
}

/// Create `sample_users` in the SQLite database at `path` and insert `count` users.
///
/// The file and table are created when missing. Returns the number of rows
/// inserted.
pub async fn create_sample_data(path: &str, count: u64) -> Result<u64> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(|e| CopyError::connection("sample", format!("{}: {}", path, e)))?;

    sqlx::query(CREATE_SAMPLE_TABLE)
        .execute(&pool)
        .await
        .map_err(|e| CopyError::schema(SAMPLE_TABLE, e))?;

    let mut start = 1;
    while start <= count {
        let end = (start + SAMPLE_BATCH_SIZE - 1).min(count);
        let now = Utc::now().naive_utc();

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            r#"INSERT INTO "sample_users" ("name", "email", "age", "active", "created_at", "updated_at") "#,
        );
        qb.push_values((start..=end).map(SampleUser::generate), |mut b, user| {
            b.push_bind(user.name)
                .push_bind(user.email)
                .push_bind(user.age)
                .push_bind(user.active)
                .push_bind(now)
                .push_bind(now);
        });

        qb.build()
            .execute(&pool)
            .await
            .map_err(|e| CopyError::insert(SAMPLE_TABLE, start, end, e))?;

        info!("Inserted records {}-{}", start, end);
        start = end + 1;
    }

    pool.close().await;

    info!(
        "Created sample table '{}' with {} records in {}",
        SAMPLE_TABLE, count, path
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[test]
    fn test_generate_user() {
        let first = SampleUser::generate(1);
        assert_eq!(first.name, "User 1");
        assert_eq!(first.email, "user1@example.com");
        assert_eq!(first.age, 20);
        assert!(first.active);

        let second = SampleUser::generate(2);
        assert_eq!(second.age, 21);
        assert!(!second.active);

        assert_eq!(SampleUser::generate(41).age, 20);
    }

    #[tokio::test]
    async fn test_create_sample_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.db");
        let path = path.to_str().unwrap();

        let inserted = create_sample_data(path, 250).await.unwrap();
        assert_eq!(inserted, 250);

        let pool = SqlitePoolOptions::new()
            .connect_with(SqliteConnectOptions::new().filename(path))
            .await
            .unwrap();
        let row = sqlx::query("SELECT COUNT(*), MAX(id), SUM(active) FROM sample_users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.get::<i64, _>(0), 250);
        assert_eq!(row.get::<i64, _>(1), 250);
        assert_eq!(row.get::<i64, _>(2), 125);
    }

    #[tokio::test]
    async fn test_zero_count_creates_empty_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.db");
        let path = path.to_str().unwrap();

        assert_eq!(create_sample_data(path, 0).await.unwrap(), 0);
        assert!(std::path::Path::new(path).exists());
    }
}
