//! Database layer
//!
//! SQLite is the default backend; MySQL is supported for larger installs.
//! Schema changes live in [`migrations`] and every table has a repository
//! under [`repositories`].

/// Run `$body` against the concrete pool behind a [`DynDatabasePool`].
///
/// The body is expanded once per driver with `$conn` bound to `&SqlitePool`
/// or `&MySqlPool`, so the same query text serves both backends.
macro_rules! with_pool {
    ($pool:expr, $conn:ident => $body:expr) => {
        match $pool.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $conn = $pool
                    .as_sqlite()
                    .ok_or_else(|| anyhow::anyhow!("SQLite pool unavailable"))?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $conn = $pool
                    .as_mysql()
                    .ok_or_else(|| anyhow::anyhow!("MySQL pool unavailable"))?;
                $body
            }
        }
    };
}

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};

/// Id of the row created by an INSERT, for either driver
pub trait LastInsertId {
    fn inserted_id(&self) -> i64;
}

impl LastInsertId for sqlx::sqlite::SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl LastInsertId for sqlx::mysql::MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Whether a repository error was caused by a UNIQUE constraint
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|e| e.downcast_ref::<sqlx::Error>())
        .any(|e| matches!(e, sqlx::Error::Database(db) if db.is_unique_violation()))
}

/// Parse a status column stored as text
pub(crate) fn parse_column<T>(value: String, column: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr<Err = anyhow::Error>,
{
    value
        .parse()
        .map_err(|e: anyhow::Error| e.context(format!("Invalid {} in database", column)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unique_violation_detection() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE codes (code TEXT UNIQUE)").await.unwrap();
        pool.execute("INSERT INTO codes (code) VALUES ('a')").await.unwrap();

        let err = pool
            .execute("INSERT INTO codes (code) VALUES ('a')")
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let other = anyhow::anyhow!("something else");
        assert!(!is_unique_violation(&other));
    }

    #[test]
    fn test_parse_column() {
        let role: crate::models::UserRole = parse_column("hr".to_string(), "role").unwrap();
        assert_eq!(role, crate::models::UserRole::Hr);

        let err = parse_column::<crate::models::UserRole>("author".to_string(), "role").unwrap_err();
        assert!(err.to_string().contains("role"));
    }
}
