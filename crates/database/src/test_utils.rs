//! Test helpers shared by the workspace's integration tests.

use crate::connection::prepare_database;
use crate::entities::User;
use crate::migrations::run_migrations;
use sqlx::SqlitePool;
use tempfile::TempDir;
use urlyn_config::DatabaseConfig;

/// Create a fully migrated file-backed database in a temp directory.
///
/// The `TempDir` must be kept alive for as long as the pool is in use.
pub async fn create_test_db() -> (SqlitePool, TempDir) {
    let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");

    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 5,
    };

    let pool = prepare_database(&config)
        .await
        .expect("failed to create test database");
    run_migrations(&pool)
        .await
        .expect("failed to run migrations");

    (pool, temp_dir)
}

/// Insert a user row and return it.
pub async fn create_test_user(pool: &SqlitePool, email: &str, display_name: &str) -> User {
    let public_id = cuid2::create_id();
    let now = chrono::Utc::now().to_rfc3339();

    let id = sqlx::query(
        r#"
        INSERT INTO users (public_id, email, display_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(email)
    .bind(display_name)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .expect("failed to insert test user")
    .last_insert_rowid();

    User {
        id,
        public_id,
        email: email.to_string(),
        display_name: Some(display_name.to_string()),
        persona: None,
        created_at: now.clone(),
        updated_at: now,
    }
}
