use std::collections::HashSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use tempfile::TempDir;
use urlyn_auth::{AuthError, Authenticator, NewAccount};
use urlyn_config::AuthConfig;
use urlyn_database::test_utils::create_test_db;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn default_auth_config() -> AuthConfig {
    AuthConfig {
        session_ttl_seconds: 3_600,
    }
}

fn account(email: &str, password: &str) -> NewAccount {
    NewAccount {
        email: email.to_string(),
        password: password.to_string(),
        display_name: None,
        persona: None,
    }
}

struct TestContext {
    pool: SqlitePool,
    authenticator: Authenticator,
    _temp_dir: TempDir,
    config: AuthConfig,
}

impl TestContext {
    async fn new_default() -> Self {
        let (pool, temp_dir) = create_test_db().await;
        let config = default_auth_config();
        let authenticator = Authenticator::new(pool.clone(), &config);

        Self {
            pool,
            authenticator,
            _temp_dir: temp_dir,
            config,
        }
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }
}

#[tokio::test]
async fn register_persists_user_and_password_identity() -> TestResult {
    let ctx = TestContext::new_default().await;

    let user = ctx
        .authenticator()
        .register(NewAccount {
            email: "alice@example.com".to_string(),
            password: "s3cret".to_string(),
            display_name: Some("Alice".to_string()),
            persona: Some("researcher".to_string()),
        })
        .await?;

    let row = sqlx::query("SELECT email, display_name, persona FROM users WHERE id = ?")
        .bind(user.id)
        .fetch_one(ctx.pool())
        .await?;
    let email: String = row.get("email");
    let persona: Option<String> = row.try_get("persona")?;
    assert_eq!(email, "alice@example.com");
    assert_eq!(persona.as_deref(), Some("researcher"));

    let identity =
        sqlx::query("SELECT provider, provider_uid, secret FROM user_identities WHERE user_id = ?")
            .bind(user.id)
            .fetch_one(ctx.pool())
            .await?;
    let provider: String = identity.get("provider");
    let provider_uid: String = identity.get("provider_uid");
    let secret: String = identity.get("secret");

    assert_eq!(provider, "password");
    assert_eq!(provider_uid, "alice@example.com");
    assert!(secret.starts_with("$argon2"), "secret must be an argon2 hash");

    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_email() -> TestResult {
    let ctx = TestContext::new_default().await;
    ctx.authenticator()
        .register(account("alice@example.com", "s3cret"))
        .await?;

    let err = ctx
        .authenticator()
        .register(account("alice@example.com", "another"))
        .await
        .expect_err("expected duplicate email to fail");
    assert!(matches!(err, AuthError::UserExists));

    let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(user_count, 1, "no additional users should be created");

    Ok(())
}

#[tokio::test]
async fn register_salts_identical_passwords_differently() -> TestResult {
    let ctx = TestContext::new_default().await;

    let first = ctx
        .authenticator()
        .register(account("alice@example.com", "s3cret"))
        .await?;
    let second = ctx
        .authenticator()
        .register(account("bob@example.com", "s3cret"))
        .await?;

    let first_secret: String =
        sqlx::query_scalar("SELECT secret FROM user_identities WHERE user_id = ?")
            .bind(first.id)
            .fetch_one(ctx.pool())
            .await?;
    let second_secret: String =
        sqlx::query_scalar("SELECT secret FROM user_identities WHERE user_id = ?")
            .bind(second.id)
            .fetch_one(ctx.pool())
            .await?;

    assert_ne!(first_secret, second_secret);
    argon2::password_hash::PasswordHash::new(&first_secret)?;
    argon2::password_hash::PasswordHash::new(&second_secret)?;

    Ok(())
}

#[tokio::test]
async fn login_returns_session_for_valid_credentials() -> TestResult {
    let ctx = TestContext::new_default().await;
    ctx.authenticator()
        .register(account("alice@example.com", "s3cret"))
        .await?;

    let session = ctx
        .authenticator()
        .login("alice@example.com", "s3cret")
        .await?;

    let ttl = Duration::seconds(ctx.config.session_ttl_seconds as i64);
    let remaining = session.expires_at - Utc::now();
    assert!(
        (remaining - ttl).num_seconds().abs() <= 2,
        "session ttl should respect configuration"
    );

    let stored_expires: String =
        sqlx::query_scalar("SELECT expires_at FROM sessions WHERE token = ?")
            .bind(&session.token)
            .fetch_one(ctx.pool())
            .await?;
    let parsed = DateTime::parse_from_rfc3339(&stored_expires)?.with_timezone(&Utc);
    assert_eq!(parsed, session.expires_at);

    Ok(())
}

#[tokio::test]
async fn login_rejects_incorrect_password() -> TestResult {
    let ctx = TestContext::new_default().await;
    ctx.authenticator()
        .register(account("alice@example.com", "s3cret"))
        .await?;

    let err = ctx
        .authenticator()
        .login("alice@example.com", "bad-secret")
        .await
        .expect_err("expected invalid password");
    assert!(matches!(err, AuthError::InvalidCredentials));

    let session_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
        .fetch_one(ctx.pool())
        .await?;
    assert_eq!(session_count, 0, "no sessions should be issued on failure");

    Ok(())
}

#[tokio::test]
async fn login_rejects_unknown_email() -> TestResult {
    let ctx = TestContext::new_default().await;
    let err = ctx
        .authenticator()
        .login("unknown@example.com", "secret")
        .await
        .expect_err("expected unknown email to fail");
    assert!(matches!(err, AuthError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn authenticate_token_resolves_user_for_active_session() -> TestResult {
    let ctx = TestContext::new_default().await;
    let user = ctx
        .authenticator()
        .register(account("alice@example.com", "s3cret"))
        .await?;
    let session = ctx
        .authenticator()
        .login("alice@example.com", "s3cret")
        .await?;

    let (resolved_user, resolved_session) = ctx
        .authenticator()
        .authenticate_token(&session.token)
        .await?;

    assert_eq!(resolved_user.id, user.id);
    assert_eq!(resolved_user.public_id, user.public_id);
    assert_eq!(resolved_session.token, session.token);
    Ok(())
}

#[tokio::test]
async fn authenticate_token_deletes_expired_sessions() -> TestResult {
    let ctx = TestContext::new_default().await;
    let user = ctx
        .authenticator()
        .register(account("alice@example.com", "s3cret"))
        .await?;

    let token = "expired-token";
    let created_at = (Utc::now() - Duration::hours(2)).to_rfc3339();
    let expires_at = (Utc::now() - Duration::hours(1)).to_rfc3339();

    sqlx::query(
        "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token)
    .bind(user.id)
    .bind(&created_at)
    .bind(&expires_at)
    .execute(ctx.pool())
    .await?;

    let err = ctx
        .authenticator()
        .authenticate_token(token)
        .await
        .expect_err("expired token should be rejected");
    assert!(matches!(err, AuthError::SessionExpired));

    let remaining: Option<i64> = sqlx::query_scalar("SELECT 1 FROM sessions WHERE token = ?")
        .bind(token)
        .fetch_optional(ctx.pool())
        .await?;
    assert!(remaining.is_none(), "expired session should be removed");

    Ok(())
}

#[tokio::test]
async fn authenticate_token_rejects_unknown_token() -> TestResult {
    let ctx = TestContext::new_default().await;
    let err = ctx
        .authenticator()
        .authenticate_token("missing-token")
        .await
        .expect_err("unknown token should not authenticate");
    assert!(matches!(err, AuthError::SessionNotFound));
    Ok(())
}

#[tokio::test]
async fn session_tokens_are_unique_and_urlsafe() -> TestResult {
    let ctx = TestContext::new_default().await;
    ctx.authenticator()
        .register(account("alice@example.com", "s3cret"))
        .await?;

    let mut tokens = HashSet::new();
    for _ in 0..5 {
        let session = ctx
            .authenticator()
            .login("alice@example.com", "s3cret")
            .await?;
        assert!(
            URL_SAFE_NO_PAD.decode(session.token.as_bytes()).is_ok(),
            "token should be URL safe base64"
        );
        assert!(
            tokens.insert(session.token.clone()),
            "tokens should be unique per session"
        );
    }
    Ok(())
}
