use std::sync::{Arc, LazyLock};

use kauth::{
    AuthMethod, ClientContext, DemoAccount, JwtConfig, Kauth, KauthBuilder, LedgerConfig, LogKind,
    MemoryStore, SecurityTest, SqliteStore,
};
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

const TEST_HS256_SECRET: &[u8] = b"this_is_a_test_secret_key_for_hs256_jwt_tokens_not_for_prod";
const EMAIL: &str = "demo@kauth.dev";
const PASSWORD: &str = "password123";

static ACCOUNT: LazyLock<DemoAccount> =
    LazyLock::new(|| DemoAccount::demo().expect("demo account"));

fn config(method: AuthMethod) -> LedgerConfig {
    LedgerConfig::default()
        .account(ACCOUNT.clone())
        .auth_method(method)
        .jwt(JwtConfig::new_hs256(TEST_HS256_SECRET.to_vec()).with_issuer("kauth-test"))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn open(pool: &SqlitePool, method: AuthMethod) -> Kauth<SqliteStore> {
    init_tracing();
    KauthBuilder::new()
        .with_sqlite_pool(pool.clone())
        .with_config(config(method))
        .apply_migrations(true)
        .build()
        .await
        .unwrap()
}

async fn pool() -> SqlitePool {
    SqlitePool::connect("sqlite::memory:").await.unwrap()
}

#[tokio::test]
async fn test_login_with_session_artifact() {
    let pool = pool().await;
    let kauth = open(&pool, AuthMethod::Session).await;
    let ledger = kauth.ledger();

    assert!(kauth.health_check().await.is_ok());
    assert!(ledger.login(EMAIL, PASSWORD).await);
    assert!(ledger.is_authenticated().await);

    let logs = ledger.logs().await;
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].kind, LogKind::LoginSuccess);
    assert_eq!(logs[0].email.as_deref(), Some(EMAIL));
    assert_eq!(logs[0].auth_method, AuthMethod::Session);

    let keys = kauth.store().keys().await.unwrap();
    assert!(keys.contains(&"kauth_session".to_string()));
    assert!(keys.contains(&"kauth_logs".to_string()));
}

#[tokio::test]
async fn test_three_failures_ban_address() {
    let pool = pool().await;
    let kauth = open(&pool, AuthMethod::Session).await;
    let ledger = kauth.ledger();
    let address = ledger.client().address.clone();

    for _ in 0..3 {
        assert!(!ledger.login(EMAIL, "wrong").await);
    }

    assert!(ledger.is_banned(&address).await);
    let bans = ledger.bans().await;
    assert_eq!(bans.len(), 1);
    assert_eq!(bans[0].address, address);
    assert_eq!(bans[0].attempts_at_ban_time, 3);

    let logs = ledger.logs().await;
    assert_eq!(logs[0].kind, LogKind::IpBanned);
    assert_eq!(logs[1].details.as_deref(), Some("Failed attempt 3"));

    // Correct credentials are refused while banned
    assert!(!ledger.login(EMAIL, PASSWORD).await);
    assert!(!ledger.is_authenticated().await);
    assert_eq!(ledger.logs().await[0].kind, LogKind::LoginFailed);

    assert_eq!(ledger.unban(&address).await, 1);
    assert!(ledger.login(EMAIL, PASSWORD).await);
    assert_eq!(ledger.failed_attempts_for(&address).await, 0);
}

#[tokio::test]
async fn test_state_persists_across_reopen() {
    let pool = pool().await;
    let attacker = ClientContext::new("10.0.0.7", "curl/8.0");
    {
        let kauth = open(&pool, AuthMethod::Session).await;
        let ledger = kauth.ledger();
        for _ in 0..3 {
            ledger.login_from(&attacker, EMAIL, "wrong").await;
        }
        ledger.simulate_security_test(SecurityTest::Csrf).await;
    }

    let kauth = open(&pool, AuthMethod::Session).await;
    let ledger = kauth.ledger();

    assert!(ledger.is_banned("10.0.0.7").await);
    assert_eq!(ledger.failed_attempts_for("10.0.0.7").await, 3);

    let logs = ledger.logs().await;
    assert_eq!(logs.len(), 5);
    assert_eq!(logs[0].kind, LogKind::CsrfAttempt);
    assert_eq!(logs[1].kind, LogKind::IpBanned);

    ledger.clear_log().await;
    let reopened = open(&pool, AuthMethod::Session).await;
    assert!(reopened.ledger().logs().await.is_empty());
}

#[tokio::test]
async fn test_jwt_restores_in_fresh_ledger() {
    let pool = pool().await;
    let first = open(&pool, AuthMethod::Jwt).await;
    assert!(first.ledger().login(EMAIL, PASSWORD).await);

    let second = open(&pool, AuthMethod::Jwt).await;
    assert!(!second.ledger().is_authenticated().await);
    assert!(second.ledger().check_auth_state().await);

    let principal = second.ledger().principal().await.unwrap();
    assert_eq!(principal.email, EMAIL);

    second.ledger().logout().await;
    assert!(!second.ledger().is_authenticated().await);
    assert_eq!(second.ledger().logs().await[0].kind, LogKind::Logout);

    let third = open(&pool, AuthMethod::Jwt).await;
    assert!(!third.ledger().check_auth_state().await);
}

async fn open_with_defaults(pool: &SqlitePool) -> Kauth<SqliteStore> {
    KauthBuilder::new()
        .with_sqlite_pool(pool.clone())
        .with_config(
            LedgerConfig::default()
                .account(ACCOUNT.clone())
                .auth_method(AuthMethod::Jwt),
        )
        .apply_migrations(true)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_default_config_restores_jwt_across_processes() {
    let pool = pool().await;
    let first = open_with_defaults(&pool).await;
    assert!(first.ledger().login(EMAIL, PASSWORD).await);

    let second = open_with_defaults(&pool).await;
    assert!(second.ledger().check_auth_state().await);
    assert_eq!(second.ledger().principal().await.unwrap().email, EMAIL);

    let keys = second.store().keys().await.unwrap();
    assert!(keys.contains(&"kauth_jwt_secret".to_string()));
}

#[tokio::test]
async fn test_jwt_with_other_secret_does_not_restore() {
    let pool = pool().await;
    let first = open(&pool, AuthMethod::Jwt).await;
    assert!(first.ledger().login(EMAIL, PASSWORD).await);

    let other = KauthBuilder::new()
        .with_sqlite_pool(pool.clone())
        .with_config(config(AuthMethod::Jwt).jwt(JwtConfig::new_random_hs256()))
        .build()
        .await
        .unwrap();

    assert!(!other.ledger().check_auth_state().await);
    assert!(!other.ledger().is_authenticated().await);
}

#[tokio::test]
async fn test_url_token_round_trip() {
    let pool = pool().await;
    let kauth = open(&pool, AuthMethod::UrlToken).await;
    let ledger = kauth.ledger();

    assert!(ledger.login(EMAIL, PASSWORD).await);
    let location = ledger.artifacts().url_token().location().await.unwrap();
    assert!(location.query_pairs().any(|(key, _)| key == "token"));

    let reopened = open(&pool, AuthMethod::UrlToken).await;
    assert!(reopened.ledger().check_auth_state().await);

    reopened.ledger().logout().await;
    let location = ledger.artifacts().url_token().location().await.unwrap();
    assert!(!location.query_pairs().any(|(key, _)| key == "token"));
}

#[tokio::test]
async fn test_brute_force_simulation_writes_five_entries() {
    let pool = pool().await;
    let kauth = open(&pool, AuthMethod::Session).await;
    let ledger = kauth.ledger();

    ledger.simulate_security_test(SecurityTest::BruteForce).await;
    ledger.wait_for_scheduled().await;

    let logs = ledger.logs().await;
    assert_eq!(logs.len(), 5);
    assert!(logs.iter().all(|entry| entry.kind == LogKind::LoginFailed));
    assert!(logs.iter().all(|entry| entry.address == "192.168.1.999"));
    assert_eq!(logs[0].details.as_deref(), Some("Brute force attempt 5"));

    // Simulated attempts never count toward a ban
    assert!(ledger.bans().await.is_empty());
    assert_eq!(ledger.failed_attempts_for("192.168.1.999").await, 0);
}

#[tokio::test]
async fn test_builder_with_memory_store() {
    let kauth = KauthBuilder::new()
        .with_store(Arc::new(MemoryStore::new()))
        .with_config(config(AuthMethod::Session))
        .apply_migrations(true)
        .build()
        .await
        .unwrap();

    assert!(kauth.migrate().await.is_ok());
    assert!(kauth.ledger().login(EMAIL, PASSWORD).await);
    assert_eq!(kauth.ledger().logs().await.len(), 1);
}

#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result = KauthBuilder::new()
        .with_store(Arc::new(MemoryStore::new()))
        .with_config(config(AuthMethod::Session).base_url("not a url"))
        .build()
        .await;

    assert!(result.is_err());
}
