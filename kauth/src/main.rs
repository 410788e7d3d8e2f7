use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kauth::{
    AuthMethod, ClientContext, JwtConfig, Kauth, KauthBuilder, LedgerConfig, SecurityTest,
    SqliteStore, auth::DEFAULT_CLIENT_ADDRESS,
};
use tracing_subscriber::EnvFilter;

/// Command line interface for the kauth ledger
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database connection string
    #[arg(long, env = "KAUTH_DB_URL", default_value = "sqlite://kauth.db?mode=rwc")]
    db_url: String,

    /// Artifact issued on login: session, jwt or url_token
    #[arg(long, env = "KAUTH_AUTH_METHOD", default_value = "session")]
    method: AuthMethod,

    /// HS256 secret for JWT artifacts, at least 32 bytes
    #[arg(long, env = "KAUTH_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Source address operations are attributed to
    #[arg(long, env = "KAUTH_CLIENT_ADDRESS", default_value = DEFAULT_CLIENT_ADDRESS)]
    address: String,

    /// Verbosity: -v WARN, -vv INFO, -vvv DEBUG, -vvvv TRACE (default: ERROR)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "KAUTH_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Log out and discard stored artifacts
    Logout,
    /// Show authentication and ban state
    Status,
    /// Print the audit log, newest first
    Logs {
        /// Maximum number of entries
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Print stored bans
    Bans {
        #[arg(long)]
        json: bool,
    },
    /// Remove every ban for an address
    Unban { address: String },
    /// Empty the audit log
    ClearLogs,
    /// Record a simulated attack: brute_force, csrf, xss, token_theft or session_hijacking
    Simulate { kind: SecurityTest },
    /// Run database migrations
    Migrate,
    /// Print version information
    Version,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    // RUST_LOG overrides -v
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn ledger_config(cli: &Cli) -> Result<LedgerConfig> {
    let mut config = LedgerConfig::default()
        .auth_method(cli.method)
        .client(ClientContext {
            address: cli.address.clone(),
            ..ClientContext::default()
        });
    // Without a secret the ledger generates one and keeps it in the database.
    if let Some(secret) = &cli.jwt_secret {
        config = config.jwt(JwtConfig::new_hs256(secret.clone().into_bytes()));
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn open(cli: &Cli) -> Result<Kauth<SqliteStore>> {
    let kauth = KauthBuilder::new()
        .with_sqlite(&cli.db_url)
        .await?
        .with_config(ledger_config(cli)?)
        .apply_migrations(true)
        .build()
        .await?;
    Ok(kauth)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Version = cli.command {
        println!("kauth v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let kauth = open(&cli).await?;
    let ledger = kauth.ledger();

    match &cli.command {
        Commands::Login { email, password } => {
            if !ledger.login(email, password).await {
                let reason = ledger
                    .logs()
                    .await
                    .into_iter()
                    .next()
                    .and_then(|entry| entry.details)
                    .unwrap_or_default();
                bail!("Login failed: {reason}");
            }
            let method = ledger.auth_method().await;
            println!("Logged in as {email} ({method})");
            if method == AuthMethod::UrlToken {
                let location = ledger.artifacts().url_token().location().await?;
                println!("Location: {location}");
            }
        }
        Commands::Logout => {
            ledger.check_auth_state().await;
            ledger.logout().await;
            println!("Logged out");
        }
        Commands::Status => {
            let authenticated = ledger.check_auth_state().await;
            let address = &ledger.client().address;
            println!("Method:          {}", ledger.auth_method().await);
            match ledger.principal().await {
                Some(principal) if authenticated => {
                    println!("Authenticated:   {} ({})", principal.email, principal.role)
                }
                _ => println!("Authenticated:   no"),
            }
            println!("Address:         {address}");
            match ledger.active_ban(address).await {
                Some(ban) => println!(
                    "Banned:          yes, until {} ({})",
                    ban.expires_at.format("%Y-%m-%d %H:%M:%S"),
                    ban.reason
                ),
                None => println!("Banned:          no"),
            }
            println!(
                "Failed attempts: {}",
                ledger.failed_attempts_for(address).await
            );
        }
        Commands::Logs { limit, json } => {
            let mut logs = ledger.logs().await;
            if let Some(limit) = limit {
                logs.truncate(*limit);
            }
            if *json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
            } else {
                for entry in logs {
                    println!(
                        "{}  {:<13} {:<15} {:<9} {}{}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.kind,
                        entry.address,
                        entry.auth_method,
                        entry.email.as_deref().unwrap_or("-"),
                        entry
                            .details
                            .map(|details| format!("  {details}"))
                            .unwrap_or_default(),
                    );
                }
            }
        }
        Commands::Bans { json } => {
            let bans = ledger.bans().await;
            if *json {
                println!("{}", serde_json::to_string_pretty(&bans)?);
            } else {
                let now = chrono::Utc::now();
                for ban in bans {
                    let state = match ban.retry_after_seconds(now) {
                        Some(seconds) => format!("active, {seconds}s left"),
                        None => "expired".to_string(),
                    };
                    println!(
                        "{:<15} attempts={} until {} ({state})  {}",
                        ban.address,
                        ban.attempts_at_ban_time,
                        ban.expires_at.format("%Y-%m-%d %H:%M:%S"),
                        ban.reason
                    );
                }
            }
        }
        Commands::Unban { address } => {
            let removed = ledger.unban(address).await;
            println!("Removed {removed} ban(s) for {address}");
        }
        Commands::ClearLogs => {
            ledger.clear_log().await;
            println!("Audit log cleared");
        }
        Commands::Simulate { kind } => {
            ledger.simulate_security_test(*kind).await;
            ledger.wait_for_scheduled().await;
            println!("Simulated {kind}");
        }
        Commands::Migrate => {
            kauth.migrate().await?;
            let store = kauth.store();
            for record in store.applied_migrations().await? {
                println!("{:>4}  {}", record.version, record.name);
            }
        }
        Commands::Version => {}
    }

    Ok(())
}
