//! Tenant Portal CLI
//!
//! Command-line interface for portal operations:
//! - Log in and inspect claims
//! - Repair a tenant user's claims
//! - Import a menu CSV
//! - Check server status

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use tenant_portal::client::{ClientError, PortalClient};
use tenant_portal::config::generate_default_config;
use tenant_portal::import::MenuCsvImporter;

#[derive(Parser)]
#[command(name = "portal-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Administration CLI for the tenant portal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Bearer token for authenticated commands
    #[arg(long, env = "PORTAL_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in and print the session token
    Login {
        email: String,
        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Show the caller's claims
    Claims,

    /// Repair a user's tenant claims (super admin)
    FixClaims {
        email: String,
    },

    /// List users (super admin)
    Users,

    /// Import menu items from CSV
    ImportMenu {
        /// Path to CSV file
        path: PathBuf,
        /// Parse locally and report, without uploading
        #[arg(long)]
        dry_run: bool,
    },

    /// Show server status
    Status,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        if let Some(ClientError::Unauthenticated { redirect: Some(_), .. }) = e.downcast_ref::<ClientError>() {
            eprintln!();
            eprintln!("Log in first:");
            eprintln!("  portal-cli login <email>");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let json = cli.format == "json";
    let mut client = PortalClient::new(&cli.api_url)?
        .with_route("/admin")
        .with_token(cli.token.clone());

    match cli.command {
        Commands::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => prompt("Password: ")?,
            };
            let session = client.login(&email, &password).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&session)?);
            } else {
                println!("Logged in as {} ({})", session.user.email, session.user.uid);
                if let Some(expires) = session.expires_at {
                    println!("Expires: {}", expires.format("%Y-%m-%d %H:%M UTC"));
                }
                println!();
                println!("export PORTAL_TOKEN={}", session.token);
            }
        }

        Commands::Claims => {
            let claims = client.claims().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&claims)?);
            } else {
                println!("User:   {} ({})", claims.email, claims.uid);
                println!("Role:   {}", claims.role.map(|r| r.to_string()).unwrap_or_else(|| "-".into()));
                println!("Tenant: {}", claims.tenant.map(|t| t.to_string()).unwrap_or_else(|| "-".into()));
                print_claims(&claims.claims);
            }
        }

        Commands::FixClaims { email } => {
            let fixed = client.fix_user_claims(&email).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&fixed)?);
            } else if fixed.changed {
                println!("Claims repaired for {}", fixed.user.email);
                print_claims(&fixed.user.claims);
            } else {
                println!("Claims for {} already consistent", fixed.user.email);
            }
        }

        Commands::Users => {
            let list = client.list_users().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if list.users.is_empty() {
                println!("No users.");
            } else {
                println!("{:<36} {:<32} {:<12} {}", "UID", "Email", "Role", "Tenant");
                println!("{}", "-".repeat(100));
                for user in &list.users {
                    println!(
                        "{:<36} {:<32} {:<12} {}",
                        user.uid,
                        user.email,
                        claim_str(&user.claims, tenant_portal::auth::ROLE),
                        claim_str(&user.claims, tenant_portal::auth::TENANT_ID),
                    );
                }
                println!();
                println!("{} user(s)", list.total);
            }
        }

        Commands::ImportMenu { path, dry_run } => {
            if !path.exists() {
                bail!("File not found: {:?}", path);
            }

            if dry_run {
                let result = MenuCsvImporter::new().import(&path)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&result.items)?);
                } else {
                    println!("{:<30} {:>8} {:<16} {}", "Name", "Price", "Category", "Available");
                    println!("{}", "-".repeat(70));
                    for item in &result.items {
                        println!(
                            "{:<30} {:>8.2} {:<16} {}",
                            item.name, item.price, item.category, item.is_available
                        );
                    }
                    println!();
                    println!("Rows processed: {}", result.rows_processed);
                    println!("Rows skipped: {}", result.rows_skipped);
                    println!("(Dry run - nothing was uploaded)");
                }
                return Ok(());
            }

            let csv = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {:?}", path))?;
            let result = client.import_menu(csv).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Imported: {}", result.imported);
                if result.skipped > 0 {
                    println!("Skipped: {}", result.skipped);
                }
            }
        }

        Commands::Status => {
            let health = match client.health().await {
                Ok(h) => h,
                Err(ClientError::Unavailable(url)) => {
                    eprintln!("Cannot connect to the portal API at {}", url);
                    eprintln!();
                    eprintln!("Make sure the server is running:");
                    eprintln!("  cargo run --bin tenant-portal");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("Tenant Portal v{}", health.version);
                println!();
                println!("API Status: {}", health.status);
                println!("Store:      {}", health.store);
                println!();
                println!("Collections: {}", health.collections);
                println!("Documents:   {}", health.documents);
                println!("Users:       {}", health.users);
                println!("Live sockets: {}", health.ws_connections);
                println!();
                println!("Uptime: {}", format_duration(health.uptime_seconds));
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, config)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", config),
            }
        }
    }

    Ok(())
}

fn prompt(label: &str) -> anyhow::Result<String> {
    eprint!("{}", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn claim_str(claims: &tenant_portal::auth::Claims, key: &str) -> String {
    match claims.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "-".to_string(),
    }
}

fn print_claims(claims: &tenant_portal::auth::Claims) {
    if claims.is_empty() {
        println!("Claims: (none)");
        return;
    }
    println!("Claims:");
    for (key, value) in claims {
        println!("  {}: {}", key, value);
    }
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
