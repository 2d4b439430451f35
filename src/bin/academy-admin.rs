use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use academy_gate::auth::{AccessPolicy, Decision, Role};
use academy_gate::db::users;

#[derive(Parser, Debug)]
#[command(author, version, about = "academy-gate administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Set the profile role of a user (`none` clears it)
    SetRole { email: String, role: String },
    /// Set the embedded role claim of a user (`none` clears it)
    SetClaim { email: String, role: String },
    /// Evaluate the access policy for a path without a running server
    Check {
        path: String,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        anonymous: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; fall back to the crate-local `.env`.
    if dotenv().is_err() {
        let crate_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::SetRole { email, role } => {
            let role = parse_optional_role(&role)?;
            let pool = get_pool().await?;
            let user = users::require_by_email(&pool, &email).await?;
            users::set_profile_role(&pool, user.uuid()?, role).await?;
            println!("profile role of {} set to {}", user.email, display_role(role));
        }
        Commands::SetClaim { email, role } => {
            let role = parse_optional_role(&role)?;
            let pool = get_pool().await?;
            let user = users::require_by_email(&pool, &email).await?;
            users::set_role_claim(&pool, user.uuid()?, role).await?;
            println!(
                "role claim of {} set to {} (applies to sessions issued from now on)",
                user.email,
                display_role(role)
            );
        }
        Commands::Check { path, role, anonymous } => {
            let decision = AccessPolicy::academy().decide(&path, role, !anonymous);
            match decision.location() {
                None => println!("allow {}", path),
                Some(location) => {
                    let kind = match decision {
                        Decision::RedirectSignIn { .. } => "sign-in",
                        _ => "role-home",
                    };
                    println!("redirect ({}) {}", kind, location);
                }
            }
        }
    }

    Ok(())
}

fn parse_optional_role(raw: &str) -> anyhow::Result<Option<Role>> {
    if raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    Role::parse(raw)
        .map(Some)
        .with_context(|| format!("unknown role {raw:?}; expected admin, instructor, student or none"))
}

fn display_role(role: Option<Role>) -> &'static str {
    role.map(|r| r.as_str()).unwrap_or("none")
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let table: Option<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
            .fetch_optional(pool)
            .await?;
    let applied_versions: HashSet<i64> = if table.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let status = if applied_versions.contains(&migration.version) { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if desc.is_empty() { "unknown" } else { desc };
        println!("{:<8} {:<20} {}", status, migration.version, name);
    }

    Ok(())
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Prefer ./migrations; fall back to the crate-local folder when CWD differs.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}
