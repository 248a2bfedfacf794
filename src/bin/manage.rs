//! Maintenance commands run outside the web server, e.g. from cron.

use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use env_logger::Env;

use myquran_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    services::{UserService, VerificationCodeStore, VerificationPolicy},
};

fn cli() -> Command {
    Command::new("manage")
        .about("MyQuran backend maintenance")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("cleanup-verifications")
                .about("Delete email verification codes older than the retention window")
                .arg(
                    Arg::new("hours")
                        .long("hours")
                        .help("Delete codes created more than this many hours ago")
                        .default_value("24")
                        .env("VERIFICATION_RETENTION_HOURS")
                        .value_parser(clap::value_parser!(i64).range(0..)),
                ),
        )
        .subcommand(
            Command::new("ensure-superuser")
                .about("Create the configured superuser unless one already exists"),
        )
}

async fn cleanup_verifications(config: &Config, matches: &ArgMatches) -> Result<()> {
    let hours = matches.get_one::<i64>("hours").copied().unwrap_or(24);

    let pool = create_pool(&config.database)
        .await
        .context("failed to connect to the database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let policy = VerificationPolicy::try_from(&config.verification)
        .context("invalid verification policy")?;
    let store = VerificationCodeStore::new(pool, policy);
    let deleted = store.cleanup(hours).await?;
    println!("Deleted {deleted} verification code(s) older than {hours} hour(s).");
    Ok(())
}

async fn ensure_superuser(config: &Config) -> Result<()> {
    let pool = create_pool(&config.database)
        .await
        .context("failed to connect to the database")?;
    run_migrations(&pool).await.context("failed to run migrations")?;

    let users = UserService::new(pool);
    match users
        .ensure_superuser(&config.superuser.email, &config.superuser.password)
        .await?
    {
        Some(user) => println!("Superuser {} is ready.", user.email),
        None => println!("A superuser already exists."),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    match matches.subcommand() {
        Some(("cleanup-verifications", sub)) => cleanup_verifications(&config, sub).await,
        Some(("ensure-superuser", _)) => ensure_superuser(&config).await,
        _ => unreachable!("subcommand_required is set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_hours_default_and_override() {
        let matches = cli()
            .try_get_matches_from(["manage", "cleanup-verifications"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<i64>("hours").copied(), Some(24));

        let matches = cli()
            .try_get_matches_from(["manage", "cleanup-verifications", "--hours", "48"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        assert_eq!(sub.get_one::<i64>("hours").copied(), Some(48));

        assert!(cli()
            .try_get_matches_from(["manage", "cleanup-verifications", "--hours", "-1"])
            .is_err());
    }
}
