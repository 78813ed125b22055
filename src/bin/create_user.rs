//! CLI tool to create staff accounts or reset their passwords.
//!
//! Usage:
//!   `create-user <username> <password> [display name]`
//!   `create-user --set-password <username> <password>`
//!
//! Reads the same `config.yml` (or `KAIZEN_CONFIG`) as the server.

use anyhow::{bail, Result};
use std::path::Path;

use kaizen_admin::{
    config::Config,
    db::{self, repositories::SqlxUserRepository},
    services::CredentialService,
};

const USAGE: &str = "usage: create-user <username> <password> [display name]\n       create-user --set-password <username> <password>";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let config_path = std::env::var("KAIZEN_CONFIG").unwrap_or_else(|_| "config.yml".to_string());
    let config = Config::load_with_env(Path::new(&config_path))?;
    let pool = db::create_pool(&config.database).await?;
    db::migrations::run_migrations(&pool).await?;

    let credentials = CredentialService::new(SqlxUserRepository::boxed(pool));

    match args.as_slice() {
        [flag, username, password] if flag == "--set-password" => {
            let user = credentials.set_password(username, password).await?;
            println!("Password updated for {}", user.username);
        }
        [username, password] => {
            let user = credentials.create_user(username, password, None).await?;
            println!("Created user {} ({})", user.username, user.id);
        }
        [username, password, name @ ..] if !name.is_empty() => {
            let name = name.join(" ");
            let user = credentials.create_user(username, password, Some(&name)).await?;
            println!("Created user {} ({})", user.username, user.id);
        }
        _ => bail!(USAGE),
    }

    Ok(())
}
