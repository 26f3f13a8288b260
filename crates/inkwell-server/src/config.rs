use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

use inkwell_api::{PasswordScheme, Settings};

const DEFAULT_SECRET: &str = "shhh, secret";

pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port: u16 = var_or("INKWELL_PORT", "5000")
            .parse()
            .context("INKWELL_PORT must be a port number")?;
        let page_size: u32 = var_or("INKWELL_PAGE_SIZE", "20")
            .parse()
            .context("INKWELL_PAGE_SIZE must be a positive number")?;
        let password_scheme: PasswordScheme = var_or("INKWELL_PASSWORD_SCHEME", "plaintext").parse()?;

        let secret_key = var_or("INKWELL_SECRET_KEY", DEFAULT_SECRET);
        if secret_key == DEFAULT_SECRET {
            warn!("INKWELL_SECRET_KEY is unset; cookies are signed with the built-in default");
        }
        if password_scheme == PasswordScheme::Plaintext {
            warn!("Passwords are stored in plaintext (INKWELL_PASSWORD_SCHEME=argon2 to hash them)");
        }

        Ok(Self {
            db_path: var_or("INKWELL_DB_PATH", "blog.db").into(),
            host: var_or("INKWELL_HOST", "0.0.0.0"),
            port,
            settings: Settings {
                secret_key,
                admin_username: var_or("INKWELL_ADMIN_USERNAME", "admin"),
                admin_password: var_or("INKWELL_ADMIN_PASSWORD", "secret"),
                password_scheme,
                page_size: page_size.max(1),
            },
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}
