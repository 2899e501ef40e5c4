use std::env;
use std::path::PathBuf;

use url::Url;

use crate::errors::BackendError;

pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DATA_DIR: &str = "data";

/// Returns the value of the named environment variable if it exists.
pub fn get_variable(name: &str) -> Result<String, BackendError> {
    env::var(name).map_err(|_| BackendError::MissingVariable(name.to_owned()))
}

fn get_optional_variable(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_variable<T: std::str::FromStr>(name: &str, value: String) -> Result<T, BackendError> {
    value.trim().parse().map_err(|_| BackendError::InvalidVariable {
        name: name.to_owned(),
        value,
    })
}

/// How to reach the database.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DbSettings {
    connection_string: String,
    max_connections: u32,
}

impl DbSettings {
    pub fn new(connection_string: impl Into<String>, max_connections: u32) -> Self {
        DbSettings {
            connection_string: connection_string.into(),
            max_connections,
        }
    }

    /// Reads `CATALOG_DB_CONNECTION_STRING`, falling back to a URL assembled
    /// from the `POSTGRES_*` variables.
    pub fn from_env() -> Result<Self, BackendError> {
        let connection_string = match get_optional_variable("CATALOG_DB_CONNECTION_STRING") {
            Some(connection_string) => connection_string,
            None => connection_string_from_parts()?,
        };

        let max_connections = match get_optional_variable("CATALOG_DB_MAX_CONNECTIONS") {
            Some(value) => parse_variable("CATALOG_DB_MAX_CONNECTIONS", value)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(DbSettings::new(connection_string, max_connections))
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }
}

fn connection_string_from_parts() -> Result<String, BackendError> {
    let user = get_variable("POSTGRES_USER")?;
    let password = get_variable("POSTGRES_PASSWORD")?;
    let host = get_optional_variable("POSTGRES_HOST")
        .or_else(|| get_optional_variable("POSTGRES_HOST_LOCALHOST"))
        .ok_or_else(|| BackendError::MissingVariable("POSTGRES_HOST".to_owned()))?;
    let port = match get_optional_variable("POSTGRES_PORT") {
        Some(value) => parse_variable("POSTGRES_PORT", value)?,
        None => DEFAULT_POSTGRES_PORT,
    };
    let database = get_variable("POSTGRES_DB")?;

    build_connection_string(&user, &password, &host, port, &database)
}

/// Assembles a `postgres://` URL, escaping each part as needed.
pub fn build_connection_string(
    user: &str,
    password: &str,
    host: &str,
    port: u16,
    database: &str,
) -> Result<String, BackendError> {
    let invalid = |name: &str, value: &str| BackendError::InvalidVariable {
        name: name.to_owned(),
        value: value.to_owned(),
    };

    let mut url = Url::parse("postgres://localhost").map_err(|_| invalid("POSTGRES_HOST", "localhost"))?;

    url.set_host(Some(host))
        .map_err(|_| invalid("POSTGRES_HOST", host))?;
    url.set_username(user)
        .map_err(|_| invalid("POSTGRES_USER", user))?;
    url.set_password(Some(password))
        .map_err(|_| invalid("POSTGRES_PASSWORD", "<redacted>"))?;
    url.set_port(Some(port))
        .map_err(|_| invalid("POSTGRES_PORT", &port.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| invalid("POSTGRES_DB", database))?
        .clear()
        .push(database);

    Ok(url.into())
}

/// Settings that don't concern the database.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
}

impl Config {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
        }
    }

    /// Reads `CATALOG_DATA_DIR`, defaulting to `data`.
    pub fn from_env() -> Self {
        Config::new(get_optional_variable("CATALOG_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_owned()))
    }
}
