//! Settings for the `inkwell` binary.
//!
//! Read from an optional `settings.toml` next to the binary, then from
//! `INKWELL__*` environment variables, e.g. `INKWELL__APP__LEVEL=debug` or
//! `INKWELL__DATABASE__SQLITE=/var/lib/inkwell.db`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

impl Default for Database {
    fn default() -> Self {
        Database::Sqlite("inkwell.db".to_string())
    }
}

impl Database {
    pub fn url(&self) -> String {
        match self {
            Database::Memory => String::from("sqlite::memory:"),
            Database::Sqlite(path) => format!("sqlite:{path}?mode=rwc"),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("app.level", "info")?
            .add_source(File::with_name("settings").required(false))
            .add_source(Environment::with_prefix("INKWELL").separator("__"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Settings {
        Config::builder()
            .set_default("app.level", "info")
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn defaults() {
        let settings = parse("");
        assert_eq!(settings.app.level, "info");
        assert_eq!(settings.database, Database::Sqlite("inkwell.db".to_string()));
    }

    #[test]
    fn database_variants() {
        let settings = parse("database = \"memory\"");
        assert_eq!(settings.database.url(), "sqlite::memory:");

        let settings = parse("[app]\nlevel = \"debug\"\n[database]\nsqlite = \"/tmp/blog.db\"");
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.database.url(), "sqlite:/tmp/blog.db?mode=rwc");
    }
}
