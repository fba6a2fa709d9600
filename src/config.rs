//! Backend selection.
//!
//! Settings are read from an optional `jambi.{toml,json,yaml,...}` file and
//! then overridden by `JAMBI_*` environment variables, e.g.
//! `JAMBI_DB_TYPE=sqlite JAMBI_DB_PATH=app.db`.

use ::config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use crate::error::{JambiError, Result};
use crate::persist::PersistenceMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbType {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub db_type: DbType,
    #[serde(default)]
    pub db_path: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from("jambi")
    }

    /// Reads `<basename>.*` if it exists, then applies the environment.
    pub fn load_from(basename: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(basename).required(false))
            .add_source(Environment::with_prefix("JAMBI"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn persistence_mode(&self) -> Result<PersistenceMode> {
        match self.db_type {
            DbType::Memory => Ok(PersistenceMode::InMemory),
            DbType::Sqlite => match &self.db_path {
                Some(path) => Ok(PersistenceMode::File(path.clone())),
                None => Err(JambiError::Config(
                    "db_type 'sqlite' requires db_path".to_string(),
                )),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_select_memory() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.db_type, DbType::Memory);
        assert_eq!(settings.persistence_mode().unwrap(), PersistenceMode::InMemory);
    }

    #[test]
    fn sqlite_settings_select_file() {
        let settings = Settings::from_toml("db_type = \"sqlite\"\ndb_path = \"app.db\"").unwrap();
        assert_eq!(
            settings.persistence_mode().unwrap(),
            PersistenceMode::File("app.db".to_string())
        );
    }

    #[test]
    fn sqlite_without_path_is_rejected() {
        let settings = Settings::from_toml("db_type = \"sqlite\"").unwrap();
        assert!(matches!(settings.persistence_mode(), Err(JambiError::Config(_))));
    }

    #[test]
    fn unknown_backend_is_a_config_error() {
        let result = Settings::from_toml("db_type = \"oracle\"");
        assert!(matches!(result, Err(JambiError::Config(_))));
    }

    #[test]
    fn environment_overrides_select_file() {
        // only this test reads JAMBI_* variables
        unsafe {
            std::env::set_var("JAMBI_DB_TYPE", "sqlite");
            std::env::set_var("JAMBI_DB_PATH", "from_env.db");
        }
        let settings = Settings::load_from("jambi_environment_override_test");
        unsafe {
            std::env::remove_var("JAMBI_DB_TYPE");
            std::env::remove_var("JAMBI_DB_PATH");
        }
        let settings = settings.unwrap();
        assert_eq!(settings.db_type, DbType::Sqlite);
        assert_eq!(
            settings.persistence_mode().unwrap(),
            PersistenceMode::File("from_env.db".to_string())
        );
    }
}
