use std::time::Duration;

use serde::{Deserialize, Serialize};

use provisioner_db::ConnectionOptions;

use super::{WorkspaceError, WorkspacePaths, WorkspaceResult};

/// `config/<profile>/connection.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password; wins over `password`.
    #[serde(default)]
    pub password_env: Option<String>,
    pub database: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_connect_timeout() -> u64 {
    10
}

impl ConnectionConfig {
    pub fn into_options(self) -> WorkspaceResult<ConnectionOptions> {
        let password = match &self.password_env {
            Some(var) => Some(std::env::var(var).map_err(|_| {
                WorkspaceError::Invalid(format!("environment variable `{var}` is not set"))
            })?),
            None => self.password,
        };
        Ok(ConnectionOptions {
            host: self.host,
            port: self.port,
            user: self.user,
            password,
            database: self.database,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..ConnectionOptions::default()
        })
    }
}

pub fn load_connection(paths: &WorkspacePaths, profile: &str) -> WorkspaceResult<ConnectionOptions> {
    let path = paths.connection_path(profile);
    if !path.is_file() {
        return Err(WorkspaceError::Invalid(format!(
            "profile `{profile}` has no connection file at {}",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(&path)?;
    let config: ConnectionConfig =
        toml::from_str(&content).map_err(|source| WorkspaceError::TomlDecode {
            path: path.display().to_string(),
            source,
        })?;
    config.into_options()
}

/// Profiles with both a connection file and a schema, sorted.
pub fn list_profiles(paths: &WorkspacePaths) -> WorkspaceResult<Vec<String>> {
    if !paths.config_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut profiles = Vec::new();
    for entry in std::fs::read_dir(&paths.config_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if paths.connection_path(&name).is_file() && paths.schema_path(&name).is_file() {
            profiles.push(name);
        }
    }
    profiles.sort();
    Ok(profiles)
}

/// Scenario names (file stems) available to a profile, sorted.
pub fn list_scenarios(paths: &WorkspacePaths, profile: &str) -> WorkspaceResult<Vec<String>> {
    let dir = paths.scenario_dir.join(profile);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut scenarios = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
            scenarios.push(stem.to_string());
        }
    }
    scenarios.sort();
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_paths() -> WorkspacePaths {
        WorkspacePaths::new(
            std::env::temp_dir().join(format!("provisioner-profiles-{}", uuid::Uuid::new_v4())),
        )
    }

    #[test]
    fn only_complete_profiles_are_listed() {
        let paths = temp_paths();
        fs::create_dir_all(paths.profile_dir("shop")).expect("shop");
        fs::write(paths.connection_path("shop"), "user = \"app\"\ndatabase = \"shop\"\n")
            .expect("connection");
        fs::write(paths.schema_path("shop"), "CREATE TABLE t (id INT AUTO_INCREMENT PRIMARY KEY);")
            .expect("schema");
        fs::create_dir_all(paths.profile_dir("half")).expect("half");
        fs::write(paths.schema_path("half"), "").expect("schema");

        assert_eq!(list_profiles(&paths).expect("list"), vec!["shop"]);
        fs::remove_dir_all(&paths.root).ok();
    }

    #[test]
    fn scenarios_are_json_stems() {
        let paths = temp_paths();
        let dir = paths.scenario_dir.join("shop");
        fs::create_dir_all(&dir).expect("dir");
        fs::write(dir.join("bulk.json"), "{}").expect("bulk");
        fs::write(dir.join("basic.json"), "{}").expect("basic");
        fs::write(dir.join("notes.txt"), "").expect("notes");

        assert_eq!(
            list_scenarios(&paths, "shop").expect("list"),
            vec!["basic", "bulk"]
        );
        assert!(list_scenarios(&paths, "other").expect("list").is_empty());
        fs::remove_dir_all(&paths.root).ok();
    }

    #[test]
    fn connection_defaults_and_localhost() {
        let config: ConnectionConfig = toml::from_str(
            "host = \"localhost\"\nuser = \"app\"\npassword = \"pw\"\ndatabase = \"shop\"\n",
        )
        .expect("parse");
        let options = config.into_options().expect("options");
        assert_eq!(options.port, 3306);
        assert_eq!(options.tcp_host(), "127.0.0.1");
        assert_eq!(options.password.as_deref(), Some("pw"));
        assert_eq!(options.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn missing_password_variable_is_an_error() {
        let config = ConnectionConfig {
            host: default_host(),
            port: 3306,
            user: "app".to_string(),
            password: None,
            password_env: Some("PROVISIONER_TEST_UNSET_PASSWORD_VAR".to_string()),
            database: "shop".to_string(),
            connect_timeout_secs: 5,
        };
        assert!(matches!(
            config.into_options(),
            Err(WorkspaceError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_connection_keys_are_rejected() {
        let paths = temp_paths();
        fs::create_dir_all(paths.profile_dir("shop")).expect("dir");
        fs::write(
            paths.connection_path("shop"),
            "user = \"app\"\ndatabase = \"shop\"\npasword = \"typo\"\n",
        )
        .expect("write");
        assert!(matches!(
            load_connection(&paths, "shop"),
            Err(WorkspaceError::TomlDecode { .. })
        ));
        fs::remove_dir_all(&paths.root).ok();
    }
}
