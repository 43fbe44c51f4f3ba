use std::time::Duration;

use provisioner_core::redact_connection_url;

const LOOPBACK: &str = "127.0.0.1";

/// Where and how to connect to the target MySQL server.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Option<String>,
    pub database: String,
    pub connect_timeout: Duration,
    pub max_connections: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            host: LOOPBACK.to_string(),
            port: 3306,
            user: "root".to_string(),
            password: None,
            database: String::new(),
            connect_timeout: Duration::from_secs(10),
            max_connections: 2,
        }
    }
}

impl ConnectionOptions {
    /// Host to dial; `localhost` becomes `127.0.0.1` so the client uses TCP
    /// instead of the local socket.
    pub fn tcp_host(&self) -> &str {
        if self.host.eq_ignore_ascii_case("localhost") {
            LOOPBACK
        } else {
            &self.host
        }
    }

    /// Connection URL with the password masked, for logs and reports.
    pub fn display_url(&self) -> String {
        let credentials = match &self.password {
            Some(password) => format!("{}:{password}", self.user),
            None => self.user.clone(),
        };
        let url = format!(
            "mysql://{credentials}@{}:{}/{}",
            self.tcp_host(),
            self.port,
            self.database
        );
        redact_connection_url(&url).redacted
    }
}
