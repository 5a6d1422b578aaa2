use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

pub struct Config {
    pub server: ServerConfig,
    pub debate: DebateConfig,
    pub summarizer: SummarizerConfig,
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Protocol timing knobs. All durations come from the environment with the
/// defaults the protocol was designed around.
#[derive(Clone)]
pub struct DebateConfig {
    pub turn_timeout: Duration,
    pub deletion_grace: Duration,
    pub sweep_interval: Duration,
    pub duplicate_window: Duration,
}

pub struct SummarizerConfig {
    pub enabled: bool,
    pub api_url: String,
    pub request_timeout: Duration,
}

fn env_secs(key: &str, default_secs: u64) -> Duration {
    let secs = env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default_secs);
    Duration::from_secs(secs)
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .expect("Invalid SERVER_PORT"),
            },
            debate: DebateConfig {
                turn_timeout: env_secs("TURN_TIMEOUT_SECS", 300),
                deletion_grace: env_secs("DELETION_GRACE_SECS", 180),
                sweep_interval: env_secs("SWEEP_INTERVAL_SECS", 60),
                duplicate_window: env_secs("DUPLICATE_WINDOW_SECS", 3),
            },
            summarizer: SummarizerConfig {
                enabled: env::var("SUMMARIZER_ENABLED")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                api_url: env::var("SUMMARIZER_API_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:5000/debate/summarize".to_string()),
                request_timeout: env_secs("SUMMARIZER_TIMEOUT_SECS", 10),
            },
        }
    }

    pub fn bind_address(&self) -> ([u8; 4], u16) {
        let ip_addr = self.parse_host_to_ipv4();
        (ip_addr.octets(), self.server.port)
    }

    fn parse_host_to_ipv4(&self) -> Ipv4Addr {
        // Try to parse as IP address first
        if let Ok(addr) = self.server.host.parse::<IpAddr>() {
            match addr {
                IpAddr::V4(ipv4) => return ipv4,
                IpAddr::V6(_) => {
                    tracing::warn!(
                        host = %self.server.host,
                        "IPv6 address provided but only IPv4 supported, using 0.0.0.0"
                    );
                    return Ipv4Addr::new(0, 0, 0, 0);
                }
            }
        }

        // Handle common hostnames
        match self.server.host.as_str() {
            "localhost" => Ipv4Addr::new(127, 0, 0, 1),
            "" | "0.0.0.0" => Ipv4Addr::new(0, 0, 0, 0),
            _ => {
                tracing::warn!(
                    host = %self.server.host,
                    "Unable to parse host as IPv4, using 0.0.0.0"
                );
                Ipv4Addr::new(0, 0, 0, 0)
            }
        }
    }
}

impl Default for DebateConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(300),
            deletion_grace: Duration::from_secs(180),
            sweep_interval: Duration::from_secs(60),
            duplicate_window: Duration::from_secs(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_debate_config() -> DebateConfig {
        DebateConfig::default()
    }

    fn default_summarizer_config() -> SummarizerConfig {
        SummarizerConfig {
            enabled: false,
            api_url: "http://127.0.0.1:5000/debate/summarize".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_parse_localhost() {
        let config = Config {
            server: ServerConfig {
                host: "localhost".to_string(),
                port: 8080,
            },
            debate: default_debate_config(),
            summarizer: default_summarizer_config(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([127, 0, 0, 1], 8080));
    }

    #[test]
    fn test_parse_ipv4_address() {
        let config = Config {
            server: ServerConfig {
                host: "192.168.1.1".to_string(),
                port: 3000,
            },
            debate: default_debate_config(),
            summarizer: default_summarizer_config(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([192, 168, 1, 1], 3000));
    }

    #[test]
    fn test_parse_invalid_hostname_defaults_to_all() {
        let config = Config {
            server: ServerConfig {
                host: "invalid-hostname".to_string(),
                port: 9000,
            },
            debate: default_debate_config(),
            summarizer: default_summarizer_config(),
        };

        let addr = config.bind_address();
        assert_eq!(addr, ([0, 0, 0, 0], 9000));
    }

    #[test]
    fn test_default_timing() {
        let debate = DebateConfig::default();
        assert_eq!(debate.turn_timeout, Duration::from_secs(300));
        assert_eq!(debate.deletion_grace, Duration::from_secs(180));
        assert_eq!(debate.sweep_interval, Duration::from_secs(60));
        assert_eq!(debate.duplicate_window, Duration::from_secs(3));
    }
}
