use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::beacon::{DropoutPolicy, RoundSettings};
use crate::{Error, Result};

/// Beacon configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Number of local contributors per round.
    pub participants: usize,
    /// Per-round protocol parameters.
    pub round: RoundSettings,
    /// Metrics exporter configuration.
    pub metrics: MetricsSettings,
}

/// Metrics exporter settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSettings {
    /// Whether metrics export is enabled.
    pub enabled: bool,
    /// Hostname or IP address for the metrics endpoint.
    pub host: String,
    /// Port number for the metrics endpoint.
    pub port: u16,
}

impl MetricsSettings {
    /// Converts host and port into a socket address.
    ///
    /// # Errors
    /// Returns [`Error::Config`] if the pair does not parse.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            Error::Config(format!(
                "invalid metrics address (host: {}, port: {}): {e}",
                self.host, self.port
            ))
        })
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            participants: 7,
            round: RoundSettings::default(),
            metrics: MetricsSettings {
                enabled: false,
                host: "127.0.0.1".to_string(),
                port: 9090,
            },
        }
    }
}

impl BeaconConfig {
    /// Loads configuration from `.env`, a TOML file and environment variables.
    ///
    /// Priority, highest first:
    /// 1. Environment variables with the `BEACON_` prefix, nested with `__`
    /// 2. The TOML file at `BEACON_CONFIG_PATH` (default `config/beacon.toml`),
    ///    skipped when missing
    /// 3. Built-in defaults
    ///
    /// # Environment Variable Examples
    /// ```bash
    /// BEACON_PARTICIPANTS=9
    /// BEACON_ROUND__MODULUS_BITS=512
    /// BEACON_ROUND__DELAY=100000
    /// BEACON_ROUND__DROPOUT__MODE=exclude
    /// BEACON_ROUND__DROPOUT__MIN_PARTICIPANTS=5
    /// BEACON_METRICS__ENABLED=true
    /// ```
    ///
    /// # Errors
    /// Returns [`Error::Config`] if a source is malformed.
    pub fn from_env() -> Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        let _ = dotenvy::dotenv();

        let config_path = std::env::var("BEACON_CONFIG_PATH")
            .unwrap_or_else(|_| "config/beacon.toml".to_string());

        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&config_path))
            .merge(
                Env::prefixed("BEACON_")
                    .ignore(&["CONFIG_PATH"])
                    .split("__"),
            )
            .extract()?;
        Ok(config)
    }

    /// Validates the configuration before any round starts.
    ///
    /// # Errors
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.participants == 0 {
            return Err(Error::Config("participants cannot be zero".to_string()));
        }

        self.round
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;

        if let DropoutPolicy::Exclude { min_participants } = self.round.dropout {
            if min_participants > self.participants {
                return Err(Error::Config(format!(
                    "min_participants {min_participants} exceeds participants {}",
                    self.participants
                )));
            }
        }

        if self.metrics.enabled {
            self.metrics.addr()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BeaconConfig::default();
        assert_eq!(config.participants, 7);
        assert_eq!(config.round.modulus_bits, 256);
        assert_eq!(config.round.delay, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_participants_rejected() {
        let config = BeaconConfig {
            participants: 0,
            ..BeaconConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn quorum_above_participants_rejected() {
        let mut config = BeaconConfig::default();
        config.round.dropout = DropoutPolicy::Exclude {
            min_participants: 8,
        };
        assert!(config.validate().is_err());

        config.round.dropout = DropoutPolicy::Exclude {
            min_participants: 7,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn short_modulus_rejected() {
        let mut config = BeaconConfig::default();
        config.round.modulus_bits = 8;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn bad_metrics_host_rejected() {
        let mut config = BeaconConfig::default();
        config.metrics.enabled = true;
        config.metrics.host = "not a host".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_file_then_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "beacon.toml",
                r#"
                participants = 4

                [round]
                modulus_bits = 64
                delay = 500

                [round.dropout]
                mode = "exclude"
                min_participants = 3
                "#,
            )?;
            jail.set_env("BEACON_CONFIG_PATH", "beacon.toml");
            jail.set_env("BEACON_ROUND__DELAY", "900");

            let config = BeaconConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.participants, 4);
            assert_eq!(config.round.modulus_bits, 64);
            assert_eq!(config.round.delay, 900);
            assert_eq!(
                config.round.dropout,
                DropoutPolicy::Exclude {
                    min_participants: 3
                }
            );
            assert!(!config.metrics.enabled);
            Ok(())
        });
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("BEACON_CONFIG_PATH", "absent.toml");
            let config = BeaconConfig::from_env().map_err(|e| e.to_string())?;
            assert_eq!(config, BeaconConfig::default());
            Ok(())
        });
    }
}
