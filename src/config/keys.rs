//! RSA key material
//!
//! Keys come from a YAML key file, then environment overrides, then suite
//! variables for anything still missing.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use super::EnvConfig;
use crate::crypto::GeneratedKeyPair;
use crate::models::SuiteError;

/// Suite variable used when no channel private key is configured
pub const CHANNEL_PRIVATE_KEY_VAR: &str = "channel_private_key";
/// Suite variable used when no platform public key is configured
pub const PLATFORM_PUBLIC_KEY_VAR: &str = "platform_public_key";

/// One side's key pair, Base64 DER
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPairConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

impl From<GeneratedKeyPair> for KeyPairConfig {
    fn from(pair: GeneratedKeyPair) -> Self {
        Self {
            private_key: Some(pair.private_key),
            public_key: Some(pair.public_key),
        }
    }
}

// Never print key bodies
impl fmt::Debug for KeyPairConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("KeyPairConfig")
            .field("private_key", &mask(&self.private_key))
            .field("public_key", &mask(&self.public_key))
            .finish()
    }
}

/// Channel and platform keys used to seal requests and open responses
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyMaterial {
    /// Our side: private key signs requests and decrypts responses
    pub channel_rsa: KeyPairConfig,
    /// Counterpart: public key encrypts requests and verifies responses
    pub platform_rsa: KeyPairConfig,
}

/// Keys the engine cannot run without
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredKeys {
    pub channel_private_key: String,
    pub platform_public_key: String,
}

impl KeyMaterial {
    /// Load a YAML key file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read key file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse key file: {}", path.display()))
    }

    /// Write a YAML key file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self).context("Failed to serialize keys")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write key file: {}", path.display()))
    }

    /// Overlay keys supplied through environment variables
    pub fn apply_env(&mut self, env: &EnvConfig) {
        let overlay = |slot: &mut Option<String>, value: &Option<String>| {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        };
        overlay(&mut self.channel_rsa.private_key, &env.channel_private_key);
        overlay(&mut self.channel_rsa.public_key, &env.channel_public_key);
        overlay(&mut self.platform_rsa.public_key, &env.platform_public_key);
        overlay(&mut self.platform_rsa.private_key, &env.platform_private_key);
    }

    /// Fill missing required keys from suite variables
    pub fn fill_from_variables(&mut self, variables: &BTreeMap<String, Value>) {
        let from_var = |name: &str| {
            variables
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        };
        if self.channel_rsa.private_key.is_none() {
            self.channel_rsa.private_key = from_var(CHANNEL_PRIVATE_KEY_VAR);
        }
        if self.platform_rsa.public_key.is_none() {
            self.platform_rsa.public_key = from_var(PLATFORM_PUBLIC_KEY_VAR);
        }
    }

    /// The channel private key and platform public key, or a config error naming what is missing
    pub fn require(&self) -> Result<RequiredKeys, SuiteError> {
        let present = |k: &Option<String>| k.clone().filter(|s| !s.trim().is_empty());

        let channel_private_key = present(&self.channel_rsa.private_key);
        let platform_public_key = present(&self.platform_rsa.public_key);

        match (channel_private_key, platform_public_key) {
            (Some(channel_private_key), Some(platform_public_key)) => Ok(RequiredKeys {
                channel_private_key,
                platform_public_key,
            }),
            (channel, platform) => {
                let mut missing = Vec::new();
                if channel.is_none() {
                    missing.push("channel private key");
                }
                if platform.is_none() {
                    missing.push("platform public key");
                }
                Err(SuiteError::Config(format!(
                    "Missing key material: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn pair(private: &str, public: &str) -> KeyPairConfig {
        KeyPairConfig {
            private_key: Some(private.to_string()),
            public_key: Some(public.to_string()),
        }
    }

    #[test]
    fn test_load_key_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rsa_config.yaml");
        std::fs::write(
            &path,
            "channel_rsa:\n  private_key: CPRIV\n  public_key: CPUB\nplatform_rsa:\n  public_key: PPUB\n",
        )
        .unwrap();

        let keys = KeyMaterial::load(&path).unwrap();
        assert_eq!(keys.channel_rsa, pair("CPRIV", "CPUB"));
        assert_eq!(keys.platform_rsa.public_key.as_deref(), Some("PPUB"));
        assert_eq!(keys.platform_rsa.private_key, None);

        let required = keys.require().unwrap();
        assert_eq!(required.channel_private_key, "CPRIV");
        assert_eq!(required.platform_public_key, "PPUB");
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keys").join("rsa.yaml");
        let keys = KeyMaterial {
            channel_rsa: pair("a", "b"),
            platform_rsa: pair("c", "d"),
        };

        keys.save(&path).unwrap();
        assert_eq!(KeyMaterial::load(&path).unwrap(), keys);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut keys = KeyMaterial {
            channel_rsa: pair("file-priv", "file-pub"),
            platform_rsa: KeyPairConfig::default(),
        };
        let env = EnvConfig {
            channel_private_key: Some("env-priv".to_string()),
            platform_public_key: Some("env-ppub".to_string()),
            ..Default::default()
        };

        keys.apply_env(&env);
        assert_eq!(keys.channel_rsa, pair("env-priv", "file-pub"));
        assert_eq!(keys.platform_rsa.public_key.as_deref(), Some("env-ppub"));
    }

    #[test]
    fn test_variables_fill_gaps_only() {
        let variables: BTreeMap<String, Value> = serde_json::from_value(json!({
            "channel_private_key": "var-priv",
            "platform_public_key": "var-ppub"
        }))
        .unwrap();

        let mut keys = KeyMaterial {
            channel_rsa: pair("cfg-priv", "cfg-pub"),
            platform_rsa: KeyPairConfig::default(),
        };
        keys.fill_from_variables(&variables);

        let required = keys.require().unwrap();
        assert_eq!(required.channel_private_key, "cfg-priv");
        assert_eq!(required.platform_public_key, "var-ppub");
    }

    #[test]
    fn test_require_reports_missing() {
        let err = KeyMaterial::default().require().unwrap_err();
        assert_eq!(
            err,
            SuiteError::Config(
                "Missing key material: channel private key, platform public key".to_string()
            )
        );

        let keys = KeyMaterial {
            channel_rsa: pair("priv", "pub"),
            platform_rsa: KeyPairConfig {
                public_key: Some("  ".to_string()),
                private_key: None,
            },
        };
        assert!(keys.require().is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let printed = format!("{:?}", pair("SECRET", "PUBLIC"));
        assert!(!printed.contains("SECRET"));
        assert!(printed.contains("<redacted>"));
    }
}
