//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
pub(crate) const ENV_PREFIX: &str = "KYC_APITEST";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Base URL from KYC_APITEST_BASE_URL
    pub base_url: Option<String>,
    /// Timeout from KYC_APITEST_TIMEOUT
    pub timeout: Option<u64>,
    /// Runs from KYC_APITEST_REPEAT
    pub repeat: Option<u32>,
    /// Workers from KYC_APITEST_WORKERS
    pub workers: Option<usize>,
    /// Success threshold from KYC_APITEST_THRESHOLD
    pub threshold: Option<f64>,
    /// Config file from KYC_APITEST_CONFIG
    pub config_file: Option<String>,
    /// Key file from KYC_APITEST_KEYS
    pub keys_file: Option<String>,
    /// Environment name from KYC_APITEST_ENV
    pub environment: Option<String>,
    /// Verbose from KYC_APITEST_VERBOSE
    pub verbose: Option<bool>,
    pub channel_private_key: Option<String>,
    pub channel_public_key: Option<String>,
    pub platform_public_key: Option<String>,
    pub platform_private_key: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            base_url: get_env("BASE_URL"),
            timeout: get_env_parse("TIMEOUT"),
            repeat: get_env_parse("REPEAT"),
            workers: get_env_parse("WORKERS"),
            threshold: get_env_parse("THRESHOLD"),
            config_file: get_env("CONFIG"),
            keys_file: get_env("KEYS"),
            environment: get_env("ENV"),
            verbose: get_env_bool("VERBOSE"),
            channel_private_key: get_env("CHANNEL_PRIVATE_KEY"),
            channel_public_key: get_env("CHANNEL_PUBLIC_KEY"),
            platform_public_key: get_env("PLATFORM_PUBLIC_KEY"),
            platform_private_key: get_env("PLATFORM_PRIVATE_KEY"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.base_url.is_some()
            || self.timeout.is_some()
            || self.repeat.is_some()
            || self.workers.is_some()
            || self.threshold.is_some()
            || self.config_file.is_some()
            || self.keys_file.is_some()
            || self.environment.is_some()
            || self.verbose.is_some()
            || self.has_keys()
    }

    /// Whether any key material is supplied directly
    pub fn has_keys(&self) -> bool {
        self.channel_private_key.is_some()
            || self.channel_public_key.is_some()
            || self.platform_public_key.is_some()
            || self.platform_private_key.is_some()
    }

    /// Get timeout with fallback
    pub fn timeout_or(&self, default: u64) -> u64 {
        self.timeout.unwrap_or(default)
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        let set = |v: &Option<String>| if v.is_some() { "<set>" } else { "<unset>" };

        println!("Environment Configuration:");
        println!("  {}_BASE_URL:  {:?}", ENV_PREFIX, self.base_url);
        println!("  {}_TIMEOUT:   {:?}", ENV_PREFIX, self.timeout);
        println!("  {}_REPEAT:    {:?}", ENV_PREFIX, self.repeat);
        println!("  {}_WORKERS:   {:?}", ENV_PREFIX, self.workers);
        println!("  {}_THRESHOLD: {:?}", ENV_PREFIX, self.threshold);
        println!("  {}_CONFIG:    {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_KEYS:      {:?}", ENV_PREFIX, self.keys_file);
        println!("  {}_ENV:       {:?}", ENV_PREFIX, self.environment);
        println!(
            "  {}_CHANNEL_PRIVATE_KEY:  {}",
            ENV_PREFIX,
            set(&self.channel_private_key)
        );
        println!(
            "  {}_PLATFORM_PUBLIC_KEY:  {}",
            ENV_PREFIX,
            set(&self.platform_public_key)
        );
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables (useful for testing)
#[cfg(test)]
pub(crate) struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    /// Set any prefixed variable
    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub(crate) struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all KYC_APITEST environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_BASE_URL              Base URL of the service under test");
    println!("  {ENV_PREFIX}_TIMEOUT               Request timeout in seconds");
    println!("  {ENV_PREFIX}_REPEAT                Full-suite runs in concurrent mode");
    println!("  {ENV_PREFIX}_WORKERS               Concurrent worker count");
    println!("  {ENV_PREFIX}_THRESHOLD             Required run success ratio (0-1)");
    println!("  {ENV_PREFIX}_CONFIG                Path to configuration file");
    println!("  {ENV_PREFIX}_KEYS                  Path to RSA key file");
    println!("  {ENV_PREFIX}_ENV                   Environment name from the config file");
    println!("  {ENV_PREFIX}_VERBOSE               Enable verbose output (true/false)");
    println!("  {ENV_PREFIX}_LOG                   Log filter (e.g. kyc_apitest=debug)");
    println!("  {ENV_PREFIX}_CHANNEL_PRIVATE_KEY   Base64 DER channel private key");
    println!("  {ENV_PREFIX}_CHANNEL_PUBLIC_KEY    Base64 DER channel public key");
    println!("  {ENV_PREFIX}_PLATFORM_PUBLIC_KEY   Base64 DER platform public key");
    println!("  {ENV_PREFIX}_PLATFORM_PRIVATE_KEY  Base64 DER platform private key");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_BASE_URL=http://10.0.0.100:8080");
    println!("  export {ENV_PREFIX}_KEYS=config/rsa_config.yaml");
    println!("  kyc-apitest run suites/credit.yaml");
}
