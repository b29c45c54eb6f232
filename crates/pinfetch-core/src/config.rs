use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Hard ceiling for `max_upload_bytes`, independent of anything a caller asks for.
pub const MAX_UPLOAD_BYTES_CEILING: u64 = 50 * 1024 * 1024;

/// Default size limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Default connect/response timeout for the pinned fetch.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Environment variable holding the comma-separated trusted hostnames.
pub const ENV_TRUSTED_DOMAINS: &str = "TRUSTED_DOMAINS";

/// Environment variable holding the maximum image size in bytes.
pub const ENV_MAX_UPLOAD_BYTES: &str = "MAX_UPLOAD_BYTES";

/// `[security]` section of config.toml, as written by the operator (unvalidated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Hostnames images may be fetched from. Empty = every fetch is rejected.
    #[serde(default)]
    pub trusted_domains: Vec<String>,
    /// Maximum image size in bytes; must be in 1..=50 MiB.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            trusted_domains: Vec::new(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// `[fetch]` section of config.toml: transport knobs for the pinned GET.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Connect and whole-transfer timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional User-Agent override (None = "pinfetch/<version>").
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

/// Global configuration loaded from `~/.config/pinfetch/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PinfetchConfig {
    #[serde(default)]
    pub security: SecuritySettings,
    #[serde(default)]
    pub fetch: FetchSettings,
}

impl PinfetchConfig {
    /// Applies `TRUSTED_DOMAINS` / `MAX_UPLOAD_BYTES` overrides read through `lookup`.
    /// A set variable replaces the file value; an unparseable size is an error.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(domains) = lookup(ENV_TRUSTED_DOMAINS) {
            self.security.trusted_domains = domains
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
        }
        if let Some(raw) = lookup(ENV_MAX_UPLOAD_BYTES) {
            let value = raw.trim();
            self.security.max_upload_bytes =
                value
                    .parse::<u64>()
                    .map_err(|source| ConfigError::MaxUploadBytesNotANumber {
                        value: value.to_string(),
                        source,
                    })?;
        }
        Ok(())
    }

    /// Validates the security section into the immutable runtime form.
    pub fn security_config(&self) -> Result<SecurityConfig, ConfigError> {
        SecurityConfig::new(
            &self.security.trusted_domains,
            self.security.max_upload_bytes,
        )
    }
}

/// Validated, read-only security policy shared by every fetch.
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    trusted_domains: BTreeSet<String>,
    max_upload_bytes: u64,
}

impl SecurityConfig {
    /// Builds the policy. Fails if `max_upload_bytes` is 0 or above 50 MiB.
    /// An empty domain list is accepted with a warning (fail-closed at runtime).
    pub fn new<I, S>(trusted_domains: I, max_upload_bytes: u64) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if max_upload_bytes == 0 || max_upload_bytes > MAX_UPLOAD_BYTES_CEILING {
            return Err(ConfigError::MaxUploadBytesOutOfRange(max_upload_bytes));
        }

        let trusted_domains: BTreeSet<String> = trusted_domains
            .into_iter()
            .map(|d| normalize_host(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();

        if trusted_domains.is_empty() {
            tracing::warn!(
                "no trusted domains configured: SSRF allowlist is empty, every image fetch will be rejected (set {})",
                ENV_TRUSTED_DOMAINS
            );
        } else {
            tracing::info!(
                "SSRF protection enabled with {} trusted domain(s)",
                trusted_domains.len()
            );
        }
        tracing::info!(
            "max upload size: {:.2}MB",
            max_upload_bytes as f64 / 1024.0 / 1024.0
        );

        Ok(Self {
            trusted_domains,
            max_upload_bytes,
        })
    }

    /// True if `hostname` (lowercased and trimmed) is in the allowlist.
    pub fn is_trusted_domain(&self, hostname: &str) -> bool {
        self.trusted_domains.contains(&normalize_host(hostname))
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// Trusted hostnames in sorted order.
    pub fn trusted_domains(&self) -> impl Iterator<Item = &str> {
        self.trusted_domains.iter().map(String::as_str)
    }

    pub fn is_protection_disabled(&self) -> bool {
        self.trusted_domains.is_empty()
    }
}

pub(crate) fn normalize_host(hostname: &str) -> String {
    hostname.trim().to_ascii_lowercase()
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pinfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
/// Environment overrides are applied on top of the file contents.
pub fn load_or_init() -> Result<PinfetchConfig, ConfigError> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PinfetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
    }
    load_from_path(&path, |key| std::env::var(key).ok())
}

/// Reads `path`, then applies environment overrides through `lookup`.
pub fn load_from_path<F>(path: &Path, lookup: F) -> Result<PinfetchConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let data = fs::read_to_string(path)?;
    let mut cfg: PinfetchConfig = toml::from_str(&data)?;
    cfg.apply_env_overrides(lookup)?;
    if cfg.fetch.timeout_secs == 0 {
        return Err(ConfigError::ZeroTimeout);
    }
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_values() {
        let cfg = PinfetchConfig::default();
        assert!(cfg.security.trusted_domains.is_empty());
        assert_eq!(cfg.security.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.fetch.timeout_secs, 10);
        assert!(cfg.fetch.user_agent.is_none());
    }

    #[test]
    fn config_toml_roundtrip() {
        let mut cfg = PinfetchConfig::default();
        cfg.security.trusted_domains = vec!["images.example.com".into()];
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: PinfetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.security.trusted_domains, cfg.security.trusted_domains);
        assert_eq!(parsed.security.max_upload_bytes, cfg.security.max_upload_bytes);
        assert_eq!(parsed.fetch.timeout_secs, cfg.fetch.timeout_secs);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            [security]
            trusted_domains = ["www.pexels.com", "www.istockphoto.com"]
            max_upload_bytes = 2_000_000

            [fetch]
            timeout_secs = 5
            user_agent = "movies-app/2.0"
        "#;
        let cfg: PinfetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.security.trusted_domains.len(), 2);
        assert_eq!(cfg.security.max_upload_bytes, 2_000_000);
        assert_eq!(cfg.fetch.timeout_secs, 5);
        assert_eq!(cfg.fetch.user_agent.as_deref(), Some("movies-app/2.0"));
    }

    #[test]
    fn config_toml_missing_sections_use_defaults() {
        let cfg: PinfetchConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.security.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert_eq!(cfg.fetch.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn config_toml_partial_sections_use_defaults() {
        let cfg: PinfetchConfig =
            toml::from_str("[security]\ntrusted_domains = [\"images.example.com\"]\n").unwrap();
        assert_eq!(cfg.security.trusted_domains, vec!["images.example.com".to_string()]);
        assert_eq!(cfg.security.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);

        let cfg: PinfetchConfig = toml::from_str("[fetch]\nuser_agent = \"x\"\n").unwrap();
        assert_eq!(cfg.fetch.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(cfg.fetch.user_agent.as_deref(), Some("x"));
    }

    #[test]
    fn load_from_path_partial_section_takes_env_size() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[security]\ntrusted_domains = [\"a.example.com\"]").unwrap();
        let cfg = load_from_path(f.path(), env(&[])).unwrap();
        assert_eq!(cfg.security.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        let cfg = load_from_path(f.path(), env(&[(ENV_MAX_UPLOAD_BYTES, "2048")])).unwrap();
        assert_eq!(cfg.security.max_upload_bytes, 2048);
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let mut cfg = PinfetchConfig::default();
        cfg.security.trusted_domains = vec!["old.example.com".into()];
        cfg.apply_env_overrides(env(&[
            (ENV_TRUSTED_DOMAINS, " www.pexels.com, ,www.istockphoto.com "),
            (ENV_MAX_UPLOAD_BYTES, "1048576"),
        ]))
        .unwrap();
        assert_eq!(
            cfg.security.trusted_domains,
            vec!["www.pexels.com".to_string(), "www.istockphoto.com".to_string()]
        );
        assert_eq!(cfg.security.max_upload_bytes, 1_048_576);
    }

    #[test]
    fn env_overrides_absent_keep_file_values() {
        let mut cfg = PinfetchConfig::default();
        cfg.security.trusted_domains = vec!["keep.example.com".into()];
        cfg.apply_env_overrides(env(&[])).unwrap();
        assert_eq!(cfg.security.trusted_domains, vec!["keep.example.com".to_string()]);
    }

    #[test]
    fn env_override_rejects_non_numeric_size() {
        let mut cfg = PinfetchConfig::default();
        let err = cfg
            .apply_env_overrides(env(&[(ENV_MAX_UPLOAD_BYTES, "ten megs")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MaxUploadBytesNotANumber { .. }));
    }

    #[test]
    fn max_bytes_boundaries() {
        let domains = ["images.example.com"];
        assert!(SecurityConfig::new(domains, 0).is_err());
        assert!(SecurityConfig::new(domains, MAX_UPLOAD_BYTES_CEILING + 1).is_err());
        let cfg = SecurityConfig::new(domains, MAX_UPLOAD_BYTES_CEILING).unwrap();
        assert_eq!(cfg.max_bytes(), 50 * 1024 * 1024);
        assert!(SecurityConfig::new(domains, 1).is_ok());
    }

    #[test]
    fn domains_are_normalized() {
        let cfg = SecurityConfig::new(["  Images.Example.COM ", ""], 1024).unwrap();
        assert!(cfg.is_trusted_domain("images.example.com"));
        assert!(cfg.is_trusted_domain(" IMAGES.example.com"));
        assert!(!cfg.is_trusted_domain("evil.example.com"));
        assert_eq!(cfg.trusted_domains().collect::<Vec<_>>(), vec!["images.example.com"]);
    }

    #[test]
    fn empty_allowlist_is_accepted_but_trusts_nothing() {
        let cfg = SecurityConfig::new(Vec::<String>::new(), 1024).unwrap();
        assert!(cfg.is_protection_disabled());
        assert!(!cfg.is_trusted_domain("images.example.com"));
        assert!(!cfg.is_trusted_domain(""));
    }

    #[test]
    fn load_from_path_applies_overrides() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            "[security]\ntrusted_domains = [\"a.example.com\"]\nmax_upload_bytes = 4096"
        )
        .unwrap();
        let cfg = load_from_path(f.path(), env(&[(ENV_MAX_UPLOAD_BYTES, "8192")])).unwrap();
        assert_eq!(cfg.security.trusted_domains, vec!["a.example.com".to_string()]);
        assert_eq!(cfg.security.max_upload_bytes, 8192);
    }

    #[test]
    fn load_from_path_rejects_zero_timeout() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "[fetch]\ntimeout_secs = 0").unwrap();
        assert!(matches!(
            load_from_path(f.path(), env(&[])),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn security_config_from_settings() {
        let mut cfg = PinfetchConfig::default();
        cfg.security.trusted_domains = vec!["cdn.example.com".into()];
        let sec = cfg.security_config().unwrap();
        assert!(sec.is_trusted_domain("cdn.example.com"));

        cfg.security.max_upload_bytes = 0;
        assert!(matches!(
            cfg.security_config(),
            Err(ConfigError::MaxUploadBytesOutOfRange(0))
        ));
    }
}
