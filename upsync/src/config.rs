use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};

use crate::headers::{HeaderRule, HeaderRules};

pub const DEFAULT_CACHE_FILE: &str = ".upsync-cache.json";
pub const DEFAULT_WORKERS: usize = 16;

#[derive(Debug, Default)]
pub struct PatternList(Vec<Pattern>, MatchOptions);

impl PatternList {
    pub fn new<I>(patterns: I, opts: MatchOptions) -> crate::Result<PatternList>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let patterns: Result<Vec<_>, _> = patterns
            .into_iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect();
        Ok(PatternList(patterns?, opts))
    }

    pub fn matches_with<P: AsRef<Utf8Path>>(&self, path: P) -> bool {
        self.0
            .iter()
            .any(|p| p.matches_with(path.as_ref().as_str(), self.1))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Options used for every path pattern of the configuration.
/// `*` crosses directory separators so that `*.html` applies at any depth.
pub fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3 compatible services (COS, OSS, MinIO...)
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Address the bucket as `<bucket>.<endpoint>` instead of `<endpoint>/<bucket>`
    #[serde(default)]
    pub virtual_host_style: bool,
    #[serde(default)]
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FtpConfig {
    pub host: String,
    #[serde(default = "default_ftp_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Use explicit FTPS
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub user: String,
    /// Private key file. The SSH agent is used when absent.
    #[serde(default)]
    pub key: Option<Utf8PathBuf>,
    /// One of `strict`, `accept` or `add`
    #[serde(default)]
    pub known_hosts_strategy: Option<String>,
    #[serde(default)]
    pub base_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FsConfig {
    pub root: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderConfig {
    Bucket(BucketConfig),
    Ftp(FtpConfig),
    Sftp(SftpConfig),
    Fs(FsConfig),
}

fn default_ftp_port() -> u16 {
    21
}

fn default_sftp_port() -> u16 {
    22
}

fn default_cache_file() -> String {
    DEFAULT_CACHE_FILE.to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    /// Name of the cache descriptor, relative to the backend base path
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
    /// Number of parallel upload workers
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub header_rules: Vec<HeaderRule>,
    /// Local paths excluded from synchronization
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Write `<dir>.json` descriptors beside top-level directories before syncing
    #[serde(default)]
    pub write_descriptors: bool,
    /// Compare files by size and modification time when the backend has no hash
    #[serde(default)]
    pub trust_mtime: bool,
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            cache_file: default_cache_file(),
            workers: default_workers(),
            header_rules: Vec::new(),
            ignore: Vec::new(),
            write_descriptors: false,
            trust_mtime: false,
            debug: false,
        }
    }

    pub async fn load_from_file(path: &Utf8Path) -> anyhow::Result<Self> {
        let config_json = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read config from {path}"))?;
        let config_json = std::str::from_utf8(&config_json)?;
        let config: Config = serde_json::from_str(config_json)
            .with_context(|| format!("Failed to parse config {path}"))?;
        config.check()?;
        Ok(config)
    }

    /// Check the values that serde can't.
    pub fn check(&self) -> crate::Result<()> {
        if self.workers == 0 {
            crate::config_bail!("workers must be at least 1");
        }
        if self.cache_file.is_empty() || self.cache_file.contains('/') {
            crate::config_bail!(
                "cache_file must be a plain file name, got '{}'",
                self.cache_file
            );
        }
        self.ignore_patterns()?;
        self.header_rules()?;
        Ok(())
    }

    pub fn ignore_patterns(&self) -> crate::Result<PatternList> {
        PatternList::new(&self.ignore, match_options())
    }

    pub fn header_rules(&self) -> crate::Result<HeaderRules> {
        HeaderRules::new(&self.header_rules)
    }
}
