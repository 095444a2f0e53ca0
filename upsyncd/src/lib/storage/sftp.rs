use opendal::services::Sftp;
use upsync::config::SftpConfig;

use super::op::{Flavor, OpStorage};

pub fn storage(config: &SftpConfig) -> upsync::Result<OpStorage> {
    let endpoint = format!("ssh://{}:{}", config.host, config.port);
    let base = config.base_path.trim_matches('/');

    let mut builder = Sftp::default()
        .endpoint(&endpoint)
        .user(&config.user)
        .root(&format!("/{base}"));
    if let Some(key) = &config.key {
        builder = builder.key(key.as_str());
    }
    if let Some(strategy) = &config.known_hosts_strategy {
        match strategy.as_str() {
            "strict" | "accept" | "add" => builder = builder.known_hosts_strategy(strategy),
            _ => {
                upsync::config_bail!(
                    "known_hosts_strategy must be one of strict, accept or add, got '{strategy}'"
                );
            }
        }
    }

    let name = format!("sftp://{}@{}:{}/{base}", config.user, config.host, config.port);
    OpStorage::new(builder, Flavor::Sftp, name)
}
