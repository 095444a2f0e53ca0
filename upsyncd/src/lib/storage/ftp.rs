use opendal::services::Ftp;
use upsync::config::FtpConfig;

use super::op::{Flavor, OpStorage};

pub fn storage(config: &FtpConfig) -> upsync::Result<OpStorage> {
    let scheme = if config.secure { "ftps" } else { "ftp" };
    let endpoint = format!("{scheme}://{}:{}", config.host, config.port);
    let base = config.base_path.trim_matches('/');

    let builder = Ftp::default()
        .endpoint(&endpoint)
        .user(&config.user)
        .password(&config.password)
        .root(&format!("/{base}"));

    let name = format!("{scheme}://{}@{}:{}/{base}", config.user, config.host, config.port);
    OpStorage::new(builder, Flavor::Ftp, name)
}
