use opendal::services::Fs;
use upsync::config::FsConfig;

use super::op::{Flavor, OpStorage};

/// Mirror into a local or mounted directory.
/// Fails if `root` is not absolute.
pub fn storage(config: &FsConfig) -> upsync::Result<OpStorage> {
    if !config.root.is_absolute() {
        upsync::config_bail!("fs root must be absolute, got {}", config.root);
    }
    let builder = Fs::default().root(config.root.as_str());
    OpStorage::new(builder, Flavor::Fs, format!("file://{}", config.root))
}
