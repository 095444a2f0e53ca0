//! Content digest of local files.
//!
//! The digest is the lowercase hex SHA-1 of the file content. It is the
//! value stored in cache descriptors and as `hash` metadata on buckets, so
//! it must stay stable across versions.

use camino::Utf8Path;
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::{io_error, FileInfo, Result};

const READ_BUF_SIZE: usize = 64 * 1024;

/// Hex SHA-1 of an in-memory buffer
pub fn bytes_digest(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// Hash the file at `path` and report its length and modification time.
pub async fn file_info(path: &Utf8Path) -> Result<FileInfo> {
    let mut f = tokio::fs::File::open(path)
        .await
        .map_err(|err| io_error!("{path}: {err}"))?;
    let metadata = f
        .metadata()
        .await
        .map_err(|err| io_error!("{path}: {err}"))?;

    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    let mut length = 0u64;
    loop {
        let n = f
            .read(&mut buf)
            .await
            .map_err(|err| io_error!("{path}: {err}"))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        length += n as u64;
    }

    if length != metadata.len() {
        log::warn!(
            "{path} changed while hashing ({} bytes announced, {length} read)",
            metadata.len()
        );
    }

    Ok(FileInfo {
        length,
        hash: hex::encode(hasher.finalize()),
        modified: metadata.modified().ok().map(|mt| mt.into()),
    })
}
