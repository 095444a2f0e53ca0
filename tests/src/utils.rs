use camino::{Utf8Path, Utf8PathBuf};
use futures::future::BoxFuture;
use tokio::fs;

pub fn temp_path(prefix: Option<&str>, ext: Option<&str>) -> Utf8PathBuf {
    use rand::{distributions::Alphanumeric, Rng};

    let mut filename = String::new();
    if let Some(prefix) = prefix {
        filename.push_str(prefix);
        filename.push('-');
    }
    let rnd: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    filename.push_str(&rnd);
    if let Some(ext) = ext {
        filename.push('.');
        filename.push_str(ext);
    }
    let mut p = std::env::temp_dir();
    p.push(filename);
    p.try_into().unwrap()
}

/// Relative paths of every file under `root`, sorted
pub async fn file_paths(root: &Utf8Path) -> Vec<String> {
    fn inner<'a>(root: &'a Utf8Path, dir: String, paths: &'a mut Vec<String>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let mut entries = fs::read_dir(root.join(&dir)).await.unwrap();
            while let Some(entry) = entries.next_entry().await.unwrap() {
                let name = entry.file_name().into_string().unwrap();
                let path = upsyncd::join_path(&dir, &name);
                if entry.file_type().await.unwrap().is_dir() {
                    inner(root, path, paths).await;
                } else {
                    paths.push(path);
                }
            }
        })
    }

    let mut paths = Vec::new();
    inner(root, String::new(), &mut paths).await;
    paths.sort();
    paths
}
