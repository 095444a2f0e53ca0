//! Bounded parallel execution of upload tasks.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};
use upsync::{config::DEFAULT_WORKERS, UploadTask};

use crate::Provider;

/// Width of the progress bar, in cells
pub const BAR_WIDTH: usize = 20;

/// Observer of an upload batch. Never used for control flow.
pub trait Progress: Send + Sync {
    fn start(&self, total: usize, length: u64) {
        let _ = (total, length);
    }

    /// Called once per task, `done` counting every task finished so far
    fn advance(&self, done: usize, task: &UploadTask, res: &upsync::Result<()>) {
        let _ = (done, task, res);
    }

    fn finish(&self, done: usize, failed: usize) {
        let _ = (done, failed);
    }
}

/// Reports nothing
#[derive(Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {}

/// Reports progress through the log
#[derive(Debug)]
pub struct LogProgress {
    started: Instant,
    total: std::sync::atomic::AtomicUsize,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            total: Default::default(),
        }
    }
}

impl Progress for LogProgress {
    fn start(&self, total: usize, length: u64) {
        use std::sync::atomic::Ordering;

        self.total.store(total, Ordering::Relaxed);
        log::info!("uploading {total} files ({length} bytes)");
    }

    fn advance(&self, done: usize, _task: &UploadTask, _res: &upsync::Result<()>) {
        use std::sync::atomic::Ordering;

        let total = self.total.load(Ordering::Relaxed);
        log::info!(
            "{} {}",
            format_elapsed(self.started.elapsed()),
            progress_line(done, total)
        );
    }

    fn finish(&self, done: usize, failed: usize) {
        log::info!("{done} uploads done, {failed} failed");
    }
}

/// `[#####...............]  5/20  25%`
pub fn progress_line(done: usize, total: usize) -> String {
    let (cells, pct) = if total == 0 {
        (BAR_WIDTH, 100)
    } else {
        (done * BAR_WIDTH / total, done * 100 / total)
    };
    format!(
        "[{}{}] {done:>w$}/{total} {pct:>3}%",
        "#".repeat(cells),
        ".".repeat(BAR_WIDTH - cells),
        w = total.to_string().len()
    )
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
}

/// Runs upload tasks on a fixed number of workers.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    workers: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl Scheduler {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Upload every task and wait until all workers are done.
    ///
    /// A failed upload doesn't stop the others. The error returned
    /// once the batch is over reports how many failed.
    pub async fn run<P>(
        &self,
        provider: Arc<P>,
        tasks: Vec<UploadTask>,
        progress: &dyn Progress,
    ) -> upsync::Result<()>
    where
        P: Provider + ?Sized + 'static,
    {
        let total = tasks.len();
        progress.start(total, tasks.iter().map(|t| t.length).sum());
        if total == 0 {
            progress.finish(0, 0);
            return Ok(());
        }

        let workers = self.workers.min(total);
        log::debug!("starting {workers} upload workers for {total} tasks");

        let (task_tx, task_rx) = mpsc::channel::<UploadTask>(workers * 2);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (res_tx, mut res_rx) = mpsc::unbounded_channel::<(UploadTask, upsync::Result<()>)>();

        let mut set = JoinSet::new();

        set.spawn(async move {
            for task in tasks {
                if task_tx.send(task).await.is_err() {
                    break;
                }
            }
        });

        for id in 0..workers {
            let task_rx = task_rx.clone();
            let res_tx = res_tx.clone();
            let provider = provider.clone();
            set.spawn(async move {
                loop {
                    let task = task_rx.lock().await.recv().await;
                    let Some(task) = task else {
                        break;
                    };
                    log::trace!("worker {id} picked {}", task.remote_path);
                    let res = provider.upload(&task).await;
                    if res_tx.send((task, res)).is_err() {
                        break;
                    }
                }
                log::trace!("worker {id} done");
            });
        }
        // the channel closes when the last worker exits
        drop(res_tx);

        let mut done = 0;
        let mut failed = 0;
        let mut first_error = None;
        while done < total {
            let Some((task, res)) = res_rx.recv().await else {
                break;
            };
            done += 1;
            if let Err(err) = &res {
                log::error!("upload of {} failed: {err}", task.remote_path);
                failed += 1;
                first_error.get_or_insert_with(|| format!("{}: {err}", task.remote_path));
            }
            progress.advance(done, &task, &res);
        }

        while let Some(res) = set.join_next().await {
            if let Err(err) = res {
                log::error!("upload worker failed: {err}");
            }
        }

        // results lost with a panicked worker
        if done < total {
            failed += total - done;
            first_error.get_or_insert_with(|| "upload worker panicked".to_string());
        }
        progress.finish(done, failed);

        match first_error {
            Some(first) => Err(upsync::Error::Upload {
                failed,
                total,
                first,
            }),
            None => Ok(()),
        }
    }
}
