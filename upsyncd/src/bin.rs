use std::process::ExitCode;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use upsync::{Config, UploadTask};
use upsyncd::{local::LocalTree, service::DryRun, Progress, Service};

const CONFIG_FILE: &str = "upsync.json";

#[derive(Parser)]
#[command(name = "upsyncd")]
#[command(author, version, about, long_about=None)]
struct Cli {
    /// Configuration file. Defaults to upsync.json next to the executable,
    /// then in the current directory.
    #[arg(long, global = true)]
    config: Option<Utf8PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Publish DIR to the configured backend
    Sync { dir: Utf8PathBuf },
    /// Print what a synchronization of DIR would do
    Plan { dir: Utf8PathBuf },
    /// Write a descriptor beside each top-level directory of DIR
    Hash { dir: Utf8PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Could not start the runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    exit_program(rt.block_on(run(cli)))
}

fn init_logger(debug: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Sync { dir } => {
            let config = setup(cli.config.as_deref()).await?;
            sync(&config, dir).await
        }
        Commands::Plan { dir } => {
            let config = setup(cli.config.as_deref()).await?;
            plan(&config, dir).await
        }
        Commands::Hash { dir } => {
            init_logger(false);
            hash(dir).await
        }
    }
}

/// Load the configuration and start logging at the level it asks for
async fn setup(path: Option<&Utf8Path>) -> anyhow::Result<Config> {
    let config = load_config(path).await;
    init_logger(config.as_ref().map(|c| c.debug).unwrap_or(false));
    let config = config?;
    log::trace!("Loaded config: {config:?}");
    Ok(config)
}

async fn load_config(path: Option<&Utf8Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(path) => path.to_owned(),
        None => default_config_file()?,
    };
    if !path.exists() {
        anyhow::bail!("No such config file: {path}");
    }
    Config::load_from_file(&path).await
}

fn default_config_file() -> anyhow::Result<Utf8PathBuf> {
    let exe = std::env::current_exe().context("Could not locate the executable")?;
    let exe = Utf8PathBuf::try_from(exe)?;
    if let Some(dir) = exe.parent() {
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            return Ok(path);
        }
    }
    let cwd = std::env::current_dir().context("Could not read the current directory")?;
    Ok(Utf8PathBuf::try_from(cwd)?.join(CONFIG_FILE))
}

async fn sync(config: &Config, dir: &Utf8Path) -> anyhow::Result<()> {
    let service = Service::new(config, dir).with_context(|| format!("Cannot sync {dir}"))?;
    let progress = BarProgress::new();
    let plan = service
        .sync(&progress)
        .await
        .with_context(|| format!("Sync of {dir} to {} failed", service.provider().name()))?;
    if plan.is_empty() {
        log::info!("{} is up to date", service.provider().name());
    } else {
        log::info!("{} synchronized", service.provider().name());
    }
    Ok(())
}

async fn plan(config: &Config, dir: &Utf8Path) -> anyhow::Result<()> {
    let service = Service::new(config, dir).with_context(|| format!("Cannot plan {dir}"))?;
    let DryRun { plan, fragments } = service
        .dry_run()
        .await
        .with_context(|| format!("Plan of {dir} against {} failed", service.provider().name()))?;

    for path in &plan.obsolete_files {
        println!("delete  {path}");
    }
    for path in plan.obsolete_directories.iter().rev() {
        println!("rmdir   {path}");
    }
    for path in &plan.new_directories {
        println!("mkdir   {path}");
    }
    for (path, info) in &plan.new_files {
        println!("upload  {path} ({})", HumanBytes(info.length));
    }
    for fragment in &fragments {
        println!("partial {fragment}");
    }
    if plan.is_empty() {
        println!("nothing to do");
    }
    Ok(())
}

async fn hash(dir: &Utf8Path) -> anyhow::Result<()> {
    let local = LocalTree::new(dir).with_context(|| format!("Cannot hash {dir}"))?;
    let written = local
        .write_descriptors()
        .await
        .with_context(|| format!("Cannot write descriptors of {dir}"))?;
    for path in written {
        println!("{path}");
    }
    Ok(())
}

struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:20}] {pos}/{len} ({percent}%) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        let bar = ProgressBar::hidden();
        bar.set_style(style);
        Self { bar }
    }
}

impl Progress for BarProgress {
    fn start(&self, total: usize, length: u64) {
        if total == 0 {
            return;
        }
        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total as u64);
        self.bar.set_message(HumanBytes(length).to_string());
    }

    fn advance(&self, done: usize, task: &UploadTask, res: &upsync::Result<()>) {
        self.bar.set_position(done as u64);
        if let Err(err) = res {
            self.bar.println(format!("{} failed: {err}", task.remote_path));
        }
    }

    fn finish(&self, done: usize, failed: usize) {
        if done == 0 {
            return;
        }
        self.bar
            .finish_with_message(format!("{} done, {failed} failed", done.saturating_sub(failed)));
    }
}

fn exit_program(res: anyhow::Result<()>) -> ExitCode {
    match res {
        Ok(..) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
