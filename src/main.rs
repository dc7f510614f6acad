use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use search_batch::{
    Config, Credentials, Dispatcher, NoopReporter, ProgressReporter, RestSearchClient,
    TerminalReporter, load_jobs,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Run a batch of searches with bounded concurrency", long_about = None)]
struct Args {
    /// Job list CSV (title, host, app, query, output)
    #[arg(short, long)]
    queries: Option<PathBuf>,

    /// Progress snapshot CSV, overwritten as jobs finish
    #[arg(short, long)]
    progress_file: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Maximum searches in flight at once
    #[arg(short = 'n', long)]
    max_concurrent: Option<usize>,

    /// Seconds between poll cycles
    #[arg(short = 'i', long)]
    poll_interval: Option<u64>,

    /// Give up on a job after this many polls
    #[arg(long)]
    max_polls: Option<u32>,

    /// Give up on a job this many seconds after submission
    #[arg(long)]
    job_timeout: Option<u64>,

    /// Skip TLS certificate verification
    #[arg(long)]
    insecure: bool,

    /// Do not draw the progress table
    #[arg(long)]
    no_render: bool,
}

impl Args {
    /// Command-line flags win over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.queries {
            config.output.query_file = path.clone();
        }
        if let Some(path) = &self.progress_file {
            config.output.progress_file = path.clone();
        }
        if let Some(n) = self.max_concurrent {
            config.dispatch.max_concurrent_searches = n;
        }
        if let Some(secs) = self.poll_interval {
            config.dispatch.poll_interval = Duration::from_secs(secs);
        }
        if self.max_polls.is_some() {
            config.dispatch.max_polls = self.max_polls;
        }
        if let Some(secs) = self.job_timeout {
            config.dispatch.job_timeout = Some(Duration::from_secs(secs));
        }
        if self.insecure {
            config.service.accept_invalid_certs = true;
        }
        if self.no_render {
            config.output.render_progress = false;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "batch aborted before dispatch");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> search_batch::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    args.apply(&mut config);
    config.credentials = Credentials::from_env()?;
    config.validate()?;

    let jobs = load_jobs(&config.output.query_file)?;
    if jobs.is_empty() {
        tracing::warn!(path = %config.output.query_file.display(), "job list has no runnable jobs");
    }

    let client = RestSearchClient::new(&config.service, config.credentials.clone())?;
    let reporter: Arc<dyn ProgressReporter> = if !config.output.render_progress {
        Arc::new(NoopReporter)
    } else if std::io::stdout().is_terminal() {
        Arc::new(TerminalReporter::new())
    } else {
        // redirected output: keep every table instead of clearing
        Arc::new(TerminalReporter::appending())
    };

    let mut dispatcher = Dispatcher::new(config, Arc::new(client), jobs)?.with_reporter(reporter);
    let summary = dispatcher.run().await;

    println!(
        "All searches complete: {} done, {} failed, {} timed out",
        summary.done, summary.failed, summary.timed_out
    );
    Ok(())
}
