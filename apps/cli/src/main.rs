use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use glimpse_core::{
    FfmpegExtractor, FrameCount, HttpAnalysisClient, Provider, Session, VideoFile,
    format_report_readable,
};
use tracing_subscriber::EnvFilter;

use crate::progress::{format_duration, render_events};

mod progress;

/// CLI wrapper for Provider enum (needed for clap ValueEnum)
#[derive(Clone, Copy, Default, ValueEnum)]
enum CliProvider {
    #[default]
    Gemini,
    Openai,
    Grok,
}

impl From<CliProvider> for Provider {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::Gemini => Provider::Gemini,
            CliProvider::Openai => Provider::Openai,
            CliProvider::Grok => Provider::Grok,
        }
    }
}

#[derive(Parser)]
#[command(name = "glimpse")]
#[command(about = "Sample frames from a video and generate an AI-powered summary")]
struct Cli {
    /// Video file to analyze
    video: PathBuf,

    /// Number of frames to sample
    #[arg(
        short = 'n',
        long,
        default_value_t = FrameCount::DEFAULT,
        value_parser = clap::value_parser!(u32).range(FrameCount::MIN as i64..=FrameCount::MAX as i64)
    )]
    frames: u32,

    /// AI provider for the analysis
    #[arg(short, long, default_value = "gemini")]
    provider: CliProvider,

    /// Model to use instead of the provider's default
    #[arg(long)]
    model: Option<String>,

    /// Chat completions endpoint to use instead of the provider's default
    #[arg(long)]
    endpoint: Option<String>,

    /// Downscale frames wider than this many pixels (0 keeps the source size)
    #[arg(long, default_value_t = 1024)]
    max_width: u32,

    /// Print the result as JSON instead of a readable report
    #[arg(long)]
    json: bool,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,glimpse=debug,glimpse_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let provider: Provider = cli.provider.into();

    // Validate API key early
    let mut client = match HttpAnalysisClient::from_env(provider) {
        Ok(client) => client,
        Err(e) => fail(e),
    };
    if let Some(model) = cli.model {
        client = client.with_model(model);
    }
    if let Some(endpoint) = cli.endpoint {
        client = client.with_endpoint(endpoint);
    }

    let extractor =
        FfmpegExtractor::new().with_max_width((cli.max_width > 0).then_some(cli.max_width));

    println!(
        "\n{}  {}\n",
        style("glimpse").cyan().bold(),
        style("Video Summarizer").dim()
    );

    let model = client.model().to_string();
    let mut session = Session::new(Arc::new(extractor), Arc::new(client));
    let events = session.subscribe();
    let renderer = tokio::spawn(render_events(events, provider.name(), model));

    if let Err(e) = session.select_file(VideoFile::from_path(&cli.video)) {
        fail(e.user_message());
    }
    session.set_frame_count(cli.frames)?;

    if let Some(preview) = session.preview() {
        println!("{} {}", style("Video:").dim(), style(preview.url()).cyan());
    }
    println!("{}", style("─".repeat(60)).dim());

    let total_start = Instant::now();
    let outcome = session.analyze().await.cloned().map_err(|e| e.user_message());

    // Closing the event stream lets the renderer finish its bars
    drop(session);
    let _ = renderer.await;

    let result = match outcome {
        Ok(result) => result,
        Err(message) => fail(message),
    };

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );
    println!("{}", style("─".repeat(60)).dim());

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_report_readable(&result));
    }

    Ok(())
}
