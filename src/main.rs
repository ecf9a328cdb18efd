mod interactive;

use anyhow::{Context, Result};
use clap::Parser;
use revoice::config::{Config, CorrectionErrorPolicy};
use revoice::{print_summary, Pipeline, Session};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "revoice")]
#[command(version, about = "Correct the grammar of a video's speech track using AI")]
#[command(
    long_about = "Transcribe a video with Google Speech-to-Text, correct the transcript with Azure OpenAI, re-synthesize it with Google Text-to-Speech and mux the time-aligned speech back into the video."
)]
struct Cli {
    /// Input video file (prompted for in interactive mode when omitted)
    input: Option<PathBuf>,

    /// Where to write the final video (defaults to SynchronizedAI_Video.mp4 next to the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Language tag for recognition and synthesis (e.g., en-US)
    #[arg(short, long)]
    language: Option<String>,

    /// Text-to-Speech voice name (e.g., en-US-Wavenet-C)
    #[arg(long)]
    voice: Option<String>,

    /// Stop instead of speaking the error text when correction fails
    #[arg(long)]
    halt_on_correction_error: bool,

    /// Ask before each step and offer retries
    #[arg(short, long)]
    interactive: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(ref language) = cli.language {
        config.language = language.clone();
    }
    if let Some(ref voice) = cli.voice {
        config.voice = voice.clone();
    }
    if cli.halt_on_correction_error {
        config.correction_error_policy = CorrectionErrorPolicy::Halt;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let (input, output, mut config) = if cli.interactive {
        let result = interactive::run_interactive_wizard(cli.input.clone())?;
        (
            result.input,
            cli.output.clone().unwrap_or(result.output),
            result.config,
        )
    } else {
        let input = cli
            .input
            .clone()
            .context("An input video is required (or use --interactive)")?;
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| interactive::derive_output_path(&input));
        let config = Config::load().context("Failed to load configuration")?;
        (input, output, config)
    };

    apply_cli(&mut config, &cli);

    let pipeline = Pipeline::from_config(&config).context("Failed to set up pipeline")?;
    let mut session = Session::new(&input)
        .with_context(|| format!("Cannot use {}", input.display()))?;

    info!("Input:    {}", input.display());
    info!("Output:   {}", output.display());
    info!("Language: {}", config.language);
    info!("Voice:    {}", config.voice);
    info!("Session:  {}", session.id());

    if cli.interactive {
        return interactive::run_steps(&pipeline, &mut session, &output).await;
    }

    let pb = interactive::spinner("Processing video...");
    let report = pipeline.run_all(&mut session).await;
    pb.finish_and_clear();
    let report = report?;

    let saved = session.export_final(&output)?;
    print_summary(&session, &report);
    info!("Saved final video to {}", saved.display());

    Ok(())
}
