use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use revoice::session::{DOWNLOAD_FILE_NAME, SUPPORTED_EXTENSIONS};
use revoice::{Config, FinalizeReport, Pipeline, Session, SessionState};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub struct InteractiveResult {
    pub input: PathBuf,
    pub output: PathBuf,
    pub config: Config,
}

pub fn run_interactive_wizard(input: Option<PathBuf>) -> anyhow::Result<InteractiveResult> {
    print_header();

    let config = setup_azure()?;

    let input = match input {
        Some(path) => path,
        None => select_source_file()?,
    };

    let output = derive_output_path(&input);
    println!("  Output will be written to {}\n", style(output.display()).cyan());

    Ok(InteractiveResult {
        input,
        output,
        config,
    })
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Transcribe,
    Correct,
    Finalize,
}

impl Step {
    fn prompt(self) -> &'static str {
        match self {
            Step::Transcribe => "Transcribe audio?",
            Step::Correct => "Correct transcription?",
            Step::Finalize => "Replace audio in video?",
        }
    }

    fn message(self) -> &'static str {
        match self {
            Step::Transcribe => "Transcribing audio...",
            Step::Correct => "Correcting transcription...",
            Step::Finalize => "Generating audio and replacing in video...",
        }
    }
}

async fn attempt(
    pipeline: &Pipeline,
    session: &mut Session,
    step: Step,
) -> revoice::Result<Option<FinalizeReport>> {
    match step {
        Step::Transcribe => pipeline.transcribe(session).await.map(|_| None),
        Step::Correct => pipeline.correct(session).await.map(|_| None),
        Step::Finalize => pipeline.finalize(session).await.map(Some),
    }
}

/// Run `step`, offering a retry while it fails.
async fn with_retry(
    pipeline: &Pipeline,
    session: &mut Session,
    step: Step,
) -> anyhow::Result<Option<FinalizeReport>> {
    loop {
        let pb = spinner(step.message());
        let result = attempt(pipeline, session, step).await;
        pb.finish_and_clear();

        match result {
            Ok(report) => {
                println!(
                    "{} {}",
                    style("✓").green(),
                    step.message().trim_end_matches("...")
                );
                return Ok(report);
            }
            Err(e) => {
                println!("{} {}", style("✗").red(), e);
                let choice = Select::new()
                    .with_prompt("What next?")
                    .items(&["Retry", "Abort"])
                    .default(0)
                    .interact()?;
                if choice == 1 {
                    return Err(e.into());
                }
            }
        }
    }
}

/// Walk the session through each step, asking before each one.
pub async fn run_steps(
    pipeline: &Pipeline,
    session: &mut Session,
    output: &Path,
) -> anyhow::Result<()> {
    let mut report = None;

    for step in [Step::Transcribe, Step::Correct, Step::Finalize] {
        if !Confirm::new()
            .with_prompt(step.prompt())
            .default(true)
            .interact()?
        {
            anyhow::bail!("Cancelled by user");
        }

        report = with_retry(pipeline, session, step).await?;
        print_transcript(session.state());

        if let Some(correction) = session.state().correction() {
            if matches!(step, Step::Correct) && correction.is_error() {
                println!(
                    "{} The language model returned an error; that text will be spoken",
                    style("!").yellow()
                );
            }
        }
    }

    let report = report.ok_or_else(|| anyhow::anyhow!("Finalize produced no report"))?;
    let saved = session.export_final(output)?;
    revoice::print_summary(session, &report);
    println!("{} Saved to {}", style("✓").green(), style(saved.display()).cyan());
    Ok(())
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn print_transcript(state: &SessionState) {
    if let Some(transcript) = state.transcript() {
        println!("  {} {}", style("Initial transcription:").bold(), transcript);
    }
    if let Some(correction) = state.correction() {
        println!("  {} {}", style("Corrected transcription:").bold(), correction);
    }
    println!();
}

fn print_header() {
    println!();
    println!(
        "{}",
        style("╔═══════════════════════════════════════════════════╗").cyan()
    );
    println!(
        "{}",
        style("║       revoice - AI Video Audio Correction         ║").cyan()
    );
    println!(
        "{}",
        style("╚═══════════════════════════════════════════════════╝").cyan()
    );
    println!();
}

fn setup_azure() -> anyhow::Result<Config> {
    let mut config = Config::load().unwrap_or_default();

    if config.azure_openai_key.is_some() && config.azure_openai_endpoint.is_some() {
        println!("{} Azure OpenAI configured", style("✓").green());
        return Ok(config);
    }

    println!("{} Azure OpenAI settings not found", style("!").yellow());

    if config.azure_openai_endpoint.is_none() {
        let endpoint: String = Input::new()
            .with_prompt("Enter the chat/completions deployment URL")
            .interact_text()?;
        if endpoint.trim().is_empty() {
            anyhow::bail!("Endpoint is required");
        }
        config.azure_openai_endpoint = Some(endpoint.trim().to_string());
    }

    if config.azure_openai_key.is_none() {
        let api_key: String = Input::new()
            .with_prompt("Enter your Azure OpenAI API key")
            .interact_text()?;
        if api_key.trim().is_empty() {
            anyhow::bail!("API key is required");
        }
        config.azure_openai_key = Some(api_key.trim().to_string());
    }

    if Confirm::new()
        .with_prompt("Save settings to config file?")
        .default(true)
        .interact()?
    {
        save_config(&config)?;
        println!("{} Settings saved to config\n", style("✓").green());
    }

    Ok(config)
}

fn save_config(config: &Config) -> anyhow::Result<()> {
    if let Some(config_dir) = dirs::config_dir() {
        let revoice_dir = config_dir.join("revoice");
        fs::create_dir_all(&revoice_dir)?;

        let config_path = revoice_dir.join("config.toml");
        let toml_content = toml::to_string_pretty(config)?;
        fs::write(config_path, toml_content)?;
    }
    Ok(())
}

fn select_source_file() -> anyhow::Result<PathBuf> {
    println!("\n{}", style("Select source video:").bold());

    let files = scan_video_files(".")?;

    if files.is_empty() {
        println!("  No video files found in current directory.\n");
        return prompt_path();
    }

    let mut items: Vec<String> = files
        .iter()
        .map(|f| {
            let size = fs::metadata(f)
                .map(|m| format_size(m.len()))
                .unwrap_or_else(|_| "?".to_string());
            format!("{} ({})", f.display(), size)
        })
        .collect();
    items.push("Enter custom path...".to_string());

    let selection = Select::new()
        .with_prompt("Choose a file")
        .items(&items)
        .default(0)
        .interact()?;

    if selection == files.len() {
        prompt_path()
    } else {
        Ok(files[selection].clone())
    }
}

fn prompt_path() -> anyhow::Result<PathBuf> {
    let path: String = Input::new()
        .with_prompt("Enter file path")
        .interact_text()?;
    let path = PathBuf::from(path);
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }
    Ok(path)
}

fn scan_video_files(dir: &str) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
                    files.push(path);
                }
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Default export path: the download name next to the input, numbered when
/// the input itself already carries that name.
pub fn derive_output_path(input: &Path) -> PathBuf {
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let default = dir.join(DOWNLOAD_FILE_NAME);
    if input.file_name() != default.file_name() {
        return default;
    }

    let stem = Path::new(DOWNLOAD_FILE_NAME)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("SynchronizedAI_Video");
    (2..)
        .map(|n| dir.join(format!("{stem}_{n}.mp4")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(default)
}
