//! Command-line interface definitions and subcommand handlers.
//!
//! Each generation subcommand prints one JSON object: the success object on
//! stdout, or the error object on stderr with exit status 1.

use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config::{default_path, Settings, DEFAULT_CONFIG};
use crate::genai::{
    prompt_or_default, GenAiError, MediaAsset, Orchestrator, RunOutcome, TransportKind,
    DEFAULT_ANIMATION_PROMPT, DEFAULT_IMAGE_PROMPT,
};
use crate::output::{timestamp, timestamped_path};

// ==================== CLI Arguments ====================

/// Generate a still image from a prompt and animate it into a short video
#[derive(Parser, Debug)]
#[command(name = "animated-image")]
#[command(version, about = "Text to image to video with Google generative models", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Transport used to reach the API
    #[arg(long, global = true)]
    pub transport: Option<TransportKind>,

    /// Directory for generated files (overrides OUTPUT_DIR)
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Give up polling a video job after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate a still image
    Image {
        /// Image prompt (words are joined with spaces)
        prompt: Vec<String>,
    },
    /// Animate an existing image into a video
    Video {
        /// Path to the conditioning image
        image: PathBuf,
        /// Animation prompt (guessed from the file name when omitted)
        prompt: Vec<String>,
    },
    /// Generate an image, then animate it
    Demo {
        image_prompt: Option<String>,
        animation_prompt: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Create default config file
    Init,
}

impl Args {
    /// Command-line values win over file and environment values.
    pub fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(kind) = self.transport {
            settings.api.transport = kind;
        }
        if let Some(dir) = &self.output_dir {
            settings.output.dir = dir.clone();
        }
        if let Some(secs) = self.timeout_secs {
            settings.polling.timeout_ms = Duration::from_secs(secs).as_millis() as u64;
        }
    }

    /// Flags forwarded to child processes spawned by `demo`.
    fn forwarded_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if let Some(path) = &self.config {
            flags.push("--config".to_string());
            flags.push(path.display().to_string());
        }
        if let Some(kind) = self.transport {
            flags.push("--transport".to_string());
            flags.push(
                match kind {
                    TransportKind::Rest => "rest",
                    TransportKind::Sdk => "sdk",
                }
                .to_string(),
            );
        }
        if let Some(dir) = &self.output_dir {
            flags.push("--output-dir".to_string());
            flags.push(dir.display().to_string());
        }
        if let Some(secs) = self.timeout_secs {
            flags.push("--timeout-secs".to_string());
            flags.push(secs.to_string());
        }
        flags
    }
}

/// Join positional words into a prompt; `None` when nothing was given.
pub fn joined_prompt(words: &[String]) -> Option<String> {
    let joined = words.join(" ");
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Pick an animation prompt from keywords in the image file name.
pub fn guess_animation_prompt(image_path: &Path) -> &'static str {
    let name = image_path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.contains("ball") {
        "Animate the scene to show the ball rolling naturally across the surface."
    } else if name.contains("child") || name.contains("person") {
        "Animate the scene to show the subject running smoothly forward with natural motion."
    } else if name.contains("car") {
        "Animate the scene to show the car moving forward along the road."
    } else if name.contains("flag") {
        "Animate the scene to show the flag waving gently in the wind."
    } else {
        "Animate the scene to introduce a subtle, natural movement consistent with the image context."
    }
}

// ==================== Subcommand Handlers ====================

/// Load settings from file, environment and flags.
pub fn load_settings(args: &Args) -> Result<Settings, String> {
    let mut settings = Settings::load(args.config.as_deref()).map_err(|e| e.to_string())?;
    settings.apply_env(|name| std::env::var(name).ok());
    args.apply_overrides(&mut settings);
    Ok(settings)
}

/// Run the parsed command and return the process exit status.
pub async fn run(args: Args) -> i32 {
    match &args.command {
        Command::Config { action } => handle_config_action(action.clone(), &args),
        Command::Demo {
            image_prompt,
            animation_prompt,
        } => {
            let image_prompt = prompt_or_default(image_prompt.as_deref(), DEFAULT_IMAGE_PROMPT);
            let animation_prompt =
                prompt_or_default(animation_prompt.as_deref(), DEFAULT_ANIMATION_PROMPT);
            match run_demo(&args, &image_prompt, &animation_prompt).await {
                Ok(()) => 0,
                Err(message) => {
                    eprintln!("{}", message);
                    1
                }
            }
        }
        Command::Image { prompt } => {
            let prompt = prompt_or_default(joined_prompt(prompt).as_deref(), DEFAULT_IMAGE_PROMPT);
            let outcome = match load_settings(&args) {
                Ok(settings) => RunOutcome::from_result(&run_image(&settings, &prompt).await),
                Err(message) => RunOutcome::Error { message },
            };
            emit(&outcome)
        }
        Command::Video { image, prompt } => {
            let prompt = joined_prompt(prompt)
                .unwrap_or_else(|| guess_animation_prompt(image).to_string());
            let outcome = match load_settings(&args) {
                Ok(settings) => RunOutcome::from_result(&run_video(&settings, image, &prompt).await),
                Err(message) => RunOutcome::Error { message },
            };
            emit(&outcome)
        }
    }
}

/// Print an outcome as JSON and return its exit status.
pub fn emit(outcome: &RunOutcome) -> i32 {
    match outcome {
        RunOutcome::Ok { .. } => match serde_json::to_string_pretty(outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        },
        RunOutcome::Error { .. } => match serde_json::to_string(outcome) {
            Ok(json) => eprintln!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        },
    }
    outcome.exit_code()
}

/// Generate an image into `output_dir/image-<timestamp>.<ext>`.
pub async fn run_image(settings: &Settings, prompt: &str) -> Result<MediaAsset, GenAiError> {
    let orchestrator = Orchestrator::new(settings.to_genai_config()?)?;
    let stem = format!("image-{}", timestamp());
    orchestrator
        .generate_image_in(prompt, &settings.output.dir, &stem)
        .await
}

/// Animate `image` into `output_dir/video-<timestamp>.mp4`.
///
/// Ctrl-C cancels the run at any stage: submission, polling or download.
pub async fn run_video(
    settings: &Settings,
    image: &Path,
    prompt: &str,
) -> Result<MediaAsset, GenAiError> {
    let orchestrator = Orchestrator::new(settings.to_genai_config()?)?;
    let destination = timestamped_path(&settings.output.dir, "video", "mp4");

    let cancel = orchestrator.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, cancelling video job");
            cancel.cancel();
        }
    });

    let result = until_cancelled(
        orchestrator.cancellation_token(),
        "video job",
        orchestrator.animate_image_file(image, prompt, &destination),
    )
    .await;
    watcher.abort();
    result
}

/// Drive `run` to completion unless `cancel` fires first.
async fn until_cancelled<T, F>(cancel: CancellationToken, label: &str, run: F) -> Result<T, GenAiError>
where
    F: Future<Output = Result<T, GenAiError>>,
{
    tokio::select! {
        result = run => result,
        _ = cancel.cancelled() => Err(GenAiError::Cancelled {
            operation: label.to_string(),
        }),
    }
}

/// Run `image` then `video` as child processes of this binary.
pub async fn run_demo(args: &Args, image_prompt: &str, animation_prompt: &str) -> Result<(), String> {
    let exe = std::env::current_exe().map_err(|e| format!("Cannot locate executable: {}", e))?;
    let flags = args.forwarded_flags();

    let image = run_child(&exe, &flags, &["image".to_string(), image_prompt.to_string()]).await?;
    let image_path = match image {
        RunOutcome::Ok { file_path, .. } => file_path,
        RunOutcome::Error { message } => return Err(format!("Image generation failed: {}", message)),
    };
    println!("Image generated at: {}", image_path.display());

    let video = run_child(
        &exe,
        &flags,
        &[
            "video".to_string(),
            image_path.display().to_string(),
            animation_prompt.to_string(),
        ],
    )
    .await?;
    match video {
        RunOutcome::Ok { file_path, .. } => {
            println!("Video generated at: {}", file_path.display());
            Ok(())
        }
        RunOutcome::Error { message } => Err(format!("Video generation failed: {}", message)),
    }
}

async fn run_child(exe: &Path, flags: &[String], command: &[String]) -> Result<RunOutcome, String> {
    log::debug!("Spawning {} {:?}", exe.display(), command);
    let output = tokio::process::Command::new(exe)
        .args(flags)
        .args(command)
        .stdin(std::process::Stdio::null())
        .output()
        .await
        .map_err(|e| format!("Failed to spawn {}: {}", exe.display(), e))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() {
        return Err(child_error_detail(&stderr, &stdout));
    }
    parse_outcome(&stdout)
}

/// Pick the error message out of a failed child's output.
///
/// Log lines share stderr with the error object, so the last line that
/// parses as an error outcome wins. Raw output is the fallback.
fn child_error_detail(stderr: &str, stdout: &str) -> String {
    let message = stderr.lines().rev().find_map(|line| {
        match serde_json::from_str::<RunOutcome>(line.trim()) {
            Ok(RunOutcome::Error { message }) => Some(message),
            _ => None,
        }
    });
    if let Some(message) = message {
        return message;
    }
    let detail = if stderr.trim().is_empty() { stdout } else { stderr };
    detail.trim().to_string()
}

/// Parse the JSON object a child process printed on stdout.
pub fn parse_outcome(stdout: &str) -> Result<RunOutcome, String> {
    serde_json::from_str(stdout.trim()).map_err(|e| format!("Unexpected child output: {}", e))
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, args: &Args) -> i32 {
    let config_path = args.config.clone().unwrap_or_else(default_path);
    match action {
        ConfigAction::Show => {
            let settings = match load_settings(args) {
                Ok(settings) => settings,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return 1;
                }
            };
            println!("Current configuration:");
            println!("  Base URL: {}", settings.api.base_url);
            println!("  Transport: {:?}", settings.api.transport);
            println!(
                "  API key: {}",
                if settings.api.api_key.is_some() { "set" } else { "not set" }
            );
            println!("  Image model: {}", settings.models.image);
            println!("  Video model: {}", settings.models.video);
            println!(
                "  Video: {}s, {}, {}",
                settings.video.duration_seconds, settings.video.resolution, settings.video.aspect_ratio
            );
            println!(
                "  Polling: every {}ms, timeout {}ms",
                settings.polling.interval_ms, settings.polling.timeout_ms
            );
            println!("  Output dir: {}", settings.output.dir.display());
            println!();

            if config_path.exists() {
                println!("Config file: {} (exists)", config_path.display());
            } else {
                println!("Config file: {} (not found)", config_path.display());
            }
            0
        }
        ConfigAction::Init => {
            if config_path.exists() {
                eprintln!("Config file already exists: {}", config_path.display());
                eprintln!("Use 'animated-image config show' to view current settings.");
                return 1;
            }

            if let Some(parent) = config_path.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    eprintln!("Error creating config directory: {}", e);
                    return 1;
                }
            }

            if let Err(e) = std::fs::write(&config_path, DEFAULT_CONFIG) {
                eprintln!("Error writing config file: {}", e);
                return 1;
            }

            println!("Created config file: {}", config_path.display());
            0
        }
    }
}
