use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use vidsum_core::{
    Focus, HistoryItem, HistorySync, LocalStore, Mode, NoAuth, StaticToken, SummarizeClient,
    SummarizeError, SummarizeRequest, TokenProvider, render_result, title_from_summary,
};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", secs / 60.0, secs % 60.0)
    }
}

/// CLI wrapper for Mode enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliMode {
    #[default]
    Smart,
    Video,
}

impl From<CliMode> for Mode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::Smart => Mode::Smart,
            CliMode::Video => Mode::Video,
        }
    }
}

/// CLI wrapper for Focus enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliFocus {
    #[default]
    Default,
    Study,
    Gossip,
    Business,
}

impl From<CliFocus> for Focus {
    fn from(cli: CliFocus) -> Self {
        match cli {
            CliFocus::Default => Focus::Default,
            CliFocus::Study => Focus::Study,
            CliFocus::Gossip => Focus::Gossip,
            CliFocus::Business => Focus::Business,
        }
    }
}

#[derive(Parser)]
#[command(name = "vidsum")]
#[command(
    about = "Summarize videos through the vidsum service and keep your summary history in sync"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize a video by URL
    Summarize {
        /// Video URL
        url: String,

        /// How the server should look at the video
        #[arg(short, long, default_value = "smart")]
        mode: CliMode,

        /// Angle the summary is written from
        #[arg(short, long, default_value = "default")]
        focus: CliFocus,

        /// Bypass the server-side summary cache
        #[arg(long)]
        skip_cache: bool,

        /// Prompt template to summarize with
        #[arg(long)]
        template_id: Option<String>,

        /// Output language (e.g. "en", "zh"). Defaults to the video's language.
        #[arg(short, long)]
        language: Option<String>,

        /// Ask the server for chain-of-thought annexes
        #[arg(long)]
        cot: bool,
    },

    /// Inspect and reconcile summary history
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// Show the local history list
    List,
    /// Merge local history with the cloud store
    Sync,
    /// Delete one record by id, locally and in the cloud
    Delete { id: String },
    /// Drop all local records (the cloud store is untouched)
    Clear,
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,vidsum_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn base_url() -> String {
    std::env::var("VIDSUM_API_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn token_provider() -> Arc<dyn TokenProvider> {
    match std::env::var("VIDSUM_TOKEN") {
        Ok(token) if !token.is_empty() => Arc::new(StaticToken(token)),
        _ => Arc::new(NoAuth),
    }
}

fn history_engine(tokens: Arc<dyn TokenProvider>) -> HistorySync {
    HistorySync::new(
        LocalStore::new(LocalStore::default_path()),
        base_url(),
        tokens,
    )
}

fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {pos:>3}% {msg}")
            .unwrap()
            .progress_chars("━╸ "),
    );
    pb
}

async fn run_summarize(
    url: String,
    mode: CliMode,
    focus: CliFocus,
    skip_cache: bool,
    template_id: Option<String>,
    language: Option<String>,
    cot: bool,
) -> Result<()> {
    let tokens = token_provider();
    let client = SummarizeClient::new(base_url(), tokens.clone());
    let history = history_engine(tokens);

    println!(
        "\n{}  {}\n",
        style("vidsum").cyan().bold(),
        style("Video Summarizer").dim()
    );

    let info = match client.video_info(&url).await {
        Ok(info) => {
            if let Some(title) = &info.title {
                let mut meta = String::new();
                if let Some(uploader) = &info.uploader {
                    meta.push_str(uploader);
                }
                if let Some(duration) = info.duration {
                    let total = duration.floor() as u64;
                    meta.push_str(&format!(" · {}:{:02}", total / 60, total % 60));
                }
                println!(
                    "{} {} {}",
                    style("▶").cyan(),
                    style(title).bold(),
                    style(meta).dim()
                );
            }
            Some(info)
        }
        Err(e) => {
            // Metadata is cosmetic; the attempt proceeds without it.
            eprintln!("{} video info unavailable: {e}", style("!").yellow());
            None
        }
    };

    let request = SummarizeRequest {
        url: url.clone(),
        mode: mode.clone().into(),
        focus: focus.clone().into(),
        skip_cache,
        template_id,
        output_language: language,
        enable_cot: cot,
    };

    let pb = progress_bar();
    let mut rx = client.subscribe();
    let watcher = {
        let pb = pb.clone();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                pb.set_position(state.progress as u64);
                match &state.hint {
                    Some(hint) => pb.set_message(format!("{} ({hint})", state.status)),
                    None => pb.set_message(state.status.clone()),
                }
                if state.phase.is_terminal() {
                    break;
                }
            }
        })
    };

    let start = Instant::now();
    let outcome = client.summarize(request).await;
    watcher.abort();
    let _ = watcher.await;

    match outcome {
        Ok(result) => {
            pb.finish_and_clear();
            println!(
                "{} Summarized in {}",
                style("✓").green().bold(),
                style(format_duration(start.elapsed())).cyan()
            );
            println!("{}", style("─".repeat(60)).dim());
            println!("{}", render_result(&result));

            let (video_title, video_thumbnail) = match info {
                Some(info) => (info.title, info.thumbnail),
                None => (None, None),
            };
            let item = HistoryItem {
                id: None,
                video_url: url.clone(),
                video_title: Some(
                    video_title.unwrap_or_else(|| title_from_summary(&result.summary, &url)),
                ),
                video_thumbnail,
                mode: Mode::from(mode).as_str().to_string(),
                focus: Focus::from(focus).as_str().to_string(),
                summary: result.summary.clone(),
                transcript: (!result.transcript.is_empty()).then(|| result.transcript.clone()),
                mindmap: None,
                created_at: None,
                updated_at: None,
            };
            history.add_local(item).await?;
            let synced = history.sync().await?;
            println!(
                "{} {} records in history",
                style("✓").green().bold(),
                synced.len()
            );
            Ok(())
        }
        Err(e) => {
            pb.abandon();
            match &e {
                SummarizeError::Server {
                    status,
                    hint,
                    message,
                    ..
                } => {
                    eprintln!("\n{} {}", style("Error:").red().bold(), status);
                    eprintln!("  {}", style(hint).dim());
                    eprintln!("  {}", style(message).dim());
                }
                other => eprintln!("\n{} {}", style("Error:").red().bold(), other),
            }
            std::process::exit(1);
        }
    }
}

async fn run_history(command: HistoryCommand) -> Result<()> {
    let history = history_engine(token_provider());
    match command {
        HistoryCommand::List => {
            let items = history.local().await?;
            if items.is_empty() {
                println!("{}", style("No history yet").dim());
                return Ok(());
            }
            for item in items {
                let when = item
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                println!(
                    "{}  {}  {} {}",
                    style(when).dim(),
                    style(item.video_title.as_deref().unwrap_or(&item.video_url)).bold(),
                    style(format!("[{}/{}]", item.mode, item.focus)).yellow(),
                    style(item.id.as_deref().unwrap_or("-")).dim()
                );
            }
            Ok(())
        }
        HistoryCommand::Sync => {
            let items = history.sync().await?;
            println!(
                "{} {} records after sync",
                style("✓").green().bold(),
                items.len()
            );
            Ok(())
        }
        HistoryCommand::Delete { id } => {
            let items = history.delete_item(&id).await?;
            println!(
                "{} deleted, {} records remain",
                style("✓").green().bold(),
                items.len()
            );
            Ok(())
        }
        HistoryCommand::Clear => {
            history.clear().await?;
            println!("{} history cleared", style("✓").green().bold());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Summarize {
            url,
            mode,
            focus,
            skip_cache,
            template_id,
            language,
            cot,
        } => run_summarize(url, mode, focus, skip_cache, template_id, language, cot).await,
        Command::History { command } => run_history(command).await,
    }
}
