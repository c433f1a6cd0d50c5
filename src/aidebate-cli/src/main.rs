//! AIDebate CLI - scripted policy debates between language models.
//!
//! Drives the debate engine turn by turn from the terminal: pick a topic
//! and two models, watch the flow play out, optionally interject as the
//! moderator, and export the transcript as Markdown.

use clap::Parser;
use colored::Colorize;
use std::env;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use aidebate_core::{
    Config, DebateError, DebateManager, MemoryStore, Message, ModelRegistry, Side,
    config::default_config,
};

#[derive(Parser)]
#[command(
    name = "aidebate",
    version,
    about = "AI Debate Simulator - scripted policy debates between LLMs",
    long_about = "Runs a fixed-flow policy debate between two model backends, \
                  cleaning model output and extracting inline citations."
)]
struct Cli {
    /// The debate topic (resolution)
    #[arg(value_name = "TOPIC", required_unless_present = "list_models")]
    topic: Option<String>,

    /// Model alias for participant A
    #[arg(short = 'a', long, value_name = "MODEL")]
    model_a: Option<String>,

    /// Model alias for participant B
    #[arg(short = 'b', long, value_name = "MODEL")]
    model_b: Option<String>,

    /// Side participant A argues
    #[arg(long, default_value = "aff", value_parser = parse_side)]
    side_a: Side,

    /// Number of speech slots (8, 12, or 18)
    #[arg(short = 'f', long, default_value = "18", value_name = "SIZE")]
    flow_size: usize,

    /// Path to a TOML config file (embedded defaults otherwise)
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Pause between turns for moderator input
    #[arg(short, long)]
    interactive: bool,

    /// Write the Markdown transcript to this path when the debate ends
    #[arg(short, long, value_name = "PATH")]
    export: Option<String>,

    /// Write the full session state as JSON to this path when the debate
    /// ends
    #[arg(short = 's', long, value_name = "PATH")]
    save_session: Option<String>,

    /// List configured models and exit
    #[arg(long)]
    list_models: bool,
}

fn parse_side(value: &str) -> Result<Side, String> {
    match value.to_lowercase().as_str() {
        "aff" | "affirmative" => Ok(Side::Affirmative),
        "neg" | "negative" => Ok(Side::Negative),
        other => Err(format!("unknown side '{other}', expected 'aff' or 'neg'")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. Cloud model calls may fail.".yellow()
        );
        String::new()
    });

    let registry = Arc::new(ModelRegistry::from_config(&config, &api_key)?);
    let manager = DebateManager::new(
        Arc::new(MemoryStore::new()),
        Arc::clone(&registry),
        &config.settings,
    );

    if cli.list_models {
        println!("{}", "Configured models:".bold());
        for model in manager.list_models() {
            println!(
                "  {} - {} ({:?})",
                model.alias.bright_cyan(),
                model.name,
                model.family
            );
        }
        return Ok(());
    }

    let Some(topic) = cli.topic.clone() else {
        eprintln!("{} A debate topic is required.", "Error:".red().bold());
        std::process::exit(1);
    };
    let (model_a, model_b) = match (&cli.model_a, &cli.model_b) {
        (Some(a), Some(b)) => (a.clone(), b.clone()),
        _ => {
            eprintln!(
                "{} Two models are required: -a MODEL -b MODEL (see --list-models).",
                "Error:".red().bold()
            );
            std::process::exit(1);
        }
    };

    let summary = manager
        .start_debate(&topic, &model_a, &model_b, cli.side_a, cli.flow_size)
        .await?;

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "{}",
        format!("  {} - Policy Debate ({} speeches)", "AIDebate".bold(), cli.flow_size)
            .bright_blue()
            .bold()
    );
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!();
    println!("{}", "Participants:".bold());
    for binding in &summary.bindings {
        println!(
            "  {} - {}",
            binding.side.display_name().yellow(),
            binding.model_alias.bright_cyan()
        );
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());

    loop {
        let moderator_note = if cli.interactive {
            prompt_moderator()?
        } else {
            ModeratorInput::None
        };

        match moderator_note {
            ModeratorInput::EndEarly => {
                manager.end_topic(&summary.session_id).await?;
                println!("{}", "  Debate ended early by moderator.".yellow());
                break;
            }
            ModeratorInput::Interjection(note) => {
                let outcome = manager
                    .execute_turn(&summary.session_id, Some(&note), true)
                    .await?;
                print_message(&outcome.message);
                continue;
            }
            ModeratorInput::Instruction(note) => {
                match run_turn(&manager, &summary.session_id, Some(&note), cli.interactive).await? {
                    TurnResult::Complete => break,
                    TurnResult::Continue => {}
                }
            }
            ModeratorInput::None => {
                match run_turn(&manager, &summary.session_id, None, cli.interactive).await? {
                    TurnResult::Complete => break,
                    TurnResult::Continue => {}
                }
            }
        }
    }

    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Debate concluded.".bright_green().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();

    if let Some(path) = &cli.export {
        let markdown = manager.export(&summary.session_id).await?;
        std::fs::write(path, markdown)?;
        println!("Transcript written to {}", path.bright_white());
    }

    if let Some(path) = &cli.save_session {
        let json = manager.dump_session(&summary.session_id).await?;
        std::fs::write(path, json)?;
        println!("Session state written to {}", path.bright_white());
    }

    Ok(())
}

enum TurnResult {
    Continue,
    Complete,
}

/// Execute one flow turn. In interactive mode a gateway failure leaves the
/// slot unconsumed and the operator chooses whether to retry it; otherwise
/// the failure aborts the run.
async fn run_turn(
    manager: &DebateManager,
    session_id: &str,
    moderator_note: Option<&str>,
    interactive: bool,
) -> Result<TurnResult, Box<dyn std::error::Error>> {
    match manager.execute_turn(session_id, moderator_note, false).await {
        Ok(outcome) => {
            print_message(&outcome.message);
            if outcome.debate_complete {
                Ok(TurnResult::Complete)
            } else {
                Ok(TurnResult::Continue)
            }
        }
        Err(err @ DebateError::Gateway { .. }) if interactive => {
            eprintln!("{} {}", "Turn failed:".red().bold(), err);
            if prompt_retry()? {
                Ok(TurnResult::Continue)
            } else {
                manager.end_topic(session_id).await?;
                Ok(TurnResult::Complete)
            }
        }
        Err(err) => Err(err.into()),
    }
}

fn print_message(message: &Message) {
    println!();
    if message.is_interjection {
        println!("{}", "▶ Moderator".bright_magenta().bold());
    } else {
        let side = message
            .side
            .map(|s| s.display_name())
            .unwrap_or("UNKNOWN");
        println!(
            "{} {} {} {}",
            "▶".bright_cyan(),
            message.speech_label.bright_cyan().bold(),
            format!("({side})").yellow(),
            message
                .model_alias
                .as_deref()
                .unwrap_or("")
                .dimmed()
        );
    }

    for line in wrap_text(&message.content, 66).lines() {
        println!("  {line}");
    }

    if !message.citations.is_empty() {
        println!();
        println!("  {}", "Sources:".bold());
        for citation in &message.citations {
            println!("  [{}] {}", citation.id, citation.text);
        }
    }
    println!();
}

enum ModeratorInput {
    None,
    Instruction(String),
    Interjection(String),
    EndEarly,
}

/// Read an optional moderator action before the next turn. A bare Enter
/// proceeds; `!text` records an interjection; `q` ends the debate early;
/// anything else is injected as an instruction for the next speech only.
fn prompt_moderator() -> std::io::Result<ModeratorInput> {
    print!(
        "{}",
        "moderator (Enter = next turn, !msg = interject, q = end): ".dimmed()
    );
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    let line = line.trim();

    Ok(if line.is_empty() {
        ModeratorInput::None
    } else if line == "q" {
        ModeratorInput::EndEarly
    } else if let Some(rest) = line.strip_prefix('!') {
        ModeratorInput::Interjection(rest.trim().to_string())
    } else {
        ModeratorInput::Instruction(line.to_string())
    })
}

fn prompt_retry() -> std::io::Result<bool> {
    print!("{}", "Retry this slot? [Y/n]: ".dimmed());
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(!line.trim().eq_ignore_ascii_case("n"))
}

/// Simple text wrapping function.
fn wrap_text(text: &str, width: usize) -> String {
    let mut result = String::new();

    for paragraph in text.split('\n') {
        if !result.is_empty() {
            result.push('\n');
        }
        let mut current_line_len = 0;
        for word in paragraph.split_whitespace() {
            if current_line_len + word.len() + 1 > width && current_line_len > 0 {
                result.push('\n');
                current_line_len = 0;
            }
            if current_line_len > 0 {
                result.push(' ');
                current_line_len += 1;
            }
            result.push_str(word);
            current_line_len += word.len();
        }
    }

    result
}
