//! Interactive Socratic tutor chat.
//!
//! This binary provides a streaming REPL for talking to the tutor model via
//! an OpenAI-compatible chat-completion endpoint (OpenRouter by default).
//!
//! # Usage
//!
//! ```bash
//! export OPENROUTER_API_KEY=sk-or-...
//!
//! # Basic usage with default settings
//! tutor-chat
//!
//! # Specify a model and a configuration file
//! tutor-chat --model qwen/qwen3-coder-next --config tutor.yaml
//!
//! # Drive the session from another process with JSON lines
//! tutor-chat --protocol
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/clear` - Clear conversation history
//! - `/history` - Show the conversation so far
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application

use std::io;
use std::sync::Arc;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tutor_chat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, PlainTextRenderer, help_text, parse_command,
};
use tutor_chat::{InterruptHandle, JsonLinesSink, UiCommand};

/// Main entry point for the tutor-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutor_chat=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("tutor-chat [OPTIONS]");
    let protocol = args.protocol;
    let config = ChatConfig::try_from(args)?;
    tracing::debug!(?config, "starting tutor-chat");

    let session = ChatSession::from_config(&config)?;
    if protocol {
        run_protocol(Arc::new(session)).await
    } else {
        run_repl(session, &config).await
    }
}

/// Reads `UiCommand` JSON lines from stdin and writes `SinkEvent` JSON lines
/// to stdout.
async fn run_protocol(session: Arc<ChatSession>) -> Result<(), Box<dyn std::error::Error>> {
    session.replay_history(&mut JsonLinesSink::new(io::stdout()));

    let mut turns = JoinSet::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match UiCommand::from_json(&line) {
            Ok(command) => command,
            Err(err) => {
                tracing::warn!(error = %err, line = %line, "ignoring unparseable command");
                continue;
            }
        };
        match command {
            UiCommand::Clear => session.clear_history(&mut JsonLinesSink::new(io::stdout())),
            send @ UiCommand::Send { .. } => {
                let session = Arc::clone(&session);
                turns.spawn(async move {
                    let mut sink = JsonLinesSink::new(io::stdout());
                    session.handle_command(send, &mut sink).await;
                });
            }
        }
        // Reap finished turns so the set does not grow without bound.
        while let Some(joined) = turns.try_join_next() {
            if let Err(err) = joined {
                tracing::error!(error = %err, "turn task failed");
            }
        }
    }
    while let Some(joined) = turns.join_next().await {
        if let Err(err) = joined {
            tracing::error!(error = %err, "turn task failed");
        }
    }
    Ok(())
}

async fn run_repl(
    session: ChatSession,
    config: &ChatConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    // Interrupts the streaming reply; a second signal before the next prompt exits.
    let interrupt = InterruptHandle::new();
    let handler_interrupt = interrupt.clone();
    ctrlc::set_handler(move || {
        if handler_interrupt.is_triggered() {
            std::process::exit(130);
        }
        handler_interrupt.trigger();
    })?;

    let mut renderer =
        PlainTextRenderer::with_color(config.use_color).with_interrupt(interrupt.clone());
    let mut rl = DefaultEditor::new()?;

    println!("Socratic tutor (model: {})", config.model);
    println!("Type /help for commands, /quit to exit\n");

    loop {
        interrupt.reset();

        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => session.clear_history(&mut renderer),
                        ChatCommand::History => renderer.print_transcript(&session.history()),
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Invalid(message) => renderer.print_info(&message),
                    }
                    continue;
                }

                session.send_user_message(line, &mut renderer).await;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Input error: {err}");
                break;
            }
        }
    }

    Ok(())
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.message_count);
    println!("      Replies: {}", stats.turns_completed);
    println!("      Failed turns: {}", stats.turns_failed);
    println!("      Rejected sends: {}", stats.turns_rejected);
}
