use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use owo_colors::OwoColorize;
use polish_rs::app::{AppEvent, AppHandle, Notice, PolishApp};
use polish_rs::cli::{Cli, Command, ConfigCommand, ScratchArgs, SessionCommand, TextArgs};
use polish_rs::completion::{ChatCompletionClient, Completer, CompletionRequest};
use polish_rs::input::{ElementDescriptor, MemoryDocument, SelectionDirection, TextHost};
use polish_rs::logging::{text_diff, PolishFormatter};
use polish_rs::paths::expand_tilde;
use polish_rs::{ConfigManager, PolishError, StatusWriter, StyleId};
use std::fs;
use std::io::{IsTerminal, Read};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polish=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .event_format(PolishFormatter::new()),
        )
        .init();

    let config_manager = ConfigManager::load()?;

    match cli.command {
        Command::Text(args) => run_text(&config_manager, args).await,
        Command::Scratch(args) => run_scratch(config_manager, args).await,
        Command::Watch(args) => run_watch(config_manager, args.delay).await,
        Command::Styles => {
            print_styles(config_manager.get().default_style);
            Ok(())
        }
        Command::Config(command) => run_config(&config_manager, command),
    }
}

async fn run_text(config_manager: &ConfigManager, args: TextArgs) -> Result<()> {
    let text = match args.text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read text from stdin")?;
            buffer
        }
    };

    let config = config_manager.get();
    let style = args.style.unwrap_or(config.default_style);
    let request = CompletionRequest {
        text: text.clone(),
        style_prompt: style.config().system_prompt.to_string(),
        api_key: config.api_key.clone(),
        endpoint: config.api_endpoint.clone(),
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: config.request_timeout(),
    };

    let client = ChatCompletionClient::new()?;
    match client.complete(request).await {
        Ok(polished) => {
            if args.diff {
                print_diff(text.trim(), &polished);
            } else {
                println!("{polished}");
            }
            Ok(())
        }
        Err(err) => {
            print_error(&err);
            std::process::exit(1);
        }
    }
}

async fn run_scratch(config_manager: ConfigManager, args: ScratchArgs) -> Result<()> {
    let path = expand_tilde(&args.file.to_string_lossy());
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut document = MemoryDocument::new();
    let descriptor = if args.multiline {
        ElementDescriptor::text_area()
    } else {
        ElementDescriptor::input("text")
    };
    let field = document.add_field(descriptor, content.trim_end_matches('\n'));
    document.set_active(Some(field));

    info!("📝 Loaded {} into a scratch field", path.display());
    println!("{}", SessionCommand::help().dimmed());

    let save_path = path.clone();
    run_session(config_manager, document, None, move |handle, command| {
        match command {
            SessionCommand::Select { start, end } => {
                handle.edit_host(move |doc: &mut MemoryDocument| {
                    doc.select_field(field, Some(start), Some(end), SelectionDirection::Forward);
                });
                handle.send(AppEvent::SelectionChanged);
            }
            SessionCommand::Show => {
                handle.edit_host(move |doc: &mut MemoryDocument| {
                    println!("{}", doc.field_value(field).unwrap_or_default());
                });
            }
            SessionCommand::Save => {
                let path = save_path.clone();
                handle.edit_host(move |doc: &mut MemoryDocument| {
                    let value = doc.field_value(field).unwrap_or_default();
                    match fs::write(&path, format!("{value}\n")) {
                        Ok(()) => info!("💾 Saved {}", path.display()),
                        Err(err) => warn!("Failed to save {}: {}", path.display(), err),
                    }
                });
            }
            other => forward(handle, other),
        }
    })
    .await?;

    info!("Scratch session for {} closed", path.display());
    Ok(())
}

#[cfg(target_os = "macos")]
async fn run_watch(config_manager: ConfigManager, delay: u64) -> Result<()> {
    use polish_rs::input::macos::AccessibilityHost;

    let host = AccessibilityHost::new()?;
    if !host.accessibility_trusted() {
        warn!("Accessibility access is not granted; opening System Settings");
        AccessibilityHost::request_access()?;
    }

    println!(
        "{}",
        format!(
            "Press Enter, then focus the target app within {delay}s. Other {}",
            SessionCommand::help()
        )
        .dimmed()
    );

    let delay = std::time::Duration::from_secs(delay);
    run_session(config_manager, host, Some(delay), |handle, command| {
        if let SessionCommand::Select { .. } | SessionCommand::Show | SessionCommand::Save =
            command
        {
            println!("{}", "Not available for desktop applications".yellow());
            return;
        }
        forward(handle, command);
    })
    .await?;
    Ok(())
}

#[cfg(not(target_os = "macos"))]
async fn run_watch(_config_manager: ConfigManager, _delay: u64) -> Result<()> {
    anyhow::bail!("watch mode needs the macOS Accessibility API")
}

fn forward<H>(handle: &AppHandle<H>, command: SessionCommand) {
    let event = match command {
        SessionCommand::Polish => AppEvent::Trigger,
        SessionCommand::Style(style) => AppEvent::Style(style),
        SessionCommand::Retry => AppEvent::Retry,
        SessionCommand::Apply => AppEvent::Apply,
        SessionCommand::Dismiss => AppEvent::Dismiss,
        SessionCommand::Edit(text) => AppEvent::EditResult(text),
        SessionCommand::Help => {
            println!("{}", SessionCommand::help());
            return;
        }
        SessionCommand::Select { .. }
        | SessionCommand::Show
        | SessionCommand::Save
        | SessionCommand::Quit => return,
    };
    handle.send(event);
}

/// Drives a session loop from stdin until EOF, `quit`, or Ctrl+C.
async fn run_session<H, F>(
    config_manager: ConfigManager,
    host: H,
    trigger_delay: Option<std::time::Duration>,
    mut on_command: F,
) -> Result<H>
where
    H: TextHost + Send + 'static,
    F: FnMut(&AppHandle<H>, SessionCommand),
{
    config_manager.start_watching();
    if !config_manager.get().has_api_key() {
        warn!("No API key configured; run `polish-rs config set-key` or set POLISH_API_KEY");
    }
    let completer: Arc<dyn Completer> = Arc::new(ChatCompletionClient::new()?);
    let (mut app, handle, notices) = PolishApp::new(host, config_manager, completer);
    match StatusWriter::new() {
        Ok(status) => app = app.with_status(status),
        Err(err) => warn!("Status file disabled: {err:#}"),
    }

    let app_task = tokio::spawn(app.run());
    let printer = tokio::spawn(print_notices(notices));
    handle.send(AppEvent::FocusChanged);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        warn!("Error reading input: {}", err);
                        break;
                    }
                };
                let command = match SessionCommand::parse(&line) {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{}", err.to_string().yellow());
                        continue;
                    }
                };
                match (command, trigger_delay) {
                    (SessionCommand::Quit, _) => break,
                    (SessionCommand::Polish, Some(delay)) => {
                        let delayed = handle.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            delayed.send(AppEvent::FocusChanged);
                            delayed.send(AppEvent::Trigger);
                        });
                    }
                    (command, _) => on_command(&handle, command),
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received SIGINT (Ctrl+C)");
                break;
            }
        }
    }

    handle.send(AppEvent::Shutdown);
    let host = app_task.await.context("Session loop panicked")??;
    printer.abort();
    info!("✅ Shutdown complete");
    Ok(host)
}

async fn print_notices(mut notices: mpsc::UnboundedReceiver<Notice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            Notice::Awaiting { style } => {
                println!("{}", format!("Polishing ({})...", style.config().label).dimmed());
            }
            Notice::Ready { polished, style } => {
                println!("{} {}", style.config().label.green().bold(), "result:".green());
                println!("{polished}");
                println!("{}", "apply | dismiss | retry | style <id> | edit <text>".dimmed());
            }
            Notice::Applied(applied) => {
                print_diff(&applied.original, &applied.polished);
                println!("{}", "Applied.".green());
            }
            Notice::Failed(err) => print_error(&err),
            Notice::SelectionPrompt(true) => {
                println!("{}", "Selection ready: press Enter to polish it".cyan());
            }
            Notice::SelectionPrompt(false) | Notice::Discarded(_) | Notice::Dismissed => {}
        }
    }
}

fn print_diff(before: &str, after: &str) {
    for line in text_diff(before, after).lines() {
        if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_error(err: &PolishError) {
    eprintln!("{} {}", "✗".red().bold(), err.message().red());
    if err.offers_configuration() {
        let hint = match err {
            PolishError::AccessibilityNotGranted => {
                "Grant access in System Settings > Privacy & Security > Accessibility"
            }
            _ => "Run `polish-rs config set-key` to add your API key",
        };
        eprintln!("  {}", hint.yellow());
    }
}

fn print_styles(default_style: StyleId) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![Cell::new("Id"), Cell::new("Label"), Cell::new("Prompt")]);

    for style in StyleId::all() {
        let config = style.config();
        let id = if *style == default_style {
            format!("{} (default)", style)
        } else {
            style.to_string()
        };
        table.add_row(vec![
            Cell::new(id),
            Cell::new(config.label),
            Cell::new(config.system_prompt),
        ]);
    }

    println!("{table}");
}

fn run_config(config_manager: &ConfigManager, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let config = config_manager.get();
            let path = config_manager
                .path()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "(in memory)".to_string());
            println!("{} {}", "Config file:".bold(), path);
            println!("  api_key:          {}", mask_key(&config.api_key));
            println!("  api_endpoint:     {}", config.api_endpoint);
            println!("  default_style:    {}", config.default_style);
            println!("  model:            {}", config.model);
            println!("  temperature:      {}", config.temperature);
            println!("  max_tokens:       {}", config.max_tokens);
            println!("  timeout:          {}s", config.request_timeout_secs);
            println!("  selection delay:  {}ms", config.selection_debounce_ms);
            println!("  auto_apply:       {}", config.auto_apply);
        }
        ConfigCommand::SetKey { key } => {
            let key = match key {
                Some(key) => key,
                None if std::io::stdin().is_terminal() => {
                    dialoguer::Password::with_theme(&dialoguer::theme::ColorfulTheme::default())
                        .with_prompt("API key")
                        .interact()
                        .context("Failed to read API key")?
                }
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            config_manager.set_api_key(&key)?;
            println!("{} API key saved", "✓".green());
        }
        ConfigCommand::SetEndpoint { url } => {
            config_manager.set_api_endpoint(&url)?;
            println!("{} Endpoint set to {}", "✓".green(), url.trim());
        }
        ConfigCommand::SetStyle { style } => {
            config_manager.set_default_style(style)?;
            println!("{} Default style set to {}", "✓".green(), style);
        }
    }
    Ok(())
}

fn mask_key(key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let tail: String = key
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("****{tail}")
}
