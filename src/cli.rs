use crate::styles::StyleId;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "polish-rs",
    version,
    about = "Rewrite selected text through a chat-completion API"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Polish a piece of text and print the result
    Text(TextArgs),
    /// Interactive session over a text file loaded into an editable field
    Scratch(ScratchArgs),
    /// Polish the selection in the focused macOS application
    Watch(WatchArgs),
    /// List the available styles
    Styles,
    /// Show or change settings
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(clap::Args)]
pub struct TextArgs {
    /// Text to polish (read from stdin when omitted)
    pub text: Option<String>,

    /// Style to use instead of the configured default
    #[arg(long, short)]
    pub style: Option<StyleId>,

    /// Print a line diff against the input
    #[arg(long)]
    pub diff: bool,
}

#[derive(clap::Args)]
pub struct ScratchArgs {
    /// File whose contents become the field value
    pub file: PathBuf,

    /// Treat the field as a multiline text area
    #[arg(long)]
    pub multiline: bool,
}

#[derive(clap::Args)]
pub struct WatchArgs {
    /// Seconds to wait after Enter before capturing, to switch applications
    #[arg(long, default_value_t = 3)]
    pub delay: u64,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Print the current settings
    Show,
    /// Store the API key (prompted when omitted)
    SetKey { key: Option<String> },
    /// Set the chat-completion endpoint URL
    SetEndpoint { url: String },
    /// Set the default style
    SetStyle { style: StyleId },
}

/// One line typed into an interactive session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Select { start: usize, end: usize },
    Polish,
    Style(StyleId),
    Retry,
    Apply,
    Dismiss,
    Edit(String),
    Show,
    Save,
    Help,
    Quit,
}

impl SessionCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));

        let command = match verb.to_ascii_lowercase().as_str() {
            "" | "polish" | "p" => Self::Polish,
            "select" | "sel" => {
                let mut bounds = rest.split_whitespace();
                let (Some(start), Some(end), None) = (bounds.next(), bounds.next(), bounds.next())
                else {
                    bail!("usage: select <start> <end>");
                };
                Self::Select {
                    start: start.parse().context("start must be a number")?,
                    end: end.parse().context("end must be a number")?,
                }
            }
            "style" => Self::Style(rest.parse()?),
            "retry" | "r" => Self::Retry,
            "apply" | "a" => Self::Apply,
            "dismiss" | "d" => Self::Dismiss,
            "edit" if !rest.is_empty() => Self::Edit(rest.to_string()),
            "edit" => bail!("usage: edit <replacement text>"),
            "show" => Self::Show,
            "save" => Self::Save,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => bail!("unknown command '{other}' (try 'help')"),
        };
        Ok(command)
    }

    pub fn help() -> &'static str {
        "commands: select <start> <end> | polish (or empty line) | style <formal|concise|commit> \
         | retry | apply | dismiss | edit <text> | show | save | quit"
    }
}
