use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};
use std::fmt;
use time::macros::format_description;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Compact event format: local time, level, message and fields. Targets are
/// only shown for debug and trace events.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolishFormatter;

impl PolishFormatter {
    pub fn new() -> Self {
        Self
    }
}

impl<S, N> FormatEvent<S, N> for PolishFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let now = time::OffsetDateTime::now_local()
            .unwrap_or_else(|_| time::OffsetDateTime::now_utc())
            .format(format_description!("[hour]:[minute]:[second]"))
            .unwrap_or_default();

        if writer.has_ansi_escapes() {
            write!(writer, "{} ", now.dimmed())?;
            match *meta.level() {
                Level::ERROR => write!(writer, "{} ", "ERROR".red().bold())?,
                Level::WARN => write!(writer, "{} ", " WARN".yellow())?,
                Level::INFO => write!(writer, "{} ", " INFO".green())?,
                Level::DEBUG => write!(writer, "{} ", "DEBUG".blue())?,
                Level::TRACE => write!(writer, "{} ", "TRACE".purple())?,
            }
        } else {
            write!(writer, "{now} {:>5} ", meta.level())?;
        }

        if *meta.level() >= Level::DEBUG {
            write!(writer, "{}: ", meta.target())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Line diff of `before` and `after` with `-`, `+` and ` ` prefixes.
pub fn text_diff(before: &str, after: &str) -> String {
    let diff = TextDiff::from_lines(before, after);
    let mut out = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        out.push(sign);
        out.push_str(change.value());
        if change.missing_newline() {
            out.push('\n');
        }
    }
    out
}

/// Logs an applied rewrite as a line diff at debug level.
pub fn log_text_change(before: &str, after: &str) {
    if !tracing::enabled!(Level::DEBUG) {
        return;
    }
    if before == after {
        tracing::debug!("Polished text is identical to the original");
        return;
    }
    tracing::debug!("Text change:\n{}", text_diff(before, after).trim_end());
}
