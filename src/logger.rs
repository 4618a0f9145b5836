/// Tag-based console logging for PoolScreener
///
/// Provides colorized, timestamped log output grouped by subsystem tag.
/// Debug output is gated behind the DEBUG environment variable so the
/// high-frequency retry/skip paths stay quiet in normal operation.

use chrono::Local;
use colored::*;
use once_cell::sync::Lazy;
use std::io::{self, Write};

/// Subsystem tags for log classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTag {
    System,
    Rpc,
    Websocket,
    Raydium,
    Openbook,
    Cache,
    Token,
    Hook,
}

impl LogTag {
    fn label(&self) -> &'static str {
        match self {
            LogTag::System => "SYSTEM",
            LogTag::Rpc => "RPC",
            LogTag::Websocket => "WEBSOCKET",
            LogTag::Raydium => "RAYDIUM",
            LogTag::Openbook => "OPENBOOK",
            LogTag::Cache => "CACHE",
            LogTag::Token => "TOKEN",
            LogTag::Hook => "HOOK",
        }
    }

    fn colored_label(&self) -> ColoredString {
        match self {
            LogTag::System => self.label().cyan().bold(),
            LogTag::Rpc => self.label().blue(),
            LogTag::Websocket => self.label().magenta(),
            LogTag::Raydium => self.label().green(),
            LogTag::Openbook => self.label().yellow(),
            LogTag::Cache => self.label().white(),
            LogTag::Token => self.label().bright_blue(),
            LogTag::Hook => self.label().bright_green(),
        }
    }
}

static DEBUG_ENABLED: Lazy<bool> =
    Lazy::new(|| std::env::var("DEBUG").map(|v| v == "1").unwrap_or(false));

/// Whether DEBUG=1 was set in the environment
pub fn is_debug_enabled() -> bool {
    *DEBUG_ENABLED
}

fn write_line(tag: LogTag, action: ColoredString, message: &str) {
    let timestamp = Local::now().format("%H:%M:%S").to_string();
    println!(
        "{} [{:<9}] [{}] {}",
        format!("[{}]", timestamp).dimmed(),
        tag.colored_label(),
        action,
        message
    );
    let _ = io::stdout().flush();
}

/// Standard informational log line
pub fn log(tag: LogTag, action: &str, message: &str) {
    write_line(tag, action.normal(), message);
}

/// Error log line (always shown)
pub fn log_error(tag: LogTag, action: &str, message: &str) {
    write_line(tag, action.red().bold(), &message.red().to_string());
}

/// Warning log line
pub fn log_warn(tag: LogTag, action: &str, message: &str) {
    write_line(tag, action.yellow(), &message.yellow().to_string());
}

/// Debug log line, only emitted when DEBUG=1
pub fn log_debug(tag: LogTag, action: &str, message: &str) {
    if is_debug_enabled() {
        write_line(tag, action.dimmed(), &message.dimmed().to_string());
    }
}
