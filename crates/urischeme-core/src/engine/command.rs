//! Parsing a stored `shell\open\command` value back into its parts.
//!
//! The command is written as the bare executable path followed by the
//! argument suffix, so the executable may itself contain spaces. Recognised
//! shapes, tried in order:
//!
//! - trailing `"%1" "%2" … "%n"` placeholders → [`ArgumentSpec::PositionalCount`]
//! - a quoted executable `"C:\Program Files\app.exe" rest`
//! - the longest space-delimited prefix that is an existing file
//! - otherwise a split at the first space

use crate::models::ArgumentSpec;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Run of quoted placeholders at the end of a command.
static POSITIONAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?: "%\d+")+$"#).unwrap());

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""%(\d+)""#).unwrap());

/// Executable and arguments recovered from a command value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub executable_path: PathBuf,
    pub arguments: ArgumentSpec,
}

/// Parse a command value. Returns `None` for an empty command.
///
/// Trailing whitespace belongs to a literal argument and is kept.
pub fn parse_command(command: &str) -> Option<ParsedCommand> {
    let command = command.trim_start();
    if command.trim_end().is_empty() {
        return None;
    }

    if let Some(parsed) = parse_positional(command) {
        return Some(parsed);
    }

    let (executable, rest) = split_executable(command);
    let rest = rest.strip_prefix(' ').unwrap_or(rest);
    let arguments = if rest.trim().is_empty() {
        ArgumentSpec::None
    } else {
        ArgumentSpec::Literal(rest.to_string())
    };
    Some(ParsedCommand {
        executable_path: PathBuf::from(executable),
        arguments,
    })
}

fn parse_positional(command: &str) -> Option<ParsedCommand> {
    let suffix = POSITIONAL_SUFFIX.find(command)?;
    let indices: Vec<u32> = PLACEHOLDER
        .captures_iter(suffix.as_str())
        .filter_map(|c| c[1].parse().ok())
        .collect();
    // Only `"%1" … "%n"` in order is something register could have written
    let in_order = indices
        .iter()
        .enumerate()
        .all(|(i, &n)| n as usize == i + 1);
    if !in_order {
        return None;
    }

    let (executable, rest) = split_executable(&command[..suffix.start()]);
    if !rest.trim().is_empty() {
        return None;
    }
    Some(ParsedCommand {
        executable_path: PathBuf::from(executable),
        arguments: ArgumentSpec::PositionalCount(indices.len() as u32),
    })
}

/// Split a command into the executable and the remaining text (which keeps
/// its leading space).
fn split_executable(command: &str) -> (&str, &str) {
    if let Some(quoted) = command.strip_prefix('"') {
        if let Some(end) = quoted.find('"') {
            return (&quoted[..end], &quoted[end + 1..]);
        }
    }

    if Path::new(command).is_file() {
        return (command, "");
    }

    let longest_file = command
        .char_indices()
        .filter(|&(_, c)| c == ' ')
        .map(|(i, _)| i)
        .rev()
        .find(|&i| Path::new(&command[..i]).is_file());
    if let Some(end) = longest_file {
        return (&command[..end], &command[end..]);
    }

    match command.find(' ') {
        Some(end) => (&command[..end], &command[end..]),
        None => (command, ""),
    }
}
