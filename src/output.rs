use std::fmt;

use serde::Serialize;

/// Output format selection for the bundled CLI. Mirrors the split used by
/// this workspace's other host-side CLI tool: JSON for scripting, a
/// human-readable summary otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object on stdout.
    Json,
    /// Human-readable table/summary on stdout.
    #[default]
    Human,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Human => write!(f, "human"),
        }
    }
}

pub fn emit<T: Serialize>(format: OutputFormat, value: &T) {
    match format {
        OutputFormat::Json => match serde_json::to_string(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("error: failed to serialize output: {e}"),
        },
        OutputFormat::Human => match serde_json::to_string_pretty(value) {
            Ok(pretty) => println!("{pretty}"),
            Err(e) => eprintln!("error: failed to serialize output: {e}"),
        },
    }
}

pub fn emit_error(format: OutputFormat, exit_code: u8, message: &str) {
    match format {
        OutputFormat::Json => {
            let obj = serde_json::json!({ "error": message, "exit_code": exit_code });
            println!(
                "{}",
                serde_json::to_string(&obj)
                    .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
            );
        }
        OutputFormat::Human => eprintln!("error: {message}"),
    }
}
