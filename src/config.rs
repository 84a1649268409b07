use clap::{Parser, ValueEnum};

use crate::history;

pub const DEFAULT_PROMPT: &str = "pipesh$ ";

/// What an unopenable redirection target takes down.
#[derive(ValueEnum, Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectErrors {
	/// Exit the interpreter with status 1.
	Fatal,
	/// Skip the current command and prompt again.
	Command,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "pipesh", version)]
#[command(about = "A small fork/exec shell with pipes, redirections, background jobs and globs")]
pub struct Config {
	/// Run a single command line and exit with its status
	#[arg(short = 'c', long = "command", value_name = "LINE")]
	pub command: Option<String>,

	/// Prompt printed before each line; empty disables it
	#[arg(long, default_value = DEFAULT_PROMPT)]
	pub prompt: String,

	/// Number of lines kept by `history`
	#[arg(long, default_value_t = history::DEFAULT_CAPACITY)]
	pub history_size: usize,

	#[arg(long, value_enum, default_value_t = RedirectErrors::Fatal)]
	pub redirect_errors: RedirectErrors,

	/// Log filter used when PIPESH_LOG is unset
	#[arg(long, default_value = "warn")]
	pub log_level: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = Config::parse_from(["pipesh"]);
		assert_eq!(config.prompt, DEFAULT_PROMPT);
		assert_eq!(config.history_size, 1000);
		assert_eq!(config.redirect_errors, RedirectErrors::Fatal);
		assert!(config.command.is_none());
	}

	#[test]
	fn overrides() {
		let config = Config::parse_from([
			"pipesh", "-c", "ls | wc", "--prompt", "", "--history-size", "5", "--redirect-errors", "command",
		]);
		assert_eq!(config.command.as_deref(), Some("ls | wc"));
		assert_eq!(config.prompt, "");
		assert_eq!(config.history_size, 5);
		assert_eq!(config.redirect_errors, RedirectErrors::Command);
	}
}
