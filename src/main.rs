mod builtin;
mod config;
mod error;
mod eval;
mod glob;
mod global;
mod history;
mod job;
mod parser;
mod stream;
mod types;

use std::io;
use std::process;
use io::BufRead;
use io::Write;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use config::{Config, RedirectErrors};

const LOG_ENV: &str = "PIPESH_LOG";

enum Flow {
	Continue(u8),
	Exit(i32),
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
	let filter = EnvFilter::try_from_env(LOG_ENV)
		.or_else(|_| EnvFilter::try_new(&config.log_level))
		.context("invalid log filter")?;
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(false)
		.init();
	Ok(())
}

fn run_line(state: &mut global::State, line: &[u8]) -> Flow {
	let args = parser::tokenize(line);
	if let Some(builtin) = builtin::match_builtin(&args) {
		return Flow::Continue(builtin(state, &args));
	}
	let saved = match stream::SavedStreams::save() {
		Ok(saved) => saved,
		Err(e) => {
			eprintln!("pipesh: cannot save standard streams: {}", e);
			return Flow::Continue(1);
		},
	};
	let result = eval::eval(state, args);
	drop(saved);
	match result {
		Ok(code) => {
			debug!(code, "command finished");
			Flow::Continue(code)
		},
		Err(e) => {
			eprintln!("pipesh: {}", e);
			if e.is_redirect() && state.config.redirect_errors == RedirectErrors::Fatal {
				error!("redirection failed, exiting");
				Flow::Exit(1)
			} else {
				Flow::Continue(1)
			}
		},
	}
}

fn report_jobs(state: &mut global::State) {
	for done in state.job_set.reap() {
		match done.code {
			Some(0) | None => eprintln!("[{}] done {}", done.id, done.job.command),
			Some(code) => eprintln!("[{}] exit {} {}", done.id, code, done.job.command),
		}
	}
}

fn repl(state: &mut global::State) -> anyhow::Result<i32> {
	let mut stdout = io::stdout();
	let stdin = io::stdin();
	let mut stdin_locked = stdin.lock();
	loop {
		report_jobs(state);
		debug!(jobs = state.job_set.len(), history = state.history.len(), "prompt");
		if !state.config.prompt.is_empty() {
			let _ = stdout.write_all(state.config.prompt.as_bytes());
			let _ = stdout.flush();
		}
		let mut line: Vec<u8> = vec![];
		let n = stdin_locked.read_until(b'\n', &mut line).context("cannot read command line")?;
		if n == 0 {
			info!("end of input");
			return Ok(0);
		}
		state.history.push(&line);
		if let Flow::Exit(code) = run_line(state, &line) {
			return Ok(code);
		}
	}
}

fn run() -> anyhow::Result<i32> {
	let config = Config::parse();
	init_logging(&config)?;
	let mut state = global::State::new(config);
	match state.config.command.clone() {
		Some(line) => match run_line(&mut state, line.as_bytes()) {
			Flow::Continue(code) => Ok(code as i32),
			Flow::Exit(code) => Ok(code),
		},
		None => repl(&mut state),
	}
}

fn main() {
	let code = match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("pipesh: {:#}", e);
			1
		},
	};
	let _ = io::stdout().flush();
	process::exit(code)
}
