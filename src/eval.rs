use std::ffi::OsStr;
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{self, ForkResult};
use tracing::debug;

use crate::error::{Result, ShellError};
use crate::global;
use crate::glob;
use crate::job::{self, WaitStatusExt};
use crate::parser;
use crate::types::*;

/// Which process a dispatch frame is running in.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum Frame {
	/// The interpreter itself, or a process that must return to it.
	Shell,
	/// The downstream side of a pipe. It owns nothing but its own command and
	/// exits once the command is resolved.
	Stage,
}

enum PipeEnd {
	/// The interpreter, after both sides have exited.
	Orchestrator(u8),
	/// The reading child, with its stdin already bound to the pipe.
	Downstream,
}

/// Rebinds stdin or stdout to `redirect.target`.
pub fn redirect_stream(redirect: &Redirect) -> Result<()> {
	let path = Path::new(OsStr::from_bytes(&redirect.target));
	let (flags, target) = match redirect.typ {
		RedirectType::Input => (OFlag::O_RDONLY, libc::STDIN_FILENO),
		RedirectType::Output => (OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC, libc::STDOUT_FILENO),
	};
	let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
	let fd = fcntl::open(path, flags, mode)
		.map_err(|e| ShellError::Redirect { path: path.display().to_string(), source: e })?;
	if fd != target {
		if target == libc::STDOUT_FILENO {
			let _ = io::stdout().flush();
		}
		let dup = unistd::dup2(fd, target);
		unistd::close(fd)?;
		dup?;
	}
	debug!(path = %path.display(), fd = target, "redirected");
	Ok(())
}

fn bind_or_exit(end: &OwnedFd, target: i32) {
	if let Err(e) = unistd::dup2(end.as_raw_fd(), target) {
		eprintln!("pipesh: dup2: {}", e);
		unsafe { libc::_exit(1) }
	}
}

/// Forks the writer (`left`, exec'd directly) and the reader of a new pipe.
/// Returns in the reader as `Downstream` and in the interpreter once both exited.
fn build_pipe(left: &[Token]) -> Result<PipeEnd> {
	let argv = job::to_cstrings(left)?;
	let (read_end, write_end) = unistd::pipe2(OFlag::O_CLOEXEC)?;

	let writer = match job::fork()? {
		ForkResult::Child => {
			bind_or_exit(&write_end, libc::STDOUT_FILENO);
			drop(read_end);
			drop(write_end);
			job::exec(&argv)
		},
		ForkResult::Parent { child } => child,
	};

	let reader = match job::fork() {
		Ok(ForkResult::Child) => {
			bind_or_exit(&read_end, libc::STDIN_FILENO);
			drop(read_end);
			drop(write_end);
			return Ok(PipeEnd::Downstream);
		},
		Ok(ForkResult::Parent { child }) => child,
		Err(e) => {
			drop(read_end);
			drop(write_end);
			job::wait_for(writer)?;
			return Err(e.into());
		},
	};

	drop(read_end);
	drop(write_end);
	debug!(%writer, %reader, command = %parser::render(left), "pipeline");
	job::wait_for(writer)?;
	let status = job::wait_for(reader)?;
	Ok(PipeEnd::Orchestrator(status.code()))
}

fn expand_glob(state: &mut global::State, args: ArgVector, index: usize) -> Result<u8> {
	let mut code = 0;
	for path in glob::expand(&args[index]) {
		let mut expanded = args.clone();
		expanded[index] = path;
		code = run_frame(state, expanded, false)?;
	}
	Ok(code)
}

/// Resolves `args` step by step until it has been launched. `frame` turns into
/// `Stage` when this process becomes the reading side of a pipe.
fn resolve(state: &mut global::State, mut args: ArgVector, mut globbing: bool, frame: &mut Frame) -> Result<u8> {
	loop {
		match parser::classify(args, globbing)? {
			Step::Empty => {
				return Ok(0);
			},
			Step::Launch(argv) => {
				return match *frame {
					Frame::Shell => job::launch_foreground(&argv),
					Frame::Stage => match job::replace_image(&argv)? {},
				};
			},
			Step::Redirect { redirect, rest } => {
				redirect_stream(&redirect)?;
				args = rest;
			},
			Step::Pipe { left, right } => {
				match build_pipe(&left)? {
					PipeEnd::Orchestrator(code) => { return Ok(code); },
					PipeEnd::Downstream => {
						*frame = Frame::Stage;
						globbing = true;
						args = right;
					},
				}
			},
			Step::Background(argv) => {
				if let Some(id) = state.job_set.launch_background(&argv)? {
					if let Some(job) = state.job_set.get(id) {
						eprintln!("[{}] {}", id, job.pid);
					}
				}
				return Ok(0);
			},
			Step::Glob { args, index } => {
				return expand_glob(state, args, index);
			},
		}
	}
}

fn finish_stage(result: Result<u8>) -> ! {
	let code = match result {
		Ok(code) => code,
		Err(e) => {
			eprintln!("pipesh: {}", e);
			1
		},
	};
	let _ = io::stdout().flush();
	unsafe { libc::_exit(code as i32) }
}

fn run_frame(state: &mut global::State, args: ArgVector, globbing: bool) -> Result<u8> {
	let mut frame = Frame::Shell;
	let result = resolve(state, args, globbing, &mut frame);
	if frame == Frame::Stage {
		finish_stage(result);
	}
	result
}

/// Runs one tokenized command line and returns its exit code.
///
/// Only the interpreter process returns from here: children forked along the way
/// either exec or exit. Redirections change the interpreter's own stdin/stdout;
/// restoring them is up to the caller. A malformed line is rejected before any
/// stage starts.
pub fn eval(state: &mut global::State, args: ArgVector) -> Result<u8> {
	parser::validate(&args)?;
	run_frame(state, args, true)
}
