use std::convert::Infallible;
use std::ffi::{CString, NulError};

use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use crate::error::Result;
use crate::parser;
use crate::types::Token;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum State { Active, Stopped, Terminated }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn code(self) -> u8;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) => State::Terminated,
			WaitStatus::Signaled(..) => State::Terminated,
			WaitStatus::Stopped(..) => State::Stopped,
			WaitStatus::Continued(..) => State::Active,
			WaitStatus::StillAlive => State::Active,
			#[allow(unreachable_patterns)]
			_ => State::Stopped,
		}
	}

	/// Shell-style exit code: the exit status, or 128 plus the signal number.
	fn code(self) -> u8 {
		match self {
			WaitStatus::Exited(_, code) => code as u8,
			WaitStatus::Signaled(_, sig, _) => 128u8.wrapping_add(sig as i32 as u8),
			_ => 0,
		}
	}
}

fn retry<T, F>(mut f: F) -> nix::Result<T> where F: FnMut() -> nix::Result<T> {
	loop {
		match f() {
			Err(Errno::EINTR) => {},
			result => return result,
		}
	}
}

/// Forks the interpreter. The interpreter is single threaded, so the child may
/// run arbitrary code before it execs or exits.
pub fn fork() -> nix::Result<ForkResult> {
	unsafe { unistd::fork() }
}

pub fn to_cstrings(args: &[Token]) -> std::result::Result<Vec<CString>, NulError> {
	args.iter().map(|t| CString::new(t.as_slice())).collect()
}

/// Replaces the current process image with `argv[0]` looked up in `PATH`.
/// Never returns: on failure the process exits with 127 (not found) or 126.
pub fn exec(argv: &[CString]) -> ! {
	// Rust starts with SIGPIPE ignored and exec keeps ignored dispositions.
	let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
	let err = match unistd::execvp(&argv[0], argv) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	let name = argv[0].to_string_lossy();
	let code = if err == Errno::ENOENT {
		eprintln!("pipesh: {}: command not found", name);
		127
	} else {
		eprintln!("pipesh: exec {} failed: {}", name, err);
		126
	};
	unsafe { libc::_exit(code) }
}

/// Blocks until `pid` has terminated.
pub fn wait_for(pid: Pid) -> nix::Result<WaitStatus> {
	loop {
		let status = retry(|| waitpid(pid, None))?;
		if status.state() == State::Terminated {
			debug!(%pid, code = status.code(), "reaped");
			return Ok(status);
		}
	}
}

/// Runs `args` in a child and waits for it.
pub fn launch_foreground(args: &[Token]) -> Result<u8> {
	let argv = to_cstrings(args)?;
	match fork()? {
		ForkResult::Parent { child } => {
			debug!(pid = %child, command = %parser::render(args), "foreground");
			Ok(wait_for(child)?.code())
		},
		ForkResult::Child => exec(&argv),
	}
}

/// Execs `args` in the calling process, which must be a forked child.
pub fn replace_image(args: &[Token]) -> Result<Infallible> {
	let argv = to_cstrings(args)?;
	exec(&argv)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
	pub pid: Pid,
	pub command: String,
}

/// A background job that has been reaped.
#[derive(Debug)]
pub struct Finished {
	pub id: usize,
	pub job: Job,
	pub code: Option<u8>,
}

/// Background jobs still running. A job's id is its slot index plus one.
#[derive(Debug, Default)]
pub struct JobSet {
	jobs: Vec<Option<Job>>,
}

impl JobSet {
	pub fn new() -> JobSet {
		JobSet { jobs: vec![] }
	}

	pub fn len(&self) -> usize {
		self.jobs.iter().filter(|j| j.is_some()).count()
	}

	pub fn get(&self, id: usize) -> Option<&Job> {
		self.jobs.get(id.checked_sub(1)?)?.as_ref()
	}

	pub fn push(&mut self, job: Job) -> usize {
		let jobs = &mut self.jobs;
		if let Some((i, space)) = jobs.iter_mut().enumerate().find(|(_, o)| o.is_none()) {
			*space = Some(job);
			i + 1
		} else {
			jobs.push(Some(job));
			jobs.len()
		}
	}

	fn compact(&mut self) {
		let len = self.jobs.iter().rposition(|j| j.is_some()).map_or(0, |i| i + 1);
		self.jobs.truncate(len);
	}

	/// Starts `args` without waiting for it. One non-blocking reap is attempted right
	/// away; a child still running is kept in the set and its id returned.
	pub fn launch_background(&mut self, args: &[Token]) -> Result<Option<usize>> {
		let argv = to_cstrings(args)?;
		let child = match fork()? {
			ForkResult::Parent { child } => child,
			ForkResult::Child => exec(&argv),
		};
		let command = parser::render(args);
		let status = retry(|| waitpid(child, Some(WaitPidFlag::WNOHANG)))?;
		if status.state() == State::Terminated {
			debug!(pid = %child, %command, "background job finished at once");
			return Ok(None);
		}
		let id = self.push(Job { pid: child, command: command });
		debug!(id, pid = %child, "background");
		Ok(Some(id))
	}

	/// Collects every background job that has terminated, without blocking.
	pub fn reap(&mut self) -> Vec<Finished> {
		let mut finished = vec![];
		for (i, slot) in self.jobs.iter_mut().enumerate() {
			let pid = match slot {
				Some(job) => job.pid,
				None => { continue; },
			};
			let code = match retry(|| waitpid(pid, Some(WaitPidFlag::WNOHANG))) {
				Ok(status) if status.state() == State::Terminated => Some(status.code()),
				Ok(_) => { continue; },
				Err(Errno::ECHILD) => None,
				Err(e) => {
					warn!(%pid, "waitpid failed: {}", e);
					continue;
				},
			};
			if let Some(job) = slot.take() {
				finished.push(Finished { id: i + 1, job: job, code: code });
			}
		}
		self.compact();
		finished
	}
}
