use std::io::{self, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use nix::fcntl::{fcntl, FcntlArg};
use nix::unistd;
use tracing::warn;

/// Close-on-exec copies of the interpreter's stdin and stdout. Dropping puts them
/// back on descriptors 0 and 1, undoing any redirection made meanwhile.
pub struct SavedStreams {
	stdin: OwnedFd,
	stdout: OwnedFd,
}

fn save(fd: i32) -> nix::Result<OwnedFd> {
	let copy = fcntl(fd, FcntlArg::F_DUPFD_CLOEXEC(10))?;
	Ok(unsafe { OwnedFd::from_raw_fd(copy) })
}

impl SavedStreams {
	pub fn save() -> nix::Result<SavedStreams> {
		let stdin = save(libc::STDIN_FILENO)?;
		let stdout = save(libc::STDOUT_FILENO)?;
		Ok(SavedStreams { stdin: stdin, stdout: stdout })
	}
}

impl Drop for SavedStreams {
	fn drop(&mut self) {
		let _ = io::stdout().flush();
		for (saved, fd) in [(&self.stdin, libc::STDIN_FILENO), (&self.stdout, libc::STDOUT_FILENO)] {
			if let Err(e) = unistd::dup2(saved.as_raw_fd(), fd) {
				warn!(fd, "cannot restore stream: {}", e);
			}
		}
	}
}
