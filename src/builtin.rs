use std::env;
use std::ffi::OsStr;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

use nix::unistd;

use crate::global;
use crate::types::Token;

pub type Builtin = fn(&mut global::State, &[Token]) -> u8;

pub fn builtin_cd(_: &mut global::State, args: &[Token]) -> u8 {
	let target = match args {
		[_] => match env::var_os("HOME") {
			Some(home) => PathBuf::from(home),
			None => {
				eprintln!("cd: HOME not set");
				return 1;
			},
		},
		[_, dir] => PathBuf::from(OsStr::from_bytes(dir)),
		_ => {
			eprintln!("cd: too many arguments");
			return 1;
		},
	};
	match unistd::chdir(target.as_path()) {
		Ok(()) => 0,
		Err(e) => {
			eprintln!("cd: {}: {}", target.display(), e);
			1
		},
	}
}

pub fn builtin_history(state: &mut global::State, _: &[Token]) -> u8 {
	match state.history.print(&mut io::stdout().lock()) {
		Ok(()) => 0,
		Err(e) => {
			eprintln!("history: {}", e);
			1
		},
	}
}

/// Commands handled by the interpreter itself, before any dispatching. `history`
/// only counts when it is the whole line.
pub fn match_builtin(args: &[Token]) -> Option<Builtin> {
	match args.first()?.as_slice() {
		b"cd" => Some(builtin_cd),
		b"history" if args.len() == 1 => Some(builtin_history),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::parser::tokenize;

	#[test]
	fn recognizes_builtins() {
		assert!(match_builtin(&tokenize(b"cd /tmp")).is_some());
		assert!(match_builtin(&tokenize(b"cd")).is_some());
		assert!(match_builtin(&tokenize(b"history\n")).is_some());
	}

	#[test]
	fn history_with_arguments_is_not_builtin() {
		assert!(match_builtin(&tokenize(b"history | wc -l")).is_none());
		assert!(match_builtin(&tokenize(b"ls")).is_none());
		assert!(match_builtin(&[]).is_none());
	}
}
