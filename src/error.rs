use std::{ffi, io};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShellError {
	#[error("syntax error: {0}")]
	Syntax(String),

	#[error("{path}: {source}")]
	Redirect { path: String, source: nix::Error },

	#[error("{0}")]
	Sys(#[from] nix::Error),

	#[error("nul byte in argument: {0}")]
	Nul(#[from] ffi::NulError),

	#[error("{0}")]
	Io(#[from] io::Error),
}

impl ShellError {
	pub fn syntax<S: Into<String>>(msg: S) -> ShellError {
		ShellError::Syntax(msg.into())
	}

	/// Whether the error may take the whole interpreter down, subject to configuration.
	pub fn is_redirect(&self) -> bool {
		matches!(self, ShellError::Redirect { .. })
	}
}

pub type Result<T> = std::result::Result<T, ShellError>;
