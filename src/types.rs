/// One whitespace-delimited word of the input line.
pub type Token = Vec<u8>;

/// A program name followed by its arguments.
pub type ArgVector = Vec<Token>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectType { Input, Output }

impl RedirectType {
	pub fn operator(self) -> char {
		match self {
			RedirectType::Input => '<',
			RedirectType::Output => '>',
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Redirect {
	pub target: Token,
	pub typ: RedirectType,
}

/// What a single dispatch frame does with its argument vector.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
	/// Nothing to run.
	Empty,
	Launch(ArgVector),
	/// Rebind a stream, then keep resolving `rest`.
	Redirect { redirect: Redirect, rest: ArgVector },
	Pipe { left: ArgVector, right: ArgVector },
	Background(ArgVector),
	/// Expand `args[index]` and resolve once per match.
	Glob { args: ArgVector, index: usize },
}
