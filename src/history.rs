use std::collections::VecDeque;
use std::io::{self, Write};

pub const DEFAULT_CAPACITY: usize = 1000;

/// Raw input lines, oldest first. Once `capacity` lines are held, each new line
/// evicts the oldest one.
#[derive(Debug)]
pub struct History {
	lines: VecDeque<Vec<u8>>,
	capacity: usize,
}

impl History {
	pub fn new(capacity: usize) -> History {
		History { lines: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)), capacity: capacity }
	}

	pub fn push(&mut self, line: &[u8]) {
		if self.capacity == 0 {
			return;
		}
		if self.lines.len() == self.capacity {
			self.lines.pop_front();
		}
		self.lines.push_back(line.to_vec());
	}

	pub fn len(&self) -> usize {
		self.lines.len()
	}

	pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
		self.lines.iter().map(|l| l.as_slice())
	}

	/// Writes one entry per line, numbered from 1.
	pub fn print<W: Write>(&self, out: &mut W) -> io::Result<()> {
		for (i, line) in self.iter().enumerate() {
			write!(out, "{:>5}  ", i + 1)?;
			out.write_all(line)?;
			if line.last() != Some(&b'\n') {
				out.write_all(b"\n")?;
			}
		}
		out.flush()
	}
}

impl Default for History {
	fn default() -> History {
		History::new(DEFAULT_CAPACITY)
	}
}
