use crate::error::{Result, ShellError};
use crate::glob;
use crate::types::*;

struct Tokenizer<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Tokenizer<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn is_whitespace(c: u8) -> bool {
		matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x07)
	}

	fn skip_whitespaces(&mut self) {
		self.proceed_while(Tokenizer::is_whitespace);
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(|c| !Tokenizer::is_whitespace(c));
		&self.line[orig .. self.i]
	}
}

/// Splits a raw line on whitespace. Quotes are ordinary bytes.
pub fn tokenize(line: &[u8]) -> ArgVector {
	let mut tokenizer = Tokenizer { line: line, i: 0 };
	let mut tokens = vec![];
	loop {
		tokenizer.skip_whitespaces();
		let word = tokenizer.read_word();
		if word.is_empty() {
			break;
		}
		tokens.push(word.to_vec());
	}
	tokens
}

fn is_operator(c: u8) -> bool {
	matches!(c, b'<' | b'>' | b'|')
}

fn display(token: &[u8]) -> String {
	String::from_utf8_lossy(token).into_owned()
}

/// Takes the operand of the operator at `i`, either glued to it (`>out`) or the next token.
/// Returns the operand and the index of the first token after it.
fn take_operand(args: &mut ArgVector, i: usize) -> Option<(Token, usize)> {
	let (operand, after) = if args[i].len() > 1 {
		(args[i].split_off(1), i + 1)
	} else {
		(args.get(i + 1)?.clone(), i + 2)
	};
	match operand.first() {
		Some(&c) if !is_operator(c) => Some((operand, after)),
		_ => None,
	}
}

fn split_redirect(mut args: ArgVector, i: usize, typ: RedirectType) -> Result<Step> {
	let (target, after) = take_operand(&mut args, i)
		.ok_or_else(|| ShellError::syntax(format!("missing file after '{}'", typ.operator())))?;
	let tail = args.split_off(after);
	args.truncate(i);
	args.extend(tail);
	Ok(Step::Redirect { redirect: Redirect { target: target, typ: typ }, rest: args })
}

fn split_pipe(mut args: ArgVector, i: usize) -> Result<Step> {
	let mut right = args.split_off(i);
	let glued = right.remove(0).split_off(1);
	if !glued.is_empty() {
		right.insert(0, glued);
	}
	if args.is_empty() {
		return Err(ShellError::syntax("missing command before '|'"));
	}
	if right.is_empty() {
		return Err(ShellError::syntax("missing command after '|'"));
	}
	Ok(Step::Pipe { left: args, right: right })
}

/// Scans `args` left to right and picks the first thing to do.
///
/// `<`, `>` and `|` fire when they start a token, wherever it is. `&` fires only as
/// the last token; anywhere else it is a plain argument. A glob metacharacter in any
/// token but the first fires expansion when `globbing` is set. Scanning stops at the
/// first trigger, so operators are handled in textual order.
pub fn classify(args: ArgVector, globbing: bool) -> Result<Step> {
	if args.is_empty() {
		return Ok(Step::Empty);
	}
	let last = args.len() - 1;
	for i in 0 .. args.len() {
		let lead = args[i].first().copied();
		match lead {
			Some(b'<') => { return split_redirect(args, i, RedirectType::Input); },
			Some(b'>') => { return split_redirect(args, i, RedirectType::Output); },
			Some(b'|') => { return split_pipe(args, i); },
			_ => {},
		}
		if i == last && args[i] == b"&" {
			let mut args = args;
			args.pop();
			if args.is_empty() {
				return Err(ShellError::syntax("missing command before '&'"));
			}
			return Ok(Step::Background(args));
		}
		if globbing && i > 0 && glob::has_magic(&args[i]) {
			return Ok(Step::Glob { args: args, index: i });
		}
	}
	Ok(Step::Launch(args))
}

/// Checks the operators of a whole command line before anything runs.
///
/// `classify` only sees the part of the line its frame is resolving, so a broken
/// segment after a `|` would otherwise surface once the stages before it had been
/// started. Every `|` needs a command word on both sides, every `<`/`>` an operand,
/// and a trailing `&` something to run.
pub fn validate(args: &[Token]) -> Result<()> {
	let background = args.last().map_or(false, |t| t == b"&");
	let end = if background { args.len() - 1 } else { args.len() };
	let mut piped = false;
	let mut words = 0;
	let mut i = 0;
	while i < end {
		let mut token = args[i].as_slice();
		i += 1;
		while let Some((&b'|', rest)) = token.split_first() {
			if words == 0 {
				return Err(ShellError::syntax("missing command before '|'"));
			}
			piped = true;
			words = 0;
			token = rest;
		}
		match token.split_first() {
			None => {},
			Some((&op, glued)) if op == b'<' || op == b'>' => {
				let operand = if glued.is_empty() {
					i += 1;
					args[.. end].get(i - 1).map(|t| t.as_slice())
				} else {
					Some(glued)
				};
				match operand.and_then(|o| o.first()) {
					Some(&c) if !is_operator(c) => {},
					_ => return Err(ShellError::syntax(format!("missing file after '{}'", op as char))),
				}
			},
			Some(_) => { words += 1; },
		}
	}
	if words == 0 && piped {
		return Err(ShellError::syntax("missing command after '|'"));
	}
	if words == 0 && background {
		return Err(ShellError::syntax("missing command before '&'"));
	}
	Ok(())
}

/// Human readable form of an argument vector, for diagnostics.
pub fn render(args: &[Token]) -> String {
	args.iter().map(|t| display(t)).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
	use super::*;

	fn words(line: &str) -> ArgVector {
		tokenize(line.as_bytes())
	}

	fn argv(items: &[&str]) -> ArgVector {
		items.iter().map(|s| s.as_bytes().to_vec()).collect()
	}

	#[test]
	fn splits_on_every_whitespace_kind() {
		assert_eq!(words(" ls\t-l\r\n"), argv(&["ls", "-l"]));
		assert_eq!(words("a\x07b  c"), argv(&["a", "b", "c"]));
	}

	#[test]
	fn blank_lines_have_no_tokens() {
		assert!(words("").is_empty());
		assert!(words(" \t \n").is_empty());
	}

	#[test]
	fn quotes_are_not_special() {
		assert_eq!(words("echo \"a b\""), argv(&["echo", "\"a", "b\""]));
	}

	#[test]
	fn non_utf8_bytes_survive() {
		assert_eq!(tokenize(b"cat \xff\xfe"), vec![b"cat".to_vec(), vec![0xff, 0xfe]]);
	}

	#[test]
	fn plain_command_launches() {
		assert_eq!(classify(words("ls -l"), true).unwrap(), Step::Launch(argv(&["ls", "-l"])));
		assert_eq!(classify(vec![], true).unwrap(), Step::Empty);
	}

	#[test]
	fn input_redirect_consumes_operator_and_file() {
		let step = classify(words("sort < in -r"), true).unwrap();
		assert_eq!(step, Step::Redirect {
			redirect: Redirect { target: b"in".to_vec(), typ: RedirectType::Input },
			rest: argv(&["sort", "-r"]),
		});
	}

	#[test]
	fn glued_redirect_operand() {
		let step = classify(words("echo hi >out"), true).unwrap();
		assert_eq!(step, Step::Redirect {
			redirect: Redirect { target: b"out".to_vec(), typ: RedirectType::Output },
			rest: argv(&["echo", "hi"]),
		});
	}

	#[test]
	fn redirect_without_file_is_rejected() {
		assert!(classify(words("cat <"), true).is_err());
		assert!(classify(words("cat > | wc"), true).is_err());
		assert!(classify(words("echo hi >> log"), true).is_err());
	}

	#[test]
	fn first_operator_wins() {
		let step = classify(words("cat < in | wc -l"), true).unwrap();
		match step {
			Step::Redirect { rest, .. } => assert_eq!(rest, argv(&["cat", "|", "wc", "-l"])),
			other => panic!("unexpected {:?}", other),
		}
		let step = classify(words("ls | sort > out"), true).unwrap();
		assert_eq!(step, Step::Pipe { left: argv(&["ls"]), right: argv(&["sort", ">", "out"]) });
	}

	#[test]
	fn pipe_needs_both_sides() {
		assert!(classify(words("| wc"), true).is_err());
		assert!(classify(words("ls |"), true).is_err());
		assert_eq!(classify(words("ls |wc"), true).unwrap(),
			Step::Pipe { left: argv(&["ls"]), right: argv(&["wc"]) });
	}

	#[test]
	fn whole_line_is_checked_up_front() {
		assert!(validate(&words("touch made | | wc")).is_err());
		assert!(validate(&words("touch made || wc")).is_err());
		assert!(validate(&words("touch made | wc >")).is_err());
		assert!(validate(&words("ls | sort | uniq >>log")).is_err());
		assert!(validate(&words("ls | sort |")).is_err());
		assert!(validate(&words("< in | wc")).is_err());
		assert!(validate(&words("ls | &")).is_err());
		assert!(validate(&words("> out &")).is_err());
	}

	#[test]
	fn well_formed_lines_pass_the_check() {
		assert!(validate(&[]).is_ok());
		assert!(validate(&words("cat < in | sort |uniq -c >out")).is_ok());
		assert!(validate(&words("sort <in >out")).is_ok());
		assert!(validate(&words("> truncated")).is_ok());
		assert!(validate(&words("echo a & b")).is_ok());
		assert!(validate(&words("sleep 1 | cat &")).is_ok());
	}

	#[test]
	fn ampersand_only_counts_at_the_end() {
		assert_eq!(classify(words("sleep 1 &"), true).unwrap(), Step::Background(argv(&["sleep", "1"])));
		assert_eq!(classify(words("echo & done"), true).unwrap(), Step::Launch(argv(&["echo", "&", "done"])));
		assert!(classify(words("&"), true).is_err());
	}

	#[test]
	fn glob_skips_program_name() {
		assert_eq!(classify(words("ls* -a"), true).unwrap(), Step::Launch(argv(&["ls*", "-a"])));
		assert_eq!(classify(words("ls a *.rs b?"), true).unwrap(),
			Step::Glob { args: argv(&["ls", "a", "*.rs", "b?"]), index: 2 });
	}

	#[test]
	fn glob_disabled_falls_through() {
		assert_eq!(classify(words("ls *.rs"), false).unwrap(), Step::Launch(argv(&["ls", "*.rs"])));
	}

	#[test]
	fn operator_before_glob_wins() {
		let step = classify(words("cat < *.txt"), true).unwrap();
		assert!(matches!(step, Step::Redirect { .. }));
	}
}
