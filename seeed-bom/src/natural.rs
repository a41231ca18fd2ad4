//! Natural ordering for designators, so `C5` sorts before `C10`.

use std::cmp::Ordering;

/// One run of a designator, either text or a digit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chunk<'a> {
	Text(&'a str),
	Number(&'a str)
}

/// Splits `s` into alternating text and digit runs, always starting with a
/// (possibly empty) text run.
fn chunks(s: &str) -> Vec<Chunk<'_>> {
	let mut out = vec![];
	let mut start = 0;
	let mut in_digits = false;

	for (i, c) in s.char_indices() {
		let digit = c.is_ascii_digit();
		if digit != in_digits {
			out.push(chunk(&s[start..i], in_digits));
			start = i;
			in_digits = digit;
		}
	}
	out.push(chunk(&s[start..], in_digits));

	out
}

fn chunk(s: &str, digits: bool) -> Chunk<'_> {
	if digits {
		Chunk::Number(s)
	} else {
		Chunk::Text(s)
	}
}

/// Compares two digit runs by value without parsing them into an integer.
fn cmp_numbers(a: &str, b: &str) -> Ordering {
	let a = a.trim_start_matches('0');
	let b = b.trim_start_matches('0');

	a.len().cmp(&b.len())
		.then_with(|| a.cmp(b))
}

/// Compares two designators run by run.
///
/// Digit runs compare as integers and text runs by code point. Numbers with
/// leading zeros equal their plain form, so `C01` and `C1` are `Equal`.
pub fn compare(a: &str, b: &str) -> Ordering {
	let a = chunks(a);
	let b = chunks(b);

	for (x, y) in a.iter().zip(b.iter()) {
		let ord = match (x, y) {
			(Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
			(Chunk::Number(x), Chunk::Number(y)) => cmp_numbers(x, y),
			// runs alternate from the same starting kind so positions align
			_ => unreachable!("misaligned designator chunks")
		};

		if ord != Ordering::Equal {
			return ord
		}
	}

	a.len().cmp(&b.len())
}
