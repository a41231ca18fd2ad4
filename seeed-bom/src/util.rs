use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const CSV_EXTENSION: &str = ".csv";

/// `board` -> `board.csv`, `out/board.v2` -> `out/board.v2.csv`
pub fn csv_path(slug: impl AsRef<Path>) -> PathBuf {
	let mut path = OsString::from(slug.as_ref());
	path.push(CSV_EXTENSION);
	PathBuf::from(path)
}
