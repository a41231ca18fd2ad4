//! Writes the bom in the layout of the Seeed Fusion PCBA template:
//!
//! ```text
//! Ref,MPN/SKU,Qtd
//! C1,RHA,1
//! "D1,D2",CC0603KRX7R9BB102,2
//! ```

use crate::error::Result;
use crate::natural;
use crate::util::csv_path;

use std::io;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::collections::BTreeMap;

use serde::Serialize;

const HEADER: [&str; 3] = ["Ref", "MPN/SKU", "Qtd"];

/// All designators using the same part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomLine {
	pub part: String,
	pub designators: Vec<String>
}

impl BomLine {
	pub fn quantity(&self) -> usize {
		self.designators.len()
	}
}

#[derive(Debug, Serialize)]
struct SeeedEntry<'a> {
	/// Comma separated designator list
	#[serde(rename = "Ref")]
	designators: String,
	#[serde(rename = "MPN/SKU")]
	part: &'a str,
	#[serde(rename = "Qtd")]
	quantity: usize
}

/// Groups designators by part. Parts are ordered by code point, designators
/// naturally, keeping the input order of ties.
pub fn group(parts: &[(String, String)]) -> Vec<BomLine> {
	let mut groups: BTreeMap<&str, Vec<String>> = BTreeMap::new();
	for (designator, part) in parts {
		groups.entry(part.as_str())
			.or_default()
			.push(designator.clone());
	}

	groups.into_iter()
		.map(|(part, mut designators)| {
			designators.sort_by(|a, b| natural::compare(a, b));
			BomLine { part: part.to_string(), designators }
		})
		.collect()
}

/// Serializes the lines, header first, to `w`.
pub fn write_lines<W: io::Write>(w: W, lines: &[BomLine]) -> Result<()> {
	let mut w = csv::WriterBuilder::new()
		.has_headers(false)
		.terminator(csv::Terminator::Any(b'\n'))
		.from_writer(w);

	w.write_record(HEADER)?;
	for line in lines {
		w.serialize(SeeedEntry {
			designators: line.designators.join(","),
			part: &line.part,
			quantity: line.quantity()
		})?;
	}
	w.flush()?;

	Ok(())
}

/// Writes the bom to `<slug>.csv`, replacing any existing file, and returns
/// the path written.
pub fn write_bom(slug: impl AsRef<Path>, parts: &[(String, String)]) -> Result<PathBuf> {
	let bom_path = csv_path(slug);
	let lines = group(parts);

	let file = File::create(&bom_path)?;
	write_lines(file, &lines)?;

	log::debug!("wrote {} lines to {:?}", lines.len(), bom_path);

	Ok(bom_path)
}
