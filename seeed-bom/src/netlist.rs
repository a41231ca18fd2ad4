//! Reads a KiCad XML netlist and resolves the part of every component.
//!
//! Only the `components` section is consulted:
//!
//! ```xml
//! <export>
//!   <components>
//!     <comp ref="R1">
//!       <fields>
//!         <field name="MPN">RC0603FR-0710KL</field>
//!       </fields>
//!     </comp>
//!   </components>
//! </export>
//! ```

use crate::error::{Error, Result};

use std::fs;
use std::io::Read;
use std::path::Path;
use std::collections::HashMap;

use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use roxmltree::{Document, Node, ParsingOptions};

const DNM: &str = "DNM";
const SKU: &str = "SKU";
const MPN: &str = "MPN";

/// What ends up happening with a component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
	/// Marked do not mount, excluded from the bom.
	DoNotMount,
	/// Part identifier taken from SKU or MPN.
	Resolved(String),
	/// Neither SKU nor MPN is set.
	Missing
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
	pub name: String,
	pub text: Option<String>
}

impl Field {
	fn is(&self, name: &str) -> bool {
		self.name.eq_ignore_ascii_case(name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
	pub designator: String,
	pub fields: Vec<Field>
}

impl Component {
	/// Value of the last field called `name`, if it has any text.
	fn value(&self, name: &str) -> Option<&str> {
		self.fields.iter()
			.filter(|f| f.is(name))
			.last()
			.and_then(|f| f.text.as_deref())
			.filter(|t| !t.is_empty())
	}

	/// DNM beats SKU, SKU beats MPN.
	pub fn classify(&self) -> Classification {
		if self.fields.iter().any(|f| f.is(DNM)) {
			return Classification::DoNotMount
		}

		match self.value(SKU).or_else(|| self.value(MPN)) {
			Some(part) => Classification::Resolved(part.to_string()),
			None => Classification::Missing
		}
	}
}

/// Where a designator ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
	Part(usize),
	Missing,
	DoNotMount
}

/// Result of reading a netlist.
///
/// A designator is in at most one of the three collections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Netlist {
	/// designator -> part, in the order the designators were first seen
	parts: Vec<(String, String)>,
	/// designators without SKU or MPN, in document order
	missing: Vec<String>,
	/// designators marked DNM, in document order
	do_not_mount: Vec<String>,
	index: HashMap<String, Slot>
}

impl Netlist {
	pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
		let raw = fs::read(path)?;
		Self::parse(&decode(&raw)?)
	}

	pub fn parse(xml: &str) -> Result<Self> {
		// kicad doesn't emit a DTD but other tools might
		let opts = ParsingOptions { allow_dtd: true, ..Default::default() };
		let doc = Document::parse_with_options(xml, opts)?;

		let mut netlist = Self::default();
		for comp in read_components(&doc)? {
			let class = comp.classify();
			log::debug!("{} -> {:?}", comp.designator, class);
			netlist.insert(comp.designator, class);
		}

		Ok(netlist)
	}

	pub fn parts(&self) -> &[(String, String)] {
		&self.parts
	}

	pub fn missing(&self) -> &[String] {
		&self.missing
	}

	pub fn do_not_mount(&self) -> &[String] {
		&self.do_not_mount
	}

	pub fn part(&self, designator: &str) -> Option<&str> {
		match self.index.get(designator)? {
			Slot::Part(i) => Some(&self.parts[*i].1),
			_ => None
		}
	}

	/// Records the classification of a designator, replacing whatever an
	/// earlier component with the same designator left behind.
	///
	/// A designator that gets resolved again keeps its position.
	pub fn insert(&mut self, designator: String, class: Classification) {
		if let Some(prev) = self.index.get(&designator).copied() {
			log::warn!("designator {} appears more than once, the last one wins", designator);

			if let (Slot::Part(i), Classification::Resolved(part)) = (prev, &class) {
				self.parts[i].1 = part.clone();
				return
			}

			self.forget(&designator, prev);
		}

		let slot = match class {
			Classification::DoNotMount => {
				self.do_not_mount.push(designator.clone());
				Slot::DoNotMount
			},
			Classification::Missing => {
				self.missing.push(designator.clone());
				Slot::Missing
			},
			Classification::Resolved(part) => {
				self.parts.push((designator.clone(), part));
				Slot::Part(self.parts.len() - 1)
			}
		};
		self.index.insert(designator, slot);
	}

	fn forget(&mut self, designator: &str, slot: Slot) {
		match slot {
			Slot::Part(i) => {
				self.parts.remove(i);
				// everything after i moved one to the front
				for (d, _) in &self.parts[i..] {
					if let Some(Slot::Part(j)) = self.index.get_mut(d) {
						*j -= 1;
					}
				}
			},
			Slot::Missing => self.missing.retain(|d| d != designator),
			Slot::DoNotMount => self.do_not_mount.retain(|d| d != designator)
		}
		self.index.remove(designator);
	}
}

/// Decodes a netlist using its byte order mark or the encoding named in the
/// xml declaration. Without either the input has to be UTF-8.
fn decode(raw: &[u8]) -> Result<String> {
	let mut reader = DecodeReaderBytesBuilder::new()
		.encoding(declared_encoding(raw))
		.bom_override(true)
		.build(raw);

	let mut xml = String::new();
	reader.read_to_string(&mut xml)?;

	Ok(xml)
}

/// `<?xml version="1.0" encoding="ISO-8859-1"?>` -> windows-1252
fn declared_encoding(raw: &[u8]) -> Option<&'static Encoding> {
	let raw = raw.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(raw);
	let head = &raw[..raw.len().min(1024)];
	let end = head.iter().position(|b| *b == b'>')?;
	let decl = std::str::from_utf8(&head[..end]).ok()?
		.strip_prefix("<?xml")?;

	let rest = &decl[decl.find("encoding")? + "encoding".len()..];
	let rest = rest.trim_start()
		.strip_prefix('=')?
		.trim_start();
	let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
	let label = rest[1..].split(quote).next()?;

	Encoding::for_label(label.as_bytes())
}

fn read_components(doc: &Document) -> Result<Vec<Component>> {
	let lists: Vec<_> = doc.root_element()
		.children()
		.filter(|n| n.has_tag_name("components"))
		.collect();

	if lists.is_empty() {
		log::warn!("netlist has no components section");
	}

	lists.iter()
		.flat_map(|list| list.children().filter(Node::is_element))
		.map(|node| read_component(doc, node))
		.collect()
}

fn read_component(doc: &Document, node: Node) -> Result<Component> {
	let designator = required_attr(doc, node, "ref")?;

	let mut fields = vec![];
	if let Some(list) = node.children().find(|n| n.has_tag_name("fields")) {
		for field in list.children().filter(Node::is_element) {
			fields.push(Field {
				name: required_attr(doc, field, "name")?,
				text: field.text().map(str::to_string)
			});
		}
	}

	Ok(Component { designator, fields })
}

fn required_attr(doc: &Document, node: Node, attr: &'static str) -> Result<String> {
	node.attribute(attr)
		.map(str::to_string)
		.ok_or_else(|| Error::MissingAttribute {
			element: node.tag_name().name().to_string(),
			attr,
			line: doc.text_pos_at(node.range().start).row
		})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn comp(fields: &[(&str, Option<&str>)]) -> Component {
		Component {
			designator: "X1".into(),
			fields: fields.iter()
				.map(|(n, t)| Field {
					name: n.to_string(),
					text: t.map(str::to_string)
				})
				.collect()
		}
	}

	fn resolved(s: &str) -> Classification {
		Classification::Resolved(s.into())
	}

	#[test]
	fn sku_beats_mpn() {
		let c = comp(&[("MPN", Some("M")), ("SKU", Some("S"))]);
		assert_eq!(c.classify(), resolved("S"));
		let c = comp(&[("SKU", Some("S")), ("MPN", Some("M"))]);
		assert_eq!(c.classify(), resolved("S"));
	}

	#[test]
	fn mpn_is_fallback() {
		assert_eq!(comp(&[("MPN", Some("M"))]).classify(), resolved("M"));
		let c = comp(&[("SKU", Some("")), ("MPN", Some("M"))]);
		assert_eq!(c.classify(), resolved("M"));
		let c = comp(&[("SKU", None), ("MPN", Some("M"))]);
		assert_eq!(c.classify(), resolved("M"));
	}

	#[test]
	fn dnm_beats_everything() {
		let c = comp(&[("SKU", Some("S")), ("MPN", Some("M")), ("DNM", None)]);
		assert_eq!(c.classify(), Classification::DoNotMount);
		let c = comp(&[("dnm", Some("no"))]);
		assert_eq!(c.classify(), Classification::DoNotMount);
	}

	#[test]
	fn names_ignore_case() {
		assert_eq!(comp(&[("sku", Some("S"))]).classify(), resolved("S"));
		assert_eq!(comp(&[("Mpn", Some("M"))]).classify(), resolved("M"));
	}

	#[test]
	fn nothing_is_missing() {
		assert_eq!(comp(&[]).classify(), Classification::Missing);
		let c = comp(&[("Value", Some("10k")), ("MPN", Some(""))]);
		assert_eq!(c.classify(), Classification::Missing);
	}

	#[test]
	fn later_field_replaces_earlier() {
		let c = comp(&[("SKU", Some("A")), ("SKU", Some("B"))]);
		assert_eq!(c.classify(), resolved("B"));
		let c = comp(&[("SKU", Some("A")), ("SKU", None), ("MPN", Some("M"))]);
		assert_eq!(c.classify(), resolved("M"));
	}

	#[test]
	fn parse_end_to_end_example() {
		let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<export version="D">
  <components>
    <comp ref="R1">
      <fields><field name="MPN">R-100</field></fields>
    </comp>
    <comp ref="R2">
      <fields>
        <field name="SKU">R-200</field>
        <field name="MPN">R-999</field>
      </fields>
    </comp>
    <comp ref="C1">
      <fields>
        <field name="DNM"/>
        <field name="SKU">C-1</field>
      </fields>
    </comp>
    <comp ref="D1"/>
  </components>
</export>"#;

		let netlist = Netlist::parse(xml).unwrap();
		assert_eq!(netlist.parts, vec![
			("R1".to_string(), "R-100".to_string()),
			("R2".to_string(), "R-200".to_string())
		]);
		assert_eq!(netlist.missing, ["D1"]);
		assert_eq!(netlist.do_not_mount, ["C1"]);
	}

	#[test]
	fn missing_ref_is_fatal() {
		let xml = "<export>\n<components>\n<comp/>\n</components>\n</export>";
		match Netlist::parse(xml) {
			Err(Error::MissingAttribute { element, attr, line }) => {
				assert_eq!(element, "comp");
				assert_eq!(attr, "ref");
				assert_eq!(line, 3);
			},
			r => panic!("unexpected {:?}", r)
		}
	}

	#[test]
	fn missing_field_name_is_fatal() {
		let xml = r#"<export><components><comp ref="R1">
			<fields><field>x</field></fields>
		</comp></components></export>"#;
		assert!(matches!(
			Netlist::parse(xml),
			Err(Error::MissingAttribute { attr: "name", .. })
		));
	}

	#[test]
	fn malformed_xml_is_fatal() {
		assert!(matches!(
			Netlist::parse("<export><components>"),
			Err(Error::XmlParse(_))
		));
	}

	#[test]
	fn no_components_section() {
		let netlist = Netlist::parse("<export><design/></export>").unwrap();
		assert_eq!(netlist, Netlist::default());
	}

	#[test]
	fn duplicate_designator_last_wins() {
		let mut n = Netlist::default();
		n.insert("R1".into(), resolved("A"));
		n.insert("R2".into(), resolved("B"));
		n.insert("R1".into(), resolved("C"));
		assert_eq!(n.parts, vec![
			("R1".to_string(), "C".to_string()),
			("R2".to_string(), "B".to_string())
		]);

		n.insert("R1".into(), Classification::DoNotMount);
		assert_eq!(n.part("R1"), None);
		assert_eq!(n.part("R2"), Some("B"));
		assert_eq!(n.do_not_mount, ["R1"]);

		n.insert("R1".into(), Classification::Missing);
		assert!(n.do_not_mount.is_empty());
		assert_eq!(n.missing, ["R1"]);

		n.insert("R1".into(), resolved("D"));
		assert!(n.missing.is_empty());
		assert_eq!(n.part("R1"), Some("D"));
		assert_eq!(n.parts(), [
			("R2".to_string(), "B".to_string()),
			("R1".to_string(), "D".to_string())
		]);
	}

	#[test]
	fn doctype_is_accepted() {
		let xml = "<?xml version=\"1.0\"?>\n<!DOCTYPE export>\n\
			<export><components><comp ref=\"R1\">\
			<fields><field name=\"MPN\">X</field></fields>\
			</comp></components></export>";

		let netlist = Netlist::parse(xml).unwrap();
		assert_eq!(netlist.part("R1"), Some("X"));
	}

	#[test]
	fn field_names_fold_ascii_only() {
		// U+017F uppercases to S but isn't an ascii case variant
		let c = comp(&[("\u{17f}ku", Some("S"))]);
		assert_eq!(c.classify(), Classification::Missing);
	}

	#[test]
	fn encoding_from_declaration() {
		let enc = declared_encoding(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a/>");
		assert_eq!(enc, Some(encoding_rs::WINDOWS_1252));
		let enc = declared_encoding(b"\xEF\xBB\xBF<?xml version='1.0' encoding = 'utf-8' ?><a/>");
		assert_eq!(enc, Some(encoding_rs::UTF_8));
		assert_eq!(declared_encoding(b"<?xml version=\"1.0\"?><a/>"), None);
		assert_eq!(declared_encoding(b"<export/>"), None);
		assert_eq!(declared_encoding(b""), None);
	}

	#[test]
	fn decodes_declared_latin1() {
		let raw = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
			<export><components><comp ref=\"C1\">\
			<fields><field name=\"MPN\">10\xb5F</field></fields>\
			</comp></components></export>";

		let netlist = Netlist::parse(&decode(raw).unwrap()).unwrap();
		assert_eq!(netlist.part("C1"), Some("10\u{b5}F"));
	}

	#[test]
	fn undeclared_non_utf8_fails() {
		let raw = b"<export><components><comp ref=\"C\xb5\"/></components></export>";
		assert!(matches!(decode(raw), Err(Error::Io(_))));
	}
}
