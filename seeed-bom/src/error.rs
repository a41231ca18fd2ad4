use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("io error: {0}")]
	Io(#[from] io::Error),
	#[error("failed to parse netlist: {0}")]
	XmlParse(#[from] roxmltree::Error),
	#[error("missing attribute '{attr}' on <{element}> (line {line})")]
	MissingAttribute {
		element: String,
		attr: &'static str,
		line: u32
	},
	#[error("failed to write bom: {0}")]
	Csv(#[from] csv::Error)
}

pub type Result<T> = std::result::Result<T, Error>;
