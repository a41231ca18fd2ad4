use seeed_bom::{write_bom, Netlist, Result};

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

/// Create a Seeed Fusion PCBA bom from a KiCad XML netlist
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
	/// KiCad XML netlist
	netlist: PathBuf,
	/// Output path without extension, `.csv` gets appended
	output: PathBuf
}

fn main() -> ExitCode {
	env_logger::init();

	let args = Args::parse();

	match bom(args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("error: {}", e);
			ExitCode::FAILURE
		}
	}
}

fn bom(args: Args) -> Result<()> {
	let netlist = Netlist::from_path(&args.netlist)?;

	let bom_path = write_bom(&args.output, netlist.parts())?;
	println!("written to {:?}", bom_path);

	if !netlist.do_not_mount().is_empty() {
		println!("\n** Info **: parts with do not mount (DNM) attribute were not included");
		println!("{}", netlist.do_not_mount().join(", "));
	}

	if !netlist.missing().is_empty() {
		println!("\n** Warning **: there were parts with missing SKU/MPN");
		println!("{}", netlist.missing().join(", "));
	}

	Ok(())
}
