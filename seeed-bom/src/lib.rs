//! Converts a KiCad XML netlist into a bom for the Seeed Fusion PCBA service.

pub mod bom;
pub mod error;
pub mod natural;
pub mod netlist;
pub mod util;

pub use bom::{BomLine, group, write_bom};
pub use error::{Error, Result};
pub use netlist::{Classification, Netlist};
