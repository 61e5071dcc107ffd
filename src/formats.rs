//! JSON exchange format for the command-line tool.
//!
//! Input is an array of flight lines:
//!
//! ```json
//! [{"id": "Data_20170413_01_004", "distance": [...], "elevation": [...], "initial_guess": null}]
//! ```
//!
//! Output is a report splitting fitted lines from the ones that were skipped.
use crate::error::GlineError;
use crate::fitting::common::error::FittingError;
use crate::fitting::scurve::scurve::{FlightLine, FlightLineFit};
use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A flight line that could not be fitted, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub fits: Vec<FlightLineFit>,
    pub failures: Vec<FitFailure>,
}

impl FitReport {
    /// Pairs each result with the id of the line it came from. `results` must be in the same
    /// order as `lines`.
    pub fn new(lines: &[FlightLine], results: Vec<Result<FlightLineFit, FittingError>>) -> Self {
        let (fits, failures): (Vec<_>, Vec<_>) =
            lines
                .iter()
                .zip(results)
                .partition_map(|(line, res)| match res {
                    Ok(fit) => Either::Left(fit),
                    Err(e) => Either::Right(FitFailure {
                        id: line.id.clone(),
                        error: e.to_string(),
                    }),
                });
        FitReport { fits, failures }
    }
}

pub fn parse_flight_lines<R: Read>(reader: R) -> Result<Vec<FlightLine>, GlineError> {
    Ok(serde_json::from_reader(reader)?)
}

pub fn read_flight_lines<P: AsRef<Path>>(path: P) -> Result<Vec<FlightLine>, GlineError> {
    let file = File::open(path)?;
    parse_flight_lines(BufReader::new(file))
}

pub fn write_report<W: Write>(report: &FitReport, writer: W) -> Result<(), GlineError> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

pub fn write_report_file<P: AsRef<Path>>(report: &FitReport, path: P) -> Result<(), GlineError> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_report(report, &mut writer)?;
    writer.flush()?;
    Ok(())
}
