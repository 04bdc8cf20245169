//! Flat `id,balance` datasets in CSV form.
//!
//! A dataset seeds the `bankaccount` table before a scenario and describes
//! the expected table contents afterwards.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use domain::{AccountRow, CoreError};

fn map_csverr(e: csv::Error) -> CoreError {
    CoreError::Repository(format!("fixture error: {e}"))
}

/// Parse rows from CSV with an `id,balance` header, in file order.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<AccountRow>, CoreError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    rdr.deserialize::<AccountRow>()
        .map(|r| r.map_err(map_csverr))
        .collect()
}

pub fn read_rows_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<AccountRow>, CoreError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        CoreError::Repository(format!("cannot open fixture {}: {e}", path.display()))
    })?;
    read_rows(file)
}

/// Write rows as CSV with an `id,balance` header.
pub fn write_rows<W: Write>(writer: W, rows: &[AccountRow]) -> Result<(), CoreError> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row).map_err(map_csverr)?;
    }
    wtr.flush()
        .map_err(|e| CoreError::Repository(format!("fixture error: {e}")))
}
