use std::io::Read;
use std::path::Path;

use crate::error::Result;
use crate::models::RawTable;

pub fn read_csv_path(path: &Path) -> Result<RawTable> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    collect(reader)
}

pub fn read_csv<R: Read>(input: R) -> Result<RawTable> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input);
    collect(reader)
}

fn collect<R: Read>(mut reader: csv::Reader<R>) -> Result<RawTable> {
    let mut table = RawTable::new(reader.headers()?.iter());
    for record in reader.records() {
        table.push_row(record?.iter());
    }
    Ok(table)
}
