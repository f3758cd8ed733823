// Primitives for reading CSV files.

use log::{debug, info};
use snafu::ResultExt;

use crate::stats::{io_common::ColumnIndex, *};

/// Reads a CSV export with a header row, one answer per line.
pub fn read_csv_records(path: String) -> BReportResult<Vec<ResponseRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(&path)
        .context(CsvOpenSnafu { path: path.clone() })?;
    let mut records = rdr.records();
    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1_usize })?
            .iter()
            .map(|s| s.to_string())
            .collect(),
        None => Vec::new(),
    };
    let columns = ColumnIndex::from_header(&header, &path)?;

    let mut res: Vec<ResponseRecord> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let cells: Vec<String> = line.iter().map(|s| s.to_string()).collect();
        debug!("read_csv_records: lineno: {:?} row: {:?}", lineno, &cells);
        if let Some(r) = columns.read_row(&cells, lineno) {
            res.push(r);
        }
    }
    info!("read_csv_records: {:?} records from {:?}", res.len(), path);
    Ok(res)
}
