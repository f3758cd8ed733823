// Primitives for reading Excel exports.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::{debug, info};
use snafu::{OptionExt, ResultExt};

use crate::stats::{io_common::ColumnIndex, *};

/// Reads the named worksheet, or the first one, with the same columns as the CSV export.
pub fn read_xlsx_records(
    path: String,
    worksheet_name: Option<String>,
) -> BReportResult<Vec<ResponseRecord>> {
    let wrange = get_range(&path, worksheet_name)?;
    let mut rows = wrange.rows();
    let header: Vec<String> = match rows.next() {
        Some(row) => row
            .iter()
            .enumerate()
            .map(|(col, cell)| read_cell(cell, 1, col))
            .collect::<BReportResult<Vec<String>>>()?,
        None => Vec::new(),
    };
    let columns = ColumnIndex::from_header(&header, &path)?;

    let mut res: Vec<ResponseRecord> = Vec::new();
    for (idx, row) in rows.enumerate() {
        let lineno = idx + 2;
        let cells = row
            .iter()
            .enumerate()
            .map(|(col, cell)| read_cell(cell, lineno, col))
            .collect::<BReportResult<Vec<String>>>()?;
        debug!("read_xlsx_records: lineno: {:?} row: {:?}", lineno, &cells);
        if let Some(r) = columns.read_row(&cells, lineno) {
            res.push(r);
        }
    }
    info!("read_xlsx_records: {:?} records from {:?}", res.len(), path);
    Ok(res)
}

fn get_range(
    path: &String,
    worksheet_name: Option<String>,
) -> BReportResult<calamine::Range<DataType>> {
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        &path, &worksheet_name
    );
    let mut workbook: Xlsx<_> =
        open_workbook(path).context(OpeningExcelSnafu { path: path.clone() })?;

    let wrange = match worksheet_name {
        Some(name) => workbook.worksheet_range(&name),
        None => workbook.worksheet_range_at(0),
    }
    .context(EmptyExcelSnafu { path: path.clone() })?
    .context(OpeningExcelSnafu { path: path.clone() })?;
    Ok(wrange)
}

/// The text of a cell. Whole numbers are written without a decimal part so that ids read back.
fn read_cell(cell: &DataType, lineno: usize, column: usize) -> BReportResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Empty => Ok(String::new()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Bool(b) => Ok(b.to_string()),
        _ => Err(Box::new(ReportError::ExcelWrongCellType {
            lineno,
            column,
            content: format!("{:?}", cell),
        })),
    }
}
