// Reading a JSON dump of the filter endpoint's response.

use log::info;
use snafu::ResultExt;
use std::fs;

use crate::stats::{wire::*, *};

pub fn read_json_records(path: String) -> BReportResult<Vec<ResponseRecord>> {
    let contents = fs::read_to_string(&path).context(OpeningJsonSnafu { path: path.clone() })?;
    let dtos: Vec<RecordDto> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    let res = records_from_dtos(dtos);
    info!("read_json_records: {:?} records from {:?}", res.len(), path);
    Ok(res)
}
