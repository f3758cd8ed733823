// Column layout shared by the tabular readers (CSV and Excel).

use log::{debug, warn};
use snafu::OptionExt;
use std::path::Path;

use crate::stats::*;

pub const COL_SURVEY_ID: &str = "encuestaId";
pub const COL_CATEGORY: &str = "categoria";
pub const COL_QUESTION: &str = "pregunta";
pub const COL_ANSWER: &str = "respuesta";
pub const COL_ANSWER_TYPE: &str = "tipoRespuesta";
pub const COL_ZONE: &str = "zona";
pub const COL_NEIGHBORHOOD: &str = "barrio";
pub const COL_CAMPAIGN: &str = "campania";
pub const COL_SEX: &str = "sexo";

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Where each known column sits in a row. Only the question and the answer are mandatory.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnIndex {
    pub survey_id: Option<usize>,
    pub category: Option<usize>,
    pub question: usize,
    pub answer: usize,
    pub answer_type: Option<usize>,
    pub zone: Option<usize>,
    pub neighborhood: Option<usize>,
    pub campaign: Option<usize>,
    pub sex: Option<usize>,
}

impl ColumnIndex {
    /// Header names are matched without regard to case or surrounding spaces.
    pub fn from_header<S: AsRef<str>>(header: &[S], path: &str) -> BReportResult<ColumnIndex> {
        let find = |name: &str| {
            header
                .iter()
                .position(|h| h.as_ref().trim().eq_ignore_ascii_case(name))
        };
        let question = find(COL_QUESTION).context(MissingColumnSnafu {
            column: COL_QUESTION,
            path,
        })?;
        let answer = find(COL_ANSWER).context(MissingColumnSnafu {
            column: COL_ANSWER,
            path,
        })?;
        let res = ColumnIndex {
            survey_id: find(COL_SURVEY_ID),
            category: find(COL_CATEGORY),
            question,
            answer,
            answer_type: find(COL_ANSWER_TYPE),
            zone: find(COL_ZONE),
            neighborhood: find(COL_NEIGHBORHOOD),
            campaign: find(COL_CAMPAIGN),
            sex: find(COL_SEX),
        };
        debug!("ColumnIndex::from_header: {:?}: {:?}", simplify_file_name(path), res);
        Ok(res)
    }

    /// Builds a record from the cells of one row.
    ///
    /// Rows without a question are dropped. An unreadable survey id leaves the record without one.
    pub fn read_row(&self, cells: &[String], lineno: usize) -> Option<ResponseRecord> {
        let cell = |idx: Option<usize>| -> Option<String> {
            idx.and_then(|i| cells.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };
        let question = match cell(Some(self.question)) {
            Some(q) => q,
            None => {
                warn!("read_row: line {:?}: no question, skipping", lineno);
                return None;
            }
        };
        let survey_id = cell(self.survey_id).and_then(|s| match s.parse::<u64>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("read_row: line {:?}: unreadable survey id {:?}", lineno, s);
                None
            }
        });
        Some(ResponseRecord {
            survey_id,
            question,
            answer: cells.get(self.answer).cloned().unwrap_or_default(),
            category: cell(self.category).unwrap_or_default(),
            answer_type: cell(self.answer_type),
            zone: cell(self.zone),
            neighborhood: cell(self.neighborhood),
            campaign: cell(self.campaign),
            sex: cell(self.sex),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_lookup() {
        let idx =
            ColumnIndex::from_header(&["Pregunta", " respuesta ", "encuestaId"], "x.csv").unwrap();
        assert_eq!(idx.question, 0);
        assert_eq!(idx.answer, 1);
        assert_eq!(idx.survey_id, Some(2));
        assert_eq!(idx.zone, None);
        assert!(ColumnIndex::from_header(&["pregunta"], "x.csv").is_err());
    }

    #[test]
    fn rows_to_records() {
        let idx =
            ColumnIndex::from_header(&["encuestaId", "pregunta", "respuesta"], "x.csv").unwrap();
        let r = idx.read_row(&row(&["7", "¿Tiene cobertura?", " Sí "]), 2).unwrap();
        assert_eq!(r.survey_id, Some(7));
        // Answers are kept as written: trimming is part of the tally.
        assert_eq!(r.answer, " Sí ");
        assert_eq!(idx.read_row(&row(&["abc", "q", "a"]), 3).unwrap().survey_id, None);
        assert!(idx.read_row(&row(&["8", " ", "a"]), 4).is_none());
        assert_eq!(idx.read_row(&row(&["9", "q"]), 5).unwrap().answer, "");
    }
}
