//! The filter request sent to the backend, and its in-process equivalent for local data.

use log::{debug, info};
use std::collections::HashSet;

use crate::config::*;

/// What the user asked for when pressing "apply".
///
/// Blank strings are treated as absent, the way the dashboard drops empty keys before
/// sending them.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FilterRequest {
    pub category: Option<String>,
    pub question: Option<String>,
    pub answer_type: Option<String>,
    pub age_from: Option<i64>,
    pub age_to: Option<i64>,
    pub clauses: FilterSet,
}

fn non_blank(s: &Option<String>) -> Option<String> {
    match s {
        Some(x) if !x.trim().is_empty() => Some(x.trim().to_string()),
        _ => None,
    }
}

/// Questions asking for the respondent's age.
pub fn is_age_question(question: &str) -> bool {
    question.to_lowercase().contains("edad")
}

impl FilterRequest {
    /// The same request with blank fields removed.
    pub fn normalized(&self) -> FilterRequest {
        FilterRequest {
            category: non_blank(&self.category),
            question: non_blank(&self.question),
            answer_type: non_blank(&self.answer_type),
            age_from: self.age_from,
            age_to: self.age_to,
            clauses: self.clauses.clone(),
        }
    }

    pub fn has_age_range(&self) -> bool {
        self.age_from.is_some() || self.age_to.is_some()
    }

    fn age_in_range(&self, age: i64) -> bool {
        self.age_from.map_or(true, |from| age >= from) && self.age_to.map_or(true, |to| age <= to)
    }
}

/// Survey ids whose answer to an age question is an integer inside the requested range.
pub fn surveys_in_age_range(records: &[ResponseRecord], request: &FilterRequest) -> HashSet<u64> {
    records
        .iter()
        .filter(|r| is_age_question(&r.question))
        .filter_map(|r| match (r.survey_id, r.answer.trim().parse::<i64>()) {
            (Some(id), Ok(age)) if request.age_in_range(age) => Some(id),
            _ => None,
        })
        .collect()
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Applies the request the way the backend does, for data that is already in memory.
///
/// The multiple-clause filters are not applied here: they select the aggregation strategy
/// and are handled by [`crate::run_aggregation`].
pub fn apply_filter_request(
    records: &[ResponseRecord],
    request: &FilterRequest,
) -> Vec<ResponseRecord> {
    let request = request.normalized();
    let age_ids: Option<HashSet<u64>> = if request.has_age_range() {
        let ids = surveys_in_age_range(records, &request);
        debug!(
            "apply_filter_request: {:?} surveys in age range {:?}..{:?}",
            ids.len(),
            request.age_from,
            request.age_to
        );
        Some(ids)
    } else {
        None
    };

    let res: Vec<ResponseRecord> = records
        .iter()
        .filter(|r| !r.question.trim().is_empty())
        .filter(|r| {
            request
                .category
                .as_ref()
                .map_or(true, |c| eq_ignore_case(c, &r.category))
        })
        .filter(|r| {
            request.answer_type.as_ref().map_or(true, |t| {
                r.answer_type
                    .as_ref()
                    .map_or(false, |rt| eq_ignore_case(t, rt))
            })
        })
        .filter(|r| {
            request
                .question
                .as_ref()
                .map_or(true, |q| eq_ignore_case(q, &r.question))
        })
        .filter(|r| match (&age_ids, r.survey_id) {
            (None, _) => true,
            (Some(ids), Some(id)) => ids.contains(&id),
            (Some(_), None) => false,
        })
        .cloned()
        .collect();
    info!(
        "apply_filter_request: kept {:?} of {:?} records",
        res.len(),
        records.len()
    );
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ResponseRecord> {
        vec![
            ResponseRecord::new(1, "SALUD", "¿Tiene cobertura?", "Sí"),
            ResponseRecord::new(1, "DATOS", "¿Qué edad tenés?", "34"),
            ResponseRecord::new(2, "SALUD", "¿Tiene cobertura?", "No"),
            ResponseRecord::new(2, "DATOS", "¿Qué edad tenés?", "71"),
            ResponseRecord::new(3, "SALUD", "¿Tiene cobertura?", "No"),
            ResponseRecord::new(3, "DATOS", "¿Qué edad tenés?", "no sabe"),
        ]
    }

    #[test]
    fn blank_fields_are_absent() {
        let req = FilterRequest {
            category: Some("  ".to_string()),
            question: Some("".to_string()),
            ..FilterRequest::default()
        };
        assert_eq!(apply_filter_request(&records(), &req).len(), 6);
    }

    #[test]
    fn category_and_question_ignore_case() {
        let req = FilterRequest {
            category: Some("salud".to_string()),
            question: Some("¿tiene cobertura?".to_string()),
            ..FilterRequest::default()
        };
        let res = apply_filter_request(&records(), &req);
        assert_eq!(res.len(), 3);
        assert!(res.iter().all(|r| r.category == "SALUD"));
    }

    #[test]
    fn age_range_selects_surveys() {
        let req = FilterRequest {
            category: Some("SALUD".to_string()),
            age_from: Some(18),
            age_to: Some(65),
            ..FilterRequest::default()
        };
        let res = apply_filter_request(&records(), &req);
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].survey_id, Some(1));

        let open_ended = FilterRequest {
            age_from: Some(60),
            ..FilterRequest::default()
        };
        let ids: Vec<Option<u64>> = apply_filter_request(&records(), &open_ended)
            .iter()
            .map(|r| r.survey_id)
            .collect();
        assert_eq!(ids, vec![Some(2), Some(2)]);
    }

    #[test]
    fn answer_type_requires_a_declared_type() {
        let mut data = records();
        data[0].answer_type = Some("BOOLEANA".to_string());
        let req = FilterRequest {
            answer_type: Some("booleana".to_string()),
            ..FilterRequest::default()
        };
        let res = apply_filter_request(&data, &req);
        assert_eq!(res.len(), 1);
    }
}
