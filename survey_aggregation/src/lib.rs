mod config;
use log::{debug, info};

use std::{
    collections::{HashMap, HashSet},
    ops::{Add, AddAssign},
};

pub mod builder;
pub mod facets;
pub mod geo;
pub mod invalid;
pub mod manual;
pub mod map;
pub mod request;
pub mod store;
pub mod table;

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
struct RecordCount(u64);

impl RecordCount {
    const EMPTY: RecordCount = RecordCount(0);
}

impl std::iter::Sum for RecordCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        RecordCount(iter.map(|vc| vc.0).sum())
    }
}

impl AddAssign for RecordCount {
    fn add_assign(&mut self, rhs: RecordCount) {
        self.0 += rhs.0;
    }
}

impl Add for RecordCount {
    type Output = RecordCount;
    fn add(self: RecordCount, rhs: RecordCount) -> RecordCount {
        RecordCount(self.0 + rhs.0)
    }
}

// All the records that gave the same answer.
#[derive(Eq, PartialEq, Debug, Clone)]
struct AnswerGroup {
    label: String,
    count: RecordCount,
    // First-seen order, without duplicates.
    categories: Vec<String>,
    questions: HashSet<String>,
}

impl AnswerGroup {
    fn new(label: String) -> AnswerGroup {
        AnswerGroup {
            label,
            count: RecordCount::EMPTY,
            categories: Vec::new(),
            questions: HashSet::new(),
        }
    }

    fn add(&mut self, record: &ResponseRecord) {
        self.count += RecordCount(1);
        let category = record.category.trim();
        if !category.is_empty() && !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }
        self.questions.insert(record.question.trim().to_string());
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct InvalidStats {
    total: RecordCount,
    invalid: RecordCount,
}

/// Decides which aggregation strategy a filter set calls for.
///
/// An empty set is not an error: it is the same as "no filtering".
pub fn classify(filters: &FilterSet) -> FilterMode {
    if filters.is_empty() || filters.iter().all(|c| c.is_all_wildcard()) {
        FilterMode::Wildcard
    } else if filters.iter().all(|c| c.is_specific()) {
        FilterMode::Specific
    } else {
        FilterMode::Mixed
    }
}

/// Rounds half away from zero to the given number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// `part / total` in percent, or 0 when there is nothing to divide by.
pub fn percentage(part: u64, total: u64, decimals: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(part as f64 / total as f64 * 100.0, decimals)
    }
}

/// The label an answer is grouped under: trimmed, with blanks mapped to the empty label.
pub fn answer_label(answer: &str, rules: &AggregationRules) -> String {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        rules.empty_label.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Runs the aggregation selected by the filters over the loaded records.
///
/// Arguments:
/// * `records` the records currently loaded. They are read, never modified.
/// * `filters` the clauses chosen by the user. An empty set tallies everything.
/// * `rules` rounding and invalid-answer settings.
pub fn run_aggregation(
    records: &[ResponseRecord],
    filters: &FilterSet,
    rules: &AggregationRules,
) -> AggregationResult {
    let mode = classify(filters);
    info!(
        "run_aggregation: {:?} records, {:?} clauses, mode {:?}",
        records.len(),
        filters.len(),
        mode
    );
    match mode {
        FilterMode::Specific => aggregate_specific(records, filters, rules),
        FilterMode::Wildcard => {
            let all: Vec<&ResponseRecord> = records.iter().collect();
            aggregate_answers(&all, FilterMode::Wildcard, rules)
        }
        FilterMode::Mixed => {
            // Fully specific clauses do not narrow the breakdown: only the clauses with a
            // wildcard select records. Kept as the dashboard has always displayed it.
            let selecting: Vec<&FilterClause> =
                filters.iter().filter(|c| c.has_wildcard()).collect();
            let subset: Vec<&ResponseRecord> = records
                .iter()
                .filter(|r| selecting.iter().any(|c| c.matches(r)))
                .collect();
            debug!(
                "run_aggregation: mixed mode selected {:?} of {:?} records with {:?} clauses",
                subset.len(),
                records.len(),
                selecting.len()
            );
            aggregate_answers(&subset, FilterMode::Mixed, rules)
        }
    }
}

fn aggregate_specific(
    records: &[ResponseRecord],
    filters: &FilterSet,
    rules: &AggregationRules,
) -> AggregationResult {
    let matching: Vec<&ResponseRecord> = records
        .iter()
        .filter(|r| filters.iter().any(|c| c.matches(r)))
        .collect();
    let matched_ids: HashSet<u64> = matching.iter().filter_map(|r| r.survey_id).collect();
    let all_ids: HashSet<u64> = records.iter().filter_map(|r| r.survey_id).collect();
    let skipped = matching.iter().filter(|r| r.survey_id.is_none()).count();
    if skipped > 0 {
        debug!(
            "aggregate_specific: {:?} matching records have no survey id and are not counted",
            skipped
        );
    }
    let total_matched = matched_ids.len() as u64;

    let mut categories: Vec<String> = Vec::new();
    let mut questions: HashSet<&str> = HashSet::new();
    let mut parts: Vec<String> = Vec::new();
    for c in filters.iter() {
        let category = c.category.as_str();
        if !categories.iter().any(|x| x == category) {
            categories.push(category.to_string());
        }
        questions.insert(c.question.as_str());
        parts.push(format!("{}: {}", c.question.as_str(), c.answer.as_str()));
    }

    let row = AggregatedRow {
        answer_label: parts.join("; "),
        count: total_matched,
        percentage: percentage(total_matched, all_ids.len() as u64, rules.decimals),
        categories,
        distinct_questions: questions.len(),
        rank: 1,
    };

    let stats = invalid_stats(&matching, rules);
    info!(
        "aggregate_specific: {:?} distinct respondents out of {:?}",
        total_matched,
        all_ids.len()
    );
    AggregationResult {
        mode: FilterMode::Specific,
        rows: vec![row],
        total_matched,
        total_records: stats.total.0,
        invalid_count: stats.invalid.0,
        valid_response_rate: valid_rate(stats, rules),
    }
}

fn aggregate_answers(
    records: &[&ResponseRecord],
    mode: FilterMode,
    rules: &AggregationRules,
) -> AggregationResult {
    let groups = group_by_answer(records, rules);
    let total: RecordCount = groups.iter().map(|g| g.count).sum();
    debug!(
        "aggregate_answers: {:?} groups over {:?} records",
        groups.len(),
        total
    );

    let rows: Vec<AggregatedRow> = rank_groups(groups)
        .into_iter()
        .enumerate()
        .map(|(idx, g)| AggregatedRow {
            percentage: percentage(g.count.0, total.0, rules.decimals),
            answer_label: g.label,
            count: g.count.0,
            categories: g.categories,
            distinct_questions: g.questions.len(),
            rank: idx as u32 + 1,
        })
        .collect();

    let stats = invalid_stats(records, rules);
    AggregationResult {
        mode,
        rows,
        total_matched: total.0,
        total_records: stats.total.0,
        invalid_count: stats.invalid.0,
        valid_response_rate: valid_rate(stats, rules),
    }
}

// Groups are returned in first-seen order.
fn group_by_answer(records: &[&ResponseRecord], rules: &AggregationRules) -> Vec<AnswerGroup> {
    let mut groups: Vec<AnswerGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for r in records.iter() {
        let label = answer_label(&r.answer, rules);
        let idx = match index.get(&label) {
            Some(idx) => *idx,
            None => {
                index.insert(label.clone(), groups.len());
                groups.push(AnswerGroup::new(label));
                groups.len() - 1
            }
        };
        groups[idx].add(r);
    }
    groups
}

/// Descending count. The sort is stable, so ties keep their first-seen order.
fn rank_groups(mut groups: Vec<AnswerGroup>) -> Vec<AnswerGroup> {
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups
}

fn invalid_stats(records: &[&ResponseRecord], rules: &AggregationRules) -> InvalidStats {
    let mut stats = InvalidStats {
        total: RecordCount::EMPTY,
        invalid: RecordCount::EMPTY,
    };
    for r in records.iter() {
        stats.total += RecordCount(1);
        if invalid::is_invalid_answer(&r.answer, rules) {
            debug!(
                "invalid_stats: survey {:?}: invalid answer {:?} to {:?}",
                r.survey_id, r.answer, r.question
            );
            stats.invalid += RecordCount(1);
        }
    }
    stats
}

fn valid_rate(stats: InvalidStats, rules: &AggregationRules) -> f64 {
    percentage(stats.total.0 - stats.invalid.0, stats.total.0, rules.decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(id: u64, answer: &str) -> ResponseRecord {
        ResponseRecord::new(id, "SALUD", "¿Tiene cobertura de salud?", answer)
    }

    fn yes_no_records() -> Vec<ResponseRecord> {
        let mut v = Vec::new();
        for i in 0..7 {
            v.push(coverage(i, "Sí"));
        }
        for i in 7..10 {
            v.push(coverage(i, "No"));
        }
        v.push(coverage(10, ""));
        v
    }

    #[test]
    fn classify_modes() {
        assert_eq!(classify(&FilterSet::default()), FilterMode::Wildcard);
        let all = FilterSet::new(vec![
            FilterClause::new("ALL", "ALL", "ALL"),
            FilterClause::new("ALL", "ALL", "ALL"),
        ]);
        assert_eq!(classify(&all), FilterMode::Wildcard);
        let specific = FilterSet::new(vec![
            FilterClause::new("SALUD", "q1", "Sí"),
            FilterClause::new("VIVIENDA", "q2", "No"),
        ]);
        assert_eq!(classify(&specific), FilterMode::Specific);
        let one_wildcard = FilterSet::new(vec![FilterClause::new("SALUD", "ALL", "Sí")]);
        assert_eq!(classify(&one_wildcard), FilterMode::Mixed);
        let specific_and_all = FilterSet::new(vec![
            FilterClause::new("SALUD", "q1", "Sí"),
            FilterClause::new("ALL", "ALL", "ALL"),
        ]);
        assert_eq!(classify(&specific_and_all), FilterMode::Mixed);
    }

    #[test]
    fn wildcard_tally() {
        let records = yes_no_records();
        let res = run_aggregation(
            &records,
            &FilterSet::default(),
            &AggregationRules::DEFAULT_RULES,
        );
        assert_eq!(res.mode, FilterMode::Wildcard);
        let summary: Vec<(&str, u64, f64, u32)> = res
            .rows
            .iter()
            .map(|r| (r.answer_label.as_str(), r.count, r.percentage, r.rank))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Sí", 7, 63.64, 1),
                ("No", 3, 27.27, 2),
                ("-", 1, 9.09, 3)
            ]
        );
        assert_eq!(res.total_matched, 11);
        assert_eq!(res.invalid_count, 1);
        assert_eq!(res.valid_response_rate, 90.91);
        assert_eq!(res.rows[0].categories, vec!["SALUD".to_string()]);
        assert_eq!(res.rows[0].distinct_questions, 1);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let records = vec![
            coverage(1, "B"),
            coverage(2, "A"),
            coverage(3, "A"),
            coverage(4, "B"),
        ];
        let res = run_aggregation(
            &records,
            &FilterSet::default(),
            &AggregationRules::DEFAULT_RULES,
        );
        let labels: Vec<&str> = res.rows.iter().map(|r| r.answer_label.as_str()).collect();
        assert_eq!(labels, vec!["B", "A"]);
    }

    #[test]
    fn answers_are_trimmed() {
        let records = vec![coverage(1, " Sí "), coverage(2, "Sí"), coverage(3, "   ")];
        let res = run_aggregation(
            &records,
            &FilterSet::default(),
            &AggregationRules::DEFAULT_RULES,
        );
        assert_eq!(res.rows[0].answer_label, "Sí");
        assert_eq!(res.rows[0].count, 2);
        assert_eq!(res.rows[1].answer_label, "-");
    }

    #[test]
    fn specific_counts_distinct_respondents() {
        let mut records = yes_no_records();
        // Same respondent twice, and a respondent matching both clauses.
        records.push(coverage(0, "Sí"));
        records.push(ResponseRecord::new(0, "VIVIENDA", "¿Tiene agua potable?", "No"));
        records.push(ResponseRecord::new(20, "VIVIENDA", "¿Tiene agua potable?", "No"));
        let filters = FilterSet::new(vec![
            FilterClause::new("SALUD", "¿Tiene cobertura de salud?", "Sí"),
            FilterClause::new("VIVIENDA", "¿Tiene agua potable?", "No"),
        ]);
        let res = run_aggregation(&records, &filters, &AggregationRules::DEFAULT_RULES);
        assert_eq!(res.mode, FilterMode::Specific);
        assert_eq!(res.total_matched, 8);
        assert_eq!(res.rows.len(), 1);
        let row = &res.rows[0];
        assert_eq!(row.count, 8);
        assert_eq!(row.rank, 1);
        assert_eq!(row.distinct_questions, 2);
        assert_eq!(row.categories, vec!["SALUD".to_string(), "VIVIENDA".to_string()]);
        // 8 of the 12 distinct respondents.
        assert_eq!(row.percentage, 66.67);
    }

    #[test]
    fn specific_without_matches() {
        let records = yes_no_records();
        let filters = FilterSet::new(vec![FilterClause::new("SALUD", "otra", "Sí")]);
        let res = run_aggregation(&records, &filters, &AggregationRules::DEFAULT_RULES);
        assert_eq!(res.total_matched, 0);
        assert_eq!(res.rows[0].count, 0);
        assert_eq!(res.rows[0].percentage, 0.0);
        assert_eq!(res.valid_response_rate, 0.0);
    }

    #[test]
    fn mixed_ignores_specific_clauses() {
        let mut records = yes_no_records();
        records.push(ResponseRecord::new(30, "VIVIENDA", "¿Tiene agua potable?", "Sí"));
        records.push(ResponseRecord::new(31, "VIVIENDA", "¿Tiene agua potable?", "No"));
        let filters = FilterSet::new(vec![
            FilterClause::new("VIVIENDA", "ALL", "ALL"),
            FilterClause::new("SALUD", "¿Tiene cobertura de salud?", "Sí"),
        ]);
        let res = run_aggregation(&records, &filters, &AggregationRules::DEFAULT_RULES);
        assert_eq!(res.mode, FilterMode::Mixed);
        assert_eq!(res.total_matched, 2);
        let labels: Vec<&str> = res.rows.iter().map(|r| r.answer_label.as_str()).collect();
        assert_eq!(labels, vec!["Sí", "No"]);
        assert_eq!(res.rows[0].percentage, 50.0);
    }

    #[test]
    fn empty_input() {
        let res = run_aggregation(&[], &FilterSet::default(), &AggregationRules::DEFAULT_RULES);
        assert!(res.rows.is_empty());
        assert_eq!(res.total_matched, 0);
        assert_eq!(res.valid_response_rate, 0.0);
    }

    // Three answers tied at 3 each, and two answers to another question.
    fn three_way_records() -> Vec<ResponseRecord> {
        let mut v = Vec::new();
        for id in 0..9 {
            v.push(coverage(id, ["A", "B", "C"][id as usize % 3]));
        }
        v.push(ResponseRecord::new(0, "VIVIENDA", "¿Tiene agua potable?", "Sí"));
        v.push(ResponseRecord::new(1, "VIVIENDA", "¿Tiene agua potable?", "Sí"));
        v
    }

    #[test]
    fn repeated_runs_are_identical() {
        let records = three_way_records();
        let filter_sets = vec![
            FilterSet::default(),
            FilterSet::new(vec![
                FilterClause::new("SALUD", "ALL", "ALL"),
                FilterClause::new("VIVIENDA", "¿Tiene agua potable?", "Sí"),
            ]),
            FilterSet::new(vec![
                FilterClause::new("SALUD", "¿Tiene cobertura de salud?", "B"),
                FilterClause::new("VIVIENDA", "¿Tiene agua potable?", "Sí"),
            ]),
        ];
        let modes: Vec<FilterMode> = filter_sets.iter().map(classify).collect();
        assert_eq!(
            modes,
            vec![FilterMode::Wildcard, FilterMode::Mixed, FilterMode::Specific]
        );
        for filters in filter_sets.iter() {
            let first = run_aggregation(&records, filters, &AggregationRules::DEFAULT_RULES);
            let second = run_aggregation(&records, filters, &AggregationRules::DEFAULT_RULES);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn counts_add_up() {
        let records = three_way_records();
        let filter_sets = vec![
            FilterSet::default(),
            FilterSet::new(vec![FilterClause::new("SALUD", "ALL", "ALL")]),
        ];
        for filters in filter_sets.iter() {
            let res = run_aggregation(&records, filters, &AggregationRules::DEFAULT_RULES);
            let counts: u64 = res.rows.iter().map(|r| r.count).sum();
            assert_eq!(counts, res.total_records);
            assert_eq!(counts, res.total_matched);
            let percentages: f64 = res.rows.iter().map(|r| r.percentage).sum();
            assert!(
                (percentages - 100.0).abs() <= 0.05,
                "{:?} sums to {}",
                classify(filters),
                percentages
            );
            // The shares do not divide evenly.
            assert_ne!(percentages, 100.0);
        }
        let wildcard = run_aggregation(
            &records,
            &FilterSet::default(),
            &AggregationRules::DEFAULT_RULES,
        );
        let labels: Vec<&str> = wildcard.rows.iter().map(|r| r.answer_label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C", "Sí"]);
        assert_eq!(wildcard.rows[0].percentage, 27.27);
        assert_eq!(wildcard.rows[3].percentage, 18.18);
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(63.636363, 2), 63.64);
        assert_eq!(percentage(1, 3, 2), 33.33);
        assert_eq!(percentage(5, 0, 2), 0.0);
    }
}
