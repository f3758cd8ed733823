// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The sentinel used on the wire and in the UI for "do not constrain this dimension".
pub const WILDCARD: &str = "ALL";

/// One answer given by one respondent, as returned by the filter endpoint.
///
/// Records are never mutated once loaded: a new query replaces the whole list.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ResponseRecord {
    /// The survey (respondent) this answer belongs to. Older exports do not carry it.
    pub survey_id: Option<u64>,
    pub question: String,
    pub answer: String,
    pub category: String,
    /// The declared answer type of the question (free text, numeric, coordinate...).
    pub answer_type: Option<String>,
    pub zone: Option<String>,
    pub neighborhood: Option<String>,
    pub campaign: Option<String>,
    pub sex: Option<String>,
}

impl ResponseRecord {
    pub fn new(survey_id: u64, category: &str, question: &str, answer: &str) -> ResponseRecord {
        ResponseRecord {
            survey_id: Some(survey_id),
            question: question.to_string(),
            answer: answer.to_string(),
            category: category.to_string(),
            ..ResponseRecord::default()
        }
    }

    pub fn with_zone(mut self, zone: &str) -> ResponseRecord {
        self.zone = Some(zone.to_string());
        self
    }

    pub fn with_neighborhood(mut self, neighborhood: &str) -> ResponseRecord {
        self.neighborhood = Some(neighborhood.to_string());
        self
    }

    pub fn with_campaign(mut self, campaign: &str) -> ResponseRecord {
        self.campaign = Some(campaign.to_string());
        self
    }

    pub fn with_sex(mut self, sex: &str) -> ResponseRecord {
        self.sex = Some(sex.to_string());
        self
    }
}

/// One dimension of a filter clause.
///
/// The wildcard is an explicit value: a missing field is never read as "no constraint".
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum FilterField {
    All,
    Exact(String),
}

impl FilterField {
    /// Reads a field as sent by the UI. Only the exact sentinel `ALL` is a wildcard.
    pub fn parse(s: &str) -> FilterField {
        if s.trim() == WILDCARD {
            FilterField::All
        } else {
            FilterField::Exact(s.trim().to_string())
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, FilterField::All)
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            FilterField::All => true,
            FilterField::Exact(s) => s == value.trim(),
        }
    }

    /// The wire form of this field.
    pub fn as_str(&self) -> &str {
        match self {
            FilterField::All => WILDCARD,
            FilterField::Exact(s) => s.as_str(),
        }
    }
}

/// A (category, question, answer) constraint.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct FilterClause {
    pub category: FilterField,
    pub question: FilterField,
    pub answer: FilterField,
}

impl FilterClause {
    pub fn new(category: &str, question: &str, answer: &str) -> FilterClause {
        FilterClause {
            category: FilterField::parse(category),
            question: FilterField::parse(question),
            answer: FilterField::parse(answer),
        }
    }

    /// No field is a wildcard.
    pub fn is_specific(&self) -> bool {
        !self.has_wildcard()
    }

    /// At least one field is a wildcard.
    pub fn has_wildcard(&self) -> bool {
        self.category.is_all() || self.question.is_all() || self.answer.is_all()
    }

    /// All three fields are wildcards.
    pub fn is_all_wildcard(&self) -> bool {
        self.category.is_all() && self.question.is_all() && self.answer.is_all()
    }

    pub fn matches(&self, record: &ResponseRecord) -> bool {
        self.category.matches(&record.category)
            && self.question.matches(&record.question)
            && self.answer.matches(&record.answer)
    }
}

/// An ordered list of clauses. An empty set does not filter anything.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct FilterSet {
    clauses: Vec<FilterClause>,
}

impl FilterSet {
    pub fn new(clauses: Vec<FilterClause>) -> FilterSet {
        FilterSet { clauses }
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FilterClause> {
        self.clauses.iter()
    }
}

impl FromIterator<FilterClause> for FilterSet {
    fn from_iter<I: IntoIterator<Item = FilterClause>>(iter: I) -> Self {
        FilterSet {
            clauses: iter.into_iter().collect(),
        }
    }
}

/// The aggregation strategy selected by a filter set.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum FilterMode {
    /// Every clause is fully specified: count distinct respondents.
    Specific,
    /// Empty set, or every clause is all wildcards: tally every loaded record.
    Wildcard,
    /// Anything else: tally the records selected by the wildcard clauses.
    Mixed,
}

impl FilterMode {
    pub fn label(&self) -> &'static str {
        match self {
            FilterMode::Specific => "SPECIFIC",
            FilterMode::Wildcard => "WILDCARD",
            FilterMode::Mixed => "MIXED",
        }
    }
}

// ******** Output data structures *********

/// One answer value in a tally.
#[derive(PartialEq, Debug, Clone)]
pub struct AggregatedRow {
    pub answer_label: String,
    pub count: u64,
    /// Share of the tallied records, in percent, rounded to the rule's decimals.
    pub percentage: f64,
    /// The distinct categories touched by this answer, in first-seen order.
    pub categories: Vec<String>,
    pub distinct_questions: usize,
    /// 1-based position in descending count order.
    pub rank: u32,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AggregationResult {
    pub mode: FilterMode,
    pub rows: Vec<AggregatedRow>,
    /// Distinct respondents in SPECIFIC mode, tallied records otherwise.
    pub total_matched: u64,
    /// The number of records the invalid-answer statistics are computed over.
    pub total_records: u64,
    pub invalid_count: u64,
    pub valid_response_rate: f64,
}

/// A validated coordinate. Construction enforces the latitude and longitude ranges.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct GeoPoint {
    survey_id: u64,
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Returns `None` when the coordinate is not finite or out of range.
    pub fn new(survey_id: u64, latitude: f64, longitude: f64) -> Option<GeoPoint> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return None;
        }
        Some(GeoPoint {
            survey_id,
            latitude,
            longitude,
        })
    }

    pub fn survey_id(&self) -> u64 {
        self.survey_id
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Failures at the data boundary.
///
/// Malformed records are not errors: they are dropped where they are read.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum FetchError {
    /// The request failed or timed out. The previously loaded data stays in place.
    Network(String),
    /// The backend answered with something that is not a list of records.
    InvalidPayload(String),
}

impl Error for FetchError {}

impl Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {}", msg),
            FetchError::InvalidPayload(msg) => write!(f, "invalid payload: {}", msg),
        }
    }
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AggregationRules {
    /// Label used for answers that are empty after trimming.
    pub empty_label: &'static str,
    /// Decimal places kept in percentages and rates.
    pub decimals: u32,
    /// Maximum edit distance for an answer to count as a misspelled non-response.
    /// Only applied to dictionary entries of at least `typo_min_length` characters.
    pub typo_distance: usize,
    pub typo_min_length: usize,
}

impl AggregationRules {
    pub const DEFAULT_RULES: AggregationRules = AggregationRules {
        empty_label: "-",
        decimals: 2,
        typo_distance: 1,
        typo_min_length: 6,
    };
}

impl Default for AggregationRules {
    fn default() -> Self {
        AggregationRules::DEFAULT_RULES
    }
}
