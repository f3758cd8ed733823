//! Filter options and chart data derived from the loaded records.

use std::collections::HashMap;

use crate::config::*;
use crate::request::is_age_question;

/// The distinct values offered in the dashboard's filter drop-downs.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Facets {
    pub zones: Vec<String>,
    pub neighborhoods: Vec<String>,
    pub campaigns: Vec<String>,
    pub sexes: Vec<String>,
    pub categories: Vec<String>,
    pub questions: Vec<String>,
    /// Numeric answers to age questions, first-seen order.
    pub ages: Vec<f64>,
}

fn distinct<'a, I>(values: I) -> Vec<String>
where
    I: Iterator<Item = Option<&'a str>>,
{
    let mut res: Vec<String> = Vec::new();
    for v in values.flatten() {
        let v = v.trim();
        if !v.is_empty() && !res.iter().any(|x| x == v) {
            res.push(v.to_string());
        }
    }
    res
}

pub fn compute_facets(records: &[ResponseRecord]) -> Facets {
    let mut ages: Vec<f64> = Vec::new();
    for r in records.iter().filter(|r| is_age_question(&r.question)) {
        if let Ok(age) = r.answer.trim().parse::<f64>() {
            if age.is_finite() && !ages.iter().any(|a| a.to_bits() == age.to_bits()) {
                ages.push(age);
            }
        }
    }
    Facets {
        zones: distinct(records.iter().map(|r| r.zone.as_deref())),
        neighborhoods: distinct(records.iter().map(|r| r.neighborhood.as_deref())),
        campaigns: distinct(records.iter().map(|r| r.campaign.as_deref())),
        sexes: distinct(records.iter().map(|r| r.sex.as_deref())),
        categories: distinct(records.iter().map(|r| Some(r.category.as_str()))),
        questions: distinct(records.iter().map(|r| Some(r.question.as_str()))),
        ages,
    }
}

/// The questions asked under a category (case-insensitive), first-seen order.
pub fn questions_for_category(records: &[ResponseRecord], category: &str) -> Vec<String> {
    let category = category.trim().to_lowercase();
    distinct(
        records
            .iter()
            .filter(|r| r.category.trim().to_lowercase() == category)
            .map(|r| Some(r.question.as_str())),
    )
}

/// Bar chart data: answer labels with their counts.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ChartBuckets {
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
}

/// Counts answers by their raw value. Only the selected question is counted when one is
/// given. Labels keep their first-seen order.
pub fn chart_buckets(records: &[ResponseRecord], question: Option<&str>) -> ChartBuckets {
    let mut buckets = ChartBuckets::default();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for r in records
        .iter()
        .filter(|r| question.map_or(true, |q| r.question == q))
    {
        let label = if r.answer.is_empty() {
            "-"
        } else {
            r.answer.as_str()
        };
        match index.get(label) {
            Some(idx) => buckets.counts[*idx] += 1,
            None => {
                index.insert(label, buckets.labels.len());
                buckets.labels.push(label.to_string());
                buckets.counts.push(1);
            }
        }
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<ResponseRecord> {
        vec![
            ResponseRecord::new(1, "SALUD", "¿Tiene cobertura?", "Sí")
                .with_zone("Zona 1")
                .with_sex("F"),
            ResponseRecord::new(1, "DATOS", "¿Qué edad tenés?", "34").with_zone("Zona 1"),
            ResponseRecord::new(2, "SALUD", "¿Tiene cobertura?", "")
                .with_zone("Zona 2")
                .with_campaign("Invierno"),
            ResponseRecord::new(2, "DATOS", "¿Qué edad tenés?", "34"),
            ResponseRecord::new(3, "DATOS", "¿Qué edad tenés?", "sin dato"),
            ResponseRecord::new(3, "SALUD", "¿Tiene cobertura?", "Sí")
                .with_neighborhood("Centro"),
        ]
    }

    #[test]
    fn distinct_values() {
        let f = compute_facets(&records());
        assert_eq!(f.zones, vec!["Zona 1", "Zona 2"]);
        assert_eq!(f.neighborhoods, vec!["Centro"]);
        assert_eq!(f.campaigns, vec!["Invierno"]);
        assert_eq!(f.sexes, vec!["F"]);
        assert_eq!(f.categories, vec!["SALUD", "DATOS"]);
        assert_eq!(f.ages, vec![34.0]);
    }

    #[test]
    fn questions_by_category() {
        assert_eq!(
            questions_for_category(&records(), "salud"),
            vec!["¿Tiene cobertura?"]
        );
        assert!(questions_for_category(&records(), "VIVIENDA").is_empty());
    }

    #[test]
    fn chart_for_one_question() {
        let c = chart_buckets(&records(), Some("¿Tiene cobertura?"));
        assert_eq!(c.labels, vec!["Sí", "-"]);
        assert_eq!(c.counts, vec![2, 1]);
        let all = chart_buckets(&records(), None);
        assert_eq!(all.counts.iter().sum::<u64>(), 6);
    }
}
