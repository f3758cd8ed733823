pub use crate::config::*;

use std::error::Error;
use std::fmt::Display;

/// A builder for filter sets coming from the UI.
///
/// Every field must be filled: use `ALL` to leave a dimension unconstrained.
///
/// ```
/// use survey_aggregation::builder::Builder;
/// use survey_aggregation::{classify, FilterMode};
/// # use survey_aggregation::builder::BuilderError;
///
/// let filters = Builder::new()
///     .clause("SALUD", "¿Tiene cobertura de salud?", "Sí")?
///     .clause("VIVIENDA", "ALL", "ALL")?
///     .build();
///
/// assert_eq!(classify(&filters), FilterMode::Mixed);
///
/// # Ok::<(), BuilderError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Builder {
    _clauses: Vec<FilterClause>,
}

/// A clause field was left blank.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum BuilderError {
    EmptyField { index: usize, field: &'static str },
}

impl Error for BuilderError {}

impl Display for BuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuilderError::EmptyField { index, field } => write!(
                f,
                "filter clause {}: the {} is empty (use {} for any value)",
                index, field, WILDCARD
            ),
        }
    }
}

impl Builder {
    pub fn new() -> Builder {
        Builder {
            _clauses: Vec::new(),
        }
    }

    /// Adds a clause. The fields are checked in (category, question, answer) order.
    pub fn clause(
        mut self,
        category: &str,
        question: &str,
        answer: &str,
    ) -> Result<Builder, BuilderError> {
        let index = self._clauses.len();
        for (field, value) in [
            ("category", category),
            ("question", question),
            ("answer", answer),
        ] {
            if value.trim().is_empty() {
                return Err(BuilderError::EmptyField { index, field });
            }
        }
        self._clauses.push(FilterClause::new(category, question, answer));
        Ok(self)
    }

    /// Adds a clause that constrains only the answer.
    pub fn any_question_with_answer(self, answer: &str) -> Result<Builder, BuilderError> {
        self.clause(WILDCARD, WILDCARD, answer)
    }

    pub fn build(self) -> FilterSet {
        FilterSet::new(self._clauses)
    }
}
