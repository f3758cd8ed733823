//! Search, sort and paging of aggregated rows for tabular display.

use std::cmp::Ordering;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::AggregatedRow;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SortColumn {
    AnswerLabel,
    Count,
    Percentage,
    Categories,
    DistinctQuestions,
    Rank,
}

impl SortColumn {
    pub fn parse(s: &str) -> Option<SortColumn> {
        match s {
            "answerLabel" => Some(SortColumn::AnswerLabel),
            "count" => Some(SortColumn::Count),
            "percentage" => Some(SortColumn::Percentage),
            "categories" => Some(SortColumn::Categories),
            "distinctQuestions" => Some(SortColumn::DistinctQuestions),
            "rank" => Some(SortColumn::Rank),
            _ => None,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// The string forms a row is searched through.
fn row_fields(row: &AggregatedRow) -> [String; 6] {
    [
        row.answer_label.clone(),
        row.count.to_string(),
        row.percentage.to_string(),
        row.categories.join(", "),
        row.distinct_questions.to_string(),
        row.rank.to_string(),
    ]
}

/// Keeps the rows where some field contains the term, ignoring case. A blank term keeps all.
pub fn search_rows<'a>(rows: &'a [AggregatedRow], term: &str) -> Vec<&'a AggregatedRow> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return rows.iter().collect();
    }
    rows.iter()
        .filter(|r| {
            row_fields(r)
                .iter()
                .any(|f| f.to_lowercase().contains(&term))
        })
        .collect()
}

/// Case- and accent-insensitive ordering, falling back to the raw strings.
pub fn collate(a: &str, b: &str) -> Ordering {
    fn fold(s: &str) -> String {
        s.nfd()
            .filter(|c| !is_combining_mark(*c))
            .collect::<String>()
            .to_lowercase()
    }
    fold(a).cmp(&fold(b)).then_with(|| a.cmp(b))
}

fn compare(a: &AggregatedRow, b: &AggregatedRow, column: SortColumn) -> Ordering {
    match column {
        SortColumn::AnswerLabel => collate(&a.answer_label, &b.answer_label),
        SortColumn::Count => a.count.cmp(&b.count),
        SortColumn::Percentage => a.percentage.total_cmp(&b.percentage),
        SortColumn::Categories => collate(&a.categories.join(", "), &b.categories.join(", ")),
        SortColumn::DistinctQuestions => a.distinct_questions.cmp(&b.distinct_questions),
        SortColumn::Rank => a.rank.cmp(&b.rank),
    }
}

/// Stable sort: rows that compare equal keep their relative order in both directions.
pub fn sort_rows(rows: &mut [&AggregatedRow], column: SortColumn, direction: SortDirection) {
    rows.sort_by(|a, b| {
        let o = compare(a, b, column);
        match direction {
            SortDirection::Ascending => o,
            SortDirection::Descending => o.reverse(),
        }
    });
}

/// Number of pages needed for `total` rows. An empty table still has one (empty) page.
pub fn total_pages(total: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    ((total + page_size - 1) / page_size).max(1)
}

/// Rows `[(page-1)*page_size, page*page_size)`, clamped to what is available. Pages are 1-based.
pub fn page_slice<T>(rows: &[T], page_size: usize, page: usize) -> &[T] {
    let page_size = page_size.max(1);
    let start = page.max(1).saturating_sub(1).saturating_mul(page_size);
    let end = start.saturating_add(page_size);
    &rows[start.min(rows.len())..end.min(rows.len())]
}

/// One rendered page of the table.
#[derive(PartialEq, Debug, Clone)]
pub struct TablePage {
    pub rows: Vec<AggregatedRow>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    /// Rows left after the search, across all pages.
    pub total_rows: usize,
}

/// The user's table settings. Changing the search, the sort or the page size goes back to
/// page 1.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TableView {
    search: String,
    sort: Option<(SortColumn, SortDirection)>,
    page_size: usize,
    page: usize,
}

impl Default for TableView {
    fn default() -> Self {
        TableView::new(DEFAULT_PAGE_SIZE)
    }
}

impl TableView {
    pub fn new(page_size: usize) -> TableView {
        TableView {
            search: String::new(),
            sort: None,
            page_size: page_size.max(1),
            page: 1,
        }
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort(&self) -> Option<(SortColumn, SortDirection)> {
        self.sort
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
        self.page = 1;
    }

    pub fn set_sort(&mut self, column: SortColumn, direction: SortDirection) {
        self.sort = Some((column, direction));
        self.page = 1;
    }

    /// Sorting on the current column flips the direction, any other column starts ascending.
    pub fn toggle_sort(&mut self, column: SortColumn) {
        let direction = match self.sort {
            Some((c, SortDirection::Ascending)) if c == column => SortDirection::Descending,
            _ => SortDirection::Ascending,
        };
        self.set_sort(column, direction);
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
        self.page = 1;
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    /// search, then sort, then slice.
    pub fn project(&self, rows: &[AggregatedRow]) -> TablePage {
        let mut visible = search_rows(rows, &self.search);
        if let Some((column, direction)) = self.sort {
            sort_rows(&mut visible, column, direction);
        }
        let total_rows = visible.len();
        TablePage {
            rows: page_slice(&visible, self.page_size, self.page)
                .iter()
                .map(|r| (*r).clone())
                .collect(),
            page: self.page,
            page_size: self.page_size,
            total_pages: total_pages(total_rows, self.page_size),
            total_rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(label: &str, count: u64, rank: u32) -> AggregatedRow {
        AggregatedRow {
            answer_label: label.to_string(),
            count,
            percentage: count as f64,
            categories: vec!["SALUD".to_string()],
            distinct_questions: 1,
            rank,
        }
    }

    fn many(n: usize) -> Vec<AggregatedRow> {
        (0..n)
            .map(|i| row(&format!("answer {}", i), (n - i) as u64, i as u32 + 1))
            .collect()
    }

    #[test]
    fn third_page_of_25() {
        let rows = many(25);
        let mut view = TableView::new(10);
        view.set_page(3);
        let page = view.project(&rows);
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.rows[0].answer_label, "answer 20");
        assert_eq!(page.rows[4].answer_label, "answer 24");
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.total_rows, 25);
    }

    #[test]
    fn pages_past_the_end_are_empty() {
        let rows = many(5);
        assert!(page_slice(&rows, 10, 2).is_empty());
        assert_eq!(page_slice(&rows, 10, 0).len(), 5);
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(20, 10), 2);
    }

    #[test]
    fn search_is_case_insensitive_over_all_fields() {
        let rows = vec![row("Sí", 7, 1), row("No", 3, 2), row("-", 1, 3)];
        let hits: Vec<&str> = search_rows(&rows, "sí")
            .iter()
            .map(|r| r.answer_label.as_str())
            .collect();
        assert_eq!(hits, vec!["Sí"]);
        assert_eq!(search_rows(&rows, "salud").len(), 3);
        assert_eq!(search_rows(&rows, "3").len(), 2);
    }

    #[test]
    fn sorts_numbers_numerically_and_text_by_collation() {
        let rows = vec![row("b", 10, 1), row("Á", 9, 2), row("c", 100, 3)];
        let mut refs: Vec<&AggregatedRow> = rows.iter().collect();
        sort_rows(&mut refs, SortColumn::Count, SortDirection::Ascending);
        let counts: Vec<u64> = refs.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![9, 10, 100]);

        sort_rows(&mut refs, SortColumn::AnswerLabel, SortDirection::Ascending);
        let labels: Vec<&str> = refs.iter().map(|r| r.answer_label.as_str()).collect();
        assert_eq!(labels, vec!["Á", "b", "c"]);

        sort_rows(&mut refs, SortColumn::AnswerLabel, SortDirection::Descending);
        let labels: Vec<&str> = refs.iter().map(|r| r.answer_label.as_str()).collect();
        assert_eq!(labels, vec!["c", "b", "Á"]);
    }

    #[test]
    fn sort_is_stable() {
        let rows = vec![row("x", 1, 1), row("y", 1, 2), row("z", 0, 3)];
        let mut refs: Vec<&AggregatedRow> = rows.iter().collect();
        sort_rows(&mut refs, SortColumn::Count, SortDirection::Descending);
        let labels: Vec<&str> = refs.iter().map(|r| r.answer_label.as_str()).collect();
        assert_eq!(labels, vec!["x", "y", "z"]);
    }

    #[test]
    fn changes_reset_the_page() {
        let mut view = TableView::new(10);
        view.set_page(3);
        view.set_search("no");
        assert_eq!(view.page(), 1);
        view.set_page(2);
        view.toggle_sort(SortColumn::Count);
        assert_eq!(view.page(), 1);
        assert_eq!(
            view.sort(),
            Some((SortColumn::Count, SortDirection::Ascending))
        );
        view.toggle_sort(SortColumn::Count);
        assert_eq!(
            view.sort(),
            Some((SortColumn::Count, SortDirection::Descending))
        );
        view.set_page(2);
        view.set_page_size(25);
        assert_eq!(view.page(), 1);
        assert_eq!(view.search(), "no");
        assert_eq!(
            view.sort(),
            Some((SortColumn::Count, SortDirection::Descending))
        );
    }

    #[test]
    fn clearing_the_sort_restores_rank_order() {
        let rows = vec![row("Sí", 7, 1), row("No", 3, 2), row("-", 1, 3)];
        let labels = |view: &TableView| -> Vec<String> {
            view.project(&rows)
                .rows
                .iter()
                .map(|r| r.answer_label.clone())
                .collect()
        };
        let mut view = TableView::new(10);
        view.set_sort(SortColumn::Count, SortDirection::Ascending);
        assert_eq!(labels(&view), vec!["-", "No", "Sí"]);
        view.set_page(2);
        view.clear_sort();
        assert_eq!(view.sort(), None);
        assert_eq!(view.page(), 1);
        assert_eq!(labels(&view), vec!["Sí", "No", "-"]);
    }
}
