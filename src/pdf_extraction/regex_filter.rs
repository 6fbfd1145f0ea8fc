// Declarative start/end/skip row filtering
use super::table::{row_text, Cell, Table};
use crate::template::RegexRule;
use regex::{Regex, RegexBuilder};

fn compile(pattern: Option<&str>) -> Result<Option<Regex>, regex::Error> {
    pattern
        .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
        .transpose()
}

#[derive(Debug, Clone)]
pub struct RowFilter {
    start: Option<Regex>,
    end: Option<Regex>,
    skip: Option<Regex>,
    include_matches: bool,
}

impl RowFilter {
    pub fn new(rule: &RegexRule) -> Result<Self, regex::Error> {
        Ok(Self {
            start: compile(rule.start.as_deref())?,
            end: compile(rule.end.as_deref())?,
            skip: compile(rule.skip.as_deref())?,
            include_matches: rule.include_matches,
        })
    }

    /// `start AND end AND NOT skip` over the rows.
    ///
    /// The window opens at the first `start` match (never, if nothing
    /// matches) and closes after the first `end` match (at the last row, if
    /// nothing matches).
    pub fn window_mask(&self, rows: &[Vec<Cell>]) -> Vec<bool> {
        let texts: Vec<String> = rows.iter().map(|r| row_text(r)).collect();
        let first_match = |re: &Regex| texts.iter().position(|t| re.is_match(t));

        let start_at = match &self.start {
            Some(re) => first_match(re).unwrap_or(texts.len()),
            None => 0,
        };
        let end_at = match &self.end {
            Some(re) => first_match(re).unwrap_or(usize::MAX),
            None => usize::MAX,
        };

        texts
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let skipped = self.skip.as_ref().is_some_and(|re| re.is_match(text));
                i >= start_at && i <= end_at && !skipped
            })
            .collect()
    }

    /// Rows kept: the window when `include_matches`, its complement otherwise.
    pub fn keep_mask(&self, rows: &[Vec<Cell>]) -> Vec<bool> {
        let mask = self.window_mask(rows);
        if self.include_matches {
            mask
        } else {
            mask.into_iter().map(|m| !m).collect()
        }
    }

    pub fn apply(&self, mut table: Table) -> Table {
        let keep = self.keep_mask(&table.rows);
        let mut flags = keep.into_iter();
        table.rows.retain(|_| flags.next().unwrap_or(false));
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_rows(count: usize) -> Table {
        let owned: Vec<Vec<Cell>> = (1..=count)
            .map(|n| vec![Some(format!("line {n}")), Some(format!("{}", n * 10))])
            .collect();
        Table::from_rows(owned)
    }

    // Column 1 always carries the 1-based row number times ten
    fn kept_numbers(table: &Table) -> Vec<usize> {
        table
            .rows
            .iter()
            .filter_map(|r| r[1].as_deref()?.parse::<usize>().ok())
            .map(|v| v / 10)
            .collect()
    }

    fn twelve_row_statement() -> Table {
        let mut table = numbered_rows(12);
        // Row 5 opens the window; rows 10 and 11 are page footers
        table.rows[4][0] = Some("TOTAL carried".into());
        table.rows[4][1] = Some("50".into());
        table.rows[9][0] = Some("Page 1".into());
        table.rows[9][1] = Some("100".into());
        table.rows[10][0] = Some("page 2".into());
        table.rows[10][1] = Some("110".into());
        table
    }

    #[test]
    fn test_start_and_skip_window() {
        let rule = RegexRule {
            start: Some("Total".into()),
            skip: Some(r"Page \d+".into()),
            ..Default::default()
        };
        let filtered = RowFilter::new(&rule).unwrap().apply(twelve_row_statement());
        assert_eq!(kept_numbers(&filtered), vec![5, 6, 7, 8, 9, 12]);
    }

    #[test]
    fn test_exclude_inverts_whole_window() {
        let rule = RegexRule {
            start: Some("Total".into()),
            skip: Some(r"Page \d+".into()),
            include_matches: false,
            ..Default::default()
        };
        let filtered = RowFilter::new(&rule).unwrap().apply(twelve_row_statement());
        assert_eq!(kept_numbers(&filtered), vec![1, 2, 3, 4, 10, 11]);
    }

    #[test]
    fn test_end_is_inclusive() {
        let rule = RegexRule {
            start: Some("line 3".into()),
            end: Some("LINE 5".into()),
            ..Default::default()
        };
        let filtered = RowFilter::new(&rule).unwrap().apply(numbered_rows(8));
        assert_eq!(kept_numbers(&filtered), vec![3, 4, 5]);
    }

    #[test]
    fn test_unmatched_patterns() {
        let never_opens = RegexRule { start: Some("nope".into()), ..Default::default() };
        assert!(RowFilter::new(&never_opens).unwrap().apply(numbered_rows(4)).rows.is_empty());

        let never_closes = RegexRule { end: Some("nope".into()), ..Default::default() };
        assert_eq!(RowFilter::new(&never_closes).unwrap().apply(numbered_rows(4)).rows.len(), 4);
    }

    #[test]
    fn test_empty_rule_keeps_everything() {
        let filter = RowFilter::new(&RegexRule::default()).unwrap();
        assert_eq!(filter.keep_mask(&numbered_rows(3).rows), vec![true, true, true]);
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let rule = RegexRule { skip: Some("[".into()), ..Default::default() };
        assert!(RowFilter::new(&rule).is_err());
    }
}
