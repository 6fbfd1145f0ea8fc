// Table cleanup and two-column field/value reshaping
use super::table::{Cell, ColumnLabel, Table};

pub const FIELD_LABEL: &str = "Field";
pub const VALUE_LABEL: &str = "Value";

pub fn is_missing(cell: &Cell) -> bool {
    cell.as_deref().map_or(true, |s| s.trim().is_empty())
}

pub fn missing_count(row: &[Cell]) -> usize {
    row.iter().filter(|c| is_missing(c)).count()
}

/// Blank-only cells become missing, present values are trimmed, and fully
/// missing rows and columns are dropped. Returns `None` when nothing is left.
pub fn clean(mut table: Table) -> Option<Table> {
    for row in &mut table.rows {
        for cell in row.iter_mut() {
            *cell = cell
                .take()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }
    }

    table.rows.retain(|row| row.iter().any(Option::is_some));

    let keep: Vec<usize> = (0..table.width())
        .filter(|&col| table.rows.iter().any(|row| row.get(col).is_some_and(Option::is_some)))
        .collect();

    if keep.len() != table.width() {
        table.columns = keep.iter().map(|&i| table.columns[i].clone()).collect();
        for row in &mut table.rows {
            *row = keep.iter().map(|&i| row.get(i).cloned().flatten()).collect();
        }
    }

    if table.is_empty() {
        None
    } else {
        Some(table)
    }
}

/// Clean, then label a positional two-column table as Field/Value.
pub fn reshape(table: Table) -> Option<Table> {
    let mut table = clean(table)?;
    if table.width() == 2 && table.has_positional_labels() {
        table.columns = vec![
            ColumnLabel::Named(FIELD_LABEL.to_string()),
            ColumnLabel::Named(VALUE_LABEL.to_string()),
        ];
    }
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_rows_and_columns_are_dropped() {
        let table = Table::from_rows(vec![
            vec![Some("Qty".into()), Some("  ".into()), Some("Price".into())],
            vec![Some("  ".into()), None, Some("\n".into())],
            vec![Some(" 2 ".into()), None, Some("9.99".into())],
        ]);
        let cleaned = clean(table).unwrap();
        assert_eq!(
            cleaned.columns,
            vec![ColumnLabel::Positional(0), ColumnLabel::Positional(2)]
        );
        assert_eq!(cleaned.rows.len(), 2);
        assert_eq!(cleaned.rows[1], vec![Some("2".into()), Some("9.99".into())]);
    }

    #[test]
    fn test_empty_table_is_no_data() {
        assert!(clean(Table::from_strs(&[&["", " "], &["", ""]])).is_none());
        assert!(reshape(Table::default()).is_none());
    }

    #[test]
    fn test_two_positional_columns_become_field_value() {
        let table = Table::from_strs(&[
            &["Invoice No", "", "INV-001"],
            &["Date", "", "2024-01-31"],
        ]);
        let shaped = reshape(table).unwrap();
        assert_eq!(shaped.columns[0].to_string(), FIELD_LABEL);
        assert_eq!(shaped.columns[1].to_string(), VALUE_LABEL);
        assert_eq!(shaped.records()[1].get("Value"), Some("2024-01-31"));
    }

    #[test]
    fn test_named_or_wide_tables_keep_labels() {
        let mut named = Table::from_strs(&[&["a", "b"]]);
        named.columns = vec![ColumnLabel::Named("Code".into()), ColumnLabel::Positional(1)];
        assert_eq!(reshape(named.clone()).unwrap().columns, named.columns);

        let wide = Table::from_strs(&[&["a", "b", "c"]]);
        assert!(reshape(wide).unwrap().has_positional_labels());
    }

    #[test]
    fn test_missing_count() {
        let row = vec![Some("x".into()), Some(" ".into()), None];
        assert_eq!(missing_count(&row), 2);
    }
}
