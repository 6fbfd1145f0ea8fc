// Groups item rows into labeled sub-sections using a blank-run heuristic
use super::reshape::missing_count;
use super::table::{row_text, Cell, ColumnLabel, Table};
use serde::ser::{Serialize, SerializeMap, Serializer};

pub const UNNAMED_SECTION: &str = "Unnamed Section";

/// One item row: present cells keyed by column label, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemRow(pub Vec<(String, String)>);

impl ItemRow {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == label).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for ItemRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ItemGroup {
    pub label: String,
    pub rows: Vec<ItemRow>,
}

/// A row separates groups when it is mostly empty: at least three missing
/// cells, or (for rows wider than two) at least half its cells missing.
pub fn is_boundary(row: &[Cell]) -> bool {
    let missing = missing_count(row);
    missing >= 3 || (row.len() > 2 && missing * 2 >= row.len())
}

/// Walk rows in order. A boundary row closes the rows gathered since the
/// previous boundary and names them with its own text; whatever is left at
/// the end is "Unnamed Section". Empty groups are dropped.
pub fn classify(table: &Table) -> Vec<ItemGroup> {
    let mut groups = Vec::new();
    let mut pending: Vec<ItemRow> = Vec::new();

    for row in &table.rows {
        if is_boundary(row) {
            let text = row_text(row);
            let label = if text.trim().is_empty() {
                UNNAMED_SECTION.to_string()
            } else {
                text
            };
            flush(&mut groups, label, &mut pending);
            continue;
        }

        let item = item_row(&table.columns, row);
        if !item.is_empty() {
            pending.push(item);
        }
    }
    flush(&mut groups, UNNAMED_SECTION.to_string(), &mut pending);
    groups
}

fn flush(groups: &mut Vec<ItemGroup>, label: String, pending: &mut Vec<ItemRow>) {
    if pending.is_empty() {
        return;
    }
    groups.push(ItemGroup {
        label,
        rows: std::mem::take(pending),
    });
}

fn item_row(columns: &[ColumnLabel], row: &[Cell]) -> ItemRow {
    ItemRow(
        columns
            .iter()
            .zip(row)
            .filter_map(|(label, cell)| {
                let value = cell.as_deref()?.trim();
                (!value.is_empty()).then(|| (label.to_string(), value.to_string()))
            })
            .collect(),
    )
}

/// Lay grouped rows back out as a table: each group's item rows followed by
/// its label row (label in the first cell).
pub fn flatten_groups(groups: &[ItemGroup], columns: &[ColumnLabel]) -> Table {
    // Narrower label rows would not read back as boundaries
    let label_width = columns.len().max(3);
    let mut rows = Vec::new();
    for group in groups {
        for item in &group.rows {
            rows.push(
                columns
                    .iter()
                    .map(|c| item.get(&c.to_string()).map(str::to_string))
                    .collect(),
            );
        }
        let mut label_row: Vec<Cell> = vec![None; label_width];
        label_row[0] = Some(group.label.clone());
        rows.push(label_row);
    }
    Table { columns: columns.to_vec(), rows }
}
