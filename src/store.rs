use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, trace, warn};

/// Column ids that exist from the start and can never be deleted.
pub const DEFAULT_COLUMN_IDS: [&str; 4] = ["name", "email", "age", "role"];

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Column \"{0}\" already exists!")]
    DuplicateColumn(String),
    #[error("Column id must not be empty!")]
    EmptyColumnId,
    #[error("Default column \"{0}\" cannot be deleted!")]
    ProtectedColumn(String),
}

/// Cell payload for user supplied columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(i64),
}

impl Value {
    pub fn as_field(&self) -> Field<'_> {
        match self {
            Value::Text(s) => Field::Text(s),
            Value::Number(n) => Field::Number(*n),
        }
    }
}

/// Borrowed view of one cell. Base fields and extras are read through this
/// so filtering, sorting and export treat them uniformly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Field<'a> {
    Text(&'a str),
    Number(i64),
}

impl Field<'_> {
    pub fn render(&self) -> String {
        match self {
            Field::Text(s) => (*s).to_string(),
            Field::Number(n) => n.to_string(),
        }
    }
}

/// One record in the table. The base fields are fixed; every user added
/// column stores its values in `extra`, keyed by column id.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: u32,
    pub role: String,
    pub extra: HashMap<String, Value>,
}

impl Row {
    /// Look up a field by column id, base fields and extras alike.
    pub fn field(&self, column_id: &str) -> Option<Field<'_>> {
        match column_id {
            "id" => Some(Field::Text(&self.id)),
            "name" => Some(Field::Text(&self.name)),
            "email" => Some(Field::Text(&self.email)),
            "age" => Some(Field::Number(i64::from(self.age))),
            "role" => Some(Field::Text(&self.role)),
            _ => self.extra.get(column_id).map(Value::as_field),
        }
    }

    /// Every field of this row, the id and hidden columns included.
    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> {
        [
            Field::Text(&self.id),
            Field::Text(&self.name),
            Field::Text(&self.email),
            Field::Number(i64::from(self.age)),
            Field::Text(&self.role),
        ]
        .into_iter()
        .chain(self.extra.values().map(Value::as_field))
    }
}

/// Display metadata for one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub id: String,
    pub label: String,
    pub visible: bool,
    pub sortable: bool,
}

impl ColumnDef {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        ColumnDef {
            id: id.into(),
            label: label.into(),
            visible: true,
            sortable: true,
        }
    }
}

pub fn default_columns() -> Vec<ColumnDef> {
    vec![
        ColumnDef::new("name", "Name"),
        ColumnDef::new("email", "Email"),
        ColumnDef::new("age", "Age"),
        ColumnDef::new("role", "Role"),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Canonical table state: the row set, the column configuration and the
/// view inputs (search text, sort, page). Mutated exclusively through the
/// operations below; the projector in `view` only reads.
#[derive(Debug, Clone)]
pub struct TableStore {
    rows: Vec<Row>,
    columns: Vec<ColumnDef>, // Insertion order is display order
    search_query: String,
    current_page: usize, // Zero based
    rows_per_page: usize,
    sort_column: Option<String>,
    sort_direction: SortDirection,
}

impl Default for TableStore {
    fn default() -> Self {
        TableStore::new(DEFAULT_PAGE_SIZE)
    }
}

impl TableStore {
    pub fn new(rows_per_page: usize) -> Self {
        TableStore {
            rows: Vec::new(),
            columns: default_columns(),
            search_query: String::new(),
            current_page: 0,
            rows_per_page: std::cmp::max(rows_per_page, 1),
            sort_column: None,
            sort_direction: SortDirection::Ascending,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn rows_per_page(&self) -> usize {
        self.rows_per_page
    }

    pub fn sort_column(&self) -> Option<&str> {
        self.sort_column.as_deref()
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn column(&self, column_id: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    // ---------------- Store operations ---------------- //

    /// Replaces the entire row collection.
    pub fn set_data(&mut self, rows: Vec<Row>) {
        debug!("Replacing row set: {} -> {} rows", self.rows.len(), rows.len());
        self.rows = rows;
    }

    /// Appends a row. A row whose id is already taken is refused to keep
    /// update/delete by id unambiguous.
    pub fn add_row(&mut self, row: Row) {
        if self.rows.iter().any(|r| r.id == row.id) {
            warn!("Ignoring add_row with duplicate id {}", row.id);
            return;
        }
        self.rows.push(row);
    }

    /// Replaces the row with the same id; no-op if there is none.
    pub fn update_row(&mut self, row: Row) {
        match self.rows.iter_mut().find(|r| r.id == row.id) {
            Some(slot) => *slot = row,
            None => debug!("update_row: no row with id {}", row.id),
        }
    }

    /// Removes the row with the given id; no-op if it is absent.
    pub fn delete_row(&mut self, row_id: &str) {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != row_id);
        if self.rows.len() == before {
            debug!("delete_row: no row with id {row_id}");
        }
    }

    /// Sets the search text and drops back to the first page, so a
    /// shrinking result set never leaves an empty page on screen.
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
        self.current_page = 0;
        trace!("Search query set to \"{}\"", self.search_query);
    }

    /// Sets the page index verbatim. An out of range index projects as an
    /// empty page, never an error.
    pub fn set_page(&mut self, page: usize) {
        self.current_page = page;
    }

    /// Sets sort column and direction verbatim.
    pub fn set_sorting(&mut self, column_id: impl Into<String>, direction: SortDirection) {
        self.sort_column = Some(column_id.into());
        self.sort_direction = direction;
    }

    /// The user facing sort path: refused for unknown or non-sortable
    /// columns. Returns whether the sort state changed.
    pub fn sort_by_column(&mut self, column_id: &str, direction: SortDirection) -> bool {
        match self.column(column_id) {
            Some(column) if column.sortable => {
                self.set_sorting(column_id, direction);
                true
            }
            Some(_) => {
                trace!("Refusing sort on non-sortable column {column_id}");
                false
            }
            None => {
                trace!("Refusing sort on unknown column {column_id}");
                false
            }
        }
    }

    /// Flips visibility on the matching column; no-op if it is absent.
    pub fn toggle_column_visibility(&mut self, column_id: &str) {
        if let Some(column) = self.columns.iter_mut().find(|c| c.id == column_id) {
            column.visible = !column.visible;
            trace!("Column {} visible: {}", column.id, column.visible);
        }
    }

    /// Adds a column at the end of the display order. The id is normalized
    /// to trimmed lowercase, which also makes the duplicate check
    /// case-insensitive.
    pub fn add_column(&mut self, id: &str, label: &str) -> Result<(), StoreError> {
        let id = id.trim().to_lowercase();
        if id.is_empty() {
            return Err(StoreError::EmptyColumnId);
        }
        if self.columns.iter().any(|c| c.id == id) {
            return Err(StoreError::DuplicateColumn(id));
        }
        debug!("Adding column {id} (\"{label}\")");
        self.columns.push(ColumnDef::new(id, label));
        Ok(())
    }

    /// Removes a column definition and strips that field from every row.
    /// The four default columns are protected. Irreversible.
    pub fn delete_column(&mut self, column_id: &str) -> Result<(), StoreError> {
        if DEFAULT_COLUMN_IDS.contains(&column_id) {
            return Err(StoreError::ProtectedColumn(column_id.to_string()));
        }
        let before = self.columns.len();
        self.columns.retain(|c| c.id != column_id);
        if self.columns.len() == before {
            debug!("delete_column: no column with id {column_id}");
            return Ok(());
        }
        // Base fields all belong to protected columns, so only extras can
        // carry data for a deletable column.
        for row in self.rows.iter_mut() {
            row.extra.remove(column_id);
        }
        debug!("Deleted column {column_id} and its row data");
        Ok(())
    }
}
