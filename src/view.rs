use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::trace;

use crate::store::{ColumnDef, Field, Row, SortDirection, TableStore};

/// What the table screen renders: the visible column set, the row indices
/// of the current page and the match count before pagination. Row indices
/// point into `TableStore::rows()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedView {
    pub columns: Vec<ColumnDef>,
    pub row_indices: Vec<usize>,
    pub total_matches: usize,
}

impl ProjectedView {
    pub fn page_row_count(&self) -> usize {
        self.row_indices.len()
    }
}

/// Derives the current view from the store: filter, then sort, then
/// paginate. Pure read, the store is never touched.
pub fn project(store: &TableStore) -> ProjectedView {
    let mut indices = filter_rows(store.rows(), store.search_query());
    let total_matches = indices.len();

    if let Some(column_id) = store.sort_column() {
        sort_rows(&mut indices, store.rows(), column_id, store.sort_direction());
    }

    let row_indices = paginate(&indices, store.current_page(), store.rows_per_page());
    trace!(
        "Projected {} matches, page {} holds {} rows",
        total_matches,
        store.current_page(),
        row_indices.len()
    );

    ProjectedView {
        columns: store.columns().iter().filter(|c| c.visible).cloned().collect(),
        row_indices,
        total_matches,
    }
}

/// Case-insensitive substring match over every field of every row, hidden
/// columns and the row id included. An empty query matches everything.
fn filter_rows(rows: &[Row], query: &str) -> Vec<usize> {
    if query.is_empty() {
        return (0..rows.len()).collect();
    }
    let needle = query.to_lowercase();
    // Indexed parallel collect keeps the original row order
    rows.par_iter()
        .enumerate()
        .filter_map(|(idx, row)| {
            row.fields()
                .any(|field| field.render().to_lowercase().contains(&needle))
                .then_some(idx)
        })
        .collect()
}

fn sort_rows(indices: &mut [usize], rows: &[Row], column_id: &str, direction: SortDirection) {
    // Stable sort keeps ties in their current order
    indices.sort_by(|&a, &b| {
        let ordering = compare_fields(rows[a].field(column_id), rows[b].field(column_id));
        match direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Numeric comparison when both sides are numbers, lowercase text
/// comparison otherwise. A missing field sorts like the empty string.
fn compare_fields(a: Option<Field<'_>>, b: Option<Field<'_>>) -> Ordering {
    match (a, b) {
        (Some(Field::Number(x)), Some(Field::Number(y))) => x.cmp(&y),
        (a, b) => {
            let x = a.map(|f| f.render().to_lowercase()).unwrap_or_default();
            let y = b.map(|f| f.render().to_lowercase()).unwrap_or_default();
            x.cmp(&y)
        }
    }
}

fn paginate(indices: &[usize], page: usize, rows_per_page: usize) -> Vec<usize> {
    let start = page.saturating_mul(rows_per_page);
    let end = std::cmp::min(start.saturating_add(rows_per_page), indices.len());
    if start >= end {
        return Vec::new();
    }
    indices[start..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    fn sample_row(id: &str, name: &str, email: &str, age: u32, role: &str) -> Row {
        Row {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            age,
            role: role.to_string(),
            extra: Default::default(),
        }
    }

    fn store_with(rows: Vec<Row>) -> TableStore {
        let mut store = TableStore::default();
        store.set_data(rows);
        store
    }

    fn names(view: &ProjectedView, store: &TableStore) -> Vec<String> {
        view.row_indices
            .iter()
            .map(|&i| store.rows()[i].name.clone())
            .collect()
    }

    #[test]
    fn search_is_case_insensitive_substring_match() {
        let mut store = store_with(vec![
            sample_row("r1", "Jane", "jane@example.com", 30, "Admin"),
            sample_row("r2", "Bob", "bob@example.com", 40, "User"),
            sample_row("r3", "Ada", "ada@example.com", 35, "ADMINISTRATOR"),
        ]);
        store.set_search_query("adm");

        let view = project(&store);
        assert_eq!(view.total_matches, 2);
        assert_eq!(names(&view, &store), ["Jane", "Ada"]);
    }

    #[test]
    fn search_covers_hidden_columns_and_the_row_id() {
        let mut store = store_with(vec![
            sample_row("row-42-0", "Jane", "jane@example.com", 30, "Admin"),
            sample_row("r2", "Bob", "bob@example.com", 40, "User"),
        ]);
        store.toggle_column_visibility("email");

        store.set_search_query("bob@");
        assert_eq!(project(&store).total_matches, 1);

        store.set_search_query("row-42");
        let view = project(&store);
        assert_eq!(view.total_matches, 1);
        assert_eq!(names(&view, &store), ["Jane"]);
    }

    #[test]
    fn search_covers_user_added_columns() {
        let mut store = TableStore::default();
        store.add_column("department", "Department").unwrap();
        let mut r = sample_row("r1", "Jane", "jane@example.com", 30, "Admin");
        r.extra
            .insert("department".to_string(), Value::Text("Sales".to_string()));
        store.set_data(vec![r, sample_row("r2", "Bob", "bob@example.com", 40, "User")]);

        store.set_search_query("sales");
        assert_eq!(project(&store).total_matches, 1);
    }

    #[test]
    fn filtering_twice_equals_filtering_once() {
        let mut store = store_with(vec![
            sample_row("r1", "Jane", "jane@example.com", 30, "Admin"),
            sample_row("r2", "Bob", "bob@example.com", 40, "User"),
            sample_row("r3", "Ada", "ada@example.com", 35, "ADMINISTRATOR"),
        ]);
        store.set_search_query("adm");
        let first = project(&store);
        let matched: Vec<Row> = first
            .row_indices
            .iter()
            .map(|&i| store.rows()[i].clone())
            .collect();
        let matched_ids: Vec<String> = matched.iter().map(|r| r.id.clone()).collect();

        // Running the same query over just the matches keeps every one of them
        let mut refiltered = store_with(matched);
        refiltered.set_search_query("adm");
        let second = project(&refiltered);

        assert_eq!(second.total_matches, first.total_matches);
        let surviving: Vec<String> = second
            .row_indices
            .iter()
            .map(|&i| refiltered.rows()[i].id.clone())
            .collect();
        assert_eq!(surviving, matched_ids);
    }

    #[test]
    fn numeric_column_sorts_numerically() {
        let mut store = store_with(vec![
            sample_row("r1", "Jane", "jane@example.com", 100, "Admin"),
            sample_row("r2", "Bob", "bob@example.com", 9, "User"),
            sample_row("r3", "Ada", "ada@example.com", 35, "User"),
        ]);
        store.set_sorting("age", SortDirection::Ascending);
        assert_eq!(names(&project(&store), &store), ["Bob", "Ada", "Jane"]);

        store.set_sorting("age", SortDirection::Descending);
        assert_eq!(names(&project(&store), &store), ["Jane", "Ada", "Bob"]);
    }

    #[test]
    fn text_sort_ignores_case() {
        let mut store = store_with(vec![
            sample_row("r1", "bob", "bob@example.com", 40, "User"),
            sample_row("r2", "Ada", "ada@example.com", 35, "User"),
            sample_row("r3", "Jane", "jane@example.com", 30, "Admin"),
        ]);
        store.set_sorting("name", SortDirection::Ascending);
        assert_eq!(names(&project(&store), &store), ["Ada", "bob", "Jane"]);
    }

    #[test]
    fn missing_fields_sort_like_empty_strings() {
        let mut store = TableStore::default();
        store.add_column("department", "Department").unwrap();
        let mut with_dept = sample_row("r1", "Jane", "jane@example.com", 30, "Admin");
        with_dept
            .extra
            .insert("department".to_string(), Value::Text("Sales".to_string()));
        let without_dept = sample_row("r2", "Bob", "bob@example.com", 40, "User");
        store.set_data(vec![with_dept, without_dept]);

        store.set_sorting("department", SortDirection::Ascending);
        assert_eq!(names(&project(&store), &store), ["Bob", "Jane"]);
    }

    #[test]
    fn equal_keys_keep_their_original_order() {
        let mut store = store_with(vec![
            sample_row("r1", "Jane", "jane@example.com", 30, "User"),
            sample_row("r2", "Bob", "bob@example.com", 40, "User"),
            sample_row("r3", "Ada", "ada@example.com", 35, "User"),
        ]);
        store.set_sorting("role", SortDirection::Ascending);
        assert_eq!(names(&project(&store), &store), ["Jane", "Bob", "Ada"]);
    }

    #[test]
    fn pagination_slices_after_filter_and_sort() {
        let rows: Vec<Row> = (0..25)
            .map(|i| sample_row(&format!("r{i}"), &format!("Person {i:02}"), "p@example.com", 20 + i, "User"))
            .collect();
        let mut store = store_with(rows);
        store.set_page(2);

        let view = project(&store);
        assert_eq!(view.total_matches, 25);
        assert_eq!(view.page_row_count(), 5);
        assert_eq!(
            names(&view, &store),
            ["Person 20", "Person 21", "Person 22", "Person 23", "Person 24"]
        );
    }

    #[test]
    fn out_of_range_page_projects_empty() {
        let mut store = store_with(vec![sample_row("r1", "Jane", "jane@example.com", 30, "Admin")]);
        store.set_page(7);
        let view = project(&store);
        assert_eq!(view.page_row_count(), 0);
        assert_eq!(view.total_matches, 1);
    }

    #[test]
    fn vanished_sort_column_keeps_original_order() {
        let mut store = store_with(vec![
            sample_row("r1", "Jane", "jane@example.com", 30, "Admin"),
            sample_row("r2", "Bob", "bob@example.com", 40, "User"),
        ]);
        store.set_sorting("department", SortDirection::Descending);
        assert_eq!(names(&project(&store), &store), ["Jane", "Bob"]);
    }

    #[test]
    fn hidden_columns_are_left_out_of_the_projection() {
        let mut store = store_with(vec![sample_row("r1", "Jane", "jane@example.com", 30, "Admin")]);
        store.toggle_column_visibility("age");
        let view = project(&store);
        let ids: Vec<&str> = view.columns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["name", "email", "role"]);
    }
}
