use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{
    CMDMode, HELP_TEXT, Message, PendingAction, StatusLevel, TdmConfig, TdmError,
};
use crate::exporter::{DirSink, export_csv};
use crate::importer::{ImportError, import_csv_file};
use crate::inputter::{InputResult, Inputter};
use crate::store::{Row, SortDirection, TableStore};
use crate::view::{ProjectedView, project};

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    LOADING,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    COLUMNS,
    CMDINPUT,
    CONFIRM,
    POPUP,
}

pub struct Model {
    config: TdmConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    store: TableStore,
    view: ProjectedView,
    curser_row: usize,    // Selected row within the current page
    curser_column: usize, // Selected column within the visible columns
    columns_curser: usize,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    pending_action: Option<PendingAction>,
    confirm_text: String,
    popup_text: String,
    status_message: String,
    status_level: StatusLevel,
    status_set_at: Instant,
    // Connected on the first copy, so headless sessions work fine
    clipboard: Option<Clipboard>,
    pending_import: Option<Receiver<Result<Vec<Row>, ImportError>>>,
}

impl Model {
    pub fn init(config: TdmConfig, file: Option<&Path>) -> Result<Self, TdmError> {
        let mut store = TableStore::new(config.page_size);
        let mut status_message = "No data loaded. Press i to import a CSV file.".to_string();
        if let Some(path) = file {
            let loading = Instant::now();
            let rows = import_csv_file(path)?;
            status_message = format!(
                "Loaded {} rows in {}ms",
                rows.len(),
                loading.elapsed().as_millis()
            );
            info!("{status_message}");
            store.set_data(rows);
        }
        let view = project(&store);

        Ok(Model {
            config,
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            store,
            view,
            curser_row: 0,
            curser_column: 0,
            columns_curser: 0,
            input: Inputter::default(),
            cmd_mode: None,
            pending_action: None,
            confirm_text: String::new(),
            popup_text: String::new(),
            status_message,
            status_level: StatusLevel::Info,
            status_set_at: Instant::now(),
            clipboard: None,
            pending_import: None,
        })
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TdmError> {
        // Runs every tick, with or without a key event
        self.poll_pending_import();
        self.expire_status();

        if let Some(msg) = message {
            trace!("Update: Modus {:?}, Message {:?}", self.modus, msg);
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveDown => self.move_table_selection_down(),
                    Message::MoveUp => self.move_table_selection_up(),
                    Message::MoveLeft => self.move_table_selection_left(),
                    Message::MoveRight => self.move_table_selection_right(),
                    Message::NextPage => self.next_page(),
                    Message::PreviousPage => self.previous_page(),
                    Message::FirstPage => self.first_page(),
                    Message::LastPage => self.last_page(),
                    Message::EnterSearch => {
                        let query = self.store.search_query().to_string();
                        self.enter_cmd_mode(CMDMode::SearchTable, &query);
                    }
                    Message::EnterGotoPage => self.enter_cmd_mode(CMDMode::GotoPage, ""),
                    Message::EnterImport => self.enter_cmd_mode(CMDMode::ImportFile, ""),
                    Message::SortAscending => self.sort_current_column(SortDirection::Ascending),
                    Message::SortDescending => self.sort_current_column(SortDirection::Descending),
                    Message::OpenColumnManager => self.open_column_manager(),
                    Message::DeleteSelectedRow => self.request_row_delete(),
                    Message::Export => self.export(),
                    Message::CopyCell => self.copy_table_cell(),
                    Message::CopyRow => self.copy_table_row(),
                    Message::Help => self.show_help(),
                    _ => (),
                },
                Modus::COLUMNS => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit => self.exit(),
                    Message::MoveDown => self.move_columns_curser_down(),
                    Message::MoveUp => self.move_columns_curser_up(),
                    Message::ToggleColumnVisibility => self.toggle_selected_column(),
                    Message::EnterAddColumn => self.enter_cmd_mode(CMDMode::AddColumn, ""),
                    Message::DeleteSelectedColumn => self.request_column_delete(),
                    _ => (),
                },
                Modus::CMDINPUT => match msg {
                    Message::Quit => self.quit(),
                    Message::RawKey(key) => self.raw_input(key),
                    _ => (),
                },
                Modus::CONFIRM => match msg {
                    Message::Quit => self.quit(),
                    Message::Confirm => self.resolve_pending_action(),
                    Message::Cancel | Message::Exit => self.cancel_pending_action(),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit => self.exit(),
                    _ => (),
                },
            }
        }

        Ok(())
    }

    // ---------------- Accessors for the controller and the ui ---------------- //

    pub fn modus(&self) -> Modus {
        self.modus
    }

    /// The screen to draw under the command line or a confirm dialog. While
    /// those own the keyboard the main area keeps showing where they came from.
    pub fn base_modus(&self) -> Modus {
        match self.modus {
            Modus::CMDINPUT => match self.cmd_mode {
                Some(CMDMode::AddColumn) => Modus::COLUMNS,
                _ => Modus::TABLE,
            },
            Modus::CONFIRM => match self.pending_action {
                Some(PendingAction::DeleteColumn(_)) => Modus::COLUMNS,
                _ => Modus::TABLE,
            },
            modus => modus,
        }
    }

    pub fn store(&self) -> &TableStore {
        &self.store
    }

    pub fn view(&self) -> &ProjectedView {
        &self.view
    }

    pub fn curser(&self) -> (usize, usize) {
        (self.curser_row, self.curser_column)
    }

    pub fn columns_curser(&self) -> usize {
        self.columns_curser
    }

    pub fn status_line(&self) -> (&str, StatusLevel) {
        (&self.status_message, self.status_level)
    }

    pub fn confirm_text(&self) -> &str {
        &self.confirm_text
    }

    pub fn popup_text(&self) -> &str {
        &self.popup_text
    }

    pub fn cmd_input(&self) -> InputResult {
        self.input.get()
    }

    pub fn cmd_prompt(&self) -> &'static str {
        match self.cmd_mode {
            Some(CMDMode::SearchTable) => "Search: ",
            Some(CMDMode::GotoPage) => "Page: ",
            Some(CMDMode::ImportFile) => "Import file: ",
            Some(CMDMode::AddColumn) => "Add column (id,label): ",
            None => "",
        }
    }

    /// True while the command line owns the keyboard and wants raw keys.
    pub fn active_cmdinput(&self) -> bool {
        self.modus == Modus::CMDINPUT
    }

    /// 1-based current page and total page count over the filtered rows.
    pub fn page_info(&self) -> (usize, usize) {
        let per_page = self.store.rows_per_page();
        let pages = self.view.total_matches.div_ceil(per_page).max(1);
        (self.store.current_page() + 1, pages)
    }

    // -------------------- Control handling functions ---------------------- //

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    fn exit(&mut self) {
        match self.modus {
            // There is no exit from the table, only quit
            Modus::TABLE => {}
            Modus::COLUMNS => self.modus = Modus::TABLE,
            Modus::POPUP => self.modus = self.previous_modus,
            Modus::CMDINPUT | Modus::CONFIRM => {}
        }
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::POPUP;
        self.popup_text = HELP_TEXT.to_string();
    }

    /// Re-derives the view and keeps all cursers inside the new bounds.
    fn refresh_view(&mut self) {
        self.view = project(&self.store);
        self.curser_row = self
            .curser_row
            .min(self.view.page_row_count().saturating_sub(1));
        self.curser_column = self
            .curser_column
            .min(self.view.columns.len().saturating_sub(1));
        self.columns_curser = self
            .columns_curser
            .min(self.store.columns().len().saturating_sub(1));
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.status_level = StatusLevel::Info;
        self.status_set_at = Instant::now();
    }

    fn set_status_warning(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.status_level = StatusLevel::Warning;
        self.status_set_at = Instant::now();
        warn!("{}", self.status_message);
    }

    fn set_status_error(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.status_level = StatusLevel::Error;
        self.status_set_at = Instant::now();
        error!("{}", self.status_message);
    }

    /// Status messages are transient; after the timeout the line goes blank.
    fn expire_status(&mut self) {
        if !self.status_message.is_empty()
            && self.status_set_at.elapsed().as_millis() >= u128::from(self.config.status_timeout)
        {
            self.status_message.clear();
            self.status_level = StatusLevel::Info;
        }
    }

    // ---------------- Table navigation ---------------- //

    fn has_next_page(&self) -> bool {
        (self.store.current_page() + 1).saturating_mul(self.store.rows_per_page())
            < self.view.total_matches
    }

    fn move_table_selection_down(&mut self) {
        if self.curser_row + 1 < self.view.page_row_count() {
            // Curser somewhere in the middle of the page
            self.curser_row += 1;
        } else if self.has_next_page() {
            // At the bottom of the page, move on to the next one
            self.store.set_page(self.store.current_page() + 1);
            self.refresh_view();
            self.curser_row = 0;
        }
    }

    fn move_table_selection_up(&mut self) {
        if self.curser_row > 0 {
            self.curser_row -= 1;
        } else if self.store.current_page() > 0 {
            // At the top of the page, fall back to the previous one
            self.store.set_page(self.store.current_page() - 1);
            self.refresh_view();
            self.curser_row = self.view.page_row_count().saturating_sub(1);
        }
    }

    fn move_table_selection_left(&mut self) {
        self.curser_column = self.curser_column.saturating_sub(1);
    }

    fn move_table_selection_right(&mut self) {
        if self.curser_column + 1 < self.view.columns.len() {
            self.curser_column += 1;
        }
    }

    fn next_page(&mut self) {
        if self.has_next_page() {
            self.store.set_page(self.store.current_page() + 1);
            self.refresh_view();
            self.curser_row = 0;
        }
    }

    fn previous_page(&mut self) {
        if self.store.current_page() > 0 {
            self.store.set_page(self.store.current_page() - 1);
            self.refresh_view();
            self.curser_row = 0;
        }
    }

    fn first_page(&mut self) {
        self.store.set_page(0);
        self.refresh_view();
        self.curser_row = 0;
    }

    fn last_page(&mut self) {
        let last = match self.view.total_matches {
            0 => 0,
            n => (n - 1) / self.store.rows_per_page(),
        };
        self.store.set_page(last);
        self.refresh_view();
        self.curser_row = 0;
    }

    // ---------------- Sorting and searching ---------------- //

    fn sort_current_column(&mut self, direction: SortDirection) {
        let Some(column) = self.view.columns.get(self.curser_column) else {
            return;
        };
        let (id, label) = (column.id.clone(), column.label.clone());
        if self.store.sort_by_column(&id, direction) {
            self.refresh_view();
            let word = match direction {
                SortDirection::Ascending => "ascending",
                SortDirection::Descending => "descending",
            };
            self.set_status_message(format!("Sorted by {label} ({word})"));
        } else {
            self.set_status_warning(format!("Column {label} is not sortable!"));
        }
    }

    fn search_table(&mut self, query: &str) {
        self.store.set_search_query(query);
        self.refresh_view();
        self.curser_row = 0;
        if query.is_empty() {
            self.set_status_message(format!("Showing all {} rows", self.view.total_matches));
        } else if self.view.total_matches == 0 {
            self.set_status_message("Found no matches!");
        } else {
            self.set_status_message(format!("Found {} results", self.view.total_matches));
        }
    }

    fn goto_page(&mut self, input: &str) {
        match input.trim().parse::<usize>() {
            Ok(0) => self.set_status_warning("Page numbers start at 1!"),
            Ok(page) => {
                self.store.set_page(page - 1);
                self.refresh_view();
                self.curser_row = 0;
                self.set_status_message(format!("Page {page}"));
            }
            Err(_) => self.set_status_error(format!("Not a valid page number: {input}")),
        }
    }

    // ---------------- Column management ---------------- //

    fn open_column_manager(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::COLUMNS;
        self.columns_curser = 0;
    }

    fn move_columns_curser_down(&mut self) {
        if self.columns_curser + 1 < self.store.columns().len() {
            self.columns_curser += 1;
        }
    }

    fn move_columns_curser_up(&mut self) {
        self.columns_curser = self.columns_curser.saturating_sub(1);
    }

    fn toggle_selected_column(&mut self) {
        let Some(column) = self.store.columns().get(self.columns_curser) else {
            return;
        };
        let id = column.id.clone();
        self.store.toggle_column_visibility(&id);
        self.refresh_view();
        let status = self.store.column(&id).map(|column| {
            let state = if column.visible { "shown" } else { "hidden" };
            format!("Column \"{}\" {state}", column.label)
        });
        if let Some(status) = status {
            self.set_status_message(status);
        }
    }

    fn add_column(&mut self, input: &str) {
        // A single input line carries both parts: "id,label"
        let (id, label) = match input.split_once(',') {
            Some((id, label)) => (id.trim(), label.trim()),
            None => (input.trim(), ""),
        };
        let label = if label.is_empty() { id } else { label };
        match self.store.add_column(id, label) {
            Ok(()) => {
                self.refresh_view();
                self.set_status_message(format!("Added column \"{label}\""));
            }
            Err(e) => self.set_status_error(e.to_string()),
        }
    }

    fn request_column_delete(&mut self) {
        let Some(column) = self.store.columns().get(self.columns_curser) else {
            return;
        };
        let (id, label) = (column.id.clone(), column.label.clone());
        if crate::store::DEFAULT_COLUMN_IDS.contains(&id.as_str()) {
            self.set_status_warning(format!("Default column \"{label}\" cannot be deleted!"));
            return;
        }
        self.confirm_text = format!(
            "Are you sure you want to delete the column \"{label}\"? This will permanently remove its data. (y/n)"
        );
        self.pending_action = Some(PendingAction::DeleteColumn(id));
        self.previous_modus = self.modus;
        self.modus = Modus::CONFIRM;
    }

    // ---------------- Row deletion ---------------- //

    fn request_row_delete(&mut self) {
        let Some(&row_idx) = self.view.row_indices.get(self.curser_row) else {
            self.set_status_warning("No row to delete!");
            return;
        };
        let id = self.store.rows()[row_idx].id.clone();
        self.confirm_text = "Are you sure you want to delete this row? (y/n)".to_string();
        self.pending_action = Some(PendingAction::DeleteRow(id));
        self.previous_modus = self.modus;
        self.modus = Modus::CONFIRM;
    }

    fn resolve_pending_action(&mut self) {
        match self.pending_action.take() {
            Some(PendingAction::DeleteRow(id)) => {
                self.store.delete_row(&id);
                self.refresh_view();
                self.set_status_message("Row deleted");
                self.modus = Modus::TABLE;
            }
            Some(PendingAction::DeleteColumn(id)) => {
                match self.store.delete_column(&id) {
                    Ok(()) => {
                        self.refresh_view();
                        self.set_status_message(format!("Deleted column \"{id}\""));
                    }
                    Err(e) => self.set_status_error(e.to_string()),
                }
                self.modus = Modus::COLUMNS;
            }
            None => {
                debug!("Confirmed without a pending action");
                self.modus = Modus::TABLE;
            }
        }
        self.confirm_text.clear();
    }

    fn cancel_pending_action(&mut self) {
        let target = match self.pending_action.take() {
            Some(PendingAction::DeleteColumn(_)) => Modus::COLUMNS,
            _ => Modus::TABLE,
        };
        self.confirm_text.clear();
        self.modus = target;
        self.set_status_message("Canceled");
    }

    // ---------------- Command line ---------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode, prefill: &str) {
        trace!("Entering command mode {mode:?}");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);
        self.input.clear();
        if !prefill.is_empty() {
            self.input.set(prefill);
        }
    }

    fn raw_input(&mut self, key: KeyEvent) {
        let result = self.input.read(key);
        if result.finished {
            self.modus = self.previous_modus;
            self.previous_modus = Modus::CMDINPUT;
            self.input.clear();
            let mode = self.cmd_mode.take();
            if result.canceled {
                return;
            }
            match mode {
                Some(CMDMode::SearchTable) => self.search_table(&result.input),
                Some(CMDMode::GotoPage) => self.goto_page(&result.input),
                Some(CMDMode::ImportFile) => self.start_import(&result.input),
                Some(CMDMode::AddColumn) => self.add_column(&result.input),
                None => debug!("Cmd input finished without a mode"),
            }
        }
    }

    // ---------------- Import and export ---------------- //

    fn start_import(&mut self, input: &str) {
        let path = match shellexpand::full(input.trim()) {
            Ok(expanded) => PathBuf::from(expanded.as_ref()),
            Err(e) => {
                self.set_status_error(format!("Invalid path! Err: {e}"));
                return;
            }
        };
        info!("Importing {} in the background", path.display());
        let (tx, rx) = mpsc::channel();
        // A newer import supersedes a running one; the old result is
        // dropped together with its receiver
        self.pending_import = Some(rx);
        self.status = Status::LOADING;
        self.set_status_message(format!("Importing {}...", path.display()));
        thread::spawn(move || {
            let result = import_csv_file(&path);
            if tx.send(result).is_err() {
                debug!("Import finished after being superseded");
            }
        });
    }

    fn poll_pending_import(&mut self) {
        let Some(rx) = &self.pending_import else {
            return;
        };
        match rx.try_recv() {
            Ok(result) => {
                self.pending_import = None;
                self.status = Status::READY;
                self.finish_import(result);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_import = None;
                self.status = Status::READY;
                self.set_status_error("Import worker died unexpectedly!");
            }
        }
    }

    fn finish_import(&mut self, result: Result<Vec<Row>, ImportError>) {
        match result {
            Ok(rows) => {
                let count = rows.len();
                self.store.set_data(rows);
                self.refresh_view();
                self.set_status_message(format!("Successfully imported {count} rows"));
            }
            Err(e) if e.is_warning() => self.set_status_warning(e.to_string()),
            Err(e) => self.set_status_error(e.to_string()),
        }
    }

    fn export(&mut self) {
        let sink = DirSink::new(self.config.export_dir.clone());
        match export_csv(self.store.rows(), self.store.columns(), &sink) {
            Ok(path) => self.set_status_message(format!("Data exported to {}", path.display())),
            Err(e) => self.set_status_error(e.to_string()),
        }
    }

    // ---------------- Clipboard ---------------- //

    fn copy_table_cell(&mut self) {
        let Some(content) = self.selected_cell_content() else {
            self.set_status_warning("Nothing selected to copy!");
            return;
        };
        self.copy_to_clipboard(content);
    }

    fn copy_table_row(&mut self) {
        let Some(&row_idx) = self.view.row_indices.get(self.curser_row) else {
            self.set_status_warning("Nothing selected to copy!");
            return;
        };
        let row = &self.store.rows()[row_idx];
        let line = self
            .view
            .columns
            .iter()
            .map(|c| wrap_cell_content(&row.field(&c.id).map(|f| f.render()).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(",");
        self.copy_to_clipboard(line);
    }

    fn selected_cell_content(&self) -> Option<String> {
        let &row_idx = self.view.row_indices.get(self.curser_row)?;
        let column = self.view.columns.get(self.curser_column)?;
        let row = &self.store.rows()[row_idx];
        Some(row.field(&column.id).map(|f| f.render()).unwrap_or_default())
    }

    fn copy_to_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    self.set_status_error(format!("Clipboard unavailable! Err: {e}"));
                    return;
                }
            }
        }
        if let Some(clipboard) = &mut self.clipboard {
            match clipboard.set_text(content) {
                Ok(()) => self.set_status_message("Copied to clipboard"),
                Err(e) => self.set_status_error(format!("Copy failed! Err: {e}")),
            }
        }
    }
}

/// Makes one cell safe for a hand-built CSV line.
fn wrap_cell_content(content: &str) -> String {
    if content.contains(',') || content.contains('"') {
        format!("\"{}\"", content.replace('"', "\"\""))
    } else {
        content.to_string()
    }
}
