use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use derive_setters::Setters;
use ratatui::crossterm::event::KeyEvent;
use thiserror::Error;

use crate::importer::ImportError;
use crate::store::DEFAULT_PAGE_SIZE;

/// Runtime configuration, filled from CLI arguments in `main`.
#[derive(Debug, Clone, Setters)]
#[setters(into)]
pub struct TdmConfig {
    /// How long the controller waits for a key event per loop, in ms
    pub event_poll_time: u64,
    pub page_size: usize,
    /// Directory the exporter writes into
    pub export_dir: PathBuf,
    /// How long a status message stays on screen, in ms
    pub status_timeout: u64,
}

impl Default for TdmConfig {
    fn default() -> Self {
        TdmConfig {
            event_poll_time: 250,
            page_size: DEFAULT_PAGE_SIZE,
            export_dir: PathBuf::from("."),
            status_timeout: 5000,
        }
    }
}

#[derive(Debug, Error)]
pub enum TdmError {
    #[error("IO error! Err: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid path! Err: {0}")]
    Path(#[from] shellexpand::LookupError<std::env::VarError>),
    #[error(transparent)]
    Import(#[from] ImportError),
}

/// What the controller hands to the model. Keys are translated into
/// semantic messages per modus; only input lines and dialogs receive the
/// raw key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Raw key, forwarded while the command line owns the keyboard
    RawKey(KeyEvent),
    Quit,
    /// Leave the current overlay and fall back to the table
    Exit,
    Confirm,
    Cancel,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PreviousPage,
    FirstPage,
    LastPage,
    EnterSearch,
    EnterGotoPage,
    EnterImport,
    EnterAddColumn,
    SortAscending,
    SortDescending,
    OpenColumnManager,
    ToggleColumnVisibility,
    DeleteSelectedColumn,
    DeleteSelectedRow,
    Export,
    CopyCell,
    CopyRow,
    Help,
}

/// What the command line input is currently collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMDMode {
    SearchTable,
    GotoPage,
    ImportFile,
    AddColumn,
}

/// Destructive operation waiting for a y/n answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    DeleteRow(String),
    DeleteColumn(String),
}

/// Coloring hint for the status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLevel {
    #[default]
    Info,
    Warning,
    Error,
}

pub const HELP_TEXT: &str = "\
Key bindings

  Up/Down, k/j      Move row selection
  Left/Right, h/l   Move column selection
  n / p             Next / previous page
  Home / End        First / last page
  g                 Go to page
  /                 Search all fields
  s / S             Sort by selected column (ascending / descending)
  c                 Manage columns (Space toggle, a add, d delete)
  x                 Delete selected row
  i                 Import a CSV file
  e                 Export to CSV
  y / Y             Copy cell / row to clipboard
  ?                 Show this help
  q                 Quit

Press any key to close.";

pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}
