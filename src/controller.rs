use std::time::Duration;

use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use tracing::trace;

use crate::domain::{Message, TdmConfig, TdmError};
use crate::model::{Model, Modus};

/// Polls the terminal and translates key presses into messages. The
/// mapping depends on what the model currently shows.
pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TdmConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TdmError> {
        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            return Ok(self.handle_key(model, key));
        }
        Ok(None)
    }

    fn handle_key(&self, model: &Model, key: KeyEvent) -> Option<Message> {
        // Ctrl+C quits from everywhere, the command line included
        if key.code == KeyCode::Char('c') && key.modifiers == KeyModifiers::CONTROL {
            return Some(Message::Quit);
        }
        if model.active_cmdinput() {
            return Some(Message::RawKey(key));
        }
        let message = match model.modus() {
            Modus::TABLE => Self::table_key(key),
            Modus::COLUMNS => Self::columns_key(key),
            Modus::CONFIRM => Self::confirm_key(key),
            Modus::POPUP => Some(Message::Exit),
            Modus::CMDINPUT => Some(Message::RawKey(key)),
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }

    fn table_key(key: KeyEvent) -> Option<Message> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::NONE) => Some(Message::Quit),
            (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => {
                Some(Message::MoveDown)
            }
            (KeyCode::Left, _) | (KeyCode::Char('h'), KeyModifiers::NONE) => {
                Some(Message::MoveLeft)
            }
            (KeyCode::Right, _) | (KeyCode::Char('l'), KeyModifiers::NONE) => {
                Some(Message::MoveRight)
            }
            (KeyCode::Char('n'), KeyModifiers::NONE) => Some(Message::NextPage),
            (KeyCode::Char('p'), KeyModifiers::NONE) => Some(Message::PreviousPage),
            (KeyCode::Home, KeyModifiers::NONE) => Some(Message::FirstPage),
            (KeyCode::End, KeyModifiers::NONE) => Some(Message::LastPage),
            (KeyCode::Char('g'), KeyModifiers::NONE) => Some(Message::EnterGotoPage),
            (KeyCode::Char('/'), _) => Some(Message::EnterSearch),
            (KeyCode::Char('s'), KeyModifiers::NONE) => Some(Message::SortAscending),
            (KeyCode::Char('S'), _) => Some(Message::SortDescending),
            (KeyCode::Char('c'), KeyModifiers::NONE) => Some(Message::OpenColumnManager),
            (KeyCode::Char('x'), KeyModifiers::NONE) => Some(Message::DeleteSelectedRow),
            (KeyCode::Char('i'), KeyModifiers::NONE) => Some(Message::EnterImport),
            (KeyCode::Char('e'), KeyModifiers::NONE) => Some(Message::Export),
            (KeyCode::Char('y'), KeyModifiers::NONE) => Some(Message::CopyCell),
            (KeyCode::Char('Y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            _ => None,
        }
    }

    fn columns_key(key: KeyEvent) -> Option<Message> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::NONE) | (KeyCode::Esc, _) => Some(Message::Exit),
            (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => Some(Message::MoveUp),
            (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => {
                Some(Message::MoveDown)
            }
            (KeyCode::Char(' '), KeyModifiers::NONE) => Some(Message::ToggleColumnVisibility),
            (KeyCode::Char('a'), KeyModifiers::NONE) => Some(Message::EnterAddColumn),
            (KeyCode::Char('d'), KeyModifiers::NONE) => Some(Message::DeleteSelectedColumn),
            _ => None,
        }
    }

    fn confirm_key(key: KeyEvent) -> Option<Message> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(Message::Confirm),
            KeyCode::Char('n') | KeyCode::Esc => Some(Message::Cancel),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TdmConfig;

    fn controller() -> Controller {
        Controller::new(&TdmConfig::default())
    }

    fn model() -> Model {
        Model::init(TdmConfig::default(), None).unwrap()
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn table_keys_map_to_table_messages() {
        let controller = controller();
        let model = model();
        assert_eq!(
            controller.handle_key(&model, press(KeyCode::Char('q'))),
            Some(Message::Quit)
        );
        assert_eq!(
            controller.handle_key(&model, press(KeyCode::Char('j'))),
            Some(Message::MoveDown)
        );
        assert_eq!(
            controller.handle_key(&model, press(KeyCode::Char('/'))),
            Some(Message::EnterSearch)
        );
        assert_eq!(
            controller.handle_key(&model, press(KeyCode::Char('e'))),
            Some(Message::Export)
        );
        assert_eq!(controller.handle_key(&model, press(KeyCode::Tab)), None);
    }

    #[test]
    fn command_line_receives_raw_keys() {
        let controller = controller();
        let mut model = model();
        model.update(Some(Message::EnterSearch)).unwrap();

        let key = press(KeyCode::Char('q'));
        assert_eq!(
            controller.handle_key(&model, key),
            Some(Message::RawKey(key))
        );
    }

    #[test]
    fn ctrl_c_quits_even_inside_the_command_line() {
        let controller = controller();
        let mut model = model();
        model.update(Some(Message::EnterSearch)).unwrap();

        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(controller.handle_key(&model, key), Some(Message::Quit));
    }

    #[test]
    fn overlay_keys_follow_the_modus() {
        let controller = controller();
        let mut model = model();
        model.update(Some(Message::Help)).unwrap();
        // Any key closes a popup
        assert_eq!(
            controller.handle_key(&model, press(KeyCode::Char('z'))),
            Some(Message::Exit)
        );

        let mut model = Model::init(TdmConfig::default(), None).unwrap();
        model.update(Some(Message::OpenColumnManager)).unwrap();
        assert_eq!(
            controller.handle_key(&model, press(KeyCode::Char(' '))),
            Some(Message::ToggleColumnVisibility)
        );
        assert_eq!(
            controller.handle_key(&model, press(KeyCode::Esc)),
            Some(Message::Exit)
        );
    }

    #[test]
    fn confirmation_accepts_y_and_n() {
        assert_eq!(
            Controller::confirm_key(press(KeyCode::Char('y'))),
            Some(Message::Confirm)
        );
        assert_eq!(
            Controller::confirm_key(press(KeyCode::Char('n'))),
            Some(Message::Cancel)
        );
        assert_eq!(
            Controller::confirm_key(press(KeyCode::Esc)),
            Some(Message::Cancel)
        );
        assert_eq!(Controller::confirm_key(press(KeyCode::Char('z'))), None);
    }
}
