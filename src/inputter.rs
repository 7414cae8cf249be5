use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

/// Line editor for the command line: plain text with a movable cursor.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize, // Cursor position in characters, not bytes
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, KeyModifiers::NONE) => self.enter(),
            (KeyCode::Esc, KeyModifiers::NONE) => self.escape(),
            (KeyCode::Backspace, KeyModifiers::NONE) => self.backspace(),
            (KeyCode::Delete, KeyModifiers::NONE) => self.delete(),
            (KeyCode::Left, KeyModifiers::NONE) => self.left(),
            (KeyCode::Right, KeyModifiers::NONE) => self.right(),
            (KeyCode::Home, KeyModifiers::NONE) => self.home(),
            (KeyCode::End, KeyModifiers::NONE) => self.end(),
            (kc, km) => self.key(kc, km),
        }
    }

    /// Prefills the line and puts the cursor behind it.
    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
        }
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let pos = self.getbytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn delete(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            let pos = self.getbytepos();
            self.current_input.remove(pos);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, _modifier: KeyModifiers) -> InputResult {
        if let Some(chr) = code.as_char() {
            let pos = self.getbytepos();
            self.current_input.insert(pos, chr);
            self.curser_pos += 1;
        }
        self.get()
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(inputter: &mut Inputter, code: KeyCode) -> InputResult {
        inputter.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(inputter: &mut Inputter, text: &str) {
        for c in text.chars() {
            press(inputter, KeyCode::Char(c));
        }
    }

    #[test]
    fn collects_typed_characters_until_enter() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "hello");
        assert!(!inputter.get().finished);

        let result = press(&mut inputter, KeyCode::Enter);
        assert!(result.finished);
        assert!(!result.canceled);
        assert_eq!(result.input, "hello");
    }

    #[test]
    fn escape_cancels_and_discards_the_input() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "hello");
        let result = press(&mut inputter, KeyCode::Esc);
        assert!(result.finished && result.canceled);
        assert_eq!(result.input, "");
    }

    #[test]
    fn backspace_and_delete_edit_at_the_cursor() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "abcd");
        press(&mut inputter, KeyCode::Left);
        press(&mut inputter, KeyCode::Left);

        press(&mut inputter, KeyCode::Backspace);
        assert_eq!(inputter.get().input, "acd");
        press(&mut inputter, KeyCode::Delete);
        assert_eq!(inputter.get().input, "ad");
        assert_eq!(inputter.get().curser_pos, 1);
    }

    #[test]
    fn insertion_respects_the_cursor_with_multibyte_text() {
        let mut inputter = Inputter::default();
        type_text(&mut inputter, "grüße");
        press(&mut inputter, KeyCode::Home);
        press(&mut inputter, KeyCode::Right);
        type_text(&mut inputter, "x");
        assert_eq!(inputter.get().input, "gxrüße");

        press(&mut inputter, KeyCode::End);
        press(&mut inputter, KeyCode::Backspace);
        assert_eq!(inputter.get().input, "gxrüß");
    }

    #[test]
    fn set_prefills_with_the_cursor_at_the_end() {
        let mut inputter = Inputter::default();
        inputter.set("query");
        type_text(&mut inputter, "!");
        assert_eq!(inputter.get().input, "query!");
    }
}
