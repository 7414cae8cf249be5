use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::Line;
use ratatui::widgets::{
    Block, Cell, Clear, Paragraph, Row as TableRow, Table, TableState, Wrap,
};

use crate::domain::StatusLevel;
use crate::model::{Model, Modus, Status};
use crate::store::SortDirection;

pub const STATUSLINE_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGHT: u16 = 1;

const SORT_ASC_MARKER: &str = " ▲";
const SORT_DESC_MARKER: &str = " ▼";

#[derive(Default)]
pub struct UI;

impl UI {
    pub fn new() -> Self {
        UI
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        let [main, statusline, cmdline] = Layout::vertical([
            Constraint::Min(1),
            Constraint::Length(STATUSLINE_HEIGHT),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        match model.base_modus() {
            Modus::COLUMNS => self.draw_column_manager(model, frame, main),
            _ => self.draw_table(model, frame, main),
        }
        self.draw_statusline(model, frame, statusline);
        self.draw_cmdline(model, frame, cmdline);

        match model.modus() {
            Modus::POPUP => self.draw_popup(model, frame),
            Modus::CONFIRM => self.draw_confirm(model, frame),
            _ => {}
        }
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let view = model.view();
        let store = model.store();
        let (curser_row, curser_column) = model.curser();

        let header = TableRow::new(view.columns.iter().map(|column| {
            let mut label = column.label.clone();
            if store.sort_column() == Some(column.id.as_str()) {
                label.push_str(match store.sort_direction() {
                    SortDirection::Ascending => SORT_ASC_MARKER,
                    SortDirection::Descending => SORT_DESC_MARKER,
                });
            }
            Cell::from(label).style(Style::new().add_modifier(Modifier::BOLD))
        }));

        let rows = view.row_indices.iter().map(|&idx| {
            let row = &store.rows()[idx];
            TableRow::new(view.columns.iter().map(|column| {
                Cell::from(row.field(&column.id).map(|f| f.render()).unwrap_or_default())
            }))
        });

        let widths = vec![Constraint::Fill(1); view.columns.len().max(1)];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::bordered().title(" tdm "))
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED))
            .cell_highlight_style(Style::new().bg(Color::Yellow).fg(Color::Black));

        let mut state = TableState::default();
        if view.page_row_count() > 0 {
            state.select(Some(curser_row));
            state.select_column(Some(curser_column));
        }
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_column_manager(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let header = TableRow::new(["", "Id", "Label", "Sortable"])
            .style(Style::new().add_modifier(Modifier::BOLD));
        let rows = model.store().columns().iter().map(|column| {
            TableRow::new([
                Cell::from(if column.visible { "[x]" } else { "[ ]" }),
                Cell::from(column.id.clone()),
                Cell::from(column.label.clone()),
                Cell::from(if column.sortable { "yes" } else { "no" }),
            ])
        });

        let widths = [
            Constraint::Length(4),
            Constraint::Fill(1),
            Constraint::Fill(1),
            Constraint::Length(8),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .block(Block::bordered().title(" Columns "))
            .row_highlight_style(Style::new().add_modifier(Modifier::REVERSED));

        let mut state = TableState::default();
        state.select(Some(model.columns_curser()));
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn draw_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let [left, right] =
            Layout::horizontal([Constraint::Min(1), Constraint::Length(32)]).areas(area);

        let (message, level) = model.status_line();
        let style = match level {
            StatusLevel::Info => Style::new(),
            StatusLevel::Warning => Style::new().fg(Color::Yellow),
            StatusLevel::Error => Style::new().fg(Color::Red),
        };
        frame.render_widget(Paragraph::new(message).style(style), left);

        let (page, pages) = model.page_info();
        let mut info = format!("Page {page}/{pages} | {} rows", model.view().total_matches);
        if model.status == Status::LOADING {
            info = format!("Loading... | {info}");
        }
        frame.render_widget(
            Paragraph::new(info).right_aligned().dim(),
            right,
        );
    }

    fn draw_cmdline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if model.active_cmdinput() {
            let prompt = model.cmd_prompt();
            let input = model.cmd_input();
            frame.render_widget(
                Paragraph::new(format!("{prompt}{}", input.input)),
                area,
            );
            // Put the terminal cursor where the next character lands
            let x = area
                .x
                .saturating_add(prompt.chars().count() as u16)
                .saturating_add(input.curser_pos as u16)
                .min(area.right().saturating_sub(1));
            frame.set_cursor_position((x, area.y));
            return;
        }

        let hints = match model.modus() {
            Modus::COLUMNS => "Space toggle | a add | d delete | q back",
            Modus::CONFIRM => "y confirm | n cancel",
            _ => "q quit | / search | g page | s/S sort | c columns | i import | e export | ? help",
        };
        frame.render_widget(Paragraph::new(Line::from(hints).dim()), area);
    }

    fn draw_popup(&self, model: &Model, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 60, 80);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(model.popup_text())
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(" Help ")),
            area,
        );
    }

    fn draw_confirm(&self, model: &Model, frame: &mut Frame) {
        let area = centered_rect(frame.area(), 50, 20);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(model.confirm_text())
                .wrap(Wrap { trim: true })
                .block(
                    Block::bordered()
                        .title(" Confirm ")
                        .border_style(Style::new().fg(Color::Red)),
                ),
            area,
        );
    }
}

fn centered_rect(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let [mid] = Layout::vertical([Constraint::Percentage(percent_y)])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Percentage(percent_x)])
        .flex(Flex::Center)
        .areas(mid);
    rect
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::domain::{Message, TdmConfig};

    fn render(model: &Model) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        let ui = UI::new();
        terminal.draw(|frame| ui.draw(model, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    fn model_with_file() -> Model {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.csv");
        std::fs::write(
            &path,
            "name,email,age,role\n\
             Jane,jane@example.com,30,Admin\n\
             Bob,bob@example.com,40,User\n",
        )
        .unwrap();
        Model::init(TdmConfig::default(), Some(path.as_path())).unwrap()
    }

    #[test]
    fn renders_headers_and_rows() {
        let model = model_with_file();
        let screen = render(&model);
        assert!(screen.contains("Name"));
        assert!(screen.contains("jane@example.com"));
        assert!(screen.contains("Page 1/1"));
    }

    #[test]
    fn sorted_column_carries_a_direction_marker() {
        let mut model = model_with_file();
        model.update(Some(Message::SortAscending)).unwrap();
        let screen = render(&model);
        assert!(screen.contains(SORT_ASC_MARKER.trim_start()));
    }

    #[test]
    fn empty_model_shows_the_import_hint() {
        let model = Model::init(TdmConfig::default(), None).unwrap();
        let screen = render(&model);
        assert!(screen.contains("No data loaded"));
        assert!(screen.contains("Page 1/1"));
    }

    #[test]
    fn help_popup_renders_over_the_table() {
        let mut model = model_with_file();
        model.update(Some(Message::Help)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("Key bindings"));
    }

    #[test]
    fn column_manager_lists_every_column() {
        let mut model = model_with_file();
        model.update(Some(Message::OpenColumnManager)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("[x]"));
        assert!(screen.contains("email"));
        assert!(screen.contains("a add"));
    }

    #[test]
    fn command_line_shows_the_prompt() {
        let mut model = model_with_file();
        model.update(Some(Message::EnterSearch)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("Search: "));
    }
}
