//! Main application logic for the terminal user interface.
//!
//! `App` is a view over a [`Store`]: it keeps only the transient input text,
//! the active filter, and selection. The visible rows are derived from the
//! store with [`apply_filter`] and recomputed when a store observer marks
//! them stale or the filter changes.

use std::cell::Cell;
use std::io;
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use tracing::warn;

use crate::db::Storage;
use crate::fields::Filter;
use crate::store::{apply_filter, compute_counts, Store};
use crate::task::Task;
use crate::tui::{
    colors::{filter_color, text_on, DARK_RED},
    enums::AppState,
    input::InputField,
    utils::centered_rect,
};

/// Terminal view over a task store.
pub struct App<S: Storage> {
    state: AppState,
    store: Store<S>,
    input: InputField,
    filter: Filter,
    visible: Vec<String>,
    list_state: ListState,
    status_message: String,
    pending_delete: Option<String>,
    stale: Rc<Cell<bool>>,
}

impl<S: Storage> App<S> {
    /// Wrap a store and subscribe to its changes.
    pub fn new(mut store: Store<S>) -> Self {
        let stale = Rc::new(Cell::new(true));
        let flag = Rc::clone(&stale);
        store.subscribe(Box::new(move |_: &[Task]| flag.set(true)));

        let mut app = App {
            state: AppState::TaskList,
            store,
            input: InputField::new(),
            filter: Filter::default(),
            visible: Vec::new(),
            list_state: ListState::default(),
            status_message: String::new(),
            pending_delete: None,
            stale,
        };
        app.refresh_if_stale();
        app
    }

    pub fn store(&self) -> &Store<S> {
        &self.store
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn input_text(&self) -> &str {
        &self.input.value
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    /// Ids of the rows currently shown, in order.
    pub fn visible_ids(&self) -> &[String] {
        &self.visible
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.list_state
            .selected()
            .and_then(|idx| self.visible.get(idx))
            .map(String::as_str)
    }

    /// Recompute the visible rows if the store changed since the last pass.
    ///
    /// Keeps the selection on the same task when it is still visible.
    fn refresh_if_stale(&mut self) {
        if !self.stale.replace(false) {
            return;
        }
        let old_selected = self.selected_id().map(str::to_string);

        self.visible = apply_filter(self.store.tasks(), self.filter)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();

        let restored = old_selected.and_then(|id| self.visible.iter().position(|v| *v == id));
        match (restored, self.list_state.selected()) {
            (Some(idx), _) => self.list_state.select(Some(idx)),
            _ if self.visible.is_empty() => self.list_state.select(None),
            (None, Some(idx)) => self.list_state.select(Some(idx.min(self.visible.len() - 1))),
            (None, None) => self.list_state.select(Some(0)),
        }
    }

    fn set_filter(&mut self, filter: Filter) {
        if self.filter != filter {
            self.filter = filter;
            self.stale.set(true);
            self.refresh_if_stale();
        }
    }

    fn select_task(&mut self, id: &str) {
        if let Some(idx) = self.visible.iter().position(|v| v == id) {
            self.list_state.select(Some(idx));
        }
    }

    fn set_status_message(&mut self, msg: String) {
        self.status_message = msg;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
    }

    /// Submit the input box. Blank input never reaches the store.
    fn submit_input(&mut self) {
        if self.input.is_blank() {
            return;
        }
        match self.store.add(&self.input.value) {
            Ok(Some(task)) => {
                let id = task.id.clone();
                let text = task.text.clone();
                self.input.clear();
                self.refresh_if_stale();
                self.select_task(&id);
                self.set_status_message(format!("Added: {}", text));
            }
            Ok(None) => {}
            Err(e) => {
                self.input.clear();
                self.refresh_if_stale();
                self.set_status_message(format!("Error saving tasks: {:#}", e));
            }
        }
    }

    fn toggle_selected(&mut self) {
        let Some(id) = self.selected_id().map(str::to_string) else {
            return;
        };
        if let Err(e) = self.store.toggle_complete(&id) {
            self.set_status_message(format!("Error saving tasks: {:#}", e));
        }
        self.refresh_if_stale();
    }

    fn delete_pending(&mut self) {
        let Some(id) = self.pending_delete.take() else {
            return;
        };
        let text = self.store.get(&id).map(|t| t.text.clone()).unwrap_or_default();
        match self.store.delete(&id) {
            Ok(true) => self.set_status_message(format!("Deleted: {}", text)),
            Ok(false) => {}
            Err(e) => self.set_status_message(format!("Error saving tasks: {:#}", e)),
        }
        self.refresh_if_stale();
    }

    fn move_selection(&mut self, down: bool) {
        if self.visible.is_empty() {
            return;
        }
        let next = match self.list_state.selected() {
            None => 0,
            Some(idx) if down => (idx + 1).min(self.visible.len() - 1),
            Some(idx) => idx.saturating_sub(1),
        };
        self.list_state.select(Some(next));
    }

    /// Handle a key on the task list. Returns true if the app should quit.
    fn handle_task_list_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        match key {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('q') | KeyCode::Esc => return true,

            KeyCode::Char('a') | KeyCode::Char('i') => {
                self.state = AppState::Input;
                self.input.active = true;
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(false),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(true),
            KeyCode::Char(' ') | KeyCode::Char('x') | KeyCode::Enter => self.toggle_selected(),
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_id().map(str::to_string) {
                    self.pending_delete = Some(id);
                    self.state = AppState::Confirm;
                }
            }
            KeyCode::Char('1') => self.set_filter(Filter::All),
            KeyCode::Char('2') => self.set_filter(Filter::Active),
            KeyCode::Char('3') => self.set_filter(Filter::Completed),
            KeyCode::Tab => self.set_filter(self.filter.next()),
            KeyCode::BackTab => self.set_filter(self.filter.prev()),
            KeyCode::Char('h') | KeyCode::F(1) => self.state = AppState::Help,
            _ => {}
        }
        false
    }

    /// Handle a key while typing a new task. Returns true if the app should quit.
    fn handle_text_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> bool {
        match key {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Esc => {
                self.state = AppState::TaskList;
                self.input.active = false;
            }
            KeyCode::Enter => self.submit_input(),
            KeyCode::Backspace => self.input.handle_backspace(),
            KeyCode::Delete => self.input.handle_delete(),
            KeyCode::Left => self.input.move_cursor_left(),
            KeyCode::Right => self.input.move_cursor_right(),
            KeyCode::Home => self.input.move_cursor_home(),
            KeyCode::End => self.input.move_cursor_end(),
            KeyCode::Char(c) => self.input.handle_char(c),
            _ => {}
        }
        false
    }

    fn handle_confirm_input(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.delete_pending();
                self.state = AppState::TaskList;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.pending_delete = None;
                self.state = AppState::TaskList;
            }
            _ => {}
        }
        false
    }

    /// Dispatch one key event. Returns true if the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        self.clear_status_message();

        let should_quit = match self.state {
            AppState::TaskList => self.handle_task_list_input(key.code, key.modifiers),
            AppState::Input => self.handle_text_input(key.code, key.modifiers),
            AppState::Help => {
                self.state = AppState::TaskList;
                false
            }
            AppState::Confirm => self.handle_confirm_input(key.code),
        };
        self.refresh_if_stale();
        should_quit
    }

    /// Poll for and handle keyboard events. Returns true if the app should quit.
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return Ok(self.handle_key(key));
            }
        }
        Ok(false)
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let header = Paragraph::new(Line::from(vec![Span::styled(
            "MY TODO LIST",
            Style::default().add_modifier(Modifier::BOLD),
        )]))
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Center);
        f.render_widget(header, area);
    }

    fn render_input(&self, f: &mut Frame, area: Rect) {
        let editing = self.input.active;
        let inner_width = usize::from(area.width.saturating_sub(2));
        let (shown, column) = self.input.scrolled(inner_width);
        let (text, style) = if self.input.value.is_empty() && !editing {
            ("Add a new todo... (press 'a')".to_string(), Style::default().fg(Color::DarkGray))
        } else {
            (shown, Style::default())
        };
        let border_style = if editing {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default()
        };

        let input = Paragraph::new(text).style(style).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title("New task"),
        );
        f.render_widget(input, area);

        if editing {
            let column = u16::try_from(column).unwrap_or(u16::MAX);
            let x = area.x.saturating_add(1).saturating_add(column);
            f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
        }
    }

    fn render_filters(&self, f: &mut Frame, area: Rect) {
        let counts = compute_counts(self.store.tasks());
        let titles: Vec<Line> = Filter::SELECTORS
            .iter()
            .map(|filter| Line::from(format!("{} ({})", filter.label(), filter.count(&counts))))
            .collect();
        let selected = Filter::SELECTORS
            .iter()
            .position(|s| *s == self.filter)
            .unwrap_or(0);
        let accent = filter_color(self.filter);

        let tabs = Tabs::new(titles)
            .select(selected)
            .block(Block::default().borders(Borders::ALL).title("Filter (1/2/3, Tab)"))
            .highlight_style(
                Style::default()
                    .bg(accent)
                    .fg(text_on(accent))
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(tabs, area);
    }

    fn render_task_list(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!("Tasks ({}/{}) - Press 'h' for help", self.visible.len(), self.store.len()));

        if self.visible.is_empty() {
            let empty = Paragraph::new(Line::from(Span::styled(
                self.filter.empty_message(),
                Style::default().add_modifier(Modifier::ITALIC),
            )))
            .block(block)
            .alignment(Alignment::Center);
            f.render_widget(empty, area);
            return;
        }

        let items: Vec<ListItem> = self
            .visible
            .iter()
            .filter_map(|id| self.store.get(id))
            .map(|task| {
                let (mark, style) = if task.completed {
                    (
                        "[x] ",
                        Style::default()
                            .fg(Color::DarkGray)
                            .add_modifier(Modifier::CROSSED_OUT),
                    )
                } else {
                    ("[ ] ", Style::default().fg(Color::White))
                };
                ListItem::new(Line::from(vec![
                    Span::raw(mark),
                    Span::styled(task.text.clone(), style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");
        f.render_stateful_widget(list, area, &mut self.list_state);
    }

    fn render_help(&self, f: &mut Frame, area: Rect) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let help_text = vec![
            Line::from(Span::styled("Todo Help", bold)),
            Line::from(""),
            Line::from(Span::styled("Task List:", bold)),
            Line::from("  ↑/↓ k/j      Move selection"),
            Line::from("  a/i          Type a new task"),
            Line::from("  Space/x/Enter Toggle complete"),
            Line::from("  d/Delete     Delete selected task"),
            Line::from("  1/2/3        Show all/active/completed"),
            Line::from("  Tab/Shift+Tab Cycle filter"),
            Line::from("  h/F1         Show this help"),
            Line::from("  q/Esc/Ctrl+C Quit"),
            Line::from(""),
            Line::from(Span::styled("New Task:", bold)),
            Line::from("  Enter        Add task"),
            Line::from("  Esc          Back to the list"),
        ];

        let area = centered_rect(60, 70, area);
        f.render_widget(Clear, area);
        let paragraph = Paragraph::new(help_text)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Help - Press any key to return"),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn render_confirm(&self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Confirm Action")
            .borders(Borders::ALL)
            .style(Style::default().bg(DARK_RED));

        let area = centered_rect(50, 30, area);
        f.render_widget(Clear, area);

        let target = self
            .pending_delete
            .as_deref()
            .and_then(|id| self.store.get(id))
            .map(|t| t.text.as_str())
            .unwrap_or("");
        let text = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Delete this task?",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(target.to_string()),
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ];

        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let status_text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            match self.state {
                AppState::TaskList => format!(
                    "{} | a: add  space: toggle  d: delete  h: help",
                    self.filter.label()
                ),
                AppState::Input => "New task: Enter to add, Esc to return".to_string(),
                AppState::Help => "Help".to_string(),
                AppState::Confirm => "Confirm Action".to_string(),
            }
        };

        let accent = filter_color(self.filter);
        let status = Paragraph::new(status_text)
            .style(Style::default().bg(accent).fg(text_on(accent)))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Draw the whole screen.
    pub fn render(&mut self, f: &mut Frame) {
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)])
            .split(f.area());
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // header
                Constraint::Length(3), // input
                Constraint::Length(3), // filters
                Constraint::Min(0),    // list
            ])
            .split(outer[0]);

        self.render_header(f, chunks[0]);
        self.render_input(f, chunks[1]);
        self.render_filters(f, chunks[2]);
        self.render_task_list(f, chunks[3]);

        match self.state {
            AppState::Help => self.render_help(f, outer[0]),
            AppState::Confirm => self.render_confirm(f, outer[0]),
            AppState::TaskList | AppState::Input => {}
        }

        self.render_status_bar(f, outer[1]);
    }

    /// Main event loop. Runs until the user quits.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            self.refresh_if_stale();
            terminal.draw(|f| self.render(f))?;

            match self.handle_input() {
                Ok(true) => break,
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "terminal input failed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
