use crate::export::export_notes;
use crate::gateway::FilePicker;
use crate::model::{Note, NoteField};
use crate::profile::expand_home;
use crate::session::{
    Confirmation, DocumentSession, Interaction, Outcome, SessionError, SessionState,
};
use crate::settings::{Settings, ThemeMode};
use anyhow::Result;
use chrono::Local;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{self, stdout, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

type Tui = Terminal<CrosstermBackend<Stdout>>;

pub fn run(session: DocumentSession) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut app = App::new(session);
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    session: DocumentSession,
    settings: Settings,
    palette: Palette,
    mode: Mode,
    pane: PaneView,
    search: String,
    last_sync: Option<Instant>,
    status: String,
    /// Last rendered frame, shown behind modal prompts.
    backdrop: Buffer,
}

enum Mode {
    Normal,
    Search(FieldValue),
    Editing(NoteForm),
    ConfirmDelete { note_id: String },
    ConfirmQuit,
    Settings(SettingsRow),
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum PaneView {
    Edit,
    Split,
    Preview,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FileAction {
    Open,
    New,
    Save,
    SaveAs,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum SettingsRow {
    Accent,
    Theme,
    FontSize,
    EditorFontSize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Palette {
    bg: Color,
    fg: Color,
    muted: Color,
    panel: Color,
    accent: Color,
    danger: Color,
}

struct NoteForm {
    note_id: String,
    title: FieldValue,
    content: FieldValue,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Title,
    Content,
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl PaneView {
    fn label(&self) -> &'static str {
        match self {
            PaneView::Edit => "Edit",
            PaneView::Split => "Split",
            PaneView::Preview => "Preview",
        }
    }

    fn next(self) -> Self {
        match self {
            PaneView::Edit => PaneView::Split,
            PaneView::Split => PaneView::Preview,
            PaneView::Preview => PaneView::Edit,
        }
    }
}

impl FileAction {
    fn label(&self) -> &'static str {
        match self {
            FileAction::Open => "Open",
            FileAction::New => "New file",
            FileAction::Save => "Save",
            FileAction::SaveAs => "Save as",
        }
    }
}

impl SettingsRow {
    const ALL: [SettingsRow; 4] = [
        SettingsRow::Accent,
        SettingsRow::Theme,
        SettingsRow::FontSize,
        SettingsRow::EditorFontSize,
    ];

    fn index(self) -> usize {
        SettingsRow::ALL.iter().position(|r| *r == self).unwrap_or(0)
    }

    fn step(self, delta: isize) -> Self {
        let len = SettingsRow::ALL.len() as isize;
        let idx = (self.index() as isize + delta).rem_euclid(len) as usize;
        SettingsRow::ALL[idx]
    }

    fn label(&self) -> &'static str {
        match self {
            SettingsRow::Accent => "Accent color",
            SettingsRow::Theme => "Theme",
            SettingsRow::FontSize => "Interface size",
            SettingsRow::EditorFontSize => "Editor font size",
        }
    }

    fn value(&self, settings: &Settings) -> String {
        match self {
            SettingsRow::Accent => {
                format!("{} ({})", settings.accent_name(), settings.primary_color)
            }
            SettingsRow::Theme => settings.theme_mode.label().to_string(),
            SettingsRow::FontSize => format!("{}px", settings.font_size),
            SettingsRow::EditorFontSize => format!("{}px", settings.editor_font_size),
        }
    }

    fn adjust(&self, settings: &mut Settings, forward: bool) {
        let delta = if forward { 1 } else { -1 };
        match self {
            SettingsRow::Accent => settings.cycle_accent(forward),
            SettingsRow::Theme => {
                settings.theme_mode = if forward {
                    settings.theme_mode.next()
                } else {
                    settings.theme_mode.prev()
                }
            }
            SettingsRow::FontSize => settings.step_font_size(delta),
            SettingsRow::EditorFontSize => settings.step_editor_font_size(delta),
        }
    }
}

impl Palette {
    fn from_settings(settings: &Settings) -> Self {
        let accent = settings
            .accent_rgb()
            .map(|(r, g, b)| Color::Rgb(r, g, b))
            .unwrap_or(Color::Cyan);
        match settings.theme_mode {
            ThemeMode::Light => Palette {
                bg: Color::Rgb(250, 250, 252),
                fg: Color::Rgb(24, 24, 32),
                muted: Color::Rgb(110, 112, 124),
                panel: Color::Rgb(236, 237, 242),
                accent,
                danger: Color::Rgb(220, 38, 38),
            },
            ThemeMode::Dark => Palette {
                bg: Color::Rgb(16, 18, 24),
                fg: Color::Gray,
                muted: Color::DarkGray,
                panel: Color::Rgb(28, 30, 38),
                accent,
                danger: Color::LightRed,
            },
            ThemeMode::Matrix => Palette {
                bg: Color::Black,
                fg: Color::Rgb(0, 255, 65),
                muted: Color::Rgb(0, 140, 40),
                panel: Color::Rgb(0, 24, 8),
                accent: Color::Rgb(0, 255, 65),
                danger: Color::LightRed,
            },
        }
    }
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn move_up(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx == 0 {
            return;
        }
        let target_start = line_starts[line_idx - 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    fn move_down(&mut self) {
        let (line_starts, line_idx, col) = line_state(&self.value, self.cursor);
        if line_idx + 1 >= line_starts.len() {
            return;
        }
        let target_start = line_starts[line_idx + 1];
        self.cursor = index_at_col(&self.value, target_start, col);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }

    fn edit(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left => self.move_left(),
            KeyCode::Right => self.move_right(),
            KeyCode::Up => self.move_up(),
            KeyCode::Down => self.move_down(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    self.insert_char(c);
                }
            }
            _ => {}
        }
    }
}

impl NoteForm {
    fn from_note(note: &Note, field: FormField) -> Self {
        NoteForm {
            note_id: note.id.clone(),
            title: FieldValue::new(&note.title),
            content: FieldValue::new(&note.content),
            field,
        }
    }

    fn toggle_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Content,
            FormField::Content => FormField::Title,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            FormField::Title => &mut self.title,
            FormField::Content => &mut self.content,
        }
    }
}

impl App {
    fn new(mut session: DocumentSession) -> Self {
        let settings = session.load_settings();
        App {
            palette: Palette::from_settings(&settings),
            settings,
            session,
            mode: Mode::Normal,
            pane: PaneView::Split,
            search: String::new(),
            last_sync: None,
            status: "Press o to open a note file or n to create one".into(),
            backdrop: Buffer::empty(Rect::default()),
        }
    }

    fn event_loop(&mut self, terminal: &mut Tui) -> Result<()> {
        loop {
            let frame = terminal.draw(|f| self.draw(f))?;
            self.backdrop = frame.buffer.clone();
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key, terminal)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> Result<bool> {
        let save_shortcut = key.code == KeyCode::Char('s')
            && key.modifiers.contains(KeyModifiers::CONTROL);
        if save_shortcut && matches!(self.mode, Mode::Normal | Mode::Editing(_)) {
            self.commit_editing();
            self.file_action(terminal, FileAction::Save)?;
            return Ok(false);
        }
        match self.mode {
            Mode::Normal => self.handle_normal_key(key, terminal),
            Mode::Search(_) => {
                self.handle_search_key(key);
                Ok(false)
            }
            Mode::Editing(_) => {
                self.handle_form_key(key);
                Ok(false)
            }
            Mode::ConfirmDelete { .. } => {
                self.handle_confirm_delete_key(key);
                Ok(false)
            }
            Mode::ConfirmQuit => Ok(self.handle_confirm_quit_key(key)),
            Mode::Settings(_) => {
                self.handle_settings_key(key);
                Ok(false)
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent, terminal: &mut Tui) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => {
                if !self.session.is_dirty() {
                    return Ok(true);
                }
                self.mode = Mode::ConfirmQuit;
                self.status = "Unsaved changes. Quit anyway? (y to quit, n/Esc to stay)".into();
            }
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Enter | KeyCode::Char('e') => self.start_editing(FormField::Content),
            KeyCode::Char('a') => {
                self.search.clear();
                let id = self.session.add_note(None, None).id.clone();
                self.start_editing(FormField::Title);
                self.status = format!("Created note {}", id);
            }
            KeyCode::Char('d') => match self.session.active_note() {
                Some(note) => {
                    self.status = format!(
                        "Delete \"{}\"? (y to confirm, n/Esc to cancel)",
                        note.display_title()
                    );
                    self.mode = Mode::ConfirmDelete {
                        note_id: note.id.clone(),
                    };
                }
                None => self.status = "No note selected to delete".into(),
            },
            KeyCode::Char('o') => self.file_action(terminal, FileAction::Open)?,
            KeyCode::Char('n') => self.file_action(terminal, FileAction::New)?,
            KeyCode::Char('s') => self.file_action(terminal, FileAction::Save)?,
            KeyCode::Char('S') => self.file_action(terminal, FileAction::SaveAs)?,
            KeyCode::Char('x') => self.export(terminal)?,
            KeyCode::Char('/') => {
                self.mode = Mode::Search(FieldValue::new(&self.search));
                self.status = "Type to filter notes, Enter to keep, Esc to clear".into();
            }
            KeyCode::Esc => {
                if !self.search.is_empty() {
                    self.search.clear();
                    self.status = "Search cleared".into();
                }
            }
            KeyCode::Char('v') => {
                self.pane = self.pane.next();
                self.status = format!("Switched to {} view", self.pane.label());
            }
            KeyCode::Char(',') => {
                self.mode = Mode::Settings(SettingsRow::Accent);
                self.status = "↑↓ choose, ←→ change, r reset, Esc close".into();
            }
            _ => {}
        }
        Ok(false)
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut keep_open = true;
        if let Mode::Search(field) = &mut mode {
            match key.code {
                KeyCode::Esc => {
                    field.value.clear();
                    field.cursor = 0;
                    keep_open = false;
                    self.status = "Search cleared".into();
                }
                KeyCode::Enter => {
                    keep_open = false;
                    self.status = format!("Filtering by \"{}\"", field.value);
                }
                _ => field.edit(key),
            }
            self.search = field.value.clone();
        }
        self.mode = if keep_open { mode } else { Mode::Normal };
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let mut close_form = false;
        if let Mode::Editing(form) = &mut mode {
            match key.code {
                KeyCode::Esc => close_form = true,
                KeyCode::Tab | KeyCode::BackTab => form.toggle_field(),
                KeyCode::Enter => {
                    if form.field == FormField::Title {
                        form.field = FormField::Content;
                    } else {
                        form.content.insert_char('\n');
                    }
                }
                _ => form.active_field_mut().edit(key),
            }
            if close_form {
                let (id, title, content) = (
                    form.note_id.clone(),
                    form.title.value.clone(),
                    form.content.value.clone(),
                );
                if self.apply_edits(&id, title, content) {
                    self.status = "Note updated (unsaved)".into();
                } else {
                    self.status = "No changes".into();
                }
            }
        }
        self.mode = if close_form { Mode::Normal } else { mode };
    }

    fn handle_confirm_delete_key(&mut self, key: KeyEvent) {
        let note_id = match &self.mode {
            Mode::ConfirmDelete { note_id } => note_id.clone(),
            _ => return,
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                if self.session.delete_note(&note_id) {
                    self.status = format!("Deleted {} (unsaved)", note_id);
                } else {
                    self.status = format!("Note {} no longer exists", note_id);
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn handle_confirm_quit_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('y') => true,
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Quit canceled".into();
                self.mode = Mode::Normal;
                false
            }
            _ => false,
        }
    }

    fn handle_settings_key(&mut self, key: KeyEvent) {
        let Mode::Settings(row) = self.mode else {
            return;
        };
        let mut next = self.settings.clone();
        match key.code {
            KeyCode::Esc | KeyCode::Char(',') | KeyCode::Char('q') => {
                self.mode = Mode::Normal;
                self.status = "Settings closed".into();
                return;
            }
            KeyCode::Up | KeyCode::Char('k') => self.mode = Mode::Settings(row.step(-1)),
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.mode = Mode::Settings(row.step(1))
            }
            KeyCode::Left | KeyCode::Char('h') => row.adjust(&mut next, false),
            KeyCode::Right | KeyCode::Char('l') | KeyCode::Enter => row.adjust(&mut next, true),
            KeyCode::Char('r') => next = Settings::default(),
            _ => {}
        }
        if next != self.settings {
            self.apply_settings(next);
        }
    }

    /// Settings take effect immediately; a failed write is reported but does
    /// not roll them back.
    fn apply_settings(&mut self, settings: Settings) {
        self.settings = settings;
        self.palette = Palette::from_settings(&self.settings);
        self.status = match self.session.save_settings(&self.settings) {
            Ok(()) => "Settings saved".into(),
            Err(err) => format!("Settings applied but not saved: {}", err),
        };
    }

    fn move_selection(&mut self, delta: isize) {
        let visible: Vec<String> = self
            .session
            .store()
            .search(&self.search)
            .iter()
            .map(|n| n.id.clone())
            .collect();
        if visible.is_empty() {
            return;
        }
        let current = self
            .session
            .active_id()
            .and_then(|id| visible.iter().position(|v| v == id));
        let next = match current {
            Some(pos) => (pos as isize + delta).clamp(0, visible.len() as isize - 1) as usize,
            None => 0,
        };
        self.session.select(Some(&visible[next]));
    }

    fn start_editing(&mut self, field: FormField) {
        match self.session.active_note() {
            Some(note) => {
                self.mode = Mode::Editing(NoteForm::from_note(note, field));
                self.status = "Editing (Tab switch field, Esc done, Ctrl+S save)".into();
            }
            None => self.status = "No note selected".into(),
        }
    }

    fn commit_editing(&mut self) {
        if let Mode::Editing(form) = &self.mode {
            let (id, title, content) = (
                form.note_id.clone(),
                form.title.value.clone(),
                form.content.value.clone(),
            );
            self.apply_edits(&id, title, content);
        }
    }

    /// Writes changed fields back to the note. Untouched fields are left alone
    /// so that merely viewing a note does not mark the file dirty.
    fn apply_edits(&mut self, id: &str, title: String, content: String) -> bool {
        let Some(note) = self.session.store().get(id) else {
            return false;
        };
        let title_changed = note.title != title;
        let content_changed = note.content != content;
        if title_changed {
            self.session.update_note(id, NoteField::Title, title);
        }
        if content_changed {
            self.session.update_note(id, NoteField::Content, content);
        }
        title_changed || content_changed
    }

    fn file_action(&mut self, terminal: &mut Tui, action: FileAction) -> Result<()> {
        let mut dialogs = Dialogs::new(terminal, self.backdrop.clone(), self.palette);
        let result = match action {
            FileAction::Open => self.session.open(&mut dialogs),
            FileAction::New => self.session.new_document(&mut dialogs),
            FileAction::Save => self.session.save(&mut dialogs),
            FileAction::SaveAs => self.session.save_as(&mut dialogs),
        };
        dialogs.finish()?;
        if matches!(result, Ok(Outcome::Completed))
            && matches!(action, FileAction::Open | FileAction::New)
        {
            self.mode = Mode::Normal;
            self.search.clear();
        }
        self.report(action, result);
        Ok(())
    }

    fn report(&mut self, action: FileAction, result: Result<Outcome, SessionError>) {
        self.status = match result {
            Ok(Outcome::Canceled) => format!("{} canceled", action.label()),
            Ok(Outcome::Completed) => {
                self.last_sync = Some(Instant::now());
                let name = self.session.display_name().unwrap_or("file");
                match action {
                    FileAction::Open => {
                        format!("Opened {} ({} notes)", name, self.session.store().len())
                    }
                    FileAction::New => format!("Created {}", name),
                    FileAction::Save | FileAction::SaveAs => format!("Saved {}", name),
                }
            }
            Err(err) => format!("{} failed: {}", action.label(), err),
        };
    }

    fn export(&mut self, terminal: &mut Tui) -> Result<()> {
        if self.session.store().is_empty() {
            self.status = "Nothing to export".into();
            return Ok(());
        }
        let mut dialogs = Dialogs::new(terminal, self.backdrop.clone(), self.palette);
        let dir = dialogs.ask_path("Export notes", "Directory for one .md file per note");
        dialogs.finish()?;
        self.status = match dir {
            None => "Export canceled".into(),
            Some(dir) => match export_notes(self.session.store().notes(), &dir) {
                Ok(written) => format!("Exported {} notes to {}", written.len(), dir.display()),
                Err(err) => format!("Export failed: {:#}", err),
            },
        };
        Ok(())
    }

    fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let p = self.palette;
        f.render_widget(
            Block::default().style(Style::default().bg(p.bg).fg(p.fg)),
            f.size(),
        );
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(layout[1]);
        self.draw_list(f, body[0]);
        self.draw_editor(f, body[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::ConfirmDelete { note_id } => self.draw_confirm_delete(f, note_id),
            Mode::ConfirmQuit => draw_confirm_box(
                f,
                p,
                "Unsaved changes",
                "You have unsaved changes. Quit without saving?",
            ),
            Mode::Settings(row) => self.draw_settings(f, *row),
            Mode::Normal | Mode::Search(_) | Mode::Editing(_) => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let p = self.palette;
        let mut spans = vec![
            Span::styled(
                "notefile ",
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ),
            match self.session.state() {
                SessionState::Bound { display_name, .. } => Span::styled(
                    display_name.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                SessionState::Empty => {
                    Span::styled("No file open", Style::default().fg(p.muted))
                }
            },
        ];
        if self.session.is_dirty() {
            spans.push(Span::styled(
                "  ● UNSAVED",
                Style::default().fg(p.danger).add_modifier(Modifier::BOLD),
            ));
        }
        spans.extend([
            Span::raw("  •  "),
            Span::styled(
                self.session
                    .backend_kind()
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "unbound".into()),
                Style::default().fg(p.muted),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("{} notes", self.session.store().len()),
                Style::default().fg(p.muted),
            ),
        ]);
        if let Some(last) = self.last_sync {
            spans.push(Span::raw("  •  "));
            spans.push(Span::styled(
                format!("synced {}", format_elapsed(last)),
                Style::default().fg(p.muted),
            ));
        }
        spans.push(Span::raw("  •  "));
        spans.push(Span::styled(
            format!("view {}", self.pane.label().to_lowercase()),
            Style::default().fg(p.accent),
        ));

        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(p.muted));
        let paragraph = Paragraph::new(Line::from(spans))
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_list(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let p = self.palette;
        let notes = self.session.store().search(&self.search);
        let title = match &self.mode {
            Mode::Search(field) => format!("Search: {}", field.with_caret()),
            _ if !self.search.is_empty() => {
                format!("Notes matching \"{}\" ({})", self.search, notes.len())
            }
            _ => format!("Notes ({})", notes.len()),
        };
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.muted))
            .style(Style::default().bg(p.panel));

        if notes.is_empty() {
            let mut lines = vec![Line::from(""), Line::from("No notes found")];
            if self.session.display_name().is_none() {
                lines.push(Line::from(Span::styled(
                    "Open a file to start",
                    Style::default().fg(p.muted),
                )));
            }
            let empty = Paragraph::new(lines)
                .alignment(Alignment::Center)
                .block(block);
            f.render_widget(empty, area);
            return;
        }

        let active = self.session.active_id();
        let width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = notes
            .iter()
            .map(|n| note_item(n, width, Some(n.id.as_str()) == active, p))
            .collect();
        let mut state = ListState::default();
        state.select(notes.iter().position(|n| Some(n.id.as_str()) == active));
        let list = List::new(items).block(block);
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_editor(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(note) = self.session.active_note() else {
            self.draw_welcome(f, area);
            return;
        };
        let form = match &self.mode {
            Mode::Editing(form) if form.note_id == note.id => Some(form),
            _ => None,
        };
        let (title, content) = match form {
            Some(form) => (form.title.value.as_str(), form.content.value.as_str()),
            None => (note.title.as_str(), note.content.as_str()),
        };
        match self.pane {
            PaneView::Edit => self.draw_source(f, area, note, form),
            PaneView::Preview => self.draw_preview(f, area, title, content),
            PaneView::Split => {
                let halves = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
                    .split(area);
                self.draw_source(f, halves[0], note, form);
                self.draw_preview(f, halves[1], title, content);
            }
        }
    }

    fn draw_source(
        &self,
        f: &mut ratatui::Frame<'_>,
        area: Rect,
        note: &Note,
        form: Option<&NoteForm>,
    ) {
        let p = self.palette;
        let (title, content, field) = match form {
            Some(form) => (form.title.clone(), form.content.clone(), Some(form.field)),
            None => (
                FieldValue::new(&note.title),
                FieldValue::new(&note.content),
                None,
            ),
        };
        let mut lines = field_lines("Title", &title, field == Some(FormField::Title), p);
        lines.push(Line::from(""));
        let title_rows = lines.len();
        lines.extend(field_lines(
            "",
            &content,
            field == Some(FormField::Content),
            p,
        ));

        let inner_height = area.height.saturating_sub(2) as usize;
        let caret_row = if field == Some(FormField::Content) {
            title_rows + line_state(&content.value, content.cursor).1
        } else {
            0
        };
        let scroll = caret_row.saturating_sub(inner_height.saturating_sub(1));

        let border = if form.is_some() { p.accent } else { p.muted };
        let block = Block::default()
            .title(Span::styled(
                format!("Markdown • {}px", self.settings.editor_font_size),
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ))
            .title(
                ratatui::widgets::block::Title::from(Span::styled(
                    format!("updated {}", format_timestamp(note)),
                    Style::default().fg(p.muted),
                ))
                .alignment(Alignment::Right),
            )
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border));
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((scroll as u16, 0));
        f.render_widget(paragraph, area);
    }

    fn draw_preview(&self, f: &mut ratatui::Frame<'_>, area: Rect, title: &str, content: &str) {
        let p = self.palette;
        let heading = if title.trim().is_empty() {
            crate::model::UNTITLED
        } else {
            title
        };
        let mut lines = vec![
            Line::from(Span::styled(
                heading.to_string(),
                Style::default()
                    .fg(p.fg)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )),
            Line::from(""),
        ];
        if content.trim().is_empty() {
            lines.push(Line::from(Span::styled(
                "Nothing to preview",
                Style::default().fg(p.muted).add_modifier(Modifier::ITALIC),
            )));
        } else {
            lines.extend(markdown_lines(content, p));
        }
        let block = Block::default()
            .title(Span::styled(
                "Preview",
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.muted));
        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        f.render_widget(paragraph, area);
    }

    fn draw_welcome(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let p = self.palette;
        let key = |k: &'static str| Span::styled(k, Style::default().fg(p.accent));
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                "Local notes",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Select a note from the list or create one with a.",
                Style::default().fg(p.muted),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "How it works:",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(vec![key("o"), Span::raw("  open a JSON note file")]),
            Line::from(vec![key("n"), Span::raw("  create a new note file")]),
            Line::from(vec![key("s / Ctrl+S"), Span::raw("  save changes")]),
        ];
        let paragraph = Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.muted)),
        );
        f.render_widget(paragraph, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let p = self.palette;
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(self.footer_help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(p.muted)),
            );
        f.render_widget(help_bar, rows[0]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(p.muted)),
            );
        f.render_widget(status, rows[1]);
    }

    fn footer_help_line(&self) -> Line<'static> {
        let p = self.palette;
        let key = |k: &'static str| Span::styled(k, Style::default().fg(p.accent));
        let danger = |k: &'static str| Span::styled(k, Style::default().fg(p.danger));
        let spans = match self.mode {
            Mode::Editing(_) => vec![
                key("Tab"),
                Span::raw(" title/body  "),
                key("←↑↓→"),
                Span::raw(" move  "),
                key("Esc"),
                Span::raw(" done  "),
                key("Ctrl+S"),
                Span::raw(" save"),
            ],
            Mode::Search(_) => vec![
                key("Enter"),
                Span::raw(" keep filter  "),
                key("Esc"),
                Span::raw(" clear"),
            ],
            Mode::Settings(_) => vec![
                key("↑↓"),
                Span::raw(" choose  "),
                key("←→"),
                Span::raw(" change  "),
                key("r"),
                Span::raw(" reset  "),
                key("Esc"),
                Span::raw(" close"),
            ],
            Mode::ConfirmDelete { .. } | Mode::ConfirmQuit => vec![
                danger("y"),
                Span::raw(" confirm  "),
                key("n/Esc"),
                Span::raw(" cancel"),
            ],
            Mode::Normal => vec![
                key("↑↓ / j k"),
                Span::raw(" select  "),
                key("a"),
                Span::raw(" add  "),
                key("e"),
                Span::raw(" edit  "),
                danger("d"),
                Span::raw(" delete  "),
                key("/"),
                Span::raw(" search  "),
                key("o"),
                Span::raw(" open  "),
                key("n"),
                Span::raw(" new  "),
                key("s/S"),
                Span::raw(" save/as  "),
                key("x"),
                Span::raw(" export  "),
                key("v"),
                Span::raw(" view  "),
                key(","),
                Span::raw(" settings  "),
                danger("q"),
                Span::raw(" quit"),
            ],
        };
        Line::from(spans)
    }

    fn draw_confirm_delete(&self, f: &mut ratatui::Frame<'_>, note_id: &str) {
        let title = self
            .session
            .store()
            .get(note_id)
            .map(|n| n.display_title().to_string())
            .unwrap_or_else(|| note_id.to_string());
        draw_confirm_box(
            f,
            self.palette,
            "Confirm Delete",
            &format!("Are you sure you want to delete \"{}\"?", title),
        );
    }

    fn draw_settings(&self, f: &mut ratatui::Frame<'_>, selected: SettingsRow) {
        let p = self.palette;
        let area = centered_rect(50, 40, f.size());
        let mut lines = vec![Line::from("")];
        for row in SettingsRow::ALL {
            let active = row == selected;
            let marker = if active { "▶ " } else { "  " };
            let label_style = if active {
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(p.fg)
            };
            lines.push(Line::from(vec![
                Span::styled(marker, Style::default().fg(p.accent)),
                Span::styled(format!("{:<18}", row.label()), label_style),
                Span::styled(
                    format!("‹ {} ›", row.value(&self.settings)),
                    Style::default().fg(if active { p.accent } else { p.muted }),
                ),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "Changes apply and save immediately",
            Style::default().fg(p.muted),
        )));
        let dialog = Paragraph::new(lines).block(
            Block::default()
                .title(Span::styled(
                    "Settings",
                    Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.accent))
                .style(Style::default().bg(p.panel).fg(p.fg)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

/// Modal prompts drawn over the last rendered frame. They block until the
/// user answers, the way a native dialog would.
struct Dialogs<'a> {
    terminal: &'a mut Tui,
    backdrop: Buffer,
    palette: Palette,
    failure: Option<io::Error>,
}

impl<'a> Dialogs<'a> {
    fn new(terminal: &'a mut Tui, backdrop: Buffer, palette: Palette) -> Self {
        Dialogs {
            terminal,
            backdrop,
            palette,
            failure: None,
        }
    }

    /// Surfaces a terminal failure that happened while a prompt was open.
    fn finish(self) -> Result<()> {
        match self.failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn render(&mut self, draw: impl FnOnce(&mut ratatui::Frame<'_>, Palette)) -> io::Result<()> {
        let backdrop = &self.backdrop;
        let palette = self.palette;
        self.terminal.draw(|f| {
            if backdrop.area == f.size() {
                f.buffer_mut().merge(backdrop);
            }
            draw(f, palette);
        })?;
        Ok(())
    }

    fn ask_yes_no(&mut self, title: &str, message: &str) -> bool {
        if self.failure.is_some() {
            return false;
        }
        loop {
            if let Err(err) = self.render(|f, p| draw_confirm_box(f, p, title, message)) {
                self.failure = Some(err);
                return false;
            }
            match next_key() {
                Ok(key) => match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => return true,
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => return false,
                    _ => {}
                },
                Err(err) => {
                    self.failure = Some(err);
                    return false;
                }
            }
        }
    }

    fn ask_path(&mut self, title: &str, hint: &str) -> Option<PathBuf> {
        if self.failure.is_some() {
            return None;
        }
        let mut field = FieldValue::new("");
        loop {
            if let Err(err) = self.render(|f, p| draw_input_box(f, p, title, hint, &field)) {
                self.failure = Some(err);
                return None;
            }
            let key = match next_key() {
                Ok(key) => key,
                Err(err) => {
                    self.failure = Some(err);
                    return None;
                }
            };
            match key.code {
                KeyCode::Esc => return None,
                KeyCode::Enter => {
                    let input = field.value.trim();
                    if !input.is_empty() {
                        return Some(expand_home(input));
                    }
                }
                KeyCode::Up | KeyCode::Down => {}
                _ => field.edit(key),
            }
        }
    }
}

impl FilePicker for Dialogs<'_> {
    fn pick_open_path(&mut self) -> Option<PathBuf> {
        self.ask_path("Open note file", "Path of an existing .json note file")
    }

    fn pick_save_path(&mut self) -> Option<PathBuf> {
        self.ask_path("Save note file", "Path for the .json note file")
    }
}

impl Interaction for Dialogs<'_> {
    fn confirm(&mut self, question: Confirmation) -> bool {
        self.ask_yes_no("Please confirm", question.message())
    }
}

fn next_key() -> io::Result<KeyEvent> {
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Press {
                return Ok(key);
            }
        }
    }
}

fn draw_confirm_box(f: &mut ratatui::Frame<'_>, p: Palette, title: &str, message: &str) {
    let area = centered_rect(50, 30, f.size());
    let body = vec![
        Line::from(""),
        Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(p.danger).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Press y to confirm, n or Esc to cancel"),
    ];
    let dialog = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .title(Span::styled(
                    title.to_string(),
                    Style::default().fg(p.danger).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(p.danger))
                .style(Style::default().bg(p.panel).fg(p.fg)),
        );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_input_box(
    f: &mut ratatui::Frame<'_>,
    p: Palette,
    title: &str,
    hint: &str,
    field: &FieldValue,
) {
    let area = centered_rect(60, 25, f.size());
    let mut lines = vec![
        Line::from(Span::styled(hint.to_string(), Style::default().fg(p.muted))),
        Line::from(""),
    ];
    lines.extend(field_lines("Path", field, true, p));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Enter to confirm • Esc to cancel",
        Style::default().fg(p.muted),
    )));
    let dialog = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .title(Span::styled(
                title.to_string(),
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.accent))
            .style(Style::default().bg(p.panel).fg(p.fg)),
    );
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

/// Renders the markdown subset that reads well in a terminal: headings,
/// lists, quotes, rules, fenced code, `inline code` and **bold**.
fn markdown_lines(text: &str, p: Palette) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code = false;
    let base = Style::default().fg(p.fg);
    for raw in text.lines() {
        let trimmed = raw.trim_start();
        if trimmed.starts_with("```") {
            in_code = !in_code;
            continue;
        }
        if in_code {
            lines.push(Line::from(Span::styled(
                format!("  {}", raw),
                Style::default().fg(p.muted).bg(p.panel),
            )));
            continue;
        }
        if let Some((level, heading)) = heading(trimmed) {
            let mut style = Style::default().fg(p.accent).add_modifier(Modifier::BOLD);
            if level == 1 {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            lines.push(Line::from(inline_spans(heading, style, p)));
        } else if trimmed == ">" || trimmed.starts_with("> ") {
            let quote = trimmed.trim_start_matches('>').trim_start();
            let mut spans = vec![Span::styled("│ ", Style::default().fg(p.accent))];
            spans.extend(inline_spans(
                quote,
                Style::default().fg(p.muted).add_modifier(Modifier::ITALIC),
                p,
            ));
            lines.push(Line::from(spans));
        } else if let Some(item) = ["- ", "* ", "+ "]
            .iter()
            .find_map(|bullet| trimmed.strip_prefix(bullet))
        {
            let indent = " ".repeat(raw.len() - trimmed.len());
            let mut spans = vec![Span::styled(
                format!("{}  • ", indent),
                Style::default().fg(p.accent),
            )];
            spans.extend(inline_spans(item, base, p));
            lines.push(Line::from(spans));
        } else if matches!(trimmed, "---" | "***" | "___") {
            lines.push(Line::from(Span::styled(
                "─".repeat(24),
                Style::default().fg(p.muted),
            )));
        } else {
            lines.push(Line::from(inline_spans(raw, base, p)));
        }
    }
    lines
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    line[level..].strip_prefix(' ').map(|rest| (level, rest.trim()))
}

fn inline_spans(text: &str, base: Style, p: Palette) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        let code = rest.find('`');
        let bold = rest.find("**");
        let code_first = code.filter(|c| bold.map_or(true, |b| *c < b));
        if let Some(start) = code_first {
            if let Some(len) = rest[start + 1..].find('`') {
                push_plain(&mut spans, &rest[..start], base);
                spans.push(Span::styled(
                    rest[start + 1..start + 1 + len].to_string(),
                    base.fg(p.accent).bg(p.panel),
                ));
                rest = &rest[start + 2 + len..];
                continue;
            }
        } else if let Some(start) = bold {
            if let Some(len) = rest[start + 2..].find("**") {
                push_plain(&mut spans, &rest[..start], base);
                spans.push(Span::styled(
                    rest[start + 2..start + 2 + len].to_string(),
                    base.add_modifier(Modifier::BOLD),
                ));
                rest = &rest[start + 4 + len..];
                continue;
            }
        }
        push_plain(&mut spans, rest, base);
        break;
    }
    spans
}

fn push_plain(spans: &mut Vec<Span<'static>>, text: &str, style: Style) {
    if !text.is_empty() {
        spans.push(Span::styled(text.to_string(), style));
    }
}

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn line_state(text: &str, cursor: usize) -> (Vec<usize>, usize, usize) {
    let mut starts = vec![0];
    for (idx, ch) in text.char_indices() {
        if ch == '\n' {
            starts.push(idx + 1);
        }
    }
    let mut line_idx = 0;
    for (i, start) in starts.iter().enumerate() {
        if *start <= cursor {
            line_idx = i;
        } else {
            break;
        }
    }
    let col = text[starts[line_idx]..cursor].chars().count();
    (starts, line_idx, col)
}

fn index_at_col(text: &str, start: usize, target_col: usize) -> usize {
    let slice = &text[start..];
    let limit = slice.find('\n').unwrap_or(slice.len());
    for (col, (idx, _)) in slice[..limit].char_indices().enumerate() {
        if col == target_col {
            return start + idx;
        }
    }
    start + limit
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out.chars().take(max).collect()
}

fn note_item(note: &Note, width: usize, selected: bool, p: Palette) -> ListItem<'static> {
    let title_style = if selected {
        Style::default().fg(p.accent).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(p.fg).add_modifier(Modifier::BOLD)
    };
    let snippet = note
        .content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("No content");
    let marker = if selected { "▌" } else { " " };
    let lines = vec![
        Line::from(vec![
            Span::styled(marker, Style::default().fg(p.accent)),
            Span::styled(truncate_text(note.display_title(), width), title_style),
        ]),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(truncate_text(snippet, width), Style::default().fg(p.muted)),
        ]),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(format_timestamp(note), Style::default().fg(p.muted)),
        ]),
        Line::from(""),
    ];
    let mut item = ListItem::new(lines);
    if selected {
        item = item.style(Style::default().bg(p.bg));
    }
    item
}

fn field_lines(label: &str, field: &FieldValue, active: bool, p: Palette) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(p.muted)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { p.accent } else { p.fg });
    let prefix = if label.is_empty() {
        String::new()
    } else {
        format!("{}: ", label)
    };
    let spacer = " ".repeat(prefix.chars().count());
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    text.split('\n')
        .enumerate()
        .map(|(idx, line)| {
            Line::from(vec![
                Span::styled(
                    if idx == 0 {
                        prefix.clone()
                    } else {
                        spacer.clone()
                    },
                    label_style,
                ),
                Span::styled(line.to_string(), value_style),
            ])
        })
        .collect()
}

fn format_timestamp(note: &Note) -> String {
    note.updated_at
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> Palette {
        Palette::from_settings(&Settings::default())
    }

    fn text_of(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn field_editing_handles_multibyte_and_lines() {
        let mut field = FieldValue::new("ab\nдв");
        field.move_up();
        assert_eq!(field.cursor, 2);
        field.backspace();
        assert_eq!(field.value, "a\nдв");
        field.move_down();
        field.insert_char('ё');
        assert_eq!(field.value, "a\nдёв");
        field.move_right();
        field.move_right();
        assert_eq!(field.cursor, field.value.len());
    }

    #[test]
    fn markdown_preview_styles_blocks() {
        let lines = markdown_lines(
            "# Title\n- item **bold**\n> quoted\n```\nlet x = 1;\n```\n---\nplain `code`",
            palette(),
        );
        let texts: Vec<String> = lines.iter().map(text_of).collect();
        assert_eq!(
            texts,
            vec![
                "Title",
                "  • item bold",
                "│ quoted",
                "  let x = 1;",
                "─".repeat(24).as_str(),
                "plain code",
            ]
        );
        assert!(lines[0].spans[0]
            .style
            .add_modifier
            .contains(Modifier::UNDERLINED));
        assert!(lines[1].spans[2]
            .style
            .add_modifier
            .contains(Modifier::BOLD));
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        let spans = inline_spans("a ** b ` c", Style::default(), palette());
        let text: String = spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "a ** b ` c");
        assert_eq!(heading("#nospace"), None);
        assert_eq!(heading("### three"), Some((3, "three")));
    }

    #[test]
    fn truncate_respects_width() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("a longer title", 8), "a lon...");
        assert_eq!(truncate_text("abc", 0), "");
    }

    #[test]
    fn matrix_theme_overrides_accent() {
        let settings = Settings {
            theme_mode: ThemeMode::Matrix,
            ..Settings::default()
        };
        let p = Palette::from_settings(&settings);
        assert_eq!(p.accent, p.fg);
        assert_eq!(p.bg, Color::Black);
        assert_eq!(palette().accent, Color::Rgb(0x4f, 0x46, 0xe5));
    }

    #[test]
    fn settings_rows_wrap_and_adjust() {
        assert!(SettingsRow::Accent.step(-1) == SettingsRow::EditorFontSize);
        let mut settings = Settings::default();
        SettingsRow::Theme.adjust(&mut settings, false);
        assert_eq!(settings.theme_mode, ThemeMode::Matrix);
        SettingsRow::EditorFontSize.adjust(&mut settings, true);
        assert_eq!(settings.editor_font_size, 17);
        assert_eq!(SettingsRow::FontSize.value(&settings), "16px");
    }
}
