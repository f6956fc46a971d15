use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row as TableRow, Table, TableState};
use tokio::sync::mpsc;

use openai_balance::config::settings::Settings;
use openai_balance::page::local_today;
use openai_balance::{ClientError, FetchTicket, Page, PageError, Storage, UsageClient};
use openai_balance_protocol::UsageResponse;

type FetchResult = (FetchTicket, Result<UsageResponse, ClientError>);

enum Mode {
    Normal,
    AddKey(String),
    Rename(usize, String),
}

struct App {
    page: Page,
    client: UsageClient,
    table_state: TableState,
    mode: Mode,
    message: Option<String>,
    running: bool,
    results: mpsc::UnboundedSender<FetchResult>,
}

impl App {
    fn selected(&self) -> Option<usize> {
        self.table_state
            .selected()
            .filter(|&i| i < self.page.rows().len())
    }

    fn next(&mut self) {
        let len = self.page.rows().len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(i) => (i + 1) % len,
            None => 0,
        };
        self.table_state.select(Some(i));
    }

    fn prev(&mut self) {
        let len = self.page.rows().len();
        if len == 0 {
            return;
        }
        let i = match self.table_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.table_state.select(Some(i));
    }

    /// Run the fetch on the runtime and report back through the channel.
    fn spawn_fetch(&self, ticket: FetchTicket) {
        let client = self.client.clone();
        let tx = self.results.clone();
        tokio::spawn(async move {
            let result = client.get_usage(&ticket.query).await;
            let _ = tx.send((ticket, result));
        });
    }

    fn submit(&mut self, key: &str) {
        match self.page.begin_submit(key, local_today()) {
            Ok(ticket) => {
                self.message = Some("Loading...".to_string());
                self.spawn_fetch(ticket);
            }
            Err(e) => self.message = Some(format!("Error: {}", e)),
        }
    }

    fn refresh_selected(&mut self) {
        let Some(index) = self.selected() else {
            return;
        };
        match self.page.begin_refresh(index, local_today()) {
            Ok(ticket) => self.spawn_fetch(ticket),
            Err(e) => self.message = Some(format!("Error: {}", e)),
        }
    }

    fn apply(&mut self, (ticket, result): FetchResult) {
        let key = ticket.query.key.clone();
        if let Err(e) = self.page.finish(ticket, result) {
            self.message = Some(format!("Error: {}", e));
            return;
        }
        self.message = match self.page.error() {
            Some(err) => Some(format!("Error: {}", err)),
            None => Some(format!("Updated {}", mask_key(&key))),
        };
        if self.table_state.selected().is_none() && !self.page.rows().is_empty() {
            self.table_state.select(Some(0));
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();
    let storage_path = settings
        .storage_path()
        .context("could not determine storage path")?;
    let storage = Storage::open(&storage_path)
        .with_context(|| format!("open storage at {}", storage_path.display()))?;
    let share_query = std::env::args().nth(1);
    let page = Page::load(storage, share_query.as_deref()).context("load saved rows")?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut app = App {
        page,
        client: UsageClient::new(&settings.relay_url),
        table_state: TableState::default(),
        mode: Mode::Normal,
        message: None,
        running: true,
        results: tx,
    };
    if !app.page.rows().is_empty() {
        app.table_state.select(Some(0));
    }

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let outcome = run(&mut terminal, &mut app, &mut rx);

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;
    outcome
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    rx: &mut mpsc::UnboundedReceiver<FetchResult>,
) -> Result<()> {
    while app.running {
        while let Ok(done) = rx.try_recv() {
            app.apply(done);
        }

        terminal.draw(|f| draw(f, app))?;

        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code)?;
                }
            }
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyCode) -> Result<(), PageError> {
    match std::mem::replace(&mut app.mode, Mode::Normal) {
        Mode::Normal => handle_normal_key(app, key),
        Mode::AddKey(mut input) => {
            match key {
                KeyCode::Enter => {
                    let entered = input.trim().to_string();
                    app.submit(&entered);
                }
                KeyCode::Esc => app.message = None,
                KeyCode::Backspace => {
                    input.pop();
                    app.mode = Mode::AddKey(input);
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    app.mode = Mode::AddKey(input);
                }
                _ => app.mode = Mode::AddKey(input),
            }
            Ok(())
        }
        Mode::Rename(index, mut input) => {
            match key {
                KeyCode::Enter => {
                    if app.page.rename(index, &input)? {
                        app.message = Some("Renamed".to_string());
                    }
                }
                KeyCode::Esc => app.message = None,
                KeyCode::Backspace => {
                    input.pop();
                    app.mode = Mode::Rename(index, input);
                }
                KeyCode::Char(c) => {
                    input.push(c);
                    app.mode = Mode::Rename(index, input);
                }
                _ => app.mode = Mode::Rename(index, input),
            }
            Ok(())
        }
    }
}

fn handle_normal_key(app: &mut App, key: KeyCode) -> Result<(), PageError> {
    match key {
        KeyCode::Char('q') | KeyCode::Esc => {
            app.running = false;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.next();
            app.message = None;
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.prev();
            app.message = None;
        }
        KeyCode::Char('a') => {
            app.mode = Mode::AddKey(String::new());
            app.message = None;
        }
        KeyCode::Char('r') => app.refresh_selected(),
        KeyCode::Char('e') => {
            if let Some(index) = app.selected() {
                let current = app.page.rows()[index].name.clone();
                app.mode = Mode::Rename(index, current);
            }
        }
        _ => {}
    }
    Ok(())
}

/// First and last four characters, enough to tell keys apart on screen.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return key.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn draw(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    // Billing summary
    let range = app.page.display_range(local_today());
    let summary = Paragraph::new(vec![
        Line::from(format!(
            "Billing from: {} to {}",
            range.start_str(),
            range.end_str()
        )),
        Line::from(Span::styled(
            format!("Total usage: ${}", app.page.total_usage()),
            Style::default().bold(),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title(" OpenAI Balance "));
    f.render_widget(summary, chunks[0]);

    // Saved keys
    let rows: Vec<TableRow> = app
        .page
        .rows()
        .iter()
        .map(|row| {
            let usage = if app.page.is_loading(&row.key) {
                Cell::from("...").style(Style::default().fg(Color::Yellow))
            } else {
                Cell::from(row.usage.clone()).style(Style::default().bold())
            };
            TableRow::new(vec![
                Cell::from(row.name.clone()),
                Cell::from(mask_key(&row.key)).style(Style::default().fg(Color::DarkGray)),
                usage,
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(30),
            Constraint::Percentage(50),
            Constraint::Percentage(20),
        ],
    )
    .header(TableRow::new(vec!["Name", "Key", "Usage"]).style(Style::default().fg(Color::DarkGray)))
    .block(Block::default().borders(Borders::ALL).title(" Keys "))
    .row_highlight_style(Style::default().bg(Color::DarkGray).bold())
    .highlight_symbol("> ");
    f.render_stateful_widget(table, chunks[1], &mut app.table_state);

    // Input or message bar
    let (title, text, style) = match &app.mode {
        Mode::AddKey(input) => (" Key ", input.clone(), Style::default()),
        Mode::Rename(_, input) => (" Name ", input.clone(), Style::default()),
        Mode::Normal => {
            let msg = app.message.clone().unwrap_or_default();
            let style = if msg.starts_with("Error") {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };
            (" Status ", msg, style)
        }
    };
    let bar = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(bar, chunks[2]);

    let keys = match app.mode {
        Mode::Normal => " q:quit  a:add key  r:refresh  e:rename  j/k:nav",
        _ => " enter:confirm  esc:cancel",
    };
    f.render_widget(
        Paragraph::new(keys).style(Style::default().fg(Color::DarkGray)),
        chunks[3],
    );
}
