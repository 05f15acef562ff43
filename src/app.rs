use crate::catalog::CatalogApi;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crate::ui::views::{CategoryListView, ProductListView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  api: CatalogApi,
  page_size: u32,
  host: String,

  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command palette
  command: CommandInput,

  /// Last app-level message, e.g. an unknown command
  notice: Option<Notice>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(api: CatalogApi, config: &Config) -> Self {
    let page_size = config.ui.page_size;
    let root = ProductListView::new(api.clone(), page_size);
    Self {
      api,
      page_size,
      host: config.host(),
      view_stack: vec![Box::new(root)],
      command: CommandInput::new(),
      notice: None,
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;

    let result = self.event_loop().await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self) -> Result<()> {
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    let mut events = EventHandler::new(TICK_RATE);

    while !self.should_quit() {
      terminal.draw(|frame| ui::draw(frame, self))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Resize => {} // Redrawn on the next loop iteration
    }
  }

  /// Only the visible view polls. Views underneath keep their
  /// subscriptions and catch up when they are shown again.
  fn tick(&mut self) {
    if let Some(view) = self.view_stack.last_mut() {
      view.tick();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self
      .view_stack
      .last()
      .is_some_and(|view| view.is_capturing_input());

    if self.command.is_active() || !capturing {
      match self.command.handle_key(key) {
        KeyResult::Handled => return,
        KeyResult::Event(CommandEvent::Submitted(name)) => {
          self.execute_command(name);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          self.notice = Some(Notice::Error(format!("Unknown command: {}", input)));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::NotHandled => {}
      }
    }

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => {
        debug!(view = %view.breadcrumb_label(), "Push view");
        self.view_stack.push(view);
      }
      ViewAction::Pop => {
        // Popping drops the view and with it its subscriptions
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
    }
  }

  /// Replace the whole stack with a new root view
  fn set_root(&mut self, view: Box<dyn View>) {
    self.view_stack.clear();
    self.view_stack.push(view);
  }

  fn execute_command(&mut self, name: &str) {
    info!(command = name, "Command");
    self.notice = None;
    match name {
      "products" => self.set_root(Box::new(ProductListView::new(
        self.api.clone(),
        self.page_size,
      ))),
      "all" => self.set_root(Box::new(ProductListView::all(
        self.api.clone(),
        self.page_size,
      ))),
      "categories" => self.set_root(Box::new(CategoryListView::new(&self.api))),
      "quit" => self.should_quit = true,
      other => {
        self.notice = Some(Notice::Error(format!("Unknown command: {}", other)));
      }
    }
  }

  // Accessors for UI rendering
  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn host(&self) -> &str {
    &self.host
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  pub fn shortcuts(&self) -> Vec<ShortcutInfo> {
    self
      .view_stack
      .last()
      .map(|v| v.shortcuts())
      .unwrap_or_default()
  }

  /// The view's own message wins over the app's
  pub fn notice(&self) -> Option<Notice> {
    self
      .view_stack
      .last()
      .and_then(|v| v.notice())
      .or_else(|| self.notice.clone())
  }

  /// Cache size and requests on the wire, for the header
  pub fn cache_status(&self) -> String {
    let client = self.api.client();
    match client.in_flight() {
      0 => format!("{} cached", client.cached()),
      n => format!("{} cached, {} loading", client.cached(), n),
    }
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }

  pub fn should_quit(&self) -> bool {
    self.should_quit
  }
}
