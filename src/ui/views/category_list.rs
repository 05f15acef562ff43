use crate::catalog::{CatalogApi, Category};
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// View for displaying the product categories
pub struct CategoryListView {
  query: Query<Vec<Category>>,
  list_state: ListState,
}

impl CategoryListView {
  pub fn new(api: &CatalogApi) -> Self {
    Self {
      query: api.categories(),
      list_state: ListState::default(),
    }
  }

  fn categories(&self) -> &[Category] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.categories().len();
    ensure_valid_selection(&mut self.list_state, len);

    let title = match self.query.state() {
      QueryState::Loading => " Categories (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Categories (error: {}) ", e),
      _ => format!(" Categories ({}) ", len),
    };

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.categories().is_empty() && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load categories. Press 'r' to retry."
      } else {
        "No categories found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let items: Vec<ListItem> = self
      .categories()
      .iter()
      .map(|category| {
        ListItem::new(Line::from(vec![
          Span::styled(
            format!("{:<24}", truncate(&category.slug, 24)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<28}", truncate(&category.name, 28))),
          Span::styled(category.url.clone(), Style::default().fg(Color::DarkGray)),
        ]))
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for CategoryListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "Categories".to_string()
  }

  fn tick(&mut self) {
    self.query.poll();
    let len = self.categories().len();
    ensure_valid_selection(&mut self.list_state, len);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(60),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
