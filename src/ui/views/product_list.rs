use crate::catalog::{CatalogApi, Product, ProductPage, ProductsArgs};
use crate::query::{Query, QueryState};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{availability_color, format_price, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::{ProductDetailView, ProductEditView};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// Paginated product table
pub struct ProductListView {
  api: CatalogApi,
  page_size: u32,
  page: u32,
  show_all: bool,
  query: Query<ProductPage>,
  /// Last total reported by the service, kept while the next page loads
  total: Option<u64>,
  /// Page whose successor has already been prefetched
  prefetched: Option<u32>,
  list_state: ListState,
}

impl ProductListView {
  pub fn new(api: CatalogApi, page_size: u32) -> Self {
    Self::build(api, page_size, false)
  }

  /// Every product on one page
  pub fn all(api: CatalogApi, page_size: u32) -> Self {
    Self::build(api, page_size, true)
  }

  fn build(api: CatalogApi, page_size: u32, show_all: bool) -> Self {
    let page_size = page_size.max(1);
    let args = if show_all {
      ProductsArgs::all()
    } else {
      ProductsArgs::page(0, page_size)
    };
    let query = api.products(args);
    Self {
      api,
      page_size,
      page: 0,
      show_all,
      query,
      total: None,
      prefetched: None,
      list_state: ListState::default(),
    }
  }

  fn args(&self) -> ProductsArgs {
    if self.show_all {
      ProductsArgs::all()
    } else {
      ProductsArgs::page(self.page, self.page_size)
    }
  }

  /// Swap to the query for the current page. The previous page's query is
  /// dropped, which unsubscribes it.
  fn reload(&mut self) {
    self.query = self.api.products(self.args());
    self.list_state.select(Some(0));
  }

  fn products(&self) -> &[Product] {
    self.query.data().map(|p| p.products.as_slice()).unwrap_or(&[])
  }

  fn total(&self) -> Option<u64> {
    self.query.data().map(|p| p.total).or(self.total)
  }

  fn page_count(&self) -> u32 {
    match self.total() {
      Some(total) if total > 0 => total.div_ceil(self.page_size as u64) as u32,
      _ => 1,
    }
  }

  fn has_next_page(&self) -> bool {
    !self.show_all && self.page + 1 < self.page_count()
  }

  fn next_page(&mut self) {
    if self.has_next_page() {
      self.page += 1;
      self.reload();
    }
  }

  fn previous_page(&mut self) {
    if !self.show_all && self.page > 0 {
      self.page -= 1;
      self.reload();
    }
  }

  /// Warm the cache for the page after the one on screen, once per page.
  fn prefetch_next(&mut self) {
    if self.query.data().is_none() || !self.has_next_page() || self.prefetched == Some(self.page) {
      return;
    }
    self.prefetched = Some(self.page);
    self
      .api
      .prefetch_products(ProductsArgs::page(self.page + 1, self.page_size));
  }

  fn toggle_all(&mut self) {
    self.show_all = !self.show_all;
    self.page = 0;
    self.reload();
  }

  fn selected_product(&self) -> Option<&Product> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.products().get(idx))
  }

  fn title(&self) -> String {
    let position = if self.show_all {
      "all".to_string()
    } else {
      format!("page {}/{}", self.page + 1, self.page_count())
    };
    let total = self
      .total()
      .map(|t| format!(", {} total", t))
      .unwrap_or_default();

    match self.query.state() {
      QueryState::Loading => format!(" Products ({}) (loading...) ", position),
      QueryState::Error(e) => format!(" Products ({}) (error: {}) ", position, e),
      _ => {
        let status = if let Some(e) = self.query.error() {
          format!(" (refresh failed: {})", e)
        } else if self.query.is_fetching() {
          " (refreshing...)".to_string()
        } else {
          String::new()
        };
        format!(" Products ({}{}){} ", position, total, status)
      }
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.products().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if self.products().is_empty() {
      let content = if self.query.is_loading() {
        "Loading products..."
      } else if self.query.is_error() {
        "Failed to load products. Press 'r' to retry."
      } else {
        "No products found."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Line::from(Span::styled(
      format!(
        "  {:>4}  {:<32} {:<18} {:>10} {:<16} {:>6} {:>6}  {}",
        "ID", "TITLE", "CATEGORY", "PRICE", "BRAND", "STOCK", "RATING", "AVAILABILITY"
      ),
      Style::default().fg(Color::DarkGray).bold(),
    ));

    let items: Vec<ListItem> = self
      .products()
      .iter()
      .map(|product| {
        let line = Line::from(vec![
          Span::styled(format!("{:>4}", product.id), Style::default().fg(Color::Cyan)),
          Span::raw("  "),
          Span::raw(format!("{:<32}", truncate(&product.title, 32))),
          Span::raw(" "),
          Span::styled(
            format!("{:<18}", truncate(&product.category, 18)),
            Style::default().fg(Color::Magenta),
          ),
          Span::raw(" "),
          Span::raw(format!("{:>10}", format_price(product.price))),
          Span::raw(" "),
          Span::raw(format!("{:<16}", truncate(&product.brand, 16))),
          Span::raw(" "),
          Span::raw(format!("{:>6}", product.stock)),
          Span::raw(" "),
          Span::styled(
            format!("{:>6.2}", product.rating),
            Style::default().fg(Color::Yellow),
          ),
          Span::raw("  "),
          Span::styled(
            product.availability_status.clone(),
            Style::default().fg(availability_color(&product.availability_status)),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Length(1), Constraint::Min(0)])
      .split(inner);

    frame.render_widget(Paragraph::new(header), chunks[0]);

    let list = List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, chunks[1], &mut self.list_state);
  }
}

impl View for ProductListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.list_state.select_next();
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.list_state.select_previous();
      }
      KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => self.next_page(),
      KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => self.previous_page(),
      KeyCode::Char('a') => self.toggle_all(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Enter => {
        if let Some(product) = self.selected_product() {
          return ViewAction::Push(Box::new(ProductDetailView::new(
            self.api.clone(),
            product.id,
          )));
        }
      }
      KeyCode::Char('e') => {
        if let Some(product) = self.selected_product() {
          return ViewAction::Push(Box::new(ProductEditView::new(
            self.api.clone(),
            product.id,
          )));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_list(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    if self.show_all {
      "Products [all]".to_string()
    } else {
      format!("Products [{}]", self.page + 1)
    }
  }

  fn tick(&mut self) {
    if self.query.poll() {
      if let Some(page) = self.query.data() {
        self.total = Some(page.total);
      }
    }
    self.prefetch_next();
    let len = self.products().len();
    ensure_valid_selection(&mut self.list_state, len);
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "detail").with_priority(20),
      ShortcutInfo::new("e", "edit").with_priority(30),
      ShortcutInfo::new("n/p", "page").with_priority(40),
      ShortcutInfo::new("a", if self.show_all { "paged" } else { "all" }).with_priority(50),
      ShortcutInfo::new("r", "refresh").with_priority(60),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
