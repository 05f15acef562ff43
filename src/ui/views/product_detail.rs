use crate::catalog::{CatalogApi, Product};
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{availability_color, format_price, join_or};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::ProductEditView;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// View for displaying every field of one product
pub struct ProductDetailView {
  api: CatalogApi,
  id: u64,
  query: Query<Product>,
  scroll: u16,
}

impl ProductDetailView {
  pub fn new(api: CatalogApi, id: u64) -> Self {
    let query = api.product(id);
    Self {
      api,
      id,
      query,
      scroll: 0,
    }
  }

  fn title(&self) -> String {
    match self.query.state() {
      QueryState::Loading => format!(" Product #{} (loading...) ", self.id),
      QueryState::Error(e) => format!(" Product #{} (error: {}) ", self.id, e),
      _ if self.query.is_fetching() => format!(" Product #{} (refreshing...) ", self.id),
      _ if self.query.is_stale() => format!(" Product #{} (stale) ", self.id),
      _ => format!(" Product #{} ", self.id),
    }
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Show loading or error state
    if self.query.is_loading() {
      let paragraph =
        Paragraph::new("Loading product...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    let Some(product) = self.query.data() else {
      let message = match self.query.error() {
        Some(e) if e.is_not_found() => format!("Product #{} does not exist.", self.id),
        Some(e) => format!("Error: {}\n\nPress 'r' to retry.", e),
        None => String::new(),
      };
      let paragraph = Paragraph::new(message).style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    };

    let paragraph = Paragraph::new(detail_lines(product))
      .wrap(Wrap { trim: false })
      .scroll((self.scroll, 0));
    frame.render_widget(paragraph, inner);
  }
}

fn field<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
  Line::from(vec![
    Span::styled(format!("{:<16}", label), Style::default().fg(Color::DarkGray)),
    value.into(),
  ])
}

fn section(title: &str) -> Line<'_> {
  Line::from(Span::styled(
    title,
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
  ))
}

fn detail_lines(product: &Product) -> Vec<Line<'_>> {
  let dims = &product.dimensions;
  let mut lines = vec![
    Line::from(Span::styled(
      product.title.as_str(),
      Style::default().add_modifier(Modifier::BOLD),
    )),
    Line::from(product.description.as_str()),
    Line::default(),
    field("Category", Span::styled(product.category.as_str(), Style::default().fg(Color::Magenta))),
    field("Brand", product.brand.as_str()),
    field("SKU", product.sku.as_str()),
    field(
      "Price",
      format!(
        "{} ({}% off)",
        format_price(product.price),
        product.discount_percentage
      ),
    ),
    field("Rating", Span::styled(format!("{:.2}", product.rating), Style::default().fg(Color::Yellow))),
    field("Stock", product.stock.to_string()),
    field(
      "Availability",
      Span::styled(
        product.availability_status.as_str(),
        Style::default().fg(availability_color(&product.availability_status)),
      ),
    ),
    field("Min. order", product.minimum_order_quantity.to_string()),
    field("Tags", join_or(&product.tags, "none")),
    Line::default(),
    section("Shipping"),
    field("Weight", product.weight.to_string()),
    field("Dimensions", format!("{} x {} x {}", dims.width, dims.height, dims.depth)),
    field("Warranty", product.warranty_information.as_str()),
    field("Shipping", product.shipping_information.as_str()),
    field("Returns", product.return_policy.as_str()),
    Line::default(),
    section("Meta"),
    field("Created", product.meta.created_at.as_str()),
    field("Updated", product.meta.updated_at.as_str()),
    field("Barcode", product.meta.barcode.as_str()),
    field("QR code", product.meta.qr_code.as_str()),
    field("Thumbnail", product.thumbnail.as_str()),
    field("Images", join_or(&product.images, "none")),
    Line::default(),
    section("Reviews"),
  ];

  if product.reviews.is_empty() {
    lines.push(Line::styled("No reviews", Style::default().fg(Color::DarkGray)));
  }
  for review in &product.reviews {
    lines.push(Line::from(vec![
      Span::styled(
        format!("{:<5}", "★".repeat(review.rating.round().clamp(0.0, 5.0) as usize)),
        Style::default().fg(Color::Yellow),
      ),
      Span::raw(" "),
      Span::raw(review.comment.as_str()),
      Span::styled(
        format!("  {} ({})", review.reviewer_name, review.date),
        Style::default().fg(Color::DarkGray),
      ),
    ]));
  }
  lines
}

impl View for ProductDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        self.scroll = self.scroll.saturating_add(1);
      }
      KeyCode::Char('k') | KeyCode::Up => {
        self.scroll = self.scroll.saturating_sub(1);
      }
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('e') => {
        if self.query.data().is_some() {
          return ViewAction::Push(Box::new(ProductEditView::new(self.api.clone(), self.id)));
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    format!("#{}", self.id)
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("e", "edit").with_priority(20),
      ShortcutInfo::new("j/k", "scroll").with_priority(30),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}
