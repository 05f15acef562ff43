use crate::catalog::{CatalogApi, Category, Product, ProductPatch, UpdateProduct};
use crate::query::{Mutation, MutationState, Query, QueryState};
use crate::ui::components::{Field, FieldForm, FieldKind, FormEvent, KeyResult, ReviewEditor};
use crate::ui::view::{Notice, ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};
use std::sync::Arc;
use tracing::debug;

/// Which half of the edit view takes keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Focus {
  Fields,
  Reviews,
}

/// Form over one product plus its reviews. Tab switches between the two,
/// `s` sends everything changed as one patch.
pub struct ProductEditView {
  id: u64,
  query: Query<Product>,
  categories: Query<Vec<Category>>,
  update: Mutation<UpdateProduct, Product>,
  /// Product the form was built from, or the last saved version of it
  base: Option<Arc<Product>>,
  form: Option<FieldForm>,
  reviews: ReviewEditor,
  focus: Focus,
  choices_offered: bool,
  /// Fields sent by the save in flight
  saving: Vec<String>,
  notice: Option<Notice>,
}

impl ProductEditView {
  pub fn new(api: CatalogApi, id: u64) -> Self {
    Self {
      id,
      query: api.product(id),
      categories: api.categories(),
      update: api.update_product(),
      base: None,
      form: None,
      reviews: ReviewEditor::default(),
      focus: Focus::Fields,
      choices_offered: false,
      saving: Vec::new(),
      notice: None,
    }
  }

  fn save(&mut self) {
    let (Some(base), Some(form)) = (&self.base, &self.form) else {
      return;
    };
    if self.update.is_running() {
      return;
    }

    if let Some((label, problem)) = form.problems().first() {
      self.notice = Some(Notice::Error(format!("{} {}", label, problem)));
      return;
    }
    if let Some(problem) = self.reviews.problems().first() {
      self.notice = Some(Notice::Error(problem.clone()));
      return;
    }

    let patch = ProductPatch::between(base, &apply(base, form, &self.reviews));
    if patch.is_empty() {
      self.notice = Some(Notice::Info("Nothing to save".to_string()));
      return;
    }

    self.saving = patch.fields();
    debug!(id = self.id, fields = ?self.saving, "Saving product");
    self.notice = Some(Notice::Info("Saving...".to_string()));
    self.update.trigger(UpdateProduct { id: self.id, patch });
  }

  fn poll_update(&mut self) {
    if !self.update.poll() {
      return;
    }
    match self.update.state() {
      MutationState::Success(saved) => {
        self.notice = Some(Notice::Info(format!("Saved {}", self.saving.join(", "))));
        self.reviews.reset(&saved.reviews);
        self.base = Some(saved.clone());
        if let Some(form) = &mut self.form {
          form.commit();
        }
      }
      MutationState::Error(e) => {
        self.notice = Some(Notice::Error(format!("Save failed: {}", e)));
      }
      MutationState::Idle | MutationState::Running => {}
    }
  }

  fn is_modified(&self) -> bool {
    self.form.as_ref().is_some_and(FieldForm::is_modified) || self.reviews.is_modified()
  }

  fn title(&self) -> String {
    let modified = if self.is_modified() { " [modified]" } else { "" };
    match self.query.state() {
      QueryState::Loading => format!(" Edit #{} (loading...) ", self.id),
      QueryState::Error(e) => format!(" Edit #{} (error: {}) ", self.id, e),
      _ if self.update.is_running() => format!(" Edit #{}{} (saving...) ", self.id, modified),
      _ => format!(" Edit #{}{} ", self.id, modified),
    }
  }

  fn border(&self, focus: Focus) -> Style {
    if self.focus == focus {
      Style::default().fg(Color::Blue)
    } else {
      Style::default().fg(Color::DarkGray)
    }
  }
}

impl View for ProductEditView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if matches!(key.code, KeyCode::Tab | KeyCode::BackTab) && !self.is_capturing_input() {
      self.focus = match self.focus {
        Focus::Fields => Focus::Reviews,
        Focus::Reviews => Focus::Fields,
      };
      return ViewAction::None;
    }

    let Some(form) = &mut self.form else {
      return match key.code {
        KeyCode::Char('r') => {
          self.query.refetch();
          ViewAction::None
        }
        KeyCode::Char('q') | KeyCode::Esc => ViewAction::Pop,
        _ => ViewAction::None,
      };
    };

    let result = match self.focus {
      Focus::Fields => form.handle_key(key),
      Focus::Reviews => self.reviews.handle_key(key),
    };
    match result {
      KeyResult::Event(FormEvent::Save) => self.save(),
      KeyResult::Event(FormEvent::Cancel) => return ViewAction::Pop,
      KeyResult::Handled | KeyResult::NotHandled => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .border_style(self.border(Focus::Fields));

    let Some(form) = &self.form else {
      let content = match self.query.error() {
        Some(e) => format!("Error: {}\n\nPress 'r' to retry.", e),
        None => "Loading product...".to_string(),
      };
      let paragraph = Paragraph::new(content)
        .block(block.borders(Borders::ALL))
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
      .split(area);
    form.render(frame, chunks[0], block);

    let reviews = Block::default()
      .title(format!(" Reviews ({}) ", self.reviews.count()))
      .border_style(self.border(Focus::Reviews));
    self.reviews.render(frame, chunks[1], reviews);
  }

  fn breadcrumb_label(&self) -> String {
    format!("Edit #{}", self.id)
  }

  fn tick(&mut self) {
    self.query.poll();
    // The form is built once. Later refreshes of the product do not
    // overwrite what the user is typing.
    if self.form.is_none() {
      if let Some(product) = self.query.data_arc() {
        self.form = Some(product_form(&product));
        self.reviews = ReviewEditor::new(&product.reviews);
        self.base = Some(product);
      }
    }

    let categories_changed = self.categories.poll();
    if let (Some(form), Some(categories)) = (&mut self.form, self.categories.data()) {
      if categories_changed || !self.choices_offered {
        form.set_choices("category", category_slugs(categories));
        self.choices_offered = true;
      }
    }

    self.poll_update();
  }

  fn is_capturing_input(&self) -> bool {
    match self.focus {
      Focus::Fields => self.form.as_ref().is_some_and(FieldForm::is_editing),
      Focus::Reviews => self.reviews.is_editing(),
    }
  }

  fn notice(&self) -> Option<Notice> {
    self.notice.clone()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.is_capturing_input() {
      return vec![
        ShortcutInfo::new("enter", "keep").with_priority(10),
        ShortcutInfo::new("esc", "revert").with_priority(20),
      ];
    }
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("enter", "edit").with_priority(20),
      ShortcutInfo::new("s", "save").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(90),
    ];
    match self.focus {
      Focus::Fields => shortcuts.extend([
        ShortcutInfo::new("</>", "choose").with_priority(30),
        ShortcutInfo::new("u", "undo field").with_priority(40),
        ShortcutInfo::new("tab", "reviews").with_priority(60),
      ]),
      Focus::Reviews => shortcuts.extend([
        ShortcutInfo::new("a", "add").with_priority(30),
        ShortcutInfo::new("d", "remove").with_priority(40),
        ShortcutInfo::new("tab", "fields").with_priority(60),
      ]),
    }
    shortcuts
  }
}

fn category_slugs(categories: &[Category]) -> Vec<String> {
  categories.iter().map(|c| c.slug.clone()).collect()
}

fn product_form(product: &Product) -> FieldForm {
  let dims = &product.dimensions;
  let percent = FieldKind::Range { min: 0.0, max: 100.0 };
  let rating = FieldKind::Range { min: 0.0, max: 5.0 };
  FieldForm::new(vec![
    Field::new("title", "Title", FieldKind::Text, product.title.clone()).required(),
    Field::new("description", "Description", FieldKind::Text, product.description.clone())
      .required(),
    Field::new("category", "Category", FieldKind::Choice(Vec::new()), product.category.clone())
      .required(),
    Field::new("price", "Price", FieldKind::Decimal, product.price.to_string()).required(),
    Field::new(
      "discountPercentage",
      "Discount %",
      percent,
      product.discount_percentage.to_string(),
    ),
    Field::new("rating", "Rating", rating, product.rating.to_string()),
    Field::new("stock", "Stock", FieldKind::Integer, product.stock.to_string()),
    Field::new("brand", "Brand", FieldKind::Text, product.brand.clone()),
    Field::new("sku", "SKU", FieldKind::Text, product.sku.clone()),
    Field::new("weight", "Weight", FieldKind::Decimal, product.weight.to_string()),
    Field::new("width", "Width", FieldKind::Decimal, dims.width.to_string()),
    Field::new("height", "Height", FieldKind::Decimal, dims.height.to_string()),
    Field::new("depth", "Depth", FieldKind::Decimal, dims.depth.to_string()),
    Field::new(
      "warrantyInformation",
      "Warranty",
      FieldKind::Text,
      product.warranty_information.clone(),
    ),
    Field::new(
      "shippingInformation",
      "Shipping",
      FieldKind::Text,
      product.shipping_information.clone(),
    ),
    Field::new(
      "availabilityStatus",
      "Availability",
      FieldKind::Choice(vec![
        "In Stock".to_string(),
        "Low Stock".to_string(),
        "Out of Stock".to_string(),
      ]),
      product.availability_status.clone(),
    ),
    Field::new("returnPolicy", "Return policy", FieldKind::Text, product.return_policy.clone()),
    Field::new(
      "minimumOrderQuantity",
      "Min. order",
      FieldKind::Integer,
      product.minimum_order_quantity.to_string(),
    ),
    Field::new("tags", "Tags", FieldKind::List, product.tags.join(", ")),
    Field::new("thumbnail", "Thumbnail", FieldKind::Text, product.thumbnail.clone()),
    Field::new("images", "Images", FieldKind::List, product.images.join(", ")),
    Field::new("barcode", "Barcode", FieldKind::Text, product.meta.barcode.clone()),
    Field::new("qrCode", "QR code", FieldKind::Text, product.meta.qr_code.clone()),
    Field::new("createdAt", "Created", FieldKind::Timestamp, product.meta.created_at.clone()),
    Field::new("updatedAt", "Updated", FieldKind::Timestamp, product.meta.updated_at.clone()),
  ])
}

/// `base` with the form's values and the edited reviews written over it.
///
/// Only called on a form without problems; unparsable numbers keep the base
/// value.
fn apply(base: &Product, form: &FieldForm, reviews: &ReviewEditor) -> Product {
  let text = |name: &str| form.get(name).unwrap_or_default().to_string();
  let decimal = |name: &str, fallback: f64| {
    form
      .get(name)
      .and_then(|v| v.trim().parse().ok())
      .unwrap_or(fallback)
  };
  let whole = |name: &str, fallback: u64| {
    form
      .get(name)
      .and_then(|v| v.trim().parse().ok())
      .unwrap_or(fallback)
  };
  let list = |name: &str| -> Vec<String> {
    form
      .get(name)
      .unwrap_or_default()
      .split(',')
      .map(str::trim)
      .filter(|item| !item.is_empty())
      .map(String::from)
      .collect()
  };

  let mut product = base.clone();
  product.title = text("title");
  product.description = text("description");
  product.category = text("category");
  product.price = decimal("price", base.price);
  product.discount_percentage = decimal("discountPercentage", base.discount_percentage);
  product.rating = decimal("rating", base.rating);
  product.stock = whole("stock", base.stock);
  product.brand = text("brand");
  product.sku = text("sku");
  product.weight = decimal("weight", base.weight);
  product.dimensions.width = decimal("width", base.dimensions.width);
  product.dimensions.height = decimal("height", base.dimensions.height);
  product.dimensions.depth = decimal("depth", base.dimensions.depth);
  product.warranty_information = text("warrantyInformation");
  product.shipping_information = text("shippingInformation");
  product.availability_status = text("availabilityStatus");
  product.return_policy = text("returnPolicy");
  product.minimum_order_quantity = whole("minimumOrderQuantity", base.minimum_order_quantity);
  product.tags = list("tags");
  product.thumbnail = text("thumbnail");
  product.images = list("images");
  product.reviews = reviews.reviews();
  product.meta.barcode = text("barcode");
  product.meta.qr_code = text("qrCode");
  product.meta.created_at = text("createdAt");
  product.meta.updated_at = text("updatedAt");
  product
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::testing::fake_api;
  use crate::client::testing::{settle, Method};
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn press(view: &mut ProductEditView, codes: &[KeyCode]) {
    for code in codes {
      view.handle_key(key(*code));
    }
  }

  /// Select `name`, clear it and type `value`.
  fn set(view: &mut ProductEditView, name: &str, value: &str) {
    let index = view
      .form
      .as_ref()
      .unwrap()
      .fields()
      .iter()
      .position(|f| f.name == name)
      .unwrap();
    // Back to the first field, then down
    while view.form.as_ref().unwrap().selected().unwrap().name != "title" {
      press(view, &[KeyCode::Up]);
    }
    for _ in 0..index {
      press(view, &[KeyCode::Down]);
    }
    press(view, &[KeyCode::Enter]);
    view.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
    press(view, &[KeyCode::End]);
    for _ in 0..40 {
      press(view, &[KeyCode::Backspace]);
    }
    for c in value.chars() {
      press(view, &[KeyCode::Char(c)]);
    }
    press(view, &[KeyCode::Enter]);
  }

  async fn ready(api: &CatalogApi, id: u64) -> ProductEditView {
    let mut view = ProductEditView::new(api.clone(), id);
    settle().await;
    view.tick();
    view
  }

  #[tokio::test]
  async fn test_form_mirrors_product() {
    let (api, _transport) = fake_api(3);
    let view = ready(&api, 2).await;
    let form = view.form.as_ref().unwrap();
    assert_eq!(form.get("title"), Some("Product 2"));
    assert_eq!(form.get("price"), Some("2"));
    assert_eq!(form.get("tags"), Some("beauty"));
    assert!(!form.is_modified());
    assert_eq!(
      form.fields().iter().find(|f| f.name == "category").unwrap().kind,
      FieldKind::Choice(vec!["beauty".into(), "fragrances".into()])
    );
  }

  #[tokio::test]
  async fn test_save_sends_only_changed_fields() {
    let (api, transport) = fake_api(3);
    let mut list = api.products(crate::catalog::ProductsArgs::page(0, 10));
    let mut view = ready(&api, 1).await;
    list.poll();

    set(&mut view, "price", "12.5");
    set(&mut view, "tags", "beauty, sale");
    press(&mut view, &[KeyCode::Char('s')]);
    assert!(view.title().contains("saving"));

    settle().await;
    view.tick();
    assert_eq!(
      view.notice(),
      Some(Notice::Info("Saved price, tags".to_string()))
    );
    assert!(!view.form.as_ref().unwrap().is_modified());

    let patch = transport
      .calls()
      .into_iter()
      .find(|call| call.method == Method::Patch)
      .unwrap();
    assert_eq!(patch.path, "products/1");
    assert_eq!(
      patch.body.unwrap(),
      serde_json::json!({ "price": 12.5, "tags": ["beauty", "sale"] })
    );

    // The open list picks up the new price
    settle().await;
    list.poll();
    assert_eq!(list.data().unwrap().products[0].price, 12.5);
  }

  #[tokio::test]
  async fn test_invalid_form_is_not_sent() {
    let (api, transport) = fake_api(3);
    let mut view = ready(&api, 1).await;

    set(&mut view, "price", "cheap");
    press(&mut view, &[KeyCode::Char('s')]);
    assert_eq!(
      view.notice(),
      Some(Notice::Error("Price must be a non-negative number".to_string()))
    );

    set(&mut view, "price", "1");
    press(&mut view, &[KeyCode::Char('s')]);
    assert_eq!(view.notice(), Some(Notice::Info("Nothing to save".to_string())));
    settle().await;
    assert!(transport.calls().iter().all(|c| c.method == Method::Get));
  }

  #[tokio::test]
  async fn test_timestamps_are_sent_as_rfc3339() {
    let (api, transport) = fake_api(1);
    let mut view = ready(&api, 1).await;

    set(&mut view, "updatedAt", "2024-06-01 10:00:00");
    press(&mut view, &[KeyCode::Char('s')]);
    settle().await;

    let patch = transport
      .calls()
      .into_iter()
      .find(|call| call.method == Method::Patch)
      .unwrap();
    assert_eq!(
      patch.body.unwrap(),
      serde_json::json!({ "meta": { "updatedAt": "2024-06-01T10:00:00Z" } })
    );
  }

  #[tokio::test]
  async fn test_typing_captures_keys() {
    let (api, _transport) = fake_api(1);
    let mut view = ready(&api, 1).await;
    assert!(!view.is_capturing_input());
    press(&mut view, &[KeyCode::Enter]);
    assert!(view.is_capturing_input());
    // 'q' is text while a field is open
    assert!(matches!(
      view.handle_key(key(KeyCode::Char('q'))),
      ViewAction::None
    ));
    press(&mut view, &[KeyCode::Esc]);
    assert_eq!(view.form.as_ref().unwrap().get("title"), Some("Product 1"));
    assert!(matches!(view.handle_key(key(KeyCode::Char('q'))), ViewAction::Pop));
  }

  /// Body of the last PATCH sent
  fn patch_body(transport: &crate::client::testing::FakeTransport) -> Option<serde_json::Value> {
    transport
      .calls()
      .into_iter()
      .rev()
      .find(|call| call.method == Method::Patch)
      .and_then(|call| call.body)
  }

  #[tokio::test]
  async fn test_clearing_a_set_timestamp_is_rejected() {
    let (api, transport) = fake_api(1);
    let mut view = ready(&api, 1).await;

    set(&mut view, "createdAt", "");
    assert!(view.title().contains("[modified]"));
    press(&mut view, &[KeyCode::Char('s')]);
    assert_eq!(
      view.notice(),
      Some(Notice::Error("Created cannot be cleared".to_string()))
    );
    settle().await;
    assert_eq!(patch_body(&transport), None);
  }

  #[tokio::test]
  async fn test_rating_is_sent() {
    let (api, transport) = fake_api(1);
    let mut view = ready(&api, 1).await;

    set(&mut view, "rating", "6");
    press(&mut view, &[KeyCode::Char('s')]);
    assert_eq!(
      view.notice(),
      Some(Notice::Error("Rating must be from 0 to 5".to_string()))
    );

    set(&mut view, "rating", "3.25");
    press(&mut view, &[KeyCode::Char('s')]);
    settle().await;
    assert_eq!(patch_body(&transport), Some(serde_json::json!({ "rating": 3.25 })));
  }

  #[tokio::test]
  async fn test_added_review_is_sent() {
    let (api, transport) = fake_api(1);
    let mut view = ready(&api, 1).await;

    // Tab to the reviews, add one and fill in rating then comment
    press(&mut view, &[KeyCode::Tab, KeyCode::Char('a'), KeyCode::Enter]);
    assert!(view.is_capturing_input());
    press(&mut view, &[KeyCode::Char('4'), KeyCode::Enter, KeyCode::Down, KeyCode::Enter]);
    for c in "Does the job".chars() {
      press(&mut view, &[KeyCode::Char(c)]);
    }
    press(&mut view, &[KeyCode::Enter, KeyCode::Esc]);
    assert!(view.title().contains("[modified]"));

    press(&mut view, &[KeyCode::Char('s')]);
    settle().await;
    view.tick();
    assert_eq!(view.notice(), Some(Notice::Info("Saved reviews".to_string())));
    assert!(!view.title().contains("[modified]"));

    let body = patch_body(&transport).unwrap();
    let reviews = body["reviews"].as_array().unwrap();
    assert_eq!(body.as_object().unwrap().len(), 1);
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0]["comment"], "Does the job");
    assert_eq!(reviews[0]["rating"].as_f64(), Some(4.0));
  }

  #[tokio::test]
  async fn test_review_removal_drops_blank_additions() {
    let (api, transport) = fake_api(1);
    let review = |rating: f64, comment: &str| crate::catalog::Review {
      rating,
      comment: comment.to_string(),
      date: "2024-05-23T08:56:21.618Z".to_string(),
      ..Default::default()
    };
    let patch = ProductPatch {
      reviews: Some(vec![review(2.0, "Meh"), review(5.0, "Great")]),
      ..ProductPatch::default()
    };
    api
      .client()
      .mutate(&api.endpoints().update_product, &UpdateProduct { id: 1, patch })
      .await
      .unwrap();
    let mut view = ready(&api, 1).await;
    assert_eq!(view.reviews.count(), 2);

    // Remove the first review, add one and leave it blank
    press(&mut view, &[KeyCode::Tab, KeyCode::Char('d'), KeyCode::Char('a'), KeyCode::Esc]);
    assert_eq!(view.reviews.count(), 2);
    press(&mut view, &[KeyCode::Char('s')]);
    settle().await;

    let body = patch_body(&transport).unwrap();
    assert_eq!(body["reviews"], serde_json::to_value(vec![review(5.0, "Great")]).unwrap());
  }

  #[tokio::test]
  async fn test_tab_is_text_while_typing() {
    let (api, _transport) = fake_api(1);
    let mut view = ready(&api, 1).await;
    press(&mut view, &[KeyCode::Enter, KeyCode::Tab]);
    assert_eq!(view.focus, Focus::Fields);
    press(&mut view, &[KeyCode::Esc, KeyCode::Tab]);
    assert_eq!(view.focus, Focus::Reviews);
    assert!(view.shortcuts().iter().any(|s| s.key == "a"));
  }
}
