use super::form::{Field, FieldForm, FieldKind, FormEvent};
use super::KeyResult;
use crate::catalog::Review;
use chrono::{SecondsFormat, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

const RATING: FieldKind = FieldKind::Range { min: 1.0, max: 5.0 };

/// One review row: the review it started from and the form editing it
#[derive(Debug, Clone)]
struct Entry {
  base: Review,
  form: FieldForm,
}

impl Entry {
  fn new(review: Review) -> Self {
    let rating = if review.rating > 0.0 {
      review.rating.to_string()
    } else {
      String::new()
    };
    let form = FieldForm::new(vec![
      Field::new("rating", "Rating", RATING, rating).required(),
      Field::new("comment", "Comment", FieldKind::Text, review.comment.clone()).required(),
      Field::new("reviewerName", "Reviewer", FieldKind::Text, review.reviewer_name.clone()),
      Field::new("reviewerEmail", "Email", FieldKind::Text, review.reviewer_email.clone()),
    ]);
    Self { base: review, form }
  }

  /// The base review with the form's values written over it. The date is
  /// not editable.
  fn review(&self) -> Review {
    let text = |name: &str| self.form.get(name).unwrap_or_default().to_string();
    Review {
      rating: text("rating").trim().parse().unwrap_or(0.0),
      comment: text("comment"),
      reviewer_name: text("reviewerName"),
      reviewer_email: text("reviewerEmail"),
      ..self.base.clone()
    }
  }

  /// Added and never filled in
  fn is_blank(&self) -> bool {
    self.form.fields().iter().all(|f| f.value().trim().is_empty())
  }
}

/// List of a product's reviews with add, remove and per-review editing.
///
/// In the list: j/k select, `a` adds a review, `d` removes the selected
/// one, Enter opens it. An open review is a [`FieldForm`]; Esc or `q`
/// closes it again. `s` saves from either level.
///
/// Reviews added but left blank are ignored. A review with anything typed
/// into it needs a rating and a comment.
#[derive(Debug, Clone, Default)]
pub struct ReviewEditor {
  original: Vec<Review>,
  entries: Vec<Entry>,
  selected: usize,
  open: bool,
}

impl ReviewEditor {
  pub fn new(reviews: &[Review]) -> Self {
    Self {
      original: reviews.to_vec(),
      entries: reviews.iter().cloned().map(Entry::new).collect(),
      ..Self::default()
    }
  }

  /// Start over from `reviews`, e.g. the ones a save returned.
  pub fn reset(&mut self, reviews: &[Review]) {
    *self = Self::new(reviews);
  }

  /// Reviews as they would be sent. Blank additions are left out.
  pub fn reviews(&self) -> Vec<Review> {
    self
      .entries
      .iter()
      .filter(|entry| !entry.is_blank())
      .map(Entry::review)
      .collect()
  }

  pub fn count(&self) -> usize {
    self.entries.len()
  }

  pub fn is_modified(&self) -> bool {
    self.reviews() != self.original
  }

  /// A text field of an open review is taking keystrokes.
  pub fn is_editing(&self) -> bool {
    self.open
      && self
        .entries
        .get(self.selected)
        .is_some_and(|entry| entry.form.is_editing())
  }

  /// Every problem as `Review <n> <field> <problem>`.
  pub fn problems(&self) -> Vec<String> {
    self
      .entries
      .iter()
      .enumerate()
      .filter(|(_, entry)| !entry.is_blank())
      .flat_map(|(i, entry)| {
        entry.form.problems().into_iter().map(move |(label, problem)| {
          format!("Review {} {} {}", i + 1, label.to_lowercase(), problem)
        })
      })
      .collect()
  }

  fn add(&mut self) {
    let review = Review {
      date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
      ..Review::default()
    };
    self.entries.push(Entry::new(review));
    self.selected = self.entries.len() - 1;
    self.open = true;
  }

  fn remove_selected(&mut self) {
    if self.selected < self.entries.len() {
      self.entries.remove(self.selected);
    }
    self.selected = self.selected.min(self.entries.len().saturating_sub(1));
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if self.open {
      let Some(entry) = self.entries.get_mut(self.selected) else {
        self.open = false;
        return KeyResult::Handled;
      };
      return match entry.form.handle_key(key) {
        KeyResult::Event(FormEvent::Cancel) => {
          self.open = false;
          KeyResult::Handled
        }
        other => other,
      };
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.entries.is_empty() {
          self.selected = (self.selected + 1) % self.entries.len();
        }
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.entries.is_empty() {
          self.selected = (self.selected + self.entries.len() - 1) % self.entries.len();
        }
      }
      KeyCode::Char('a') => self.add(),
      KeyCode::Char('d') | KeyCode::Delete => self.remove_selected(),
      KeyCode::Enter | KeyCode::Char('i') => self.open = !self.entries.is_empty(),
      KeyCode::Char('s') => return KeyResult::Event(FormEvent::Save),
      KeyCode::Esc | KeyCode::Char('q') => return KeyResult::Event(FormEvent::Cancel),
      _ => return KeyResult::NotHandled,
    }
    KeyResult::Handled
  }

  pub fn render(&self, frame: &mut Frame, area: Rect, block: Block) {
    if self.open {
      if let Some(entry) = self.entries.get(self.selected) {
        let block = block.title(format!(" Review {} ", self.selected + 1));
        entry.form.render(frame, area, block);
        return;
      }
    }

    let items: Vec<ListItem> = self.entries.iter().map(row).collect();
    let list = List::new(items)
      .block(block.borders(Borders::ALL))
      .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select((!self.entries.is_empty()).then_some(self.selected));
    frame.render_stateful_widget(list, area, &mut state);
  }
}

fn row(entry: &Entry) -> ListItem<'static> {
  if entry.is_blank() {
    return ListItem::new(Span::styled(
      "(empty, not sent)",
      Style::default().fg(Color::DarkGray),
    ));
  }
  let review = entry.review();
  let mut spans = vec![
    Span::styled(
      format!("{:>4} ", entry.form.get("rating").unwrap_or_default()),
      Style::default().fg(Color::Yellow),
    ),
    Span::styled(
      format!("{:<20} ", review.reviewer_name),
      Style::default().fg(Color::Cyan),
    ),
    Span::raw(review.comment),
  ];
  if !entry.form.problems().is_empty() {
    spans.push(Span::styled("  (incomplete)", Style::default().fg(Color::Red)));
  }
  ListItem::new(Line::from(spans))
}
