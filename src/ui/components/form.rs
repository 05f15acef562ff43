use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::catalog::parse_timestamp;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};

/// What a field accepts
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
  Text,
  /// Non-negative decimal number
  Decimal,
  /// Non-negative whole number
  Integer,
  /// Decimal number within `min..=max`
  Range { min: f64, max: f64 },
  /// Comma-separated values
  List,
  /// RFC 3339 or `YYYY-MM-DD HH:MM:SS`. Can start out empty but, once set,
  /// cannot be cleared
  Timestamp,
  /// One of a fixed set, cycled with Left/Right
  Choice(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct Field {
  pub name: &'static str,
  pub label: &'static str,
  pub kind: FieldKind,
  pub required: bool,
  input: TextInput,
  original: String,
}

impl Field {
  pub fn new(name: &'static str, label: &'static str, kind: FieldKind, value: String) -> Self {
    Self {
      name,
      label,
      kind,
      required: false,
      input: TextInput::with_value(&value),
      original: value,
    }
  }

  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub fn value(&self) -> &str {
    self.input.value()
  }

  pub fn is_modified(&self) -> bool {
    self.input.value() != self.original
  }

  /// Why the current value is unacceptable, if it is.
  pub fn problem(&self) -> Option<String> {
    let value = self.value().trim();
    if value.is_empty() {
      if self.kind == FieldKind::Timestamp && !self.original.trim().is_empty() {
        return Some("cannot be cleared".to_string());
      }
      return self.required.then(|| "is required".to_string());
    }
    match &self.kind {
      FieldKind::Decimal => match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n >= 0.0 => None,
        _ => Some("must be a non-negative number".to_string()),
      },
      FieldKind::Integer => value
        .parse::<u64>()
        .err()
        .map(|_| "must be a whole number".to_string()),
      FieldKind::Range { min, max } => match value.parse::<f64>() {
        Ok(n) if (*min..=*max).contains(&n) => None,
        _ => Some(format!("must be from {} to {}", min, max)),
      },
      FieldKind::Timestamp => parse_timestamp(value)
        .is_none()
        .then(|| "must look like 2024-05-23 08:56:21".to_string()),
      FieldKind::Choice(options) if !options.is_empty() && !options.iter().any(|o| o == value) => {
        Some("is not a known option".to_string())
      }
      _ => None,
    }
  }

  fn cycle(&mut self, step: isize) {
    let FieldKind::Choice(options) = &self.kind else {
      return;
    };
    if options.is_empty() {
      return;
    }
    let len = options.len() as isize;
    let current = options
      .iter()
      .position(|o| o == self.input.value())
      .map_or(if step > 0 { -1 } else { 0 }, |i| i as isize);
    let next = (current + step).rem_euclid(len) as usize;
    let value = options[next].clone();
    self.input.set_value(&value);
  }
}

/// Events emitted by the form that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  Save,
  Cancel,
}

/// Vertical list of editable fields.
///
/// Navigate with j/k, Enter edits the selected field (Enter again keeps the
/// change, Esc reverts it), `u` restores the loaded value, `s` saves.
#[derive(Debug, Clone, Default)]
pub struct FieldForm {
  fields: Vec<Field>,
  selected: usize,
  editing: bool,
  /// Value of the selected field when editing started
  before_edit: String,
}

impl FieldForm {
  pub fn new(fields: Vec<Field>) -> Self {
    Self {
      fields,
      ..Self::default()
    }
  }

  pub fn fields(&self) -> &[Field] {
    &self.fields
  }

  pub fn get(&self, name: &str) -> Option<&str> {
    self.field(name).map(Field::value)
  }

  fn field(&self, name: &str) -> Option<&Field> {
    self.fields.iter().find(|f| f.name == name)
  }

  /// Offer `options` for a choice field, e.g. once they have loaded.
  pub fn set_choices(&mut self, name: &str, options: Vec<String>) {
    if let Some(field) = self.fields.iter_mut().find(|f| f.name == name) {
      field.kind = FieldKind::Choice(options);
    }
  }

  pub fn is_editing(&self) -> bool {
    self.editing
  }

  pub fn is_modified(&self) -> bool {
    self.fields.iter().any(Field::is_modified)
  }

  pub fn selected(&self) -> Option<&Field> {
    self.fields.get(self.selected)
  }

  /// Every invalid field as `(label, problem)`.
  pub fn problems(&self) -> Vec<(&'static str, String)> {
    self
      .fields
      .iter()
      .filter_map(|f| f.problem().map(|p| (f.label, p)))
      .collect()
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if self.editing {
      let Some(field) = self.fields.get_mut(self.selected) else {
        self.editing = false;
        return KeyResult::Handled;
      };
      match field.input.handle_key(key) {
        InputResult::Submitted(_) => self.editing = false,
        InputResult::Cancelled => {
          field.input.set_value(&self.before_edit);
          self.editing = false;
        }
        InputResult::Consumed | InputResult::NotHandled => {}
      }
      return KeyResult::Handled;
    }

    match key.code {
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.fields.is_empty() {
          self.selected = (self.selected + 1) % self.fields.len();
        }
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.fields.is_empty() {
          self.selected = (self.selected + self.fields.len() - 1) % self.fields.len();
        }
      }
      KeyCode::Left | KeyCode::Char('h') => self.cycle_selected(-1),
      KeyCode::Right | KeyCode::Char('l') => self.cycle_selected(1),
      KeyCode::Enter | KeyCode::Char('i') => {
        if let Some(field) = self.fields.get(self.selected) {
          self.before_edit = field.value().to_string();
          self.editing = true;
        }
      }
      KeyCode::Char('u') => {
        if let Some(field) = self.fields.get_mut(self.selected) {
          let original = field.original.clone();
          field.input.set_value(&original);
        }
      }
      KeyCode::Char('s') => return KeyResult::Event(FormEvent::Save),
      KeyCode::Esc | KeyCode::Char('q') => return KeyResult::Event(FormEvent::Cancel),
      _ => return KeyResult::NotHandled,
    }
    KeyResult::Handled
  }

  fn cycle_selected(&mut self, step: isize) {
    if let Some(field) = self.fields.get_mut(self.selected) {
      field.cycle(step);
    }
  }

  /// Everything becomes unmodified, e.g. after a successful save.
  pub fn commit(&mut self) {
    for field in &mut self.fields {
      field.original = field.value().to_string();
    }
  }

  pub fn render(&self, frame: &mut Frame, area: Rect, block: Block) {
    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.chars().count())
      .max()
      .unwrap_or(0);

    let items: Vec<ListItem> = self
      .fields
      .iter()
      .enumerate()
      .map(|(i, field)| {
        let editing = self.editing && i == self.selected;
        let label_style = if field.is_modified() {
          Style::default().fg(Color::Yellow)
        } else {
          Style::default().fg(Color::DarkGray)
        };
        let marker = if field.required { "*" } else { " " };

        let mut spans = vec![Span::styled(
          format!("{:<width$}{} ", field.label, marker, width = label_width),
          label_style,
        )];
        if editing {
          spans.extend(with_cursor(field.value(), field.input.cursor_position()));
        } else {
          spans.push(Span::raw(field.value().to_string()));
        }
        if matches!(field.kind, FieldKind::Choice(_)) && !editing {
          spans.push(Span::styled("  </>", Style::default().fg(Color::DarkGray)));
        }
        if let Some(problem) = field.problem() {
          spans.push(Span::styled(
            format!("  ({})", problem),
            Style::default().fg(Color::Red),
          ));
        }
        ListItem::new(Line::from(spans))
      })
      .collect();

    let highlight = if self.editing {
      Style::default().bg(Color::Blue)
    } else {
      Style::default().bg(Color::DarkGray)
    };
    let list = List::new(items)
      .block(block.borders(Borders::ALL))
      .highlight_style(highlight.add_modifier(Modifier::BOLD))
      .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(self.selected));
    frame.render_stateful_widget(list, area, &mut state);
  }
}

/// `value` split around a reversed cell at char index `cursor`.
fn with_cursor(value: &str, cursor: usize) -> Vec<Span<'static>> {
  let before: String = value.chars().take(cursor).collect();
  let mut rest = value.chars().skip(cursor);
  let under = rest.next().map_or_else(|| " ".to_string(), String::from);
  let after: String = rest.collect();
  vec![
    Span::raw(before),
    Span::styled(under, Style::default().add_modifier(Modifier::REVERSED)),
    Span::raw(after),
  ]
}
