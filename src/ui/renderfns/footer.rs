use crate::ui::view::{Notice, ShortcutInfo};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar: shortcuts on the left, the latest notice after them
pub fn draw_footer(frame: &mut Frame, area: Rect, shortcuts: &[ShortcutInfo], notice: Option<&Notice>) {
  let mut sorted: Vec<&ShortcutInfo> = shortcuts.iter().collect();
  sorted.sort_by_key(|s| s.priority);

  let mut spans = vec![Span::raw(" ")];
  for shortcut in sorted {
    // Keys and brackets highlighted, descriptions dimmed
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}   ", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  match notice {
    Some(Notice::Error(message)) => {
      spans.push(Span::styled(
        format!("✗ {}", message),
        Style::default().fg(Color::Red).bold(),
      ));
    }
    Some(Notice::Info(message)) => {
      spans.push(Span::styled(
        format!("✓ {}", message),
        Style::default().fg(Color::Green),
      ));
    }
    None => {}
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
