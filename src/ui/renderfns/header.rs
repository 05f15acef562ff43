use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar: logo, catalog host and breadcrumb on the left,
/// cache status on the right.
pub fn draw_header(frame: &mut Frame, area: Rect, host: &str, breadcrumb: &[String], status: &str) {
  let mut spans = vec![
    Span::styled(" prodcat ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", host), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::raw(" "),
  ];

  for (i, part) in breadcrumb.iter().enumerate() {
    if i > 0 {
      spans.push(Span::styled(" > ", Style::default().fg(Color::DarkGray)));
    }

    let style = if i + 1 == breadcrumb.len() {
      // Current view - highlighted
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::White)
    };

    spans.push(Span::styled(part.clone(), style));
  }

  let status = Span::styled(format!("{} ", status), Style::default().fg(Color::DarkGray));
  let chunks = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Min(0), Constraint::Length(status.width() as u16)])
    .split(area);

  let style = Style::default().bg(Color::Black);
  frame.render_widget(Paragraph::new(Line::from(spans)).style(style), chunks[0]);
  frame.render_widget(Paragraph::new(status).style(style), chunks[1]);
}
