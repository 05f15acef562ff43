use ratatui::prelude::Color;

/// Truncate a string to at most `max_len` characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a product availability status
pub fn availability_color(status: &str) -> Color {
  match status {
    "In Stock" => Color::Green,
    "Low Stock" => Color::Yellow,
    "Out of Stock" => Color::Red,
    _ => Color::White,
  }
}

pub fn format_price(price: f64) -> String {
  format!("${:.2}", price)
}

/// Join a list for display, or a placeholder when empty
pub fn join_or(items: &[String], placeholder: &str) -> String {
  if items.is_empty() {
    placeholder.to_string()
  } else {
    items.join(", ")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("Crème brûlée set", 8), "Crème...");
  }

  #[test]
  fn test_availability_color() {
    assert_eq!(availability_color("In Stock"), Color::Green);
    assert_eq!(availability_color("Low Stock"), Color::Yellow);
    assert_eq!(availability_color("Out of Stock"), Color::Red);
    assert_eq!(availability_color(""), Color::White);
  }

  #[test]
  fn test_format_price() {
    assert_eq!(format_price(9.99), "$9.99");
    assert_eq!(format_price(1899.0), "$1899.00");
  }

  #[test]
  fn test_join_or() {
    assert_eq!(join_or(&[], "none"), "none");
    assert_eq!(join_or(&["a".into(), "b".into()], "none"), "a, b");
  }
}
