/// Available commands and autocomplete logic

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "products",
    aliases: &["p", "product", "list"],
    description: "Browse products page by page",
  },
  Command {
    name: "all",
    aliases: &["a", "everything"],
    description: "All products on one page",
  },
  Command {
    name: "categories",
    aliases: &["c", "category", "cats"],
    description: "Product categories",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit prodcat",
  },
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    let rank = if cmd.name == input_lower {
      0
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      1
    } else if cmd.name.starts_with(&input_lower) {
      2
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      3
    } else if cmd.name.contains(&input_lower) {
      4
    } else if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      5
    } else {
      continue;
    };
    matches.push((cmd, rank));
  }

  // Stable: ties keep declaration order
  matches.sort_by_key(|(_, rank)| *rank);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("categories");
    assert_eq!(suggestions[0].name, "categories");
  }

  #[test]
  fn test_alias_match() {
    assert_eq!(get_suggestions("p")[0].name, "products");
    assert_eq!(get_suggestions("c")[0].name, "categories");
    assert_eq!(get_suggestions("q")[0].name, "quit");
  }

  #[test]
  fn test_prefix_match() {
    assert_eq!(get_suggestions("prod")[0].name, "products");
    assert_eq!(get_suggestions("al")[0].name, "all");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("gor");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].name, "categories");
  }

  #[test]
  fn test_no_match() {
    assert!(get_suggestions("zzz").is_empty());
  }
}
