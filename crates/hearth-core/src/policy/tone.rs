//! Pattern-based content policy for outbound text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::traits::{ContentPolicy, PolicyVerdict};

struct PatternFamily {
    name: &'static str,
    pattern: Regex,
}

fn family(name: &'static str, pattern: &str) -> PatternFamily {
    PatternFamily {
        name,
        pattern: Regex::new(pattern).expect("valid regex"),
    }
}

static FAMILIES: Lazy<Vec<PatternFamily>> = Lazy::new(|| {
    vec![
        family(
            "blame",
            r"(?i)\b(your fault|because of you|you (always|never|forgot|didn't|did not)|blame)\b",
        ),
        family(
            "comparison",
            r"(?i)\b((more|less|fewer|better|worse|harder|faster) than|unlike|compared (to|with)|than (you|him|her|them|everyone))\b",
        ),
        family(
            "command",
            r"(?i)(^\s*(go|do|clean|make|stop|start)\b|\b(you should|you need to|you must|you have to|don't forget to|make sure (you|to)))",
        ),
        family(
            "judgment",
            r"(?i)\b(lazy|finally|about time|slacking|useless|messy|good job|well done|great job|proud of)\b",
        ),
    ]
});

/// Rejects blame, comparison, command and judgment phrasing. Never edits text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternContentPolicy;

impl PatternContentPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl ContentPolicy for PatternContentPolicy {
    fn check(&self, text: &str) -> PolicyVerdict {
        for family in FAMILIES.iter() {
            if let Some(m) = family.pattern.find(text) {
                return PolicyVerdict::Invalid {
                    reason: format!("{}: '{}'", family.name, m.as_str().trim()),
                };
            }
        }
        PolicyVerdict::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(text: &str) -> Option<String> {
        match PatternContentPolicy::new().check(text) {
            PolicyVerdict::Valid => None,
            PolicyVerdict::Invalid { reason } => Some(reason),
        }
    }

    #[test]
    fn test_neutral_text_passes() {
        assert_eq!(reason("Noted, washing-up."), None);
        assert_eq!(reason("Did you mean laundry?"), None);
        assert_eq!(reason("Logged the school-run for today."), None);
    }

    #[test]
    fn test_each_family_rejects() {
        assert!(reason("You never do the bins").unwrap().starts_with("blame"));
        assert!(reason("That's more than Alex did").unwrap().starts_with("comparison"));
        assert!(reason("You should hoover next").unwrap().starts_with("command"));
        assert!(reason("Finally, the dishes").unwrap().starts_with("judgment"));
        assert!(reason("Well done on the laundry").unwrap().starts_with("judgment"));
    }
}
