use crate::manifest::ToolDescriptor;
use serde::{Deserialize, Serialize};

/// Rough token-equivalent count: one token per four characters.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Just enough for a caller to decide whether a tool is worth loading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub parameters: Vec<String>,
}

impl ToolSummary {
    pub fn estimated_tokens(&self) -> usize {
        serde_json::to_string(self)
            .map(|s| estimate_tokens(&s))
            .unwrap_or(usize::MAX)
    }
}

/// Smallest budget any summary can fit: the cost of an all-empty summary.
pub fn min_summary_budget() -> usize {
    ToolSummary::default().estimated_tokens()
}

/// Project `descriptor` onto a summary that fits within `budget` tokens.
///
/// Shrinks in order: description (word by word), parameter list (from the
/// end), then the name itself. Budgets below [`min_summary_budget`] cannot
/// be met; callers are expected to reject them up front.
pub fn build_summary(descriptor: &ToolDescriptor, budget: usize) -> ToolSummary {
    let mut summary = ToolSummary {
        name: descriptor.name.clone(),
        description: descriptor.description.clone(),
        parameters: descriptor.parameter_names(),
    };
    if summary.estimated_tokens() <= budget {
        return summary;
    }

    let mut words: Vec<&str> = descriptor.description.split_whitespace().collect();
    while summary.estimated_tokens() > budget && !words.is_empty() {
        words.pop();
        summary.description = if words.is_empty() {
            String::new()
        } else {
            format!("{}…", words.join(" "))
        };
    }

    while summary.estimated_tokens() > budget && summary.parameters.pop().is_some() {}

    while summary.estimated_tokens() > budget && summary.name.pop().is_some() {}

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn descriptor(description: &str, params: usize) -> ToolDescriptor {
        let mut properties = Map::new();
        for i in 0..params {
            properties.insert(
                format!("parameter_number_{i:03}"),
                json!({"type": "string", "description": "x".repeat(200)}),
            );
        }
        ToolDescriptor {
            name: "crm.lookup".to_string(),
            version: "1.0.0".to_string(),
            author: None,
            description: description.to_string(),
            storage_locator: "crm.tool".to_string(),
            input_schema: json!({"type": "object", "properties": Value::Object(properties)}),
            output_schema: json!({}),
            estimated_tokens: 0,
            estimated_latency_ms: 0,
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_small_tool_unchanged() {
        let summary = build_summary(&descriptor("Find a customer", 2), 50);
        assert_eq!(summary.description, "Find a customer");
        assert_eq!(summary.parameters.len(), 2);
        assert!(summary.estimated_tokens() <= 50);
    }

    #[test]
    fn test_long_description_truncated_on_word_boundary() {
        let long = "Look up a customer record by email address and return the profile ".repeat(10);
        let summary = build_summary(&descriptor(&long, 1), 50);

        assert!(summary.estimated_tokens() <= 50);
        assert!(summary.description.ends_with('…'));
        assert!(long.starts_with(summary.description.trim_end_matches('…')));
        assert_eq!(summary.parameters.len(), 1);
    }

    #[test]
    fn test_budget_holds_for_huge_schemas() {
        for params in [0, 5, 50, 500] {
            for budget in [16, 30, 50, 120] {
                let summary = build_summary(&descriptor(&"word ".repeat(300), params), budget);
                assert!(
                    summary.estimated_tokens() <= budget,
                    "params={} budget={} got={}",
                    params,
                    budget,
                    summary.estimated_tokens()
                );
            }
        }
    }

    #[test]
    fn test_budget_holds_at_floor() {
        let floor = min_summary_budget();
        assert_eq!(floor, estimate_tokens(r#"{"name":"","description":"","parameters":[]}"#));

        let summary = build_summary(&descriptor(&"word ".repeat(50), 20), floor);
        assert!(summary.estimated_tokens() <= floor);
        assert!(summary.name.is_empty());
        assert!(summary.parameters.is_empty());
    }

    #[test]
    fn test_schema_details_excluded() {
        let summary = build_summary(&descriptor("Find", 1), 50);
        let encoded = serde_json::to_string(&summary).unwrap();
        assert!(!encoded.contains("\"type\""));
    }
}
