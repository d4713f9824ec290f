use anyhow::Context;
use minijinja::{context, Environment};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::model::analysis::{ActionItem, EmailSummary};

use super::priority::PriorityResult;

const FOCUS_MODE_TEMPLATE_NAME: &str = "focus_mode.txt";

// Block tags sit on their own lines and vanish with trim/lstrip. The blank
// line after an item absorbs the newline eaten by its trailing `endif`.
const FOCUS_MODE_TEMPLATE: &str = r#"{% if attention %}
⚠️ {{ level }} PRIORITY (score {{ score }}/100)
{% else %}
PRIORITY: {{ level }} (score {{ score }}/100)
{% endif %}

📋 {{ summary }}
{% if action_items %}

✅ ACTION ITEMS:
{% for item in action_items %}
{{ loop.index }}. {{ item.text }}{% if item.deadline %} (Due: {{ item.deadline }}){% endif %}{% if item.assignee %} [@{{ item.assignee }}]{% endif %}

{% endfor %}
{% endif %}
{% if key_points %}

🔑 KEY POINTS:
{% for point in key_points %}
• {{ point }}
{% endfor %}
{% endif %}
"#;

static FOCUS_MODE_ENV: Lazy<Environment<'static>> = Lazy::new(|| {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template(FOCUS_MODE_TEMPLATE_NAME, FOCUS_MODE_TEMPLATE)
        .unwrap();
    env
});

#[derive(Serialize)]
struct FocusItem<'a> {
    text: &'a str,
    deadline: Option<&'a str>,
    assignee: Option<&'a str>,
}

impl<'a> From<&'a ActionItem> for FocusItem<'a> {
    fn from(item: &'a ActionItem) -> Self {
        Self {
            text: &item.text,
            deadline: item.has_deadline().then_some(item.deadline.as_str()),
            assignee: item.has_assignee().then_some(item.assignee.as_str()),
        }
    }
}

/// Condensed plain-text view: priority line, summary, the first
/// `max_items` action items and the key points.
pub fn render_focus_mode(
    priority: &PriorityResult,
    summary: &EmailSummary,
    action_items: &[ActionItem],
    max_items: usize,
) -> anyhow::Result<String> {
    let items: Vec<FocusItem> = action_items.iter().take(max_items).map(Into::into).collect();

    let template = FOCUS_MODE_ENV
        .get_template(FOCUS_MODE_TEMPLATE_NAME)
        .context("Focus mode template is missing")?;
    let rendered = template
        .render(context! {
            attention => priority.level.needs_attention(),
            level => priority.level.label(),
            score => priority.score,
            summary => summary.summary,
            action_items => items,
            key_points => summary.key_points,
        })
        .context("Could not render focus mode")?;

    Ok(rendered.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        email::priority::{PriorityBreakdown, PriorityLevel},
        model::analysis::Confidence,
    };

    fn priority(score: u8, level: PriorityLevel) -> PriorityResult {
        PriorityResult {
            score,
            level,
            color: level.color(),
            breakdown: PriorityBreakdown::default(),
        }
    }

    fn summary(key_points: &[&str]) -> EmailSummary {
        EmailSummary {
            summary: "Q4 report is due tomorrow.".to_string(),
            key_points: key_points.iter().map(|p| p.to_string()).collect(),
            tone: "urgent".to_string(),
        }
    }

    #[test]
    fn test_full_render() {
        let items = vec![
            ActionItem::new(
                "Review projections",
                Some("Alex".into()),
                Some("5 PM today".into()),
                Confidence::High,
            ),
            ActionItem::new("Confirm tasks", None, None, Confidence::Low),
        ];
        let text = render_focus_mode(
            &priority(82, PriorityLevel::Critical),
            &summary(&["Board meeting Wednesday", "Three owners"]),
            &items,
            5,
        )
        .unwrap();

        assert_eq!(
            text,
            "⚠️ CRITICAL PRIORITY (score 82/100)\n\
             \n\
             📋 Q4 report is due tomorrow.\n\
             \n\
             ✅ ACTION ITEMS:\n\
             1. Review projections (Due: 5 PM today) [@Alex]\n\
             2. Confirm tasks\n\
             \n\
             🔑 KEY POINTS:\n\
             • Board meeting Wednesday\n\
             • Three owners"
        );
    }

    #[test]
    fn test_low_priority_without_sections() {
        let text = render_focus_mode(
            &priority(30, PriorityLevel::Medium),
            &summary(&[]),
            &[],
            5,
        )
        .unwrap();

        assert_eq!(
            text,
            "PRIORITY: MEDIUM (score 30/100)\n\n📋 Q4 report is due tomorrow."
        );
    }

    #[test]
    fn test_action_items_are_capped() {
        let items: Vec<_> = (1..=4)
            .map(|i| ActionItem::new(format!("Task {i}"), None, None, Confidence::Low))
            .collect();
        let text = render_focus_mode(
            &priority(60, PriorityLevel::High),
            &summary(&[]),
            &items,
            2,
        )
        .unwrap();

        assert!(text.starts_with("⚠️ HIGH PRIORITY (score 60/100)"));
        assert!(text.contains("2. Task 2"));
        assert!(!text.contains("Task 3"));
        assert!(text.ends_with("2. Task 2"));
    }

    #[test]
    fn test_markup_is_not_escaped() {
        let mut s = summary(&[]);
        s.summary = "Use <b>bold</b> & \"quotes\"".to_string();
        let text = render_focus_mode(&priority(0, PriorityLevel::Low), &s, &[], 5).unwrap();
        assert!(text.ends_with("📋 Use <b>bold</b> & \"quotes\""));
    }
}
