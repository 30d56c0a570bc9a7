//! Prompt templates with a `{company_name}` placeholder.

pub const COMPANY_PLACEHOLDER: &str = "{company_name}";

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a business analyst providing detailed company analysis.";

pub const DEFAULT_TEMPLATE: &str = r#"You are a social media research expert. I need you to find the official Twitter handles for {company_name}.

Company: {company_name}

Please provide:
1. The main company's official Twitter handle

Focus on:
- Official corporate accounts (usually verified with blue checkmark)

Format your response strictly as JSON with the following schema:
{
  "company_name": "{company_name}",
  "main_twitter_handle": "@company_handle"
}

Important:
- Only include verified or clearly official accounts
- Use @ symbol for all handles
- If no Twitter handle is found, use null for the handle field
- Be specific about account types and descriptions
- Only return JSON, no additional text"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: strip_line_comments(&template.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn has_placeholder(&self) -> bool {
        self.template.contains(COMPANY_PLACEHOLDER)
    }

    /// Substitutes every placeholder. Without a placeholder the template is
    /// returned unchanged.
    pub fn render(&self, company_name: &str) -> String {
        self.template.replace(COMPANY_PLACEHOLDER, company_name)
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

/// Drops `//` comments users paste into JSON examples. Only a `//` at the
/// start of a line or after whitespace counts, so URLs survive.
pub fn strip_line_comments(text: &str) -> String {
    let mut kept = Vec::new();
    for line in text.split('\n') {
        match comment_start(line) {
            Some(0) => continue,
            Some(idx) => kept.push(line[..idx].trim_end()),
            None => kept.push(line),
        }
    }
    kept.join("\n")
}

fn comment_start(line: &str) -> Option<usize> {
    let leading = line.len() - line.trim_start().len();
    if line[leading..].starts_with("//") {
        return Some(0);
    }
    line.match_indices("//")
        .map(|(idx, _)| idx)
        .find(|&idx| {
            line[..idx]
                .chars()
                .next_back()
                .is_some_and(char::is_whitespace)
        })
}

/// Substitutes several named `{placeholder}`s at once.
pub fn render_named(template: &str, values: &[(&str, &str)]) -> String {
    let mut rendered = template.to_string();
    for (name, value) in values {
        rendered = rendered.replace(&format!("{{{}}}", name), value);
    }
    rendered
}
