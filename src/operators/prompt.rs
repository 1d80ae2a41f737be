// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::OperatorError;
use crate::traits::{Operator, OperatorInput};

/// Prompt text with `{field}` placeholders.
///
/// Placeholders are looked up with [`OperatorInput::field`]: the bound input
/// first, then the upstream outputs. Strings are substituted as-is, arrays of
/// strings one per line, anything else as JSON. `{{` and `}}` produce literal
/// braces. As an operator it outputs `{"prompt": <rendered>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn render(&self, input: &OperatorInput) -> Result<String, OperatorError> {
        let mut out = String::with_capacity(self.template.len());
        let mut chars = self.template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => key.push(ch),
                            None => {
                                return Err(OperatorError::invalid_input(format!(
                                    "unterminated placeholder '{{{}' in prompt template",
                                    key
                                )))
                            }
                        }
                    }
                    let key = key.trim();
                    let value = input.field(key).ok_or_else(|| {
                        OperatorError::invalid_input(format!(
                            "prompt template references missing field '{}'",
                            key
                        ))
                    })?;
                    out.push_str(&substitution(value));
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}

fn substitution(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.iter().all(Value::is_string) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new("{query}")
    }
}

#[async_trait]
impl Operator for PromptTemplate {
    async fn forward(&self, input: OperatorInput) -> Result<Value, OperatorError> {
        Ok(json!({ "prompt": self.render(&input)? }))
    }

    fn name(&self) -> &str {
        "prompt_template"
    }
}
