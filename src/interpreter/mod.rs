//! Instruction interpretation via the Anthropic Messages API.
//!
//! One natural-language instruction plus a dataset sample goes in; a
//! [`TransformationDescriptor`] comes back. The response is validated
//! against the embedded step schema before it reaches the executor, so a
//! malformed generation surfaces here as a command error instead of a
//! silent no-op later.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rowlab::interpreter::{AiInterpreter, CommandInterpreter};
//!
//! let interpreter = AiInterpreter::from_env();
//! let descriptor = interpreter
//!     .interpret("drop the notes column", &headers, &sample)
//!     .await?;
//! ```

pub mod prompt;

use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::future::Future;

use crate::error::{InterpreterError, InterpreterResult};
use crate::models::TransformationDescriptor;

pub use prompt::{system_prompt, user_prompt};

/// Anything that can turn an instruction into a transformation descriptor.
///
/// The session and pipeline are generic over this, which keeps the remote
/// service out of their tests.
pub trait CommandInterpreter {
    fn interpret(
        &self,
        instruction: &str,
        headers: &[String],
        sample_rows: &[Value],
    ) -> impl Future<Output = InterpreterResult<TransformationDescriptor>> + Send;
}

/// Anthropic API client.
#[derive(Clone)]
pub struct AiInterpreter {
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

/// Anthropic API response structure.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API error response.
#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Number of attempts per instruction.
const MAX_RETRIES: u32 = 3;

/// Delay between attempts in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

impl AiInterpreter {
    /// Create a new interpreter with an explicit API key.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key: Some(api_key),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
        }
    }

    /// Create an interpreter from the `ANTHROPIC_API_KEY` environment
    /// variable (a `.env` file works too).
    ///
    /// A missing key is not fatal here: the interpreter is constructed
    /// anyway and every `interpret` call fails with an actionable message,
    /// so the rest of the application (upload, queue, export) keeps working.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let api_key = env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
        }
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Whether a credential is configured.
    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// Single attempt: call the API and parse the descriptor.
    async fn try_interpret(
        &self,
        api_key: &str,
        instruction: &str,
        headers: &[String],
        sample_rows: &[Value],
    ) -> InterpreterResult<TransformationDescriptor> {
        let response = self
            .call_api(api_key, instruction, headers, sample_rows)
            .await?;
        parse_descriptor(&response)
    }

    async fn call_api(
        &self,
        api_key: &str,
        instruction: &str,
        headers: &[String],
        sample_rows: &[Value],
    ) -> InterpreterResult<String> {
        let client = reqwest::Client::new();

        let messages = prompt::build_messages(instruction, headers, sample_rows);
        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0,
            "system": prompt::system_prompt(),
            "messages": messages
        });

        let response = client
            .post("https://api.anthropic.com/v1/messages")
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| InterpreterError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| InterpreterError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<AnthropicError>(&body) {
                return Err(InterpreterError::Api(error.error.message));
            }
            return Err(InterpreterError::Api(format!("HTTP {}: {}", status, body)));
        }

        let response: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| InterpreterError::InvalidResponse(e.to_string()))?;

        let text = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(InterpreterError::InvalidResponse(
                "Empty response".to_string(),
            ));
        }

        Ok(text)
    }
}

impl CommandInterpreter for AiInterpreter {
    /// Interpret one instruction, with retries.
    async fn interpret(
        &self,
        instruction: &str,
        headers: &[String],
        sample_rows: &[Value],
    ) -> InterpreterResult<TransformationDescriptor> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(InterpreterError::MissingApiKey)?;

        let mut last_error = None;
        for attempt in 1..=MAX_RETRIES {
            match self
                .try_interpret(&api_key, instruction, headers, sample_rows)
                .await
            {
                Ok(descriptor) => return Ok(descriptor),
                Err(e) => {
                    eprintln!("interpreter attempt {}/{} failed: {}", attempt, MAX_RETRIES, e);
                    last_error = Some(e);
                    if attempt < MAX_RETRIES {
                        tokio::time::sleep(tokio::time::Duration::from_millis(RETRY_DELAY_MS))
                            .await;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| InterpreterError::Api("Unknown error".to_string())))
    }
}

/// Parse and validate a transformation descriptor from the response text.
pub fn parse_descriptor(response: &str) -> InterpreterResult<TransformationDescriptor> {
    let json_str = extract_json(response);

    let value: Value = serde_json::from_str(&json_str).map_err(|e| {
        InterpreterError::InvalidResponse(format!(
            "Not valid JSON: {}. Response was: {}",
            e,
            truncate_chars(response, 500)
        ))
    })?;

    validate_against_schema(&value)?;

    let descriptor: TransformationDescriptor = serde_json::from_value(value)
        .map_err(|e| InterpreterError::InvalidResponse(e.to_string()))?;

    let steps = descriptor
        .logic
        .get("steps")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    if steps == 0 {
        return Err(InterpreterError::EmptyLogic);
    }

    Ok(descriptor)
}

/// Check the raw value against the embedded step schema.
fn validate_against_schema(value: &Value) -> InterpreterResult<()> {
    let schema: Value = serde_json::from_str(prompt::STEP_SCHEMA)
        .map_err(|e| InterpreterError::InvalidResponse(e.to_string()))?;
    let validator = jsonschema::draft7::new(&schema)
        .map_err(|e| InterpreterError::InvalidResponse(e.to_string()))?;

    let errors: Vec<String> = validator
        .iter_errors(value)
        .map(|e| format!("{} at {}", e, e.instance_path()))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(InterpreterError::InvalidResponse(errors.join("; ")))
    }
}

/// First `max` characters of a response, safe to slice on multibyte text.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

/// Extract JSON from a response that may contain markdown code blocks.
fn extract_json(text: &str) -> String {
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start..].find("```\n").or_else(|| text[start..].rfind("```")) {
            let json_start = start + 7; // len of "```json"
            if json_start < start + end {
                return text[json_start..start + end].trim().to_string();
            }
        }
    }

    if let Some(start) = text.find("```") {
        let after_start = start + 3;
        // skip language identifier if present
        let content_start = text[after_start..]
            .find('\n')
            .map(|i| after_start + i + 1)
            .unwrap_or(after_start);

        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim().to_string();
        }
    }

    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if start < end {
                return text[start..=end].to_string();
            }
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransformationKind;

    #[test]
    fn test_extract_json_from_code_block() {
        let response = r#"Here it is:

```json
{
  "type": "filter_rows",
  "description": "Keeps adults only",
  "logic": {"steps": []}
}
```

Done!"#;

        let json = extract_json(response);
        assert!(json.contains("\"filter_rows\""));
        assert!(!json.contains("```"));
    }

    #[test]
    fn test_extract_raw_json() {
        let response = r#"{"type": "x", "description": "y", "logic": {"steps": []}}"#;
        assert_eq!(extract_json(response), response);
    }

    #[test]
    fn test_parse_descriptor_happy_path() {
        let response = r#"{
            "type": "rename",
            "description": "Renames Name to full_name",
            "logic": {"steps": [{"type": "rename_column", "from": "Name", "to": "full_name"}]}
        }"#;
        let descriptor = parse_descriptor(response).unwrap();
        assert_eq!(descriptor.kind, TransformationKind::Rename);
        assert!(descriptor.description.contains("full_name"));
    }

    #[test]
    fn test_long_multibyte_garbage_is_an_error_not_a_panic() {
        // euro sign is 3 bytes; a naive byte slice at 500 would split one
        let response = "\u{20AC}".repeat(200);
        let err = parse_descriptor(&response).unwrap_err();
        assert!(matches!(err, InterpreterError::InvalidResponse(_)));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        let text = "\u{20AC}".repeat(10);
        assert_eq!(truncate_chars(&text, 4).chars().count(), 4);
        assert_eq!(truncate_chars("short", 500), "short");
    }

    #[test]
    fn test_parse_descriptor_rejects_empty_steps() {
        let response = r#"{"type": "x", "description": "noop", "logic": {"steps": []}}"#;
        assert!(matches!(
            parse_descriptor(response),
            Err(InterpreterError::EmptyLogic)
        ));
    }

    #[test]
    fn test_parse_descriptor_rejects_missing_logic() {
        let response = r#"{"type": "x", "description": "no logic here"}"#;
        assert!(matches!(
            parse_descriptor(response),
            Err(InterpreterError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_descriptor_rejects_unknown_step_type() {
        let response = r#"{
            "type": "x",
            "description": "bad step",
            "logic": {"steps": [{"type": "explode_rows"}]}
        }"#;
        assert!(matches!(
            parse_descriptor(response),
            Err(InterpreterError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_missing_key_fails_per_call() {
        let interpreter = AiInterpreter {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 2048,
        };
        assert!(!interpreter.has_credentials());
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let err = rt
            .block_on(interpreter.interpret("anything", &[], &[]))
            .unwrap_err();
        assert!(matches!(err, InterpreterError::MissingApiKey));
    }
}
