//! Prompt generation for instruction interpretation.
//!
//! Builds the prompts that turn one natural-language edit instruction plus
//! a dataset sample into a row-program descriptor.

use serde_json::Value;

use crate::engine::{example_program, operations_description};

/// The transformation step JSON schema (embedded at compile time).
pub const STEP_SCHEMA: &str = include_str!("../../schemas/transformation-step.json");

/// Generate the system prompt for instruction interpretation.
pub fn system_prompt() -> String {
    let example = serde_json::to_string_pretty(&example_program()).unwrap_or_default();
    format!(
        r#"You are a data transformation expert. A user is editing a tabular dataset and gives you one instruction in natural language. Your task is to translate that instruction into a single transformation step.

## Output Format

You MUST return ONLY valid JSON matching this schema EXACTLY:

```json
{step_schema}
```

The `logic` field is a row program: an object with a `steps` array. Each step is one of:

- `rename_column` {{"from", "to"}} - rename a column, keeping its position
- `drop_columns` {{"columns": [...]}} - remove columns
- `select_columns` {{"columns": [...]}} - keep only these columns, in this order
- `set_column` {{"column", "value": <expression>}} - add or overwrite a column
- `update_column` {{"column", "ops": [...]}} - rewrite a column's cell through value operations
- `filter` {{"when": <condition>}} - keep only rows matching the condition

Expressions: `column` {{"name"}}, `constant` {{"value"}}, `concat` {{"parts": [...], "separator"?}}, `row_index`, `row_count`, `aggregate` {{"column", "func": "sum"|"average"|"min"|"max"|"count"}}, `apply` {{"input": <expression>, "ops": [...]}}.

Conditions: `equals`/`not_equals`/`greater_than`/`less_than` {{"left", "right"}}, `contains`/`matches` {{"value": <expression>, "pattern": <string>}} (contains is a literal substring, matches is a regex), `is_empty` {{"value"}}, `not` {{"of": <condition>}}, `all`/`any` {{"of": [<condition>, ...]}}.

Value operations (for `update_column` and `apply`):

{operations}

## Example

Instruction: "keep only people over 18 and uppercase their names"

```json
{example}
```

## Rules

1. Use ONLY the step types, expressions, conditions and operations listed above. Do NOT invent new ones.
2. Use exact column names from the sample (case-sensitive).
3. `type` is a short category: prefer "rename", "map_values", "filter", "extract" or "format"; anything else is treated as custom.
4. `description` is one plain sentence a non-programmer understands.
5. Regular expression patterns must be valid Rust regex syntax (no lookbehind, no backreferences).
6. Return ONLY the JSON object, no explanations or markdown."#,
        step_schema = STEP_SCHEMA,
        operations = operations_description(),
        example = example,
    )
}

/// Generate the user prompt with the instruction and a dataset sample.
pub fn user_prompt(instruction: &str, headers: &[String], sample_rows: &[Value]) -> String {
    let sample_json = serde_json::to_string_pretty(sample_rows).unwrap_or_default();
    let headers_json = serde_json::to_string(headers).unwrap_or_default();

    format!(
        r#"## Columns

{headers_json}

## Sample Rows ({count} shown)

```json
{sample_json}
```

## Instruction

{instruction}

Return ONLY the JSON object for this one instruction."#,
        count = sample_rows.len(),
    )
}

/// Build the message list for the API call.
pub fn build_messages(instruction: &str, headers: &[String], sample_rows: &[Value]) -> Vec<Value> {
    vec![serde_json::json!({
        "role": "user",
        "content": user_prompt(instruction, headers, sample_rows)
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_system_prompt_lists_steps_and_ops() {
        let prompt = system_prompt();
        assert!(prompt.contains("rename_column"));
        assert!(prompt.contains("update_column"));
        assert!(prompt.contains("trim"));
        assert!(prompt.contains("to_number"));
    }

    #[test]
    fn test_user_prompt_includes_sample() {
        let rows = vec![json!({"Name": "Ada", "Born": "1815"})];
        let headers = vec!["Name".to_string(), "Born".to_string()];
        let prompt = user_prompt("drop the Born column", &headers, &rows);
        assert!(prompt.contains("Ada"));
        assert!(prompt.contains("drop the Born column"));
        assert!(prompt.contains("1 shown"));
    }

    #[test]
    fn test_step_schema_is_valid_json() {
        let schema: Value = serde_json::from_str(STEP_SCHEMA).unwrap();
        assert!(schema.get("properties").is_some());
    }
}
