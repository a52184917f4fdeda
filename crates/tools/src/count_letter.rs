//! Letter counter: the deterministic tool behind the "how many r's in
//! strawberry" example. Counting is case-insensitive.

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::Tool;
use serde::Deserialize;

pub struct CountLetterTool;

#[derive(Deserialize)]
struct Args {
    text: String,
    letter: String,
}

#[async_trait]
impl Tool for CountLetterTool {
    fn name(&self) -> &str {
        "count_letter"
    }

    fn description(&self) -> &str {
        "Count the number of occurrences of a specific letter in a given text. \
         Examples: how many \"r\" in \"strawberry\", how many \"a\" in \"alibaba\"."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The word or sentence to analyze"
                },
                "letter": {
                    "type": "string",
                    "minLength": 1,
                    "maxLength": 1,
                    "description": "The letter to count (single character)"
                }
            },
            "required": ["text", "letter"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<serde_json::Value, ToolError> {
        let args: Args = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let mut letters = args.letter.chars();
        let (Some(letter), None) = (letters.next(), letters.next()) else {
            return Err(ToolError::InvalidArguments(
                "'letter' must be exactly one character".into(),
            ));
        };
        Ok(serde_json::json!(count_letter(&args.text, letter)))
    }
}

/// Count occurrences of `letter` in `text`, ignoring case.
pub fn count_letter(text: &str, letter: char) -> usize {
    let needle: Vec<char> = letter.to_lowercase().collect();
    text.chars()
        .filter(|c| c.to_lowercase().eq(needle.iter().copied()))
        .count()
}
