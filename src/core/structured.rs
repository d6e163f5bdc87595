//! Schema-constrained generation.
//!
//! Each request declares the JSON schema its reply must satisfy. The schema
//! goes to the provider as `response_format` and is checked again locally
//! before the payload reaches the caller.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::core::model_client::{ModelClient, ModelError};
use crate::core::policy::{evaluation_prompt, PromptPolicy, NEXT_QUESTION_PROMPT};

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    pub name: &'static str,
    pub schema: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub system_instruction: Option<String>,
    pub prompt: String,
    pub schema: OutputSchema,
}

/// `{type, question, options?, answer}`
pub fn question_schema() -> OutputSchema {
    OutputSchema {
        name: "question",
        schema: json!({
            "type": "object",
            "properties": {
                "type": { "type": "string" },
                "question": { "type": "string" },
                "options": { "type": "array", "items": { "type": "string" } },
                "answer": { "type": "string" }
            },
            "required": ["type", "question", "answer"]
        }),
    }
}

/// `{is_correct, explanation}`
pub fn evaluation_schema() -> OutputSchema {
    OutputSchema {
        name: "evaluation",
        schema: json!({
            "type": "object",
            "properties": {
                "is_correct": { "type": "boolean" },
                "explanation": { "type": "string" }
            },
            "required": ["is_correct", "explanation"]
        }),
    }
}

pub fn question_request() -> StructuredRequest {
    StructuredRequest {
        system_instruction: Some(PromptPolicy::quiz().system_instruction.to_string()),
        prompt: NEXT_QUESTION_PROMPT.to_string(),
        schema: question_schema(),
    }
}

pub fn evaluation_request(question: &str, answer: &str) -> StructuredRequest {
    StructuredRequest {
        system_instruction: Some(PromptPolicy::quiz().system_instruction.to_string()),
        prompt: evaluation_prompt(question, answer),
        schema: evaluation_schema(),
    }
}

/// Check `value` against the schema; every violation is reported.
pub fn validate_payload(schema: &OutputSchema, value: &Value) -> Result<(), ModelError> {
    let validator = jsonschema::validator_for(&schema.schema).map_err(|err| {
        ModelError::validation(format!("schema '{}' is invalid: {err}", schema.name))
    })?;

    let violations: Vec<String> = validator
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect();
    if violations.is_empty() {
        Ok(())
    } else {
        Err(ModelError::validation(format!(
            "{} does not match schema: {}",
            schema.name,
            violations.join("; ")
        )))
    }
}

/// Run a structured request and deserialize the validated payload.
pub async fn generate<T: DeserializeOwned>(
    client: &dyn ModelClient,
    request: StructuredRequest,
) -> Result<T, ModelError> {
    let name = request.schema.name;
    let value = client.generate_structured(request).await?;
    serde_json::from_value(value)
        .map_err(|err| ModelError::validation(format!("{name} could not be decoded: {err}")))
}
