use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LlmError;
use crate::models::QueryParams;

const SYSTEM_PROMPT: &str = "You extract filters for a voter-contact analytics query. \
Reply with a single JSON object and nothing else. Allowed keys: \
tactic (Phone, SMS or Canvas), person (full name), date (YYYY-MM-DD), \
resultType (attempts, contacts, support, oppose, undecided, not_home, refusal, bad_data, not_reached), \
team, searchQuery. Omit keys the question does not mention.";

/// Turns a free-text question into a query filter.
#[async_trait]
pub trait QueryInterpreter: Send + Sync {
    async fn interpret(&self, question: &str) -> Result<QueryParams, LlmError>;
}

#[derive(Debug, Serialize)]
struct InterpretRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
}

/// Client for the hosted text-in/JSON-out endpoint.
pub struct HttpInterpreter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
}

impl HttpInterpreter {
    pub fn new(endpoint: String, api_key: Option<String>, model: String) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl QueryInterpreter for HttpInterpreter {
    async fn interpret(&self, question: &str) -> Result<QueryParams, LlmError> {
        let body = InterpretRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            prompt: question,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "LLM endpoint returned an error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body: text,
            });
        }

        let params = parse_filter_response(&text)?;
        tracing::info!(?params, "interpreted natural-language query");
        Ok(params)
    }
}

/// Unwraps envelopes such as `{"text": "..."}` that carry the model output
/// as a string.
fn unwrap_envelope(raw: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(raw) {
        for key in ["text", "content", "response", "output"] {
            if let Some(serde_json::Value::String(inner)) = map.get(key) {
                return inner.clone();
            }
        }
    }
    raw.to_string()
}

/// Best-effort extraction of a filter object from model output: tolerates
/// surrounding prose and code fences, takes the outermost `{...}` span.
pub fn parse_filter_response(raw: &str) -> Result<QueryParams, LlmError> {
    let text = unwrap_envelope(raw);
    let start = text.find('{');
    let end = text.rfind('}');

    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(LlmError::MalformedResponse(
                "no JSON object in response".to_string(),
            ))
        }
    };

    let params: QueryParams = serde_json::from_str(json)
        .map_err(|err| LlmError::MalformedResponse(err.to_string()))?;
    Ok(params.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_object() {
        let params = parse_filter_response(r#"{"tactic":"Phone","resultType":"contacts"}"#).unwrap();
        assert_eq!(params.tactic.as_deref(), Some("Phone"));
        assert_eq!(params.result_type.as_deref(), Some("contacts"));
    }

    #[test]
    fn tolerates_prose_and_fences() {
        let raw = "Sure! Here you go:\n```json\n{\"person\": \"Ann Lee\", \"date\": \"\"}\n```";
        let params = parse_filter_response(raw).unwrap();
        assert_eq!(params.person.as_deref(), Some("Ann Lee"));
        assert_eq!(params.date, None);
    }

    #[test]
    fn unwraps_text_envelopes() {
        let raw = r#"{"text": "{\"team\": \"Local Party\"}"}"#;
        let params = parse_filter_response(raw).unwrap();
        assert_eq!(params.team.as_deref(), Some("Local Party"));
    }

    #[test]
    fn rejects_responses_without_json() {
        assert!(matches!(
            parse_filter_response("I could not understand the question."),
            Err(LlmError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_filter_response("{not json}"),
            Err(LlmError::MalformedResponse(_))
        ));
    }
}
