//! Answer generation via an LLM provider.
//!
//! Supports two providers, selected by `QB_LLM_PROVIDER`:
//! - **gemini** — Google's Generative Language API (`generateContent`).
//!   Requires `GEMINI_API_KEY`.
//! - **ollama** — a local Ollama instance's `/api/generate` endpoint.
//!
//! Both paths share the retry strategy used for embeddings: retry 429 and
//! 5xx with exponential backoff, fail fast on other client errors.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::LlmConfig;

/// Build the prompt sent to the LLM from retrieved context and the user query.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "Based on the following context, please answer the question.\n\n\
         Context:\n{}\n\n\
         Question:\n{}\n\n\
         Please try to help the user if you don't get relevant context than \
         provide the most relevant answer according to context and query.",
        context, query
    )
}

/// Generate an answer for `query` grounded in `context`.
///
/// Dispatches on the configured provider. The context is the newline-joined
/// text of the retrieved chunks; it may be empty when nothing matched.
pub async fn generate_answer(config: &LlmConfig, context: &str, query: &str) -> Result<String> {
    let prompt = build_prompt(context, query);

    match config.provider.as_str() {
        "gemini" => generate_gemini(config, &prompt).await,
        "ollama" => generate_ollama(config, &prompt).await,
        other => bail!("Unknown LLM provider: {}", other),
    }
}

/// Call the Gemini `generateContent` endpoint with retry/backoff.
async fn generate_gemini(config: &LlmConfig, prompt: &str) -> Result<String> {
    let api_key = config
        .api_key
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY not set"))?;

    let base = config
        .url
        .as_deref()
        .unwrap_or("https://generativelanguage.googleapis.com");

    let endpoint = format!(
        "{}/v1beta/models/{}:generateContent?key={}",
        base,
        config.model_or_default(),
        api_key
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "contents": [
            { "parts": [ { "text": prompt } ] }
        ]
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&endpoint)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_gemini_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Gemini API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("Gemini API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Answer generation failed after retries")))
}

/// Extract the answer text from a Gemini `generateContent` response.
///
/// Joins all text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join("");

    if text.is_empty() {
        bail!("Invalid Gemini response: no text parts");
    }

    Ok(text)
}

/// Call an Ollama instance's `/api/generate` endpoint with retry/backoff.
async fn generate_ollama(config: &LlmConfig, prompt: &str) -> Result<String> {
    let url = config.url.as_deref().unwrap_or("http://localhost:11434");

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let body = serde_json::json!({
        "model": config.model_or_default(),
        "prompt": prompt,
        "stream": false,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(format!("{}/api/generate", url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    return parse_ollama_generate_response(&json);
                }

                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Ollama API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                let body_text = response.text().await.unwrap_or_default();
                bail!("Ollama API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    url,
                    e
                ));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Answer generation failed after retries")))
}

fn parse_ollama_generate_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_contains_context_and_query() {
        let prompt = build_prompt("the sky is blue", "what color is the sky?");
        assert!(prompt.starts_with("Based on the following context"));
        assert!(prompt.contains("Context:\nthe sky is blue"));
        assert!(prompt.contains("Question:\nwhat color is the sky?"));
    }

    #[test]
    fn test_build_prompt_empty_context() {
        let prompt = build_prompt("", "anything?");
        assert!(prompt.contains("Context:\n\n"));
        assert!(prompt.contains("Question:\nanything?"));
    }

    #[test]
    fn test_parse_gemini_response() {
        let json = serde_json::json!({
            "candidates": [
                {
                    "content": {
                        "parts": [
                            { "text": "The sky " },
                            { "text": "is blue." }
                        ]
                    }
                }
            ]
        });
        let answer = parse_gemini_response(&json).unwrap();
        assert_eq!(answer, "The sky is blue.");
    }

    #[test]
    fn test_parse_gemini_response_missing_candidates() {
        let json = serde_json::json!({ "promptFeedback": {} });
        assert!(parse_gemini_response(&json).is_err());
    }

    #[test]
    fn test_parse_gemini_response_empty_parts() {
        let json = serde_json::json!({
            "candidates": [ { "content": { "parts": [] } } ]
        });
        assert!(parse_gemini_response(&json).is_err());
    }

    #[test]
    fn test_parse_ollama_generate_response() {
        let json = serde_json::json!({ "response": "hello there", "done": true });
        let answer = parse_ollama_generate_response(&json).unwrap();
        assert_eq!(answer, "hello there");
    }

    #[test]
    fn test_parse_ollama_generate_response_missing_field() {
        let json = serde_json::json!({ "done": true });
        assert!(parse_ollama_generate_response(&json).is_err());
    }

    #[tokio::test]
    async fn test_generate_answer_unknown_provider() {
        let config = LlmConfig {
            provider: "mystery".to_string(),
            model: String::new(),
            url: None,
            api_key: None,
            max_retries: 0,
            timeout_secs: 5,
        };
        let err = generate_answer(&config, "ctx", "q").await.unwrap_err();
        assert!(err.to_string().contains("Unknown LLM provider"));
    }
}
