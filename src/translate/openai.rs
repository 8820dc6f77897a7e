//! OpenAI-compatible chat-completions translator.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{TranslateFuture, Translator};
use crate::config::TranslationConfig;
use crate::error::TranslateError;

pub struct OpenAiTranslator {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(cfg: &TranslationConfig) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("ai-news-aggregator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| TranslateError::Request(format!("http client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }

    async fn call(&self, texts: &[String], target_lang: &str) -> Result<Vec<String>, TranslateError> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let sys = format!(
            "You are a professional news translator. Translate each string of the JSON array \
             the user sends into {target_lang}. Keep product and company names as-is. \
             Reply with ONLY a JSON array of strings, same length and order as the input."
        );
        let input = serde_json::to_string(texts)
            .map_err(|e| TranslateError::Malformed(format!("encoding input: {e}")))?;
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &sys,
                },
                Msg {
                    role: "user",
                    content: &input,
                },
            ],
            temperature: 0.2,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| TranslateError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| TranslateError::Malformed(format!("response body: {e}")))?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        parse_translation_payload(&content)
    }
}

impl Translator for OpenAiTranslator {
    fn translate<'a>(&'a self, texts: &'a [String], target_lang: &'a str) -> TranslateFuture<'a> {
        Box::pin(self.call(texts, target_lang))
    }
    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Model output must be a JSON array of strings, optionally wrapped in a
/// Markdown code fence.
pub fn parse_translation_payload(content: &str) -> Result<Vec<String>, TranslateError> {
    let mut s = content.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Drop an optional language tag on the fence line.
        s = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
        s = s.trim_end().strip_suffix("```").unwrap_or(s).trim();
    }
    if s.is_empty() {
        return Err(TranslateError::Malformed("empty response".into()));
    }
    serde_json::from_str::<Vec<String>>(s)
        .map_err(|e| TranslateError::Malformed(format!("expected JSON array of strings: {e}")))
}
