use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TranslateConfig;
use crate::error::{JimakuError, Result};
use crate::retry::RetryPolicy;
use crate::transcript::{Segment, TranslatedSegment};

/// Seam for the translation collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate segments to the target language, preserving the 1:1
    /// correspondence and timing of the input sequence.
    async fn translate(
        &self,
        segments: &[Segment],
        target_lang: &str,
    ) -> Result<Vec<TranslatedSegment>>;
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchResult {
    lines: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SingleResult {
    text: String,
}

/// Group consecutive segments into batches bounded by a character budget, so
/// many short texts go out as one provider request. Every batch holds at
/// least one segment regardless of the budget.
fn batch_segments(segments: &[Segment], budget: usize) -> Vec<&[Segment]> {
    let mut batches = Vec::new();
    let mut batch_start = 0;
    let mut chars = 0;

    for (idx, segment) in segments.iter().enumerate() {
        let len = segment.text.chars().count();
        if idx > batch_start && chars + len > budget {
            batches.push(&segments[batch_start..idx]);
            batch_start = idx;
            chars = 0;
        }
        chars += len;
    }

    if batch_start < segments.len() {
        batches.push(&segments[batch_start..]);
    }

    batches
}

/// Re-attach translated lines onto their source segments, carrying timing
/// over unchanged.
fn zip_translations(batch: &[Segment], lines: Vec<String>) -> Vec<TranslatedSegment> {
    batch
        .iter()
        .zip(lines)
        .map(|(segment, text)| TranslatedSegment::from_segment(segment, text))
        .collect()
}

/// LLM-endpoint-backed translator with batching and bounded
/// retry-with-backoff.
pub struct LlmTranslator {
    client: Client,
    config: TranslateConfig,
    policy: RetryPolicy,
}

impl LlmTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(JimakuError::Http)?;

        let policy = RetryPolicy::from_secs(config.max_retries, config.retry_delay_secs);

        Ok(Self {
            client,
            config,
            policy,
        })
    }

    /// Verify the endpoint is reachable and the model is loaded before
    /// translating anything.
    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/show", self.config.endpoint);
        let request = json!({ "name": self.config.model });

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                JimakuError::Translation(format!(
                    "Failed to connect to translation endpoint {}: {}",
                    self.config.endpoint, e
                ))
            })?;

        if response.status().is_success() {
            debug!("Translation model '{}' is available", self.config.model);
            Ok(())
        } else {
            Err(JimakuError::Translation(format!(
                "Translation model '{}' not found at {}",
                self.config.model, self.config.endpoint
            )))
        }
    }

    async fn generate(&self, prompt: String) -> Result<String> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt,
            stream: false,
            format: "json".to_string(),
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| JimakuError::Translation(format!("HTTP request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(JimakuError::Translation(format!(
                "Translation API error {}: {}",
                status, error_text
            )));
        }

        let generate_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| JimakuError::Translation(format!("Failed to parse response: {}", e)))?;

        let raw = generate_response.response.trim().to_string();
        if raw.is_empty() {
            return Err(JimakuError::Translation(
                "Empty translation received".to_string(),
            ));
        }

        Ok(raw)
    }

    async fn translate_batch(
        &self,
        batch: &[Segment],
        target_lang: &str,
    ) -> Result<Vec<String>> {
        let prompt = build_batch_prompt(batch, target_lang);
        let raw = self.generate(prompt).await?;

        let result: BatchResult = serde_json::from_str(&raw).map_err(|e| {
            JimakuError::Translation(format!("Unparseable batch translation: {}", e))
        })?;

        if result.lines.len() != batch.len() {
            return Err(JimakuError::Translation(format!(
                "Batch translation returned {} lines for {} segments",
                result.lines.len(),
                batch.len()
            )));
        }

        Ok(result.lines)
    }

    async fn translate_single(&self, text: &str, target_lang: &str) -> Result<String> {
        let prompt = build_single_prompt(text, target_lang);
        let raw = self.generate(prompt).await?;

        match serde_json::from_str::<SingleResult>(&raw) {
            Ok(result) => Ok(result.text.trim().to_string()),
            Err(_) => Ok(raw),
        }
    }

    /// Translate one batch, falling back to per-segment requests when the
    /// batched form keeps failing (count drift on small models is common).
    async fn translate_batch_resilient(
        &self,
        batch: &[Segment],
        target_lang: &str,
    ) -> Result<Vec<String>> {
        let batched = self
            .policy
            .run("translation batch", |_| true, || {
                self.translate_batch(batch, target_lang)
            })
            .await;

        match batched {
            Ok(lines) => Ok(lines),
            Err(e) if batch.len() > 1 => {
                warn!(
                    "Batch translation failed ({}), retrying segment-by-segment",
                    e
                );
                let mut lines = Vec::with_capacity(batch.len());
                for segment in batch {
                    let line = self
                        .policy
                        .run("translation", |_| true, || {
                            self.translate_single(&segment.text, target_lang)
                        })
                        .await?;
                    lines.push(line);
                }
                Ok(lines)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate(
        &self,
        segments: &[Segment],
        target_lang: &str,
    ) -> Result<Vec<TranslatedSegment>> {
        if segments.is_empty() {
            return Ok(Vec::new());
        }

        self.check_availability().await?;

        info!(
            "Translating {} segments to {} via {}",
            segments.len(),
            target_lang,
            self.config.model
        );

        let bar = ProgressBar::new(segments.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(format!("translating to {}", target_lang));

        let mut translated = Vec::with_capacity(segments.len());

        for batch in batch_segments(segments, self.config.batch_chars) {
            let lines = self.translate_batch_resilient(batch, target_lang).await?;
            translated.extend(zip_translations(batch, lines));
            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        info!("Translation completed: {} segments", translated.len());

        Ok(translated)
    }
}

fn build_batch_prompt(batch: &[Segment], target_lang: &str) -> String {
    let language_name = language_code_to_name(target_lang);
    let mut prompt = format!(
        "You are a professional translator.\n\
         \n\
         CRITICAL: Translate every numbered line below to {} ONLY (language code: {}).\n\
         Keep a strict 1:1 correspondence: return exactly {} translations, one per input line,\n\
         in the same order. Never merge, split, or reorder lines.\n\
         \n\
         Return ONLY JSON in the form {{\"lines\":[\"translation 1\",\"translation 2\",...]}}.\n\
         Do not include explanations or text in any other language.\n\
         \n\
         Lines to translate:\n",
        language_name,
        target_lang,
        batch.len()
    );

    for (idx, segment) in batch.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", idx + 1, segment.text));
    }

    prompt
}

fn build_single_prompt(text: &str, target_lang: &str) -> String {
    let language_name = language_code_to_name(target_lang);
    format!(
        "You are a professional translator.\n\
         \n\
         CRITICAL: You must translate the text to {} ONLY (language code: {}).\n\
         Return ONLY the translation in JSON format as {{\"text\":\"your {} translation here\"}}.\n\
         Do not include any explanations, alternatives, or text in other languages.\n\
         \n\
         Text to translate: \"{}\"\n",
        language_name, target_lang, language_name, text
    )
}

/// Full language name for clearer prompts. Unknown codes pass through.
fn language_code_to_name(code: &str) -> String {
    match code.to_lowercase().as_str() {
        "en" => "English",
        "ja" => "Japanese",
        "ko" => "Korean",
        "zh" => "Chinese",
        "fr" => "French",
        "de" => "German",
        "es" => "Spanish",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "nl" => "Dutch",
        "pl" => "Polish",
        "tr" => "Turkish",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        "id" => "Indonesian",
        "sv" => "Swedish",
        "uk" => "Ukrainian",
        other => return other.to_string(),
    }
    .to_string()
}
