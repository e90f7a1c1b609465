//! Gemini text-to-speech client.
//!
//! Gemini returns raw 16-bit PCM at 24 kHz, base64-encoded, with no header.
//! Decoded buffers are cached by exact text so replaying a message costs
//! nothing.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::pcm::{AudioBuffer, SPEECH_SAMPLE_RATE, decode_pcm16};
use crate::config::SpeechConfig;

/// Connection timeout. Synthesis itself is not time-limited.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Message used when the endpoint fails without explaining why.
const GENERIC_FAILURE: &str = "TTS generation failed";

/// Errors raised by speech synthesis.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Nothing to say.
    #[error("TTS received empty text")]
    EmptyText,
    /// No API key is configured.
    #[error("no API key configured for speech synthesis")]
    MissingApiKey,
    /// The endpoint answered with a non-success status.
    #[error("{message} (status {status})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Error message from the endpoint.
        message: String,
    },
    /// The response carried no audio.
    #[error("No audio data received from Gemini")]
    NoAudio,
    /// The audio payload was not valid base64.
    #[error("invalid audio payload: {0}")]
    Base64(#[from] base64::DecodeError),
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The configured endpoint is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesisRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    speech_config: SpeechSettings<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechSettings<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoice<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoice<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct SynthesisResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Pull the base64 audio out of the first candidate's first part.
fn audio_payload(response: SynthesisResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .inline_data?
        .data
        .filter(|data| !data.is_empty())
}

/// Text-to-speech client with a per-text cache.
pub struct GeminiTts {
    client: reqwest::Client,
    config: SpeechConfig,
    cache: DashMap<String, Arc<AudioBuffer>>,
}

impl GeminiTts {
    /// Create a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SpeechConfig) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            config,
            cache: DashMap::new(),
        })
    }

    /// Synthesize `text`, or return the cached buffer for it.
    ///
    /// # Errors
    /// Returns an error if the text is empty, the request fails, the endpoint
    /// reports an error, or no audio comes back.
    pub async fn synthesize(&self, text: &str) -> Result<Arc<AudioBuffer>, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        if let Some(cached) = self.cache.get(text) {
            debug!("Speech cache hit ({} chars)", text.len());
            return Ok(Arc::clone(cached.value()));
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SynthesisError::MissingApiKey)?;

        let body = SynthesisRequest {
            contents: [Content {
                parts: [TextPart { text }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechSettings {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoice {
                            voice_name: &self.config.voice,
                        },
                    },
                },
            },
        };

        let response = self
            .client
            .post(self.endpoint(api_key)?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&raw)
                .ok()
                .and_then(|b| b.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| GENERIC_FAILURE.to_string());
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SynthesisResponse = serde_json::from_str(&raw).unwrap_or_default();
        let data = audio_payload(parsed).ok_or(SynthesisError::NoAudio)?;
        let bytes = STANDARD.decode(data.as_bytes())?;
        let buffer = Arc::new(decode_pcm16(&bytes, SPEECH_SAMPLE_RATE));

        self.cache.insert(text.to_string(), Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Number of cached buffers.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn endpoint(&self, api_key: &str) -> Result<Url, SynthesisError> {
        let base = self.config.endpoint_base.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{}:generateContent", self.config.model))?;
        url.query_pairs_mut().append_pair("key", api_key);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}/v1beta/models")
    }

    fn config(base: String) -> SpeechConfig {
        SpeechConfig::default()
            .with_endpoint_base(base)
            .with_api_key("g-key")
    }

    #[test]
    fn test_request_body_shape() {
        let body = SynthesisRequest {
            contents: [Content {
                parts: [TextPart { text: "Hello" }],
            }],
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechSettings {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoice { voice_name: "Kore" },
                    },
                },
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(value["generationConfig"]["responseModalities"][0], "AUDIO");
        assert_eq!(
            value["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Kore"
        );
    }

    #[test]
    fn test_endpoint_carries_key() {
        let tts = GeminiTts::new(SpeechConfig::default()).unwrap();
        let url = tts.endpoint("abc").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-preview-tts:generateContent?key=abc"
        );
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let tts = GeminiTts::new(SpeechConfig::default()).unwrap();
        assert!(matches!(
            tts.synthesize("  ").await,
            Err(SynthesisError::EmptyText)
        ));
    }

    #[tokio::test]
    async fn test_synthesize_decodes_and_caches() {
        let calls = Arc::new(AtomicUsize::new(0));

        async fn handler(
            State(calls): State<Arc<AtomicUsize>>,
            Query(params): Query<std::collections::HashMap<String, String>>,
        ) -> (StatusCode, Json<serde_json::Value>) {
            calls.fetch_add(1, Ordering::SeqCst);
            if params.get("key").map(String::as_str) != Some("g-key") {
                return (StatusCode::FORBIDDEN, Json(serde_json::json!({})));
            }
            // Two samples: 0 and -32768.
            let data = STANDARD.encode([0x00, 0x00, 0x00, 0x80]);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "candidates": [{"content": {"parts": [{"inlineData": {"data": data}}]}}]
                })),
            )
        }

        let app = Router::new()
            .route(
                "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent",
                post(handler),
            )
            .with_state(Arc::clone(&calls));
        let tts = GeminiTts::new(config(serve(app).await)).unwrap();

        let first = tts.synthesize("Hello there").await.unwrap();
        assert_eq!(first.samples(), &[0.0, -1.0]);
        assert_eq!(first.sample_rate(), SPEECH_SAMPLE_RATE);

        let second = tts.synthesize("Hello there").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tts.cached_len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_carries_message() {
        async fn handler() -> (StatusCode, Json<serde_json::Value>) {
            (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": {"message": "API key not valid"}})),
            )
        }
        let app = Router::new().route(
            "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent",
            post(handler),
        );
        let tts = GeminiTts::new(config(serve(app).await)).unwrap();

        let result = tts.synthesize("Hello").await;
        assert!(matches!(
            result,
            Err(SynthesisError::Status { status: 400, ref message }) if message == "API key not valid"
        ));
        assert_eq!(tts.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_missing_audio() {
        async fn handler() -> Json<serde_json::Value> {
            Json(serde_json::json!({"candidates": [{"content": {"parts": [{"text": "no"}]}}]}))
        }
        let app = Router::new().route(
            "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent",
            post(handler),
        );
        let tts = GeminiTts::new(config(serve(app).await)).unwrap();
        assert!(matches!(
            tts.synthesize("Hello").await,
            Err(SynthesisError::NoAudio)
        ));
    }
}
