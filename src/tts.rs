use crate::audio;
use crate::config::Config;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// Gemini TTS returns raw PCM at this rate, mono, 16-bit.
const TTS_SAMPLE_RATE: u32 = 24000;
const TTS_CHANNELS: u16 = 1;
const TTS_BITS_PER_SAMPLE: u16 = 16;

pub const DEFAULT_VOICE: &str = "Kore";

/// Prebuilt voice names accepted by the speech model.
pub const PREBUILT_VOICES: &[&str] = &[
    "Kore", "Puck", "Charon", "Fenrir", "Aoede", "Leda", "Orus", "Zephyr",
];

#[async_trait]
pub trait TtsClient: Send + Sync {
    /// Synthesizes `text` and returns a complete WAV buffer.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

pub fn create_tts_client(config: &Config) -> Box<dyn TtsClient> {
    let voice = config
        .narration
        .voice
        .clone()
        .unwrap_or_else(|| DEFAULT_VOICE.to_string());
    Box::new(GeminiTtsClient::new(
        &config.gemini.api_key,
        &config.gemini.tts_model,
        &voice,
    ))
}

pub struct GeminiTtsClient {
    api_key: String,
    model: String,
    voice: String,
    client: reqwest::Client,
}

impl GeminiTtsClient {
    pub fn new(api_key: &str, model: &str, voice: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            voice: voice.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct TtsRequest {
    contents: Vec<TtsContent>,
    #[serde(rename = "generationConfig")]
    generation_config: TtsGenerationConfig,
}

#[derive(Serialize)]
struct TtsContent {
    role: String,
    parts: Vec<TtsPart>,
}

#[derive(Serialize)]
struct TtsPart {
    text: String,
}

#[derive(Serialize)]
struct TtsGenerationConfig {
    #[serde(rename = "responseModalities")]
    response_modalities: Vec<String>,
    #[serde(rename = "speechConfig")]
    speech_config: SpeechConfig,
}

#[derive(Serialize)]
struct SpeechConfig {
    #[serde(rename = "voiceConfig")]
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
struct VoiceConfig {
    #[serde(rename = "prebuiltVoiceConfig")]
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
struct PrebuiltVoiceConfig {
    #[serde(rename = "voiceName")]
    voice_name: String,
}

#[derive(Deserialize)]
struct TtsResponse {
    candidates: Option<Vec<TtsCandidate>>,
    error: Option<TtsError>,
}

#[derive(Deserialize)]
struct TtsCandidate {
    content: Option<TtsContentResponse>,
}

#[derive(Deserialize)]
struct TtsContentResponse {
    #[serde(default)]
    parts: Vec<TtsPartResponse>,
}

#[derive(Deserialize)]
struct TtsPartResponse {
    #[serde(rename = "inlineData")]
    inline_data: Option<TtsInlineData>,
}

#[derive(Deserialize)]
struct TtsInlineData {
    data: String,
}

#[derive(Deserialize, Debug)]
struct TtsError {
    message: String,
}

#[async_trait]
impl TtsClient for GeminiTtsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if self.api_key.is_empty() {
            return Err(anyhow!("TTS not available - no API key"));
        }

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let request_body = TtsRequest {
            contents: vec![TtsContent {
                role: "user".to_string(),
                parts: vec![TtsPart {
                    text: text.to_string(),
                }],
            }],
            generation_config: TtsGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.voice.clone(),
                        },
                    },
                },
            },
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("TTS API error: {}", error_text));
        }

        let result: TtsResponse = resp.json().await?;

        if let Some(err) = result.error {
            return Err(anyhow!("TTS API returned error: {}", err.message));
        }

        let data = result
            .candidates
            .and_then(|c| c.into_iter().next())
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.inline_data)
            .map(|d| d.data)
            .ok_or_else(|| anyhow!("No audio data in TTS response"))?;

        let pcm = STANDARD.decode(data.as_bytes())?;
        Ok(audio::wrap_pcm(
            &pcm,
            TTS_SAMPLE_RATE,
            TTS_CHANNELS,
            TTS_BITS_PER_SAMPLE,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_voice_is_prebuilt() {
        assert!(PREBUILT_VOICES.contains(&DEFAULT_VOICE));
    }

    #[tokio::test]
    async fn synthesize_without_key_fails_fast() {
        let client = GeminiTtsClient::new("", "model", DEFAULT_VOICE);
        assert!(client.synthesize("Hallo").await.is_err());
    }

    #[test]
    fn request_serializes_with_api_casing() {
        let request = TtsRequest {
            contents: vec![],
            generation_config: TtsGenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: "Kore".to_string(),
                        },
                    },
                },
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"generationConfig\""));
        assert!(json.contains("\"responseModalities\""));
        assert!(json.contains("\"prebuiltVoiceConfig\""));
        assert!(json.contains("\"voiceName\":\"Kore\""));
    }
}
