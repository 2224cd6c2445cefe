use crate::config::Config;
use crate::model::{Analysis, Region, Status, Step, StepKind};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Analyzes a worksheet image and returns step-by-step feedback.
    async fn analyze(&self, image: &[u8], mime_type: &str) -> Result<Analysis>;
}

pub fn create_vision_client(config: &Config) -> Box<dyn VisionClient> {
    Box::new(GeminiVisionClient::new(
        &config.gemini.api_key,
        &config.gemini.vision_model,
    ))
}

const ANALYSIS_PROMPT: &str = r#"You are a warm, encouraging homework tutor. Analyze this student's worksheet image and provide step-by-step pedagogical feedback.

IMPORTANT INSTRUCTIONS:
1. Detect the language of the worksheet (e.g. German if you see "Rechne aus", "Berechne", etc.) and provide ALL feedback in that same language. If unsure, default to German.
2. Use 2nd person ("Du hast...", "You wrote...") with a warm, supportive teacher tone.
3. Step 1 MUST be an overall summary: congratulate the student, state their score (e.g. "14 von 16 richtig!"), set an encouraging tone.
4. Group by correctness: correct sections get brief praise ("Super gemacht bei der Addition!"). Incorrect sections get detailed pedagogical feedback explaining WHY the mistake happened and HOW to fix it.
5. If multiple mistakes share a root cause (e.g. decimal place errors, carrying errors), group them and explain the underlying concept.
6. Maximum 30 steps total.

For each identified part, provide:
- A short label
- The type: "calculation", "text_block", "highlight", or "annotation"
- The region as percentage coordinates: { x, y, w, h } where x/y is top-left corner, w/h is width/height, all as percentages (0-100) of the image
- Whether it's "correct", "incorrect", or "neutral"
- A narration sentence for text-to-speech (warm, teacher-like, 2nd person)
- Short overlay text to display on the image
- Whether to celebrate (true only for correct items)
- If incorrect, an errorHighlight sub-region pointing to the specific error

Respond ONLY with valid JSON in this exact format:
{
  "title": "Brief title for this image analysis",
  "summary": "One sentence encouraging summary with score",
  "steps": [
    {
      "id": 1,
      "label": "Zusammenfassung",
      "type": "annotation",
      "region": { "x": 0, "y": 0, "w": 100, "h": 100 },
      "status": "neutral",
      "narration": "Overall encouraging summary with score...",
      "overlayText": "14/16 richtig!",
      "celebrate": false,
      "errorHighlight": null
    }
  ]
}"#;

// --- Gemini ---

pub struct GeminiVisionClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiVisionClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
}

#[derive(Serialize)]
struct GeminiInlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[async_trait]
impl VisionClient for GeminiVisionClient {
    async fn analyze(&self, image: &[u8], mime_type: &str) -> Result<Analysis> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![
                    GeminiPart {
                        text: None,
                        inline_data: Some(GeminiInlineData {
                            mime_type: mime_type.to_string(),
                            data: STANDARD.encode(image),
                        }),
                    },
                    GeminiPart {
                        text: Some(ANALYSIS_PROMPT.to_string()),
                        inline_data: None,
                    },
                ],
            }],
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error: {}", error_text));
        }

        let response_text = resp.text().await?;
        let result: GeminiResponse = serde_json::from_str(&response_text)
            .with_context(|| format!("Failed to parse Gemini response: {}", response_text))?;

        if let Some(err) = result.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }

        let text = result
            .candidates
            .as_ref()
            .and_then(|c| c.first())
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.first())
            .map(|p| p.text.clone())
            .ok_or_else(|| {
                let reason = result
                    .candidates
                    .as_ref()
                    .and_then(|c| c.first())
                    .and_then(|c| c.finish_reason.clone())
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                anyhow!("Gemini response empty. Finish reason: {}", reason)
            })?;

        parse_analysis(&text)
    }
}

// --- Reply parsing ---

pub fn strip_code_blocks(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("```json") {
        s.trim_start_matches("```json")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else if s.starts_with("```") {
        s.trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
            .to_string()
    } else {
        s.to_string()
    }
}

/// Pulls the outermost JSON object out of a model reply. The model is asked
/// for bare JSON but often wraps it in fences or prose.
fn extract_json(reply: &str) -> Result<String> {
    let cleaned = strip_code_blocks(reply);
    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if e > s => Ok(cleaned[s..=e].to_string()),
        _ => Err(anyhow!("No JSON object in model reply")),
    }
}

pub fn parse_analysis(reply: &str) -> Result<Analysis> {
    let json = extract_json(reply)?;
    let mut analysis: Analysis = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse analysis JSON: {}", json))?;
    analysis.truncate_steps();
    Ok(analysis)
}

/// Shown when no API key is configured, so the rest of the pipeline stays
/// usable end-to-end.
pub fn placeholder_analysis() -> Analysis {
    Analysis {
        title: "Image Analysis".to_string(),
        summary: "Analysis complete. API key not configured — showing demo results.".to_string(),
        steps: vec![Step {
            id: 1,
            label: "Full Image".to_string(),
            kind: StepKind::Annotation,
            region: Region::new(5.0, 5.0, 90.0, 90.0),
            status: Status::Neutral,
            narration: "This is the uploaded image. Configure a Gemini API key for real analysis."
                .to_string(),
            overlay_text: "Configure GEMINI_API_KEY for real analysis".to_string(),
            celebrate: false,
            error_highlight: None,
        }],
    }
}
