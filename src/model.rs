use serde::{Deserialize, Serialize};

/// Hard cap on steps per analysis, enforced when parsing model output.
/// The playback core tolerates anything in 0..=MAX_STEPS.
pub const MAX_STEPS: usize = 30;

/// Rectangle in percentage units of the source image (0-100 on both axes).
/// Out-of-range values are not rejected; they are rendered as-is.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Region {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Region {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Correct,
    Incorrect,
    #[default]
    Neutral,
    /// Anything the model emits that we do not recognize. Renders as neutral.
    #[serde(other)]
    Unknown,
}

/// Informational only; never affects playback logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Calculation,
    TextBlock,
    Highlight,
    #[default]
    Annotation,
    #[serde(other)]
    Other,
}

/// One unit of feedback, tied to a region of the worksheet image.
/// Immutable once loaded; insertion order is the narrative order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type", default)]
    pub kind: StepKind,
    #[serde(default)]
    pub region: Region,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub narration: String,
    #[serde(default)]
    pub overlay_text: String,
    #[serde(default)]
    pub celebrate: bool,
    /// Sub-rectangle in the same percentage space as `region`.
    /// Only meaningful when `status` is `incorrect`.
    #[serde(default)]
    pub error_highlight: Option<Region>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Analysis {
    /// Drops steps past [`MAX_STEPS`]. The upstream prompt asks the model to
    /// stay under the cap, but the reply is untrusted.
    pub fn truncate_steps(&mut self) {
        if self.steps.len() > MAX_STEPS {
            self.steps.truncate(MAX_STEPS);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_parses_camel_case_fields() {
        let json = r#"{
            "id": 3,
            "label": "Addition",
            "type": "calculation",
            "region": { "x": 10.0, "y": 20.0, "w": 30.0, "h": 5.0 },
            "status": "incorrect",
            "narration": "Check the carry here.",
            "overlayText": "7 + 5 = 13?",
            "celebrate": false,
            "errorHighlight": { "x": 12.0, "y": 21.0, "w": 4.0, "h": 2.0 }
        }"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.kind, StepKind::Calculation);
        assert_eq!(step.status, Status::Incorrect);
        assert_eq!(step.overlay_text, "7 + 5 = 13?");
        assert_eq!(step.error_highlight.unwrap().x, 12.0);
    }

    #[test]
    fn unknown_status_and_kind_do_not_fail() {
        let json = r#"{"id": 1, "status": "brilliant", "type": "doodle"}"#;
        let step: Step = serde_json::from_str(json).unwrap();
        assert_eq!(step.status, Status::Unknown);
        assert_eq!(step.kind, StepKind::Other);
    }

    #[test]
    fn missing_optional_fields_default() {
        let step: Step = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert_eq!(step.status, Status::Neutral);
        assert!(!step.celebrate);
        assert!(step.error_highlight.is_none());
        assert!(step.narration.is_empty());
    }

    #[test]
    fn truncate_caps_step_count() {
        let step: Step = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        let mut analysis = Analysis {
            title: String::new(),
            summary: String::new(),
            steps: vec![step; MAX_STEPS + 5],
        };
        analysis.truncate_steps();
        assert_eq!(analysis.steps.len(), MAX_STEPS);
    }
}
