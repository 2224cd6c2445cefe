//! Highlight-box scene builder. Pure: the same `(steps, active_index)` input
//! always yields the same scene; a host shell turns scenes into pixels.

use crate::model::{Region, Status, Step};

/// Deterministic status palette shared with the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusColors {
    pub fill: &'static str,
    pub border: &'static str,
    pub text: &'static str,
}

/// Total over any status: unrecognized values render as neutral, never error.
pub fn status_colors(status: Status) -> StatusColors {
    match status {
        Status::Correct => StatusColors {
            fill: "rgba(72, 187, 120, 0.15)",
            border: "rgba(72, 187, 120, 0.6)",
            text: "#48bb78",
        },
        Status::Incorrect => StatusColors {
            fill: "rgba(232, 85, 61, 0.15)",
            border: "rgba(232, 85, 61, 0.6)",
            text: "#e8553d",
        },
        _ => StatusColors {
            fill: "rgba(212, 168, 83, 0.12)",
            border: "rgba(212, 168, 83, 0.4)",
            text: "#d4a853",
        },
    }
}

/// Where the active step's text label sits relative to its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelPlacement {
    /// Default: below the bottom edge.
    Below,
    /// Used when the box ends in the bottom fifth of the image, so the label
    /// is not clipped.
    Above,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayLabel {
    pub text: String,
    pub color: &'static str,
    pub placement: LabelPlacement,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub index: usize,
    /// Percentage-space frame, rendered as-is even if out of range.
    pub frame: Region,
    pub colors: StatusColors,
    pub active: bool,
    pub dimmed: bool,
    /// Active + incorrect steps get the error treatment.
    pub error_emphasis: bool,
    /// Only the active step carries a label.
    pub label: Option<OverlayLabel>,
    /// Error sub-rectangle, in percentages relative to `frame`.
    pub error_inset: Option<Region>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayScene {
    pub boxes: Vec<OverlayBox>,
}

impl OverlayScene {
    pub fn empty() -> Self {
        Self::default()
    }
}

fn label_placement(region: &Region) -> LabelPlacement {
    if region.y + region.h > 80.0 {
        LabelPlacement::Above
    } else {
        LabelPlacement::Below
    }
}

/// Offsets of the error sub-rectangle within its parent box, as percentages
/// of the parent's size.
fn error_inset(region: &Region, error: &Region) -> Region {
    Region {
        x: (error.x - region.x) / region.w * 100.0,
        y: (error.y - region.y) / region.h * 100.0,
        w: error.w / region.w * 100.0,
        h: error.h / region.h * 100.0,
    }
}

/// Builds the overlay for every step at once. The active box is emphasized,
/// the rest are dimmed but still present and clickable.
pub fn render(steps: &[Step], active_index: usize) -> OverlayScene {
    let boxes = steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let active = i == active_index;
            let colors = status_colors(step.status);

            let label = active.then(|| OverlayLabel {
                text: step.overlay_text.clone(),
                color: colors.text,
                placement: label_placement(&step.region),
            });

            let inset = if active {
                step.error_highlight
                    .as_ref()
                    .map(|e| error_inset(&step.region, e))
            } else {
                None
            };

            OverlayBox {
                index: i,
                frame: step.region,
                colors,
                active,
                dimmed: !active,
                error_emphasis: active && step.status == Status::Incorrect,
                label,
                error_inset: inset,
            }
        })
        .collect();

    OverlayScene { boxes }
}

/// Maps a click at percentage coordinates to a step index. Later boxes sit on
/// top, so they win when frames overlap; dimmed boxes are clickable too.
pub fn hit_test(scene: &OverlayScene, x: f64, y: f64) -> Option<usize> {
    scene.boxes.iter().rev().find_map(|b| {
        let inside = x >= b.frame.x
            && x <= b.frame.x + b.frame.w
            && y >= b.frame.y
            && y <= b.frame.y + b.frame.h;
        inside.then_some(b.index)
    })
}
