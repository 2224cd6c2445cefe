//! Step progress bar scene. Same status palette as the overlay; pure
//! function of `(steps, active_index)`.

use super::overlay::{status_colors, StatusColors};
use crate::model::{Status, Step};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerPhase {
    Done,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineMarker {
    pub index: usize,
    pub label: String,
    pub status: Status,
    pub colors: StatusColors,
    pub phase: MarkerPhase,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimelineScene {
    /// Progress-fill width in whole percent.
    pub progress_pct: u32,
    pub markers: Vec<TimelineMarker>,
}

/// Fill fraction for the progress bar. Degenerate sequences (one step or
/// none) report 0 at the start and 100 anywhere past it.
pub fn progress(len: usize, active_index: usize) -> u32 {
    if len <= 1 {
        return if active_index == 0 { 0 } else { 100 };
    }
    (active_index as f64 / (len - 1) as f64 * 100.0).round() as u32
}

pub fn render(steps: &[Step], active_index: usize) -> TimelineScene {
    let markers = steps
        .iter()
        .enumerate()
        .map(|(i, step)| TimelineMarker {
            index: i,
            label: step.label.clone(),
            status: step.status,
            colors: status_colors(step.status),
            phase: if i == active_index {
                MarkerPhase::Current
            } else if i < active_index {
                MarkerPhase::Done
            } else {
                MarkerPhase::Upcoming
            },
        })
        .collect();

    TimelineScene {
        progress_pct: progress(steps.len(), active_index),
        markers,
    }
}
