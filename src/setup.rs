use crate::config::Config;
use crate::tts::{DEFAULT_VOICE, PREBUILT_VOICES};
use anyhow::Result;
use inquire::Select;
use log::warn;

/// Interactive narration-voice selection, run once before the first narrated
/// use. The choice is persisted to config.yml; non-interactive terminals
/// fall back to the default voice without persisting.
pub fn run_setup(config: &mut Config) -> Result<()> {
    if config.narration.voice.is_some() {
        return Ok(());
    }

    let starting = PREBUILT_VOICES
        .iter()
        .position(|v| *v == DEFAULT_VOICE)
        .unwrap_or(0);

    match Select::new("Select narration voice:", PREBUILT_VOICES.to_vec())
        .with_starting_cursor(starting)
        .prompt()
    {
        Ok(voice) => {
            config.narration.voice = Some(voice.to_string());
            config.save()?;
        }
        Err(err) => {
            warn!("voice selection unavailable ({}), using {}", err, DEFAULT_VOICE);
            config.narration.voice = Some(DEFAULT_VOICE.to_string());
        }
    }

    Ok(())
}
