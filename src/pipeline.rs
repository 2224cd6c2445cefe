//! Batch narration synthesis: one WAV chunk per narrated step, cached on
//! disk so an interrupted run resumes where it stopped, then merged into a
//! single track.

use crate::audio;
use crate::model::Analysis;
use crate::store::Library;
use crate::tts::TtsClient;
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use log::info;
use std::fs;
use std::path::PathBuf;

pub async fn synthesize_narration(
    library: &Library,
    id: &str,
    analysis: &Analysis,
    tts: &dyn TtsClient,
) -> Result<PathBuf> {
    let dir = library.narration_dir(id);
    fs::create_dir_all(&dir)?;

    let narrated: Vec<(usize, &str)> = analysis
        .steps
        .iter()
        .enumerate()
        .filter(|(_, step)| !step.narration.is_empty())
        .map(|(i, step)| (i, step.narration.as_str()))
        .collect();

    info!("synthesizing {} narration chunks for {}", narrated.len(), id);
    let bar = ProgressBar::new(narrated.len() as u64);

    let mut chunks = Vec::with_capacity(narrated.len());
    for (i, text) in narrated {
        let chunk = dir.join(format!("chunk_{:04}.wav", i));
        if !chunk.exists() {
            let wav = tts
                .synthesize(text)
                .await
                .with_context(|| format!("Failed to synthesize step {}", i + 1))?;
            fs::write(&chunk, wav)?;
        }
        chunks.push(chunk);
        bar.inc(1);
    }
    bar.finish_and_clear();

    let output = dir.join("narration.wav");
    audio::merge_wav_files(&chunks, &output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wrap_pcm;
    use crate::config::Config;
    use crate::vision::placeholder_analysis;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct CountingTts {
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl TtsClient for CountingTts {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            *self.calls.lock().unwrap() += 1;
            Ok(wrap_pcm(&[0u8; 480], 24000, 1, 16))
        }
    }

    fn library_in(dir: &std::path::Path) -> Library {
        let config = Config {
            uploads_folder: dir.join("uploads").to_string_lossy().to_string(),
            analyses_folder: dir.join("analyses").to_string_lossy().to_string(),
            ..serde_yaml_ng::from_str("{}").unwrap()
        };
        Library::open(&config).unwrap()
    }

    #[tokio::test]
    async fn chunks_are_cached_between_runs() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = library_in(dir.path());
        let mut analysis = placeholder_analysis();
        analysis.steps.push(analysis.steps[0].clone());
        analysis.steps[1].narration = "Second line.".to_string();

        let calls = Arc::new(Mutex::new(0));
        let tts = CountingTts {
            calls: calls.clone(),
        };

        let track = synthesize_narration(&library, "abc", &analysis, &tts).await?;
        assert!(track.exists());
        assert_eq!(*calls.lock().unwrap(), 2);

        // Second run finds every chunk on disk.
        synthesize_narration(&library, "abc", &analysis, &tts).await?;
        assert_eq!(*calls.lock().unwrap(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn steps_without_narration_are_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let library = library_in(dir.path());
        let mut analysis = placeholder_analysis();
        analysis.steps[0].narration = String::new();

        let calls = Arc::new(Mutex::new(0));
        let tts = CountingTts {
            calls: calls.clone(),
        };

        synthesize_narration(&library, "xyz", &analysis, &tts).await?;
        assert_eq!(*calls.lock().unwrap(), 0);
        Ok(())
    }
}
