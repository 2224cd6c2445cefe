//! Narration playback with a remote-synthesis primary backend and an
//! on-device fallback. A `speak` call always completes exactly once:
//! natural end, recovered error and unsupported-backend all converge on the
//! future resolving. Cancellation is dropping the future; a cancelled call
//! never completes, so stale completions cannot fire.
//!
//! Backend strategy is explicit: try the primary (synthesize then play),
//! fall back to on-device speech only when synthesis itself fails, and
//! treat total failure as normal completion so playback never stalls.

use crate::tts::TtsClient;
use anyhow::Result;
use async_trait::async_trait;
use log::warn;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Plays a prepared audio buffer. `play` resolves at the natural end of the
/// buffer and must stop output when the returned future is dropped.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, wav: &[u8]) -> Result<()>;
    async fn pause(&self);
    async fn resume(&self);
}

/// Platform speech synthesis (the on-device fallback). Same contract as
/// [`AudioSink::play`]: resolve on completion, stop on drop.
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
    async fn pause(&self);
    async fn resume(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveBackend {
    Idle,
    Primary,
    Secondary,
}

pub struct Narrator {
    enabled: AtomicBool,
    tts: Box<dyn TtsClient>,
    sink: Box<dyn AudioSink>,
    fallback: Option<Box<dyn SpeechSynthesis>>,
    /// Synthesized audio keyed by exact text, so repeat visits to a step do
    /// not refetch.
    cache: Mutex<HashMap<String, Arc<Vec<u8>>>>,
    active: Mutex<ActiveBackend>,
    /// Budget for remote synthesis; a stall counts as primary failure.
    timeout: Duration,
}

impl Narrator {
    pub fn new(
        tts: Box<dyn TtsClient>,
        sink: Box<dyn AudioSink>,
        fallback: Option<Box<dyn SpeechSynthesis>>,
        timeout: Duration,
    ) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            tts,
            sink,
            fallback,
            cache: Mutex::new(HashMap::new()),
            active: Mutex::new(ActiveBackend::Idle),
            timeout,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Flips the enabled flag and returns the new state. When disabling, the
    /// host must also drop any in-flight `speak` future.
    pub fn toggle(&self) -> bool {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled);
        enabled
    }

    /// Housekeeping after the host cancels an in-flight `speak` by dropping
    /// its future.
    pub fn stop(&self) {
        *self.active.lock().unwrap() = ActiveBackend::Idle;
    }

    pub async fn pause(&self) {
        let active = *self.active.lock().unwrap();
        match active {
            ActiveBackend::Primary => self.sink.pause().await,
            ActiveBackend::Secondary => {
                if let Some(fallback) = &self.fallback {
                    fallback.pause().await;
                }
            }
            ActiveBackend::Idle => {}
        }
    }

    pub async fn resume(&self) {
        let active = *self.active.lock().unwrap();
        match active {
            ActiveBackend::Primary => self.sink.resume().await,
            ActiveBackend::Secondary => {
                if let Some(fallback) = &self.fallback {
                    fallback.resume().await;
                }
            }
            ActiveBackend::Idle => {}
        }
    }

    /// Speaks `text` and resolves when narration is over, whatever "over"
    /// turned out to mean. Disabled or fully failed narration completes
    /// without audio so the caller's pacing still works.
    pub async fn speak(&self, text: &str) {
        if !self.is_enabled() {
            return;
        }

        match self.fetch(text).await {
            Ok(wav) => {
                if !self.is_enabled() {
                    return;
                }
                *self.active.lock().unwrap() = ActiveBackend::Primary;
                if let Err(err) = self.sink.play(&wav).await {
                    // Playback failure after a good fetch counts as
                    // completion, not a reason to re-narrate via fallback.
                    warn!("narration playback failed: {:#}", err);
                }
                *self.active.lock().unwrap() = ActiveBackend::Idle;
            }
            Err(err) => {
                warn!("remote narration failed, using on-device speech: {:#}", err);
                let Some(fallback) = &self.fallback else {
                    return;
                };
                if !self.is_enabled() {
                    return;
                }
                *self.active.lock().unwrap() = ActiveBackend::Secondary;
                if let Err(err) = fallback.speak(text).await {
                    warn!("on-device speech failed: {:#}", err);
                }
                *self.active.lock().unwrap() = ActiveBackend::Idle;
            }
        }
    }

    async fn fetch(&self, text: &str) -> Result<Arc<Vec<u8>>> {
        if let Some(hit) = self.cache.lock().unwrap().get(text) {
            return Ok(hit.clone());
        }

        let wav = tokio::time::timeout(self.timeout, self.tts.synthesize(text))
            .await
            .map_err(|_| anyhow::anyhow!("narration synthesis timed out"))??;

        let wav = Arc::new(wav);
        self.cache
            .lock()
            .unwrap()
            .insert(text.to_string(), wav.clone());
        Ok(wav)
    }
}

/// Sink for hosts without an audio device: completes after the buffer's
/// natural duration without producing sound, so autoplay pacing matches a
/// real playback.
pub struct TimedSink;

#[async_trait]
impl AudioSink for TimedSink {
    async fn play(&self, wav: &[u8]) -> Result<()> {
        let length = crate::audio::duration(wav)?;
        tokio::time::sleep(length).await;
        Ok(())
    }

    async fn pause(&self) {}

    async fn resume(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::wrap_pcm;
    use anyhow::anyhow;

    struct MockTts {
        calls: Arc<Mutex<usize>>,
        fail: bool,
    }

    #[async_trait]
    impl TtsClient for MockTts {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            *self.calls.lock().unwrap() += 1;
            if self.fail {
                Err(anyhow!("mock synthesis error"))
            } else {
                Ok(wrap_pcm(&[0u8; 480], 24000, 1, 16))
            }
        }
    }

    struct StallingTts;

    #[async_trait]
    impl TtsClient for StallingTts {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    struct MockSink {
        plays: Arc<Mutex<usize>>,
        fail: bool,
    }

    #[async_trait]
    impl AudioSink for MockSink {
        async fn play(&self, _wav: &[u8]) -> Result<()> {
            *self.plays.lock().unwrap() += 1;
            if self.fail {
                Err(anyhow!("mock playback error"))
            } else {
                Ok(())
            }
        }
        async fn pause(&self) {}
        async fn resume(&self) {}
    }

    struct MockSpeech {
        calls: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl SpeechSynthesis for MockSpeech {
        async fn speak(&self, _text: &str) -> Result<()> {
            *self.calls.lock().unwrap() += 1;
            Ok(())
        }
        async fn pause(&self) {}
        async fn resume(&self) {}
    }

    struct Counters {
        tts: Arc<Mutex<usize>>,
        sink: Arc<Mutex<usize>>,
        speech: Arc<Mutex<usize>>,
    }

    fn narrator(tts_fails: bool, sink_fails: bool, with_fallback: bool) -> (Narrator, Counters) {
        let counters = Counters {
            tts: Arc::new(Mutex::new(0)),
            sink: Arc::new(Mutex::new(0)),
            speech: Arc::new(Mutex::new(0)),
        };
        let fallback: Option<Box<dyn SpeechSynthesis>> = if with_fallback {
            Some(Box::new(MockSpeech {
                calls: counters.speech.clone(),
            }))
        } else {
            None
        };
        let narrator = Narrator::new(
            Box::new(MockTts {
                calls: counters.tts.clone(),
                fail: tts_fails,
            }),
            Box::new(MockSink {
                plays: counters.sink.clone(),
                fail: sink_fails,
            }),
            fallback,
            Duration::from_secs(5),
        );
        (narrator, counters)
    }

    #[tokio::test]
    async fn disabled_speak_completes_without_backend_calls() {
        let (narrator, counters) = narrator(false, false, true);
        narrator.set_enabled(false);

        narrator.speak("hello").await;
        assert_eq!(*counters.tts.lock().unwrap(), 0);
        assert_eq!(*counters.sink.lock().unwrap(), 0);
        assert_eq!(*counters.speech.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn primary_success_does_not_touch_fallback() {
        let (narrator, counters) = narrator(false, false, true);
        narrator.speak("hello").await;
        assert_eq!(*counters.tts.lock().unwrap(), 1);
        assert_eq!(*counters.sink.lock().unwrap(), 1);
        assert_eq!(*counters.speech.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_to_speech() {
        let (narrator, counters) = narrator(true, false, true);
        narrator.speak("hello").await;
        assert_eq!(*counters.sink.lock().unwrap(), 0);
        assert_eq!(*counters.speech.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn playback_failure_completes_without_fallback() {
        let (narrator, counters) = narrator(false, true, true);
        narrator.speak("hello").await;
        assert_eq!(*counters.sink.lock().unwrap(), 1);
        assert_eq!(*counters.speech.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn total_failure_still_completes() {
        let (narrator, counters) = narrator(true, false, false);
        narrator.speak("hello").await; // resolving at all is the assertion
        assert_eq!(*counters.tts.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn repeated_text_is_served_from_cache() {
        let (narrator, counters) = narrator(false, false, true);
        narrator.speak("same line").await;
        narrator.speak("same line").await;
        assert_eq!(*counters.tts.lock().unwrap(), 1);
        assert_eq!(*counters.sink.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn synthesis_stall_times_out_into_fallback() {
        let speech_calls = Arc::new(Mutex::new(0));
        let narrator = Narrator::new(
            Box::new(StallingTts),
            Box::new(TimedSink),
            Some(Box::new(MockSpeech {
                calls: speech_calls.clone(),
            })),
            Duration::from_secs(8),
        );

        narrator.speak("slow line").await;
        assert_eq!(*speech_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn toggle_flips_and_reports_state() {
        let (narrator, _counters) = narrator(false, false, false);
        assert!(narrator.is_enabled());
        assert!(!narrator.toggle());
        assert!(narrator.toggle());
    }

    #[tokio::test(start_paused = true)]
    async fn timed_sink_lasts_the_buffer_duration() {
        let wav = wrap_pcm(&[0u8; 48000], 24000, 1, 16); // one second
        let started = tokio::time::Instant::now();
        TimedSink.play(&wav).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(1));
    }
}
