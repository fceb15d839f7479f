//! TTS module for text-to-speech synthesis using kokoro-tiny.
//!
//! The kokoro engine is blocking and not shared across threads, so it lives
//! on a dedicated worker thread and callers talk to it over a channel.
//! Callers bound their wait with [`render_bounded`]; a late result is
//! dropped by the worker.

use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kokoro_tiny::TtsEngine;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SpeechConfig;
use crate::error::DebateError;

/// Kokoro output sample rate.
pub const SAMPLE_RATE: u32 = 24_000;

/// Safe text length for a single kokoro synthesis call.
const MAX_CHUNK_CHARS: usize = 200;

/// Renders text to an audio file.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` and return the path of the written audio file.
    async fn render(&self, text: &str) -> Result<PathBuf, DebateError>;
}

/// Render `text`, waiting at most `budget`.
///
/// Returns `None` when rendering fails or takes too long; the caller
/// carries on without audio either way.
pub async fn render_bounded(
    synth: &dyn SpeechSynthesizer,
    text: &str,
    budget: Duration,
) -> Option<PathBuf> {
    match tokio::time::timeout(budget, synth.render(text)).await {
        Ok(Ok(path)) => Some(path),
        Ok(Err(e)) => {
            warn!(error = %e, "speech rendering failed; continuing without audio");
            None
        }
        Err(_) => {
            warn!(?budget, "speech rendering timed out; continuing without audio");
            None
        }
    }
}

struct SpeechJob {
    text: String,
    path: PathBuf,
    reply: oneshot::Sender<Result<PathBuf, DebateError>>,
}

/// Speech synthesizer backed by a kokoro engine on a worker thread.
pub struct KokoroSpeech {
    jobs: mpsc::Sender<SpeechJob>,
    audio_dir: PathBuf,
}

impl KokoroSpeech {
    /// Start the worker and wait for the engine to load (downloads the model
    /// on first run). Fails if the configured voice does not exist.
    pub async fn spawn(config: &SpeechConfig) -> Result<Self, DebateError> {
        tokio::fs::create_dir_all(&config.audio_dir).await?;

        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let voice = config.voice.clone();

        std::thread::Builder::new()
            .name("speech-worker".to_string())
            .spawn(move || speech_worker(voice, jobs_rx, ready_tx))?;

        ready_rx
            .await
            .map_err(|_| DebateError::TtsError("Speech worker exited during startup".to_string()))??;

        info!(voice = %config.voice, dir = %config.audio_dir.display(), "speech worker ready");
        Ok(Self {
            jobs: jobs_tx,
            audio_dir: config.audio_dir.clone(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for KokoroSpeech {
    async fn render(&self, text: &str) -> Result<PathBuf, DebateError> {
        let path = self.audio_dir.join(audio_filename(Utc::now()));
        let (reply_tx, reply_rx) = oneshot::channel();

        self.jobs
            .send(SpeechJob {
                text: text.to_string(),
                path,
                reply: reply_tx,
            })
            .map_err(|_| DebateError::TtsError("Speech worker has stopped".to_string()))?;

        reply_rx
            .await
            .map_err(|_| DebateError::TtsError("Speech worker dropped the request".to_string()))?
    }
}

fn speech_worker(
    voice: String,
    jobs: mpsc::Receiver<SpeechJob>,
    ready: oneshot::Sender<Result<(), DebateError>>,
) {
    let mut engine = match load_engine(&voice) {
        Ok(engine) => engine,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    if ready.send(Ok(())).is_err() {
        return;
    }

    while let Ok(job) = jobs.recv() {
        let result = synthesize_to_file(&mut engine, &voice, &job.text, &job.path);
        if job.reply.send(result).is_err() {
            debug!(path = %job.path.display(), "speech finished after the caller moved on");
        }
    }
    debug!("speech worker shutting down");
}

fn load_engine(voice: &str) -> Result<TtsEngine, DebateError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let engine = runtime
        .block_on(TtsEngine::new())
        .map_err(|e| DebateError::TtsError(format!("Failed to initialize TTS: {}", e)))?;

    let available = engine.voices();
    if !available.iter().any(|v| v == voice) {
        return Err(DebateError::TtsError(format!(
            "Unknown voice '{}'. Available voices:\n{}",
            voice,
            format_voices(&available)
        )));
    }
    Ok(engine)
}

/// English voices, one per line.
fn format_voices(voices: &[String]) -> String {
    let mut english: Vec<&String> = voices
        .iter()
        .filter(|v| {
            v.starts_with("af_")
                || v.starts_with("am_")
                || v.starts_with("bf_")
                || v.starts_with("bm_")
        })
        .collect();
    english.sort();

    english
        .iter()
        .map(|v| format!("  - {}", v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn synthesize_to_file(
    engine: &mut TtsEngine,
    voice: &str,
    text: &str,
    path: &Path,
) -> Result<PathBuf, DebateError> {
    let chunks = split_into_chunks(text, MAX_CHUNK_CHARS);
    if chunks.is_empty() {
        return Err(DebateError::TtsError("Nothing to synthesize".to_string()));
    }

    let mut samples = Vec::new();
    for chunk in &chunks {
        let chunk_samples = engine
            .synthesize(chunk, Some(voice))
            .map_err(|e| DebateError::TtsError(format!("Synthesis failed: {}", e)))?;
        samples.extend(chunk_samples);
        // 0.3s pause so chunk endings are not clipped
        samples.extend(std::iter::repeat_n(0.0, 7_200));
    }
    // 0.5s trailing padding
    samples.extend(std::iter::repeat_n(0.0, 12_000));

    write_wav(path, &samples)?;
    debug!(path = %path.display(), chunks = chunks.len(), "speech rendered");
    Ok(path.to_path_buf())
}

/// Write mono 16-bit PCM samples at [`SAMPLE_RATE`].
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<(), DebateError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let wav_err = |e: hound::Error| DebateError::TtsError(format!("Failed to write WAV: {}", e));

    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(value).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)
}

/// Split text into chunks that are safe for TTS synthesis.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current_chunk = String::new();

    for sentence in text.split_inclusive(&['.', '!', '?', ';'][..]) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }

        if current_chunk.len() + sentence.len() > max_chars {
            if !current_chunk.trim().is_empty() {
                chunks.push(current_chunk.trim().to_string());
                current_chunk.clear();
            }

            // A single overlong sentence is split at commas.
            if sentence.len() > max_chars {
                for part in sentence.split_inclusive(',') {
                    if current_chunk.len() + part.len() > max_chars
                        && !current_chunk.trim().is_empty()
                    {
                        chunks.push(current_chunk.trim().to_string());
                        current_chunk.clear();
                    }
                    current_chunk.push_str(part.trim());
                    current_chunk.push(' ');
                }
                continue;
            }
        }
        current_chunk.push_str(sentence);
        current_chunk.push(' ');
    }

    if !current_chunk.trim().is_empty() {
        chunks.push(current_chunk.trim().to_string());
    }

    chunks
}

/// File name for a rendered turn, e.g. `tts_20250101120000_1a2b3c4d.wav`.
pub fn audio_filename(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("tts_{}_{}.wav", at.format("%Y%m%d%H%M%S"), &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Instant;

    struct SlowSpeech;

    #[async_trait]
    impl SpeechSynthesizer for SlowSpeech {
        async fn render(&self, _text: &str) -> Result<PathBuf, DebateError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(PathBuf::from("never.wav"))
        }
    }

    struct BrokenSpeech;

    #[async_trait]
    impl SpeechSynthesizer for BrokenSpeech {
        async fn render(&self, _text: &str) -> Result<PathBuf, DebateError> {
            Err(DebateError::TtsError("no engine".to_string()))
        }
    }

    struct InstantSpeech;

    #[async_trait]
    impl SpeechSynthesizer for InstantSpeech {
        async fn render(&self, _text: &str) -> Result<PathBuf, DebateError> {
            Ok(PathBuf::from("audio/tts_1.wav"))
        }
    }

    #[tokio::test]
    async fn test_render_bounded_times_out() {
        let started = Instant::now();
        let audio = render_bounded(&SlowSpeech, "hello", Duration::from_millis(50)).await;
        assert!(audio.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_render_bounded_swallows_failure() {
        let audio = render_bounded(&BrokenSpeech, "hello", Duration::from_secs(1)).await;
        assert!(audio.is_none());
    }

    #[tokio::test]
    async fn test_render_bounded_returns_path() {
        let audio = render_bounded(&InstantSpeech, "hello", Duration::from_secs(1)).await;
        assert_eq!(audio, Some(PathBuf::from("audio/tts_1.wav")));
    }

    #[test]
    fn test_audio_filename() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        let name = audio_filename(at);
        assert!(name.starts_with("tts_20250309140507_"));
        assert!(name.ends_with(".wav"));
        assert_eq!(name.len(), "tts_20250309140507_".len() + 8 + ".wav".len());
        assert_ne!(audio_filename(at), name);
    }

    #[test]
    fn test_split_into_chunks() {
        let text = "Hello world. This is a test. Another sentence here.";
        let chunks = split_into_chunks(text, 30);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 30, "chunk too long: {chunk}");
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_split_long_sentence_at_commas() {
        let text = "First clause here, second clause here, third clause here.";
        let chunks = split_into_chunks(text, 25);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0], "First clause here,");
    }

    #[test]
    fn test_split_blank_text() {
        assert!(split_into_chunks("   ", 200).is_empty());
    }

    #[test]
    fn test_write_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, &[0.0, 0.5, -0.5, 2.0]).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, SAMPLE_RATE);
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[3], i16::MAX);
    }

    #[test]
    fn test_format_voices_keeps_english() {
        let voices = vec![
            "zf_xiaobei".to_string(),
            "bm_george".to_string(),
            "af_sky".to_string(),
        ];
        assert_eq!(format_voices(&voices), "  - af_sky\n  - bm_george");
    }
}
