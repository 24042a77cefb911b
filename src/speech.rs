//! Speech capture and transcription boundary.
//! Records a bounded clip from the default input device (cpal), encodes it as
//! an in-memory WAV (hound), and sends it to the Google Speech REST API with
//! the configured language code and a chess-vocabulary bias list. The whole
//! path is synchronous and blocks the interface while it runs.
//! Requires the GOOGLE_SPEECH_API_KEY environment variable.

use anyhow::{Context, Result, anyhow, bail};
use base64::{Engine as _, engine::general_purpose};
use cpal::SampleFormat;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const API_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";
const TIMEOUT_SECS: u64 = 30;

/// Outcome of one listen attempt. Service and device failures are errors;
/// audio the service could not make sense of is not.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transcript {
    Text(String),
    Unrecognized,
}

/// Captures a short clip and returns recognized text.
pub trait Transcriber {
    fn listen(&self) -> Result<Transcript>;
}

/// Checks if the speech API key is available.
pub fn has_api_key() -> bool {
    std::env::var("GOOGLE_SPEECH_API_KEY").is_ok()
}

// *************** Request/Response Types ***************

#[derive(Serialize)]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    encoding: &'static str,
    sample_rate_hertz: u32,
    audio_channel_count: u16,
    language_code: String,
    speech_contexts: Vec<SpeechContext>,
}

#[derive(Serialize)]
struct SpeechContext {
    phrases: Vec<String>,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Deserialize)]
struct Alternative {
    transcript: String,
    #[serde(default)]
    confidence: f32,
}

// *************** Production Transcriber ***************

pub struct CloudTranscriber {
    client: Client,
    rt: tokio::runtime::Runtime,
    language: String,
    phrases: Vec<String>,
    listen_secs: u64,
}

impl CloudTranscriber {
    pub fn new(language: String, phrases: Vec<String>, listen_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create speech runtime")?;
        Ok(Self {
            client,
            rt,
            language,
            phrases,
            listen_secs,
        })
    }

    async fn recognize(&self, api_key: &str, request: &RecognizeRequest) -> Result<RecognizeResponse> {
        let response = self
            .client
            .post(format!("{API_URL}?key={api_key}"))
            .json(request)
            .send()
            .await
            .context("Failed to send request to speech service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Speech service error {status}: {body}");
        }

        response
            .json()
            .await
            .context("Failed to parse speech service response")
    }
}

impl Transcriber for CloudTranscriber {
    fn listen(&self) -> Result<Transcript> {
        let api_key = std::env::var("GOOGLE_SPEECH_API_KEY")
            .context("GOOGLE_SPEECH_API_KEY environment variable not set")?;

        let clip = record_clip(Duration::from_secs(self.listen_secs))?;
        debug!(
            samples = clip.samples.len(),
            rate = clip.sample_rate,
            "captured audio clip"
        );

        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: clip.sample_rate,
                audio_channel_count: clip.channels,
                language_code: self.language.clone(),
                speech_contexts: vec![SpeechContext {
                    phrases: self.phrases.clone(),
                }],
            },
            audio: RecognitionAudio {
                content: general_purpose::STANDARD.encode(wav_bytes(&clip)?),
            },
        };

        let response = self.rt.block_on(self.recognize(&api_key, &request))?;

        match response
            .results
            .into_iter()
            .next()
            .and_then(|r| r.alternatives.into_iter().next())
        {
            Some(alt) => {
                debug!(confidence = alt.confidence, transcript = %alt.transcript, "recognized");
                Ok(Transcript::Text(alt.transcript))
            }
            None => Ok(Transcript::Unrecognized),
        }
    }
}

// *************** Microphone Capture ***************

struct AudioClip {
    samples: Vec<i16>,
    sample_rate: u32,
    channels: u16,
}

fn stream_error(e: cpal::StreamError) {
    warn!("audio stream error: {e}");
}

/// Records from the default input device for `duration`. Blocks the caller
/// for the whole listen window.
fn record_clip(duration: Duration) -> Result<AudioClip> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No input device available")?;
    let supported = device
        .default_input_config()
        .context("Failed to query default input config")?;

    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let stream_config: cpal::StreamConfig = supported.clone().into();

    let samples = Arc::new(Mutex::new(Vec::<i16>::new()));

    let stream = match supported.sample_format() {
        SampleFormat::I16 => {
            let buffer = Arc::clone(&samples);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buffer) = buffer.lock() {
                        buffer.extend_from_slice(data);
                    }
                },
                stream_error,
                None,
            )
        }
        SampleFormat::F32 => {
            let buffer = Arc::clone(&samples);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buffer) = buffer.lock() {
                        buffer.extend(
                            data.iter()
                                .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
                        );
                    }
                },
                stream_error,
                None,
            )
        }
        other => bail!("Unsupported input sample format {other:?}"),
    }
    .context("Failed to open input stream")?;

    stream.play().context("Failed to start audio capture")?;
    thread::sleep(duration);
    drop(stream);

    let samples = samples
        .lock()
        .map_err(|_| anyhow!("audio buffer mutex poisoned"))?
        .clone();
    Ok(AudioClip {
        samples,
        sample_rate,
        channels,
    })
}

fn wav_bytes(clip: &AudioClip) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: clip.channels,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).context("Failed to start WAV encoder")?;
    for &sample in &clip.samples {
        writer
            .write_sample(sample)
            .context("Failed to encode WAV sample")?;
    }
    writer.finalize().context("Failed to finalize WAV clip")?;
    Ok(cursor.into_inner())
}

// *************** Tests ***************
