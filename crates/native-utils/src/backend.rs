//! cpal + hound implementation of the core's [`AudioBackend`].
//!
//! cpal streams are not `Send`, so each capture or playback session runs on
//! its own dedicated thread that owns the stream; the async side talks to
//! it over channels. Capture mixes the input down to mono and writes a
//! 16-bit WAV; playback reads a WAV, feeds the default output device, and
//! fires the completion channel once the file's samples are exhausted.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, StreamTrait};
use intona_core::audio::{AudioBackend, AudioError};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::device;

type WavSink = Arc<Mutex<Option<hound::WavWriter<BufWriter<File>>>>>;

struct CaptureSession {
    stop_tx: std_mpsc::Sender<()>,
    done_rx: oneshot::Receiver<Result<(), AudioError>>,
}

enum PlaybackSignal {
    /// Sent by the output callback when the file's samples ran out.
    Finished,
    /// Sent by `stop_playback`.
    Stop,
}

struct PlaybackSession {
    signal_tx: std_mpsc::Sender<PlaybackSignal>,
    ack_rx: oneshot::Receiver<()>,
}

/// At most one capture and one playback session exist at a time; the
/// manager in `intona-core` guarantees the call ordering.
#[derive(Default)]
pub struct CpalAudioBackend {
    capture: Mutex<Option<CaptureSession>>,
    playback: Mutex<Option<PlaybackSession>>,
}

impl CpalAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_capture(&self) -> Option<CaptureSession> {
        self.capture.lock().ok().and_then(|mut slot| slot.take())
    }

    fn take_playback(&self) -> Option<PlaybackSession> {
        self.playback.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[async_trait]
impl AudioBackend for CpalAudioBackend {
    async fn start_capture(&self, destination: &Path) -> Result<(), AudioError> {
        {
            let slot = self
                .capture
                .lock()
                .map_err(|_| AudioError::Stream("capture state poisoned".into()))?;
            if slot.is_some() {
                return Err(AudioError::Stream("capture already active".into()));
            }
        }

        let destination = destination.to_path_buf();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let (done_tx, done_rx) = oneshot::channel();

        // Detached; the session channels are its only handles.
        let _ = std::thread::Builder::new()
            .name("intona-capture".into())
            .spawn(move || capture_thread(destination, ready_tx, stop_rx, done_tx))
            .map_err(|error| AudioError::Stream(format!("could not spawn capture thread: {error}")))?;

        match ready_rx.await {
            Ok(Ok(())) => {
                if let Ok(mut slot) = self.capture.lock() {
                    *slot = Some(CaptureSession { stop_tx, done_rx });
                }
                Ok(())
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(AudioError::Stream(
                "capture thread exited before it was ready".into(),
            )),
        }
    }

    async fn finish_capture(&self) -> Result<(), AudioError> {
        let Some(session) = self.take_capture() else {
            return Err(AudioError::Stream("no capture in progress".into()));
        };
        let _ = session.stop_tx.send(());
        match session.done_rx.await {
            Ok(result) => result,
            Err(_) => Err(AudioError::Stream(
                "capture thread terminated without finalizing".into(),
            )),
        }
    }

    async fn start_playback(&self, source: &Path) -> Result<oneshot::Receiver<()>, AudioError> {
        // A naturally-finished playback leaves its session behind; release
        // it before starting the next one.
        if let Some(stale) = self.take_playback() {
            let _ = stale.signal_tx.send(PlaybackSignal::Stop);
        }

        let source = source.to_path_buf();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (signal_tx, signal_rx) = std_mpsc::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let (ack_tx, ack_rx) = oneshot::channel();

        let callback_signal = signal_tx.clone();
        let _ = std::thread::Builder::new()
            .name("intona-playback".into())
            .spawn(move || {
                playback_thread(source, ready_tx, signal_rx, callback_signal, done_tx, ack_tx)
            })
            .map_err(|error| {
                AudioError::Stream(format!("could not spawn playback thread: {error}"))
            })?;

        match ready_rx.await {
            Ok(Ok(())) => {
                if let Ok(mut slot) = self.playback.lock() {
                    *slot = Some(PlaybackSession { signal_tx, ack_rx });
                }
                Ok(done_rx)
            }
            Ok(Err(error)) => Err(error),
            Err(_) => Err(AudioError::Stream(
                "playback thread exited before it was ready".into(),
            )),
        }
    }

    async fn stop_playback(&self) -> Result<(), AudioError> {
        let Some(session) = self.take_playback() else {
            return Ok(());
        };
        let _ = session.signal_tx.send(PlaybackSignal::Stop);
        // Wait until the thread has dropped its stream, so a following
        // playback never overlaps with this one's teardown. A thread that
        // already exited has sent the ack.
        let _ = session.ack_rx.await;
        Ok(())
    }
}

fn capture_thread(
    destination: PathBuf,
    ready_tx: oneshot::Sender<Result<(), AudioError>>,
    stop_rx: std_mpsc::Receiver<()>,
    done_tx: oneshot::Sender<Result<(), AudioError>>,
) {
    let started = start_capture_stream(&destination);
    match started {
        Ok((stream, sink)) => {
            let _ = ready_tx.send(Ok(()));
            // Park until finish_capture signals (or the session is dropped).
            let _ = stop_rx.recv();
            drop(stream);
            let result = finalize_wav(&sink);
            let _ = done_tx.send(result);
        }
        Err(error) => {
            let _ = ready_tx.send(Err(error));
        }
    }
}

fn start_capture_stream(destination: &Path) -> Result<(cpal::Stream, WavSink), AudioError> {
    let device = device::default_input()?;
    let config = device
        .default_input_config()
        .map_err(|error| AudioError::Device(error.to_string()))?;
    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::Device(format!(
            "unsupported input sample format: {:?}",
            config.sample_format()
        )));
    }
    let channels = config.channels() as usize;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: config.sample_rate().0,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let writer = hound::WavWriter::create(destination, spec)
        .map_err(|error| AudioError::File(error.to_string()))?;
    let sink: WavSink = Arc::new(Mutex::new(Some(writer)));

    let callback_sink = Arc::clone(&sink);
    let stream = device
        .build_input_stream(
            &config.config(),
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let Ok(mut guard) = callback_sink.lock() else {
                    return;
                };
                let Some(writer) = guard.as_mut() else { return };
                for sample in downmix_to_mono(data, channels) {
                    let _ = writer.write_sample(f32_to_i16(sample));
                }
            },
            move |error| tracing::error!("input stream error: {error}"),
            None,
        )
        .map_err(|error| AudioError::Stream(error.to_string()))?;
    stream
        .play()
        .map_err(|error| AudioError::Stream(error.to_string()))?;
    tracing::debug!(path = %destination.display(), "capture stream running");
    Ok((stream, sink))
}

fn finalize_wav(sink: &WavSink) -> Result<(), AudioError> {
    let Ok(mut guard) = sink.lock() else {
        return Err(AudioError::File("recording writer poisoned".into()));
    };
    match guard.take() {
        Some(writer) => writer
            .finalize()
            .map_err(|error| AudioError::File(error.to_string())),
        None => Ok(()),
    }
}

fn playback_thread(
    source: PathBuf,
    ready_tx: oneshot::Sender<Result<(), AudioError>>,
    signal_rx: std_mpsc::Receiver<PlaybackSignal>,
    callback_signal: std_mpsc::Sender<PlaybackSignal>,
    done_tx: oneshot::Sender<()>,
    ack_tx: oneshot::Sender<()>,
) {
    let started = start_playback_stream(&source, callback_signal);
    match started {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            loop {
                match signal_rx.recv() {
                    Ok(PlaybackSignal::Finished) => {
                        let _ = done_tx.send(());
                        break;
                    }
                    Ok(PlaybackSignal::Stop) | Err(_) => break,
                }
            }
            drop(stream);
            let _ = ack_tx.send(());
        }
        Err(error) => {
            let _ = ready_tx.send(Err(error));
            let _ = ack_tx.send(());
        }
    }
}

fn start_playback_stream(
    source: &Path,
    signal_tx: std_mpsc::Sender<PlaybackSignal>,
) -> Result<cpal::Stream, AudioError> {
    let samples = read_wav_mono(source)?;

    let device = device::default_output()?;
    let config = device
        .default_output_config()
        .map_err(|error| AudioError::Device(error.to_string()))?;
    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::Device(format!(
            "unsupported output sample format: {:?}",
            config.sample_format()
        )));
    }
    let out_channels = config.channels() as usize;

    let mut position = 0usize;
    let mut finished_sent = false;
    let stream = device
        .build_output_stream(
            &config.config(),
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(out_channels) {
                    let sample = if position < samples.len() {
                        let sample = samples[position];
                        position += 1;
                        sample
                    } else {
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }
                if position >= samples.len() && !finished_sent {
                    finished_sent = true;
                    let _ = signal_tx.send(PlaybackSignal::Finished);
                }
            },
            move |error| tracing::error!("output stream error: {error}"),
            None,
        )
        .map_err(|error| AudioError::Stream(error.to_string()))?;
    stream
        .play()
        .map_err(|error| AudioError::Stream(error.to_string()))?;
    tracing::debug!(path = %source.display(), "playback stream running");
    Ok(stream)
}

/// Reads a WAV file as one mono f32 track, mixing channels down when the
/// file is multi-channel.
fn read_wav_mono(source: &Path) -> Result<Vec<f32>, AudioError> {
    let reader =
        hound::WavReader::open(source).map_err(|error| AudioError::File(error.to_string()))?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(Result::ok)
                .map(|sample| sample as f32 / full_scale)
                .collect()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(Result::ok)
            .collect(),
    };
    Ok(downmix_to_mono(&samples, spec.channels as usize))
}

fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_frames_average_into_mono() {
        let interleaved = [0.5, -0.5, 1.0, 0.0, -1.0, -1.0];
        assert_eq!(downmix_to_mono(&interleaved, 2), vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn mono_input_passes_through() {
        let samples = [0.1, 0.2, 0.3];
        assert_eq!(downmix_to_mono(&samples, 1), samples.to_vec());
    }

    #[test]
    fn sample_conversion_clamps_out_of_range_values() {
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -i16::MAX);
    }

    #[test]
    fn wav_round_trips_through_the_mono_reader() {
        let dir = std::env::temp_dir().join(format!("intona-wav-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for value in [0i16, i16::MAX / 2, -i16::MAX / 2] {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();

        let samples = read_wav_mono(&path).unwrap();
        assert_eq!(samples.len(), 3);
        assert!(samples[0].abs() < f32::EPSILON);
        assert!((samples[1] - 0.5).abs() < 0.01);
        assert!((samples[2] + 0.5).abs() < 0.01);

        let _ = std::fs::remove_file(&path);
    }
}
