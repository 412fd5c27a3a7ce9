use std::fs::File;
use std::path::{Path, PathBuf};

use stemtap_transport::{AudioRef, PeakData, PeakProvider, SyntheticPeaks};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Default peak resolution: one peak per 10ms of audio.
pub const DEFAULT_PEAKS_PER_SECOND: u32 = 100;

/// Interleaved PCM decoded from a file.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as f64 * 1000.0 / self.sample_rate as f64).round() as u64
    }
}

/// Turn an audio reference into a local path.
/// Accepts plain paths and `file://` URIs.
pub fn resolve_audio_path(source: &AudioRef) -> Option<PathBuf> {
    let raw = source.uri.strip_prefix("file://").unwrap_or(&source.uri);
    let path = Path::new(raw);
    if path.exists() {
        return Some(path.to_path_buf());
    }

    let by_name = Path::new(&source.filename);
    if !source.filename.is_empty() && by_name.exists() {
        return Some(by_name.to_path_buf());
    }

    None
}

fn open_format(path: &Path) -> anyhow::Result<Box<dyn FormatReader>> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    Ok(probed.format)
}

/// Song length in seconds from container metadata, decoding the whole file
/// only when the container does not record a frame count.
pub fn probe_duration_secs(path: &Path) -> anyhow::Result<f64> {
    let format = open_format(path)?;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let params = &track.codec_params;
    if let (Some(frames), Some(rate)) = (params.n_frames, params.sample_rate) {
        if rate > 0 {
            return Ok(frames as f64 / rate as f64);
        }
    }

    let audio = decode_file(path)?;
    Ok(audio.duration_ms() as f64 / 1000.0)
}

pub fn decode_file(path: &Path) -> anyhow::Result<DecodedAudio> {
    let mut format = open_format(path)?;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet)?;
        let spec = *decoded.spec();
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// Reduce decoded audio to normalized amplitude peaks.
///
/// Each bucket covers `sample_rate / peaks_per_second` frames, is mixed down
/// to mono and keeps its largest absolute value. The result is scaled so the
/// loudest bucket is `1.0`; silence stays at `0.0`.
pub fn compute_peaks(audio: &DecodedAudio, peaks_per_second: u32) -> PeakData {
    let frames = audio.frames();
    let channels = audio.channels.max(1) as usize;
    let frames_per_bucket = (audio.sample_rate / peaks_per_second.max(1)).max(1) as usize;
    let num_buckets = frames.div_ceil(frames_per_bucket);

    let mut peaks = Vec::with_capacity(num_buckets);
    for bucket_idx in 0..num_buckets {
        let start = bucket_idx * frames_per_bucket;
        let end = ((bucket_idx + 1) * frames_per_bucket).min(frames);

        let mut max_abs: f32 = 0.0;
        for frame_idx in start..end {
            let frame = &audio.samples[frame_idx * channels..(frame_idx + 1) * channels];
            let mono = frame.iter().sum::<f32>() / channels as f32;
            max_abs = max_abs.max(mono.abs());
        }
        peaks.push(max_abs);
    }

    let loudest = peaks.iter().copied().fold(0.0_f32, f32::max);
    if loudest > 0.0 {
        for peak in &mut peaks {
            *peak /= loudest;
        }
    }

    PeakData::new(peaks, audio.duration_ms())
}

/// Peak provider backed by symphonia decoding.
///
/// Falls back to synthetic peaks when the source cannot be found or decoded.
#[derive(Debug, Clone, Copy)]
pub struct DecodingPeakProvider {
    peaks_per_second: u32,
}

impl DecodingPeakProvider {
    pub fn new(peaks_per_second: u32) -> Self {
        Self { peaks_per_second }
    }

    fn try_load(&self, source: &AudioRef) -> anyhow::Result<PeakData> {
        let path = resolve_audio_path(source)
            .ok_or_else(|| anyhow::anyhow!("audio not found: {}", source.uri))?;
        let audio = decode_file(&path)?;
        Ok(compute_peaks(&audio, self.peaks_per_second))
    }
}

impl Default for DecodingPeakProvider {
    fn default() -> Self {
        Self::new(DEFAULT_PEAKS_PER_SECOND)
    }
}

impl PeakProvider for DecodingPeakProvider {
    fn load_peaks(&mut self, source: &AudioRef, duration_ms: u64) -> PeakData {
        match self.try_load(source) {
            Ok(peaks) => {
                tracing::debug!(uri = %source.uri, peaks = peaks.len(), "decoded peaks");
                peaks
            }
            Err(e) => {
                tracing::warn!(uri = %source.uri, error = %e, "peak decoding failed, using placeholder");
                SyntheticPeaks.load_peaks(source, duration_ms)
            }
        }
    }
}
