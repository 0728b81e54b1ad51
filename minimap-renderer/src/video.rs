use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use image::RgbImage;
use openh264::OpenH264API;
use openh264::encoder::{Encoder, EncoderConfig, FrameRate};
use openh264::formats::{RgbSliceU8, YUVBuffer};
use tracing::{debug, info};

use crate::error::VideoError;

pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_BITRATE_BPS: u32 = 20_000_000;

/// Track ticks per frame; the track timescale is `fps * SAMPLE_DURATION`.
const SAMPLE_DURATION: u32 = 1000;

/// Mode for dumping a single frame instead of rendering a full video.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DumpMode {
    Frame(usize),
    Midpoint,
}

/// H.264/MP4 writer that accepts frames strictly in index order.
///
/// Frames are encoded as they arrive; the MP4 container is written by
/// `finish` once all frames are known.
pub struct VideoEncoder {
    output_path: PathBuf,
    dump_mode: Option<DumpMode>,
    total_frames: usize,
    fps: u32,
    bitrate_bps: u32,
    next_index: usize,
    frame_size: Option<(u32, u32)>,

    // H.264 encoder (created lazily on first video frame)
    encoder: Option<Encoder>,
    // Encoded H.264 Annex B NAL data per frame
    h264_frames: Vec<Vec<u8>>,
    dumped: Option<PathBuf>,
}

impl VideoEncoder {
    pub fn new(
        output_path: impl Into<PathBuf>,
        fps: u32,
        bitrate_bps: u32,
        total_frames: usize,
        dump_mode: Option<DumpMode>,
    ) -> Self {
        let capacity = if dump_mode.is_some() { 0 } else { total_frames };
        Self {
            output_path: output_path.into(),
            dump_mode,
            total_frames,
            fps: fps.max(1),
            bitrate_bps,
            next_index: 0,
            frame_size: None,
            encoder: None,
            h264_frames: Vec::with_capacity(capacity),
            dumped: None,
        }
    }

    /// Number of frames accepted so far.
    pub fn frames_pushed(&self) -> usize {
        self.next_index
    }

    /// Where a dumped frame is written: the output path with a `.png` extension.
    pub fn png_path(&self) -> PathBuf {
        self.output_path.with_extension("png")
    }

    fn dump_index(&self) -> Option<usize> {
        self.dump_mode.map(|mode| match mode {
            DumpMode::Frame(n) => n,
            DumpMode::Midpoint => self.total_frames / 2,
        })
    }

    /// Create the H.264 encoder on first use.
    fn ensure_encoder(&mut self) -> Result<&mut Encoder, VideoError> {
        if self.encoder.is_none() {
            let config = EncoderConfig::new()
                .max_frame_rate(FrameRate::from_hz(self.fps as f32))
                .usage_type(openh264::encoder::UsageType::ScreenContentRealTime)
                .rate_control_mode(openh264::encoder::RateControlMode::Bitrate)
                .bitrate(openh264::encoder::BitRate::from_bps(self.bitrate_bps))
                .qp(openh264::encoder::QpRange::new(0, 24))
                .adaptive_quantization(false)
                .background_detection(false);
            let encoder = Encoder::with_api_config(OpenH264API::from_source(), config)
                .map_err(|e| VideoError::EncoderInit(e.to_string()))?;
            info!(
                "Encoding {} frames at {} fps, {} bps",
                self.total_frames, self.fps, self.bitrate_bps
            );
            self.encoder = Some(encoder);
        }
        self.encoder
            .as_mut()
            .ok_or_else(|| VideoError::EncoderInit("encoder missing after creation".to_string()))
    }

    /// Accept frame `index`, which must be exactly the next one in sequence.
    pub fn push_frame(&mut self, index: usize, frame: &RgbImage) -> Result<(), VideoError> {
        if index != self.next_index {
            return Err(VideoError::OutOfOrder {
                expected: self.next_index,
                got: index,
            });
        }
        match self.frame_size {
            None => self.frame_size = Some(frame.dimensions()),
            Some(size) if size != frame.dimensions() => {
                return Err(VideoError::EncodeFailed(format!(
                    "frame {index} is {:?}, earlier frames were {size:?}",
                    frame.dimensions()
                )));
            }
            Some(_) => {}
        }
        self.next_index += 1;

        if let Some(dump_index) = self.dump_index() {
            if index == dump_index {
                let png_path = self.png_path();
                frame
                    .save(&png_path)
                    .map_err(|e| VideoError::Io(std::io::Error::other(e)))?;
                info!(
                    "Frame {} saved to {} ({}x{})",
                    index,
                    png_path.display(),
                    frame.width(),
                    frame.height()
                );
                self.dumped = Some(png_path);
            }
            return Ok(());
        }

        let (width, height) = frame.dimensions();
        let encoder = self.ensure_encoder()?;
        let rgb = RgbSliceU8::new(frame.as_raw(), (width as usize, height as usize));
        let yuv = YUVBuffer::from_rgb_source(rgb);
        let data = encoder
            .encode(&yuv)
            .map(|bitstream| bitstream.to_vec())
            .map_err(|e| VideoError::EncodeFailed(format!("frame {index}: {e}")))?;
        self.h264_frames.push(data);

        if index % 100 == 0 {
            debug!("  Frame {}/{}", index, self.total_frames);
        }
        Ok(())
    }

    /// Write the video (or confirm the dumped frame) and return its path.
    pub fn finish(self) -> Result<PathBuf, VideoError> {
        if self.dump_mode.is_some() {
            return self.dumped.ok_or(VideoError::NoFrames);
        }
        let (width, height) = self.frame_size.ok_or(VideoError::NoFrames)?;
        mux_to_mp4(&self.output_path, &self.h264_frames, width, height, self.fps)?;
        Ok(self.output_path)
    }
}

fn mux_err(e: impl std::fmt::Display) -> VideoError {
    VideoError::MuxFailed(e.to_string())
}

fn fourcc(code: &str) -> Result<mp4::FourCC, VideoError> {
    code.parse().map_err(mux_err)
}

/// Mux pre-encoded H.264 Annex B frames into an MP4 file.
fn mux_to_mp4(
    output_path: &Path,
    h264_frames: &[Vec<u8>],
    width: u32,
    height: u32,
    fps: u32,
) -> Result<(), VideoError> {
    let first_frame = h264_frames.first().ok_or(VideoError::NoFrames)?;
    let nals = parse_annexb_nals(first_frame);
    let sps = nals
        .iter()
        .find(|n| (n[0] & 0x1f) == 7)
        .ok_or_else(|| mux_err("no SPS found in first frame"))?;
    let pps = nals
        .iter()
        .find(|n| (n[0] & 0x1f) == 8)
        .ok_or_else(|| mux_err("no PPS found in first frame"))?;

    let mp4_config = mp4::Mp4Config {
        major_brand: fourcc("isom")?,
        minor_version: 512,
        compatible_brands: vec![
            fourcc("isom")?,
            fourcc("iso2")?,
            fourcc("avc1")?,
            fourcc("mp41")?,
        ],
        timescale: 1000,
    };

    let file = File::create(output_path)?;
    let writer = BufWriter::new(file);
    let mut mp4_writer = mp4::Mp4Writer::write_start(writer, &mp4_config).map_err(mux_err)?;

    let track_timescale = fps * SAMPLE_DURATION;
    let track_config = mp4::TrackConfig {
        track_type: mp4::TrackType::Video,
        timescale: track_timescale,
        language: "und".to_string(),
        media_conf: mp4::MediaConfig::AvcConfig(mp4::AvcConfig {
            width: width as u16,
            height: height as u16,
            seq_param_set: sps.to_vec(),
            pic_param_set: pps.to_vec(),
        }),
    };
    mp4_writer.add_track(&track_config).map_err(mux_err)?;

    for (frame_idx, annexb_data) in h264_frames.iter().enumerate() {
        if annexb_data.is_empty() {
            continue;
        }
        let nals = parse_annexb_nals(annexb_data);
        let is_sync = nals.iter().any(|n| (n[0] & 0x1f) == 5);

        let mut avcc_data = Vec::new();
        for nal in &nals {
            let nal_type = nal[0] & 0x1f;
            if nal_type == 7 || nal_type == 8 {
                continue;
            }
            let len = nal.len() as u32;
            avcc_data.extend_from_slice(&len.to_be_bytes());
            avcc_data.extend_from_slice(nal);
        }

        if avcc_data.is_empty() {
            continue;
        }

        let sample = mp4::Mp4Sample {
            start_time: frame_idx as u64 * SAMPLE_DURATION as u64,
            duration: SAMPLE_DURATION,
            rendering_offset: 0,
            is_sync,
            bytes: Bytes::from(avcc_data),
        };
        mp4_writer.write_sample(1, &sample).map_err(mux_err)?;
    }

    mp4_writer.write_end().map_err(mux_err)?;
    info!("Video saved to {}", output_path.display());
    Ok(())
}

/// Parse Annex B byte stream into individual NAL units (without start codes).
fn parse_annexb_nals(data: &[u8]) -> Vec<&[u8]> {
    let mut nals = Vec::new();
    let mut i = 0;
    while i < data.len() {
        if i + 2 < data.len() && data[i] == 0 && data[i + 1] == 0 {
            let start = if i + 3 < data.len() && data[i + 2] == 0 && data[i + 3] == 1 {
                i + 4
            } else if data[i + 2] == 1 {
                i + 3
            } else {
                i += 1;
                continue;
            };
            let mut end = start;
            while end < data.len() {
                if end + 2 < data.len()
                    && data[end] == 0
                    && data[end + 1] == 0
                    && (data[end + 2] == 1
                        || (end + 3 < data.len() && data[end + 2] == 0 && data[end + 3] == 1))
                {
                    break;
                }
                end += 1;
            }
            if end > start {
                nals.push(&data[start..end]);
            }
            i = end;
        } else {
            i += 1;
        }
    }
    nals
}
