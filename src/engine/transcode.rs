//! Real-time paced capture: decode a stream, re-encode what would be rendered,
//! and keep going until told to stop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{codec, encoder, format, media, Dictionary, Packet, Rational};
use tracing::{debug, info, warn};

use crate::domain::errors::DomainError;
use crate::engine::audio::AudioTranscoder;
use crate::ports::StreamSource;

/// Encoded timestamps are milliseconds since capture start
const ENCODER_TIME_BASE: (i32, i32) = (1, 1000);

/// Everything the capture loop needs to know
#[derive(Debug, Clone)]
pub struct CaptureJob {
    pub source: StreamSource,
    pub has_audio: bool,
    pub output_path: PathBuf,
    /// libavformat muxer name
    pub muxer: &'static str,
    /// libavcodec video encoder name
    pub video_encoder: &'static str,
    /// libavcodec audio encoder name; `None` when the build has none for the muxer
    pub audio_encoder: Option<&'static str>,
    pub bit_rate: Option<u64>,
}

/// What a finished capture produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSummary {
    pub frames: u64,
    /// Media time covered by the encoded video
    pub media_secs: f64,
    /// Audio samples encoded; zero for silent captures
    pub audio_samples: u64,
}

fn ff_err(context: &'static str) -> impl Fn(ffmpeg::Error) -> DomainError {
    move |e| DomainError::ProcessingError(format!("{}: {}", context, e))
}

/// Open a capture device through libavdevice
pub fn open_device(format_name: &str, url: &str) -> Result<format::context::Input, ffmpeg::Error> {
    let input_format = ffmpeg::device::input::video()
        .find(|f| f.name() == format_name)
        .ok_or(ffmpeg::Error::DemuxerNotFound)?;

    let mut options = Dictionary::new();
    if format_name == "avfoundation" {
        options.set("framerate", "30");
    }
    let url = PathBuf::from(url);
    Ok(format::open_with(&url, &input_format, options)?.input())
}

/// Run a capture until `stop` is raised or the source runs dry.
///
/// File sources are paced against the wall clock, so the encoded duration
/// tracks how long the capture ran. Device sources are live already.
pub fn run_capture(
    job: &CaptureJob,
    stop: &AtomicBool,
    poll: Duration,
) -> Result<CaptureSummary, DomainError> {
    let (mut ictx, start) = match &job.source {
        StreamSource::File { path, start } => {
            let ictx = format::input(path).map_err(ff_err("Failed to open capture source"))?;
            (ictx, *start)
        }
        StreamSource::Device { format, url } => {
            let ictx = open_device(format, url).map_err(ff_err("Failed to open capture device"))?;
            (ictx, 0.0)
        }
    };
    let paced = matches!(job.source, StreamSource::File { .. });

    let (video_index, video_tb, video_params) = {
        let stream = ictx
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| DomainError::UnsupportedSource("No video stream to capture".to_string()))?;
        (stream.index(), stream.time_base(), stream.parameters())
    };
    let mut decoder = codec::context::Context::from_parameters(video_params)
        .map_err(ff_err("Failed to create decoder context"))?
        .decoder()
        .video()
        .map_err(ff_err("Failed to create video decoder"))?;

    if start > 0.0 {
        let ts = (start * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
        ictx.seek(ts, ..ts).map_err(ff_err("Failed to seek capture source"))?;
    }

    let mut octx = format::output_as(&job.output_path, job.muxer)
        .map_err(ff_err("Failed to create capture output"))?;
    let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

    let codec = encoder::find_by_name(job.video_encoder).ok_or_else(|| {
        DomainError::CaptureFailure(format!("Encoder {} is not available", job.video_encoder))
    })?;

    let width = decoder.width() & !1;
    let height = decoder.height() & !1;
    let encoder_tb = Rational::new(ENCODER_TIME_BASE.0, ENCODER_TIME_BASE.1);

    let mut video_encoder = {
        let mut ost = octx.add_stream(codec).map_err(ff_err("Failed to add video stream"))?;
        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(ff_err("Failed to create video encoder"))?;
        enc.set_width(width);
        enc.set_height(height);
        enc.set_format(Pixel::YUV420P);
        enc.set_time_base(encoder_tb);
        enc.set_frame_rate(decoder.frame_rate());
        if let Some(bit_rate) = job.bit_rate {
            enc.set_bit_rate(bit_rate as usize);
            enc.set_max_bit_rate(bit_rate as usize);
        }
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let opened = enc
            .open_with(Dictionary::new())
            .map_err(ff_err("Failed to open video encoder"))?;
        ost.set_parameters(&opened);
        opened
    };
    let video_ost = 0;

    let mut audio = match (job.has_audio, job.audio_encoder) {
        (false, _) => None,
        (true, None) => {
            warn!(muxer = job.muxer, "No audio encoder for this container; capture is silent");
            None
        }
        (true, Some(name)) => {
            let audio_start = paced.then_some(start);
            match AudioTranscoder::new(&ictx, &mut octx, name, audio_start) {
                Ok(transcoder) => transcoder,
                Err(e) => {
                    warn!("Audio cannot be encoded, capture is silent: {}", e);
                    None
                }
            }
        }
    };

    octx.write_header().map_err(ff_err("Failed to write capture header"))?;
    let video_ost_tb = octx
        .stream(video_ost)
        .map(|s| s.time_base())
        .unwrap_or(encoder_tb);

    info!(
        encoder = job.video_encoder,
        muxer = job.muxer,
        width,
        height,
        start,
        audio = audio.is_some(),
        "Capture started"
    );

    let clock = Instant::now();
    let half_frame = decoder
        .frame_rate()
        .map(|r| 0.5 / f64::from(r).max(1.0))
        .unwrap_or(0.02);
    let mut scaler: Option<scaling::Context> = None;
    let mut last_pts: i64 = -1;
    let mut frames = 0u64;
    let mut media_secs = 0.0;

    'packets: for (stream, packet) in ictx.packets() {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        if let Some(transcoder) = audio.as_mut() {
            if stream.index() == transcoder.input_index() {
                transcoder.push_packet(&packet, &mut octx)?;
                continue;
            }
        }

        if stream.index() != video_index {
            continue;
        }

        decoder
            .send_packet(&packet)
            .map_err(ff_err("Failed to send packet to decoder"))?;

        let mut decoded = VideoFrame::empty();
        while decoder.receive_frame(&mut decoded).is_ok() {
            let media_time = if paced {
                let frame_secs = decoded
                    .timestamp()
                    .map(|ts| ts as f64 * f64::from(video_tb))
                    .unwrap_or(start);
                let media_time = frame_secs - start;
                if media_time < -half_frame {
                    continue;
                }
                if !wait_until(clock, media_time.max(0.0), stop, poll) {
                    break 'packets;
                }
                media_time.max(0.0)
            } else {
                clock.elapsed().as_secs_f64()
            };

            let pts = ((media_time * 1000.0).round() as i64).max(last_pts + 1);
            last_pts = pts;

            if scaler.is_none() {
                scaler = Some(
                    scaling::Context::get(
                        decoded.format(),
                        decoded.width(),
                        decoded.height(),
                        Pixel::YUV420P,
                        width,
                        height,
                        scaling::Flags::BILINEAR,
                    )
                    .map_err(ff_err("Failed to create scaler"))?,
                );
            }
            let Some(scaler) = scaler.as_mut() else {
                continue;
            };
            let mut yuv = VideoFrame::empty();
            scaler.run(&decoded, &mut yuv).map_err(ff_err("Failed to scale frame"))?;
            yuv.set_pts(Some(pts));

            video_encoder
                .send_frame(&yuv)
                .map_err(ff_err("Failed to send frame to encoder"))?;
            drain_encoder(&mut video_encoder, &mut octx, encoder_tb, video_ost_tb, video_ost)?;

            frames += 1;
            media_secs = media_time;
            if frames % 100 == 0 {
                debug!(frames, media_secs, "Capture progress");
            }
        }
    }

    video_encoder
        .send_eof()
        .map_err(ff_err("Failed to flush video encoder"))?;
    drain_encoder(&mut video_encoder, &mut octx, encoder_tb, video_ost_tb, video_ost)?;
    let audio_samples = match audio.as_mut() {
        Some(transcoder) => {
            transcoder.finish(&mut octx)?;
            transcoder.samples()
        }
        None => 0,
    };
    octx.write_trailer().map_err(ff_err("Failed to write capture trailer"))?;

    info!(frames, media_secs, audio_samples, "Capture finalized");
    Ok(CaptureSummary {
        frames,
        media_secs,
        audio_samples,
    })
}

/// Sleep until `clock` reaches `media_time`; `false` if stopped meanwhile
fn wait_until(clock: Instant, media_time: f64, stop: &AtomicBool, poll: Duration) -> bool {
    let due = Duration::from_secs_f64(media_time);
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let elapsed = clock.elapsed();
        if elapsed >= due {
            return true;
        }
        std::thread::sleep((due - elapsed).min(poll));
    }
}

fn drain_encoder(
    encoder: &mut encoder::video::Encoder,
    octx: &mut format::context::Output,
    encoder_tb: Rational,
    ost_tb: Rational,
    ost_index: usize,
) -> Result<(), DomainError> {
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(ost_index);
        packet.rescale_ts(encoder_tb, ost_tb);
        packet
            .write_interleaved(octx)
            .map_err(ff_err("Failed to write encoded packet"))?;
    }
    Ok(())
}
