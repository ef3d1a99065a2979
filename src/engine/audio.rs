//! Audio leg of a capture: decode, resample for the encoder, encode.

use ffmpeg_next as ffmpeg;
use ffmpeg::format::{sample, Sample};
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::{codec, decoder, encoder, filter, format, media, Dictionary, Packet, Rational, Rescale};
use tracing::{debug, warn};

use crate::domain::errors::DomainError;

/// Output sample rate; opus only takes 48 kHz
const AUDIO_RATE: i32 = 48_000;
const AUDIO_CHANNELS: i32 = 2;
const AUDIO_BIT_RATE: usize = 128_000;

fn ff_err(context: &'static str) -> impl Fn(ffmpeg::Error) -> DomainError {
    move |e| DomainError::ProcessingError(format!("{}: {}", context, e))
}

/// Sample layout the named encoder accepts
fn encoder_sample_format(encoder_name: &str) -> Sample {
    match encoder_name {
        "libopus" => Sample::F32(sample::Type::Packed),
        _ => Sample::F32(sample::Type::Planar),
    }
}

/// Re-encodes the best audio stream of an input into one output stream
pub struct AudioTranscoder {
    input_index: usize,
    /// Input pts mapped to zero; taken from the first frame when unknown
    offset: Option<i64>,
    decoder: decoder::Audio,
    graph: filter::Graph,
    sink_tb: Rational,
    encoder: encoder::audio::Encoder,
    encoder_tb: Rational,
    ost_index: usize,
    samples: u64,
}

impl AudioTranscoder {
    /// Add an audio stream to `octx`. `None` when the input has no audio.
    ///
    /// `start` is where the capture starts in input media time; live inputs
    /// pass `None` and start from their first decoded frame.
    pub fn new(
        ictx: &format::context::Input,
        octx: &mut format::context::Output,
        encoder_name: &str,
        start: Option<f64>,
    ) -> Result<Option<Self>, DomainError> {
        let Some(stream) = ictx.streams().best(media::Type::Audio) else {
            return Ok(None);
        };
        let input_index = stream.index();
        let input_tb = stream.time_base();
        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .map_err(ff_err("Failed to create audio decoder context"))?
            .decoder()
            .audio()
            .map_err(ff_err("Failed to create audio decoder"))?;

        let codec = encoder::find_by_name(encoder_name).ok_or_else(|| {
            DomainError::CaptureFailure(format!("Audio encoder {} is not available", encoder_name))
        })?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);
        let sample_format = encoder_sample_format(encoder_name);
        let encoder_tb = Rational::new(1, AUDIO_RATE);

        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .audio()
            .map_err(ff_err("Failed to create audio encoder"))?;
        enc.set_rate(AUDIO_RATE);
        enc.set_format(sample_format);
        enc.set_time_base(encoder_tb);
        enc.set_bit_rate(AUDIO_BIT_RATE);
        unsafe {
            ffmpeg::ffi::av_channel_layout_default(&mut (*enc.as_mut_ptr()).ch_layout, AUDIO_CHANNELS);
        }
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let mut options = Dictionary::new();
        options.set("strict", "experimental");
        let encoder = enc
            .open_with(options)
            .map_err(ff_err("Failed to open audio encoder"))?;

        let mut graph = build_graph(&decoder, input_tb, sample_format, encoder.frame_size())?;
        let sink_tb = graph
            .get("out")
            .map(|sink| Rational::from(unsafe { ffmpeg::ffi::av_buffersink_get_time_base(sink.as_ptr()) }))
            .unwrap_or(encoder_tb);

        // Last fallible step; nothing is added to `octx` unless the chain is complete
        let ost_index = {
            let mut ost = octx.add_stream(codec).map_err(ff_err("Failed to add audio stream"))?;
            ost.set_parameters(&encoder);
            ost.index()
        };

        let offset = start.map(|secs| (secs / f64::from(input_tb)).round() as i64);
        debug!(encoder = encoder_name, input_index, ost_index, "Audio transcoder ready");

        Ok(Some(Self {
            input_index,
            offset,
            decoder,
            graph,
            sink_tb,
            encoder,
            encoder_tb,
            ost_index,
            samples: 0,
        }))
    }

    pub fn input_index(&self) -> usize {
        self.input_index
    }

    /// Samples handed to the encoder so far
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Decode one input packet and push whatever it yields through to `octx`
    pub fn push_packet(
        &mut self,
        packet: &Packet,
        octx: &mut format::context::Output,
    ) -> Result<(), DomainError> {
        if let Err(e) = self.decoder.send_packet(packet) {
            warn!("Dropping undecodable audio packet: {}", e);
            return Ok(());
        }
        self.receive_decoded(octx)
    }

    /// Flush decoder, filter and encoder
    pub fn finish(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        self.decoder
            .send_eof()
            .map_err(ff_err("Failed to flush audio decoder"))?;
        self.receive_decoded(octx)?;
        self.filter_input()?
            .source()
            .flush()
            .map_err(ff_err("Failed to flush audio filter"))?;
        self.drain_filter(octx)?;
        self.encoder
            .send_eof()
            .map_err(ff_err("Failed to flush audio encoder"))?;
        self.drain_encoder(octx)?;
        debug!(samples = self.samples, "Audio transcoder finished");
        Ok(())
    }

    fn filter_input(&mut self) -> Result<filter::Context<'_>, DomainError> {
        self.graph
            .get("in")
            .ok_or_else(|| DomainError::InternalError("Audio filter input missing".to_string()))
    }

    fn receive_decoded(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        let mut decoded = AudioFrame::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            let Some(pts) = decoded.timestamp().or(decoded.pts()) else {
                continue;
            };
            let offset = *self.offset.get_or_insert(pts);
            if pts < offset {
                continue;
            }
            decoded.set_pts(Some(pts - offset));
            self.filter_input()?
                .source()
                .add(&decoded)
                .map_err(ff_err("Failed to feed audio filter"))?;
            self.drain_filter(octx)?;
        }
        Ok(())
    }

    fn drain_filter(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        let mut filtered = AudioFrame::empty();
        loop {
            let received = match self.graph.get("out") {
                Some(mut sink) => sink.sink().frame(&mut filtered).is_ok(),
                None => false,
            };
            if !received {
                return Ok(());
            }
            let pts = filtered.pts().map(|pts| pts.rescale(self.sink_tb, self.encoder_tb));
            filtered.set_pts(pts);
            self.samples += filtered.samples() as u64;
            self.encoder
                .send_frame(&filtered)
                .map_err(ff_err("Failed to send audio to encoder"))?;
            self.drain_encoder(octx)?;
        }
    }

    fn drain_encoder(&mut self, octx: &mut format::context::Output) -> Result<(), DomainError> {
        let ost_tb = octx
            .stream(self.ost_index)
            .map(|s| s.time_base())
            .unwrap_or(self.encoder_tb);
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.ost_index);
            packet.rescale_ts(self.encoder_tb, ost_tb);
            packet
                .write_interleaved(octx)
                .map_err(ff_err("Failed to write audio packet"))?;
        }
        Ok(())
    }
}

/// `abuffer -> aformat -> abuffersink`, cut into encoder-sized frames
fn build_graph(
    decoder: &decoder::Audio,
    input_tb: Rational,
    sample_format: Sample,
    frame_size: u32,
) -> Result<filter::Graph, DomainError> {
    let layout = unsafe {
        let ch_layout = &(*decoder.as_ptr()).ch_layout;
        if matches!(ch_layout.order, ffmpeg::ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE) {
            format!("channel_layout=0x{:x}", ch_layout.u.mask)
        } else {
            format!("channel_layout={}c", ch_layout.nb_channels.max(1))
        }
    };
    let args = format!(
        "time_base={}:sample_rate={}:sample_fmt={}:{}",
        input_tb,
        decoder.rate(),
        decoder.format().name(),
        layout
    );
    let spec = format!(
        "aformat=sample_fmts={}:sample_rates={}:channel_layouts=stereo",
        sample_format.name(),
        AUDIO_RATE
    );

    let abuffer = filter::find("abuffer")
        .ok_or_else(|| DomainError::CaptureFailure("abuffer filter missing".to_string()))?;
    let abuffersink = filter::find("abuffersink")
        .ok_or_else(|| DomainError::CaptureFailure("abuffersink filter missing".to_string()))?;

    let mut graph = filter::Graph::new();
    graph
        .add(&abuffer, "in", &args)
        .map_err(ff_err("Failed to add audio source filter"))?;
    graph
        .add(&abuffersink, "out", "")
        .map_err(ff_err("Failed to add audio sink filter"))?;
    graph
        .output("in", 0)
        .and_then(|parser| parser.input("out", 0))
        .and_then(|parser| parser.parse(&spec))
        .map_err(ff_err("Failed to link audio filters"))?;
    graph.validate().map_err(ff_err("Invalid audio filter graph"))?;

    if frame_size > 0 {
        if let Some(mut sink) = graph.get("out") {
            sink.sink().set_frame_size(frame_size);
        }
    }
    Ok(graph)
}
