//! Generates small .mov files with an MPEG-4 video track and an optional
//! 16-bit PCM audio track.

use std::path::Path;

use ffmpeg_next::format::sample::Type as SampleType;
use ffmpeg_next::format::Sample as SampleFormat;
use ffmpeg_next::{codec, encoder, format, frame, ChannelLayout, Dictionary, Packet, Rational};

pub(crate) const AUDIO_FRAMES_PER_CHUNK: usize = 800;

pub(crate) struct TestMedia {
    pub frames: usize,
    pub fps: i32,
    pub gop: u32,
    pub width: u32,
    pub height: u32,
    /// Mono 8 kHz PCM alternating between `+amplitude` and `-amplitude`.
    pub audio_amplitude: Option<i16>,
    pub audio_rate: i32,
}

impl Default for TestMedia {
    fn default() -> Self {
        Self {
            frames: 90,
            fps: 30,
            gop: 10,
            width: 160,
            height: 120,
            audio_amplitude: Some(1000),
            audio_rate: 8_000,
        }
    }
}

impl TestMedia {
    pub fn video_only() -> Self {
        Self {
            audio_amplitude: None,
            ..Self::default()
        }
    }
}

pub(crate) fn create_test_media(path: &Path, media: &TestMedia) {
    ffmpeg_next::init().unwrap();

    let mut octx = format::output(path).unwrap();
    let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

    let video_codec = encoder::find(codec::Id::MPEG4).unwrap();
    let mut video_ost = octx.add_stream(Some(video_codec)).unwrap();
    let video_index = video_ost.index();

    let mut video_ctx = codec::context::Context::new_with_codec(video_codec)
        .encoder()
        .video()
        .unwrap();
    video_ctx.set_width(media.width);
    video_ctx.set_height(media.height);
    video_ctx.set_format(format::Pixel::YUV420P);
    video_ctx.set_time_base(Rational(1, media.fps));
    video_ctx.set_frame_rate(Some(Rational(media.fps, 1)));
    video_ctx.set_gop(media.gop);
    video_ctx.set_max_b_frames(0);
    if global_header {
        video_ctx.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let mut video_encoder = video_ctx.open_with(Dictionary::new()).unwrap();
    video_ost.set_parameters(&video_encoder);

    let mut audio = media.audio_amplitude.map(|amplitude| {
        let audio_codec = encoder::find(codec::Id::PCM_S16LE).unwrap();
        let mut audio_ost = octx.add_stream(Some(audio_codec)).unwrap();
        let audio_index = audio_ost.index();

        let mut audio_ctx = codec::context::Context::new_with_codec(audio_codec)
            .encoder()
            .audio()
            .unwrap();
        audio_ctx.set_rate(media.audio_rate);
        audio_ctx.set_channel_layout(ChannelLayout::MONO);
        audio_ctx.set_format(SampleFormat::I16(SampleType::Packed));
        audio_ctx.set_time_base(Rational(1, media.audio_rate));
        if global_header {
            audio_ctx.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let audio_encoder = audio_ctx.open_as(audio_codec).unwrap();
        audio_ost.set_parameters(&audio_encoder);
        (audio_encoder, audio_index, amplitude)
    });

    octx.write_header().unwrap();

    let video_time_base = octx.stream(video_index).unwrap().time_base();
    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        format::Pixel::RGB24,
        media.width,
        media.height,
        format::Pixel::YUV420P,
        media.width,
        media.height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )
    .unwrap();

    for i in 0..media.frames {
        let mut rgb_frame = frame::Video::new(format::Pixel::RGB24, media.width, media.height);
        let value = ((i * 40) % 256) as u8;
        rgb_frame.data_mut(0).fill(value);

        let mut yuv_frame = frame::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame).unwrap();
        yuv_frame.set_pts(Some(i as i64));

        video_encoder.send_frame(&yuv_frame).unwrap();
        drain_encoder(
            &mut video_encoder,
            &mut octx,
            video_index,
            Rational(1, media.fps),
            video_time_base,
        );
    }
    video_encoder.send_eof().unwrap();
    drain_encoder(
        &mut video_encoder,
        &mut octx,
        video_index,
        Rational(1, media.fps),
        video_time_base,
    );

    if let Some((audio_encoder, audio_index, amplitude)) = audio.as_mut() {
        let audio_time_base = octx.stream(*audio_index).unwrap().time_base();
        let total = media.frames * media.audio_rate as usize / media.fps as usize;
        let mut pts = 0usize;
        while pts < total {
            let count = AUDIO_FRAMES_PER_CHUNK.min(total - pts);
            let mut chunk = frame::Audio::new(
                SampleFormat::I16(SampleType::Packed),
                count,
                ChannelLayout::MONO,
            );
            chunk.set_rate(media.audio_rate as u32);
            chunk.set_pts(Some(pts as i64));
            let bytes = chunk.data_mut(0);
            for (i, pair) in bytes.chunks_exact_mut(2).take(count).enumerate() {
                let value = if i % 2 == 0 { *amplitude } else { -*amplitude };
                pair.copy_from_slice(&value.to_le_bytes());
            }

            audio_encoder.send_frame(&chunk).unwrap();
            drain_encoder(
                audio_encoder,
                &mut octx,
                *audio_index,
                Rational(1, media.audio_rate),
                audio_time_base,
            );
            pts += count;
        }
        audio_encoder.send_eof().unwrap();
        drain_encoder(
            audio_encoder,
            &mut octx,
            *audio_index,
            Rational(1, media.audio_rate),
            audio_time_base,
        );
    }

    octx.write_trailer().unwrap();
}

fn drain_encoder(
    encoder: &mut encoder::Encoder,
    octx: &mut format::context::Output,
    stream_index: usize,
    encoder_time_base: Rational,
    stream_time_base: Rational,
) {
    let mut encoded = Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(stream_index);
        encoded.rescale_ts(encoder_time_base, stream_time_base);
        encoded.write_interleaved(octx).unwrap();
    }
}

/// Every payload byte of the first audio (or video) track, in order, for
/// comparing content independent of packet boundaries.
pub(crate) fn concatenated_payload(path: &Path, audio: bool) -> Vec<u8> {
    let mut ictx = format::input(path).unwrap();
    let medium = if audio {
        ffmpeg_next::media::Type::Audio
    } else {
        ffmpeg_next::media::Type::Video
    };
    let Some(index) = ictx.streams().best(medium).map(|s| s.index()) else {
        return Vec::new();
    };
    let mut bytes = Vec::new();
    for (stream, packet) in ictx.packets() {
        if stream.index() == index {
            bytes.extend_from_slice(packet.data().unwrap_or_default());
        }
    }
    bytes
}
