use super::*;
use crate::foundation::core::Fps;

fn params(width: u32, height: u32, bitrate: u32) -> CodecParams {
    CodecParams {
        canvas: Canvas { width, height },
        fps: Fps::integer(30).unwrap(),
        bitrate,
    }
}

#[test]
fn quality_follows_bits_per_pixel() {
    // 64x64 @ 30fps = 122_880 px/s.
    assert_eq!(quality_for_bitrate(params(64, 64, 122_880)), 50);
    assert_eq!(quality_for_bitrate(params(64, 64, 0)), MIN_QUALITY);
    assert_eq!(quality_for_bitrate(params(64, 64, u32::MAX)), MAX_QUALITY);

    let low = quality_for_bitrate(params(64, 64, 60_000));
    let high = quality_for_bitrate(params(64, 64, 200_000));
    assert!(low < high);
}

#[test]
fn encoded_frames_decode_to_original_size() {
    let codec = MjpegCodec::new(params(32, 16, 500_000));
    let mut frame = RasterImage::filled_rgba(32, 16, [255, 255, 255, 255]).unwrap();
    frame.fill_rect(0, 0, 8, 8, [255, 0, 0, 255]);

    let pkt = codec
        .encode(
            &frame,
            EncodeContext {
                seq: 0,
                timestamp_us: 0,
            },
        )
        .unwrap();
    assert!(pkt.key_frame);
    assert_eq!(&pkt.data[..2], &[0xFF, 0xD8]);

    let decoded = image::load_from_memory_with_format(&pkt.data, image::ImageFormat::Jpeg)
        .unwrap()
        .to_rgb8();
    assert_eq!(decoded.dimensions(), (32, 16));
    let red = decoded.get_pixel(2, 2);
    assert!(red[0] > 200 && red[1] < 60 && red[2] < 60);
    let white = decoded.get_pixel(28, 12);
    assert!(white[0] > 200 && white[1] > 200 && white[2] > 200);
}

#[test]
fn size_mismatch_is_a_codec_fault() {
    let codec = MjpegCodec::new(params(32, 16, 500_000));
    let frame = RasterImage::filled_rgba(16, 16, [0, 0, 0, 255]).unwrap();
    let err = codec
        .encode(
            &frame,
            EncodeContext {
                seq: 0,
                timestamp_us: 0,
            },
        )
        .unwrap_err();
    assert!(err.to_string().contains("frame size mismatch"));
}

#[test]
fn with_quality_clamps() {
    let codec = MjpegCodec::new(params(8, 8, 1)).with_quality(200);
    assert_eq!(codec.quality(), MAX_QUALITY);
}
