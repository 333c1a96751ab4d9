use super::*;
use crate::render::frame::PixelFormat;

#[test]
fn raw_packets_are_rgb_rows() {
    let codec = RawCodec::new(Canvas {
        width: 2,
        height: 1,
    });
    let frame =
        RasterImage::new(2, 1, PixelFormat::Rgba8, vec![1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
    let pkt = codec
        .encode(
            &frame,
            EncodeContext {
                seq: 0,
                timestamp_us: 0,
            },
        )
        .unwrap();
    assert_eq!(pkt.data, vec![1, 2, 3, 4, 5, 6]);
    assert!(pkt.key_frame);
}

#[test]
fn raw_rejects_size_mismatch() {
    let codec = RawCodec::new(Canvas {
        width: 4,
        height: 4,
    });
    let frame = RasterImage::filled_rgba(2, 2, [0, 0, 0, 255]).unwrap();
    let ctx = EncodeContext {
        seq: 3,
        timestamp_us: 100,
    };
    assert!(codec.encode(&frame, ctx).is_err());
}
