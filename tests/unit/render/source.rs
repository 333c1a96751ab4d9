use super::*;

fn pixel(img: &RasterImage, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * img.width() + x) * 4) as usize;
    img.data()[i..i + 4].try_into().unwrap()
}

#[test]
fn moving_box_starts_at_left_edge() {
    let mut src = MovingBoxSource::new(
        Canvas {
            width: 40,
            height: 20,
        },
        4,
    )
    .with_box_size(5);
    let f0 = src.frame(FrameIndex(0)).unwrap();
    assert_eq!(pixel(&f0, 0, 0), [255, 0, 0, 255]);
    assert_eq!(pixel(&f0, 5, 0), [255, 255, 255, 255]);
    assert_eq!(pixel(&f0, 0, 5), [255, 255, 255, 255]);
}

#[test]
fn moving_box_advances_proportionally() {
    let mut src = MovingBoxSource::new(
        Canvas {
            width: 40,
            height: 20,
        },
        4,
    )
    .with_box_size(5);
    assert_eq!(src.box_x(FrameIndex(2)), 20);
    let f2 = src.frame(FrameIndex(2)).unwrap();
    assert_eq!(pixel(&f2, 19, 0), [255, 255, 255, 255]);
    assert_eq!(pixel(&f2, 20, 0), [255, 0, 0, 255]);
}

#[test]
fn moving_box_is_deterministic() {
    let canvas = Canvas {
        width: 16,
        height: 8,
    };
    let mut a = MovingBoxSource::new(canvas, 3);
    let mut b = MovingBoxSource::new(canvas, 3);
    assert_eq!(a.frame(FrameIndex(1)).unwrap(), b.frame(FrameIndex(1)).unwrap());
}

#[test]
fn moving_box_rejects_out_of_range_index() {
    let mut src = MovingBoxSource::new(
        Canvas {
            width: 8,
            height: 8,
        },
        2,
    );
    let err = src.frame(FrameIndex(2)).unwrap_err();
    assert_eq!(err.position(), Some(2));
}

#[test]
fn closures_are_frame_sources() {
    let mut calls = Vec::new();
    let mut src = |idx: FrameIndex| {
        calls.push(idx.0);
        RasterImage::filled_rgba(2, 2, [0, 0, 0, 255])
    };
    src.frame(FrameIndex(0)).unwrap();
    src.frame(FrameIndex(1)).unwrap();
    assert_eq!(calls, vec![0, 1]);
}
