use super::*;
use crate::session::pipeline::Pipeline;

#[test]
fn minimal_json_fills_defaults() {
    let json = r#"{ "frame_count": 60, "fps": { "num": 30, "den": 1 }, "width": 640, "height": 480 }"#;
    let cfg = PipelineConfig::from_reader(json.as_bytes()).unwrap();
    assert_eq!(cfg.frame_count, 60);
    assert_eq!(cfg.bitrate, DEFAULT_BITRATE);
    assert_eq!(cfg.codec, CodecId::Mjpeg);
    assert!(cfg.fast_start);
    assert_eq!(cfg.encoder, EncoderOpts::default());
    cfg.validate().unwrap();
}

#[test]
fn full_json_round_trips() {
    let mut cfg = PipelineConfig::new(320, 240, Fps::new(30_000, 1001).unwrap(), 10);
    cfg.codec = CodecId::Raw;
    cfg.fast_start = false;
    cfg.encoder.workers = Some(2);
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"codec\":\"raw\""));
    assert_eq!(PipelineConfig::from_reader(json.as_bytes()).unwrap(), cfg);
}

#[test]
fn unknown_fields_and_bad_json_are_config_errors() {
    let json = r#"{ "frame_count": 1, "fps": { "num": 30, "den": 1 }, "width": 2, "height": 2, "fsp": 3 }"#;
    assert!(matches!(
        PipelineConfig::from_reader(json.as_bytes()),
        Err(ReelError::Config(_))
    ));
    assert!(matches!(
        PipelineConfig::from_reader("{".as_bytes()),
        Err(ReelError::Config(_))
    ));
    assert!(matches!(
        PipelineConfig::from_path("/definitely/not/here.json"),
        Err(ReelError::Config(_))
    ));
}

#[test]
fn validate_rejects_degenerate_shapes() {
    let fps = Fps::integer(30).unwrap();
    for (w, h) in [(0, 480), (640, 0), (70_000, 10)] {
        assert!(matches!(
            PipelineConfig::new(w, h, fps, 1).validate(),
            Err(ReelError::Config(_))
        ));
    }

    let mut cfg = PipelineConfig::new(64, 64, fps, 1);
    cfg.fps = Fps { num: 0, den: 1 };
    assert!(matches!(cfg.validate(), Err(ReelError::Config(_))));

    let mut cfg = PipelineConfig::new(64, 64, fps, 1);
    cfg.bitrate = 0;
    assert!(matches!(cfg.validate(), Err(ReelError::Config(_))));

    let mut cfg = PipelineConfig::new(64, 64, fps, 1);
    cfg.encoder.queue_depth = 0;
    assert!(matches!(cfg.validate(), Err(ReelError::Config(_))));

    // Zero frames is an empty stream, not an error.
    PipelineConfig::new(64, 64, fps, 0).validate().unwrap();
}

#[test]
fn duration_maps_to_floor_frame_count() {
    let fps = Fps::integer(30).unwrap();
    assert_eq!(PipelineConfig::for_duration(8, 8, fps, 2.0).unwrap().frame_count, 60);
    assert_eq!(PipelineConfig::for_duration(8, 8, fps, 0.99).unwrap().frame_count, 29);
    assert!(PipelineConfig::for_duration(8, 8, fps, -1.0).is_err());
    assert!(PipelineConfig::for_duration(8, 8, fps, f64::NAN).is_err());
}

#[test]
fn validate_rejects_rates_finer_than_one_microsecond() {
    let mut cfg = PipelineConfig::new(64, 64, Fps::integer(30).unwrap(), 2);
    cfg.fps = Fps {
        num: 2_000_000,
        den: 1,
    };
    assert!(matches!(cfg.validate(), Err(ReelError::Config(_))));
    assert!(matches!(Pipeline::new(cfg), Err(ReelError::Config(_))));

    // Exactly one frame per microsecond still yields distinct timestamps.
    let mut cfg = PipelineConfig::new(64, 64, Fps::integer(30).unwrap(), 2);
    cfg.fps = Fps {
        num: 1_000_000,
        den: 1,
    };
    cfg.validate().unwrap();
}
