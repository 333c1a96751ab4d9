use super::*;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("reelmux_sink_{}_{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn in_memory_sink_holds_one_buffer() {
    let mut sink = InMemorySink::new();
    assert!(sink.buffer().is_none());
    sink.accept(Bytes::from_static(b"abc")).unwrap();
    assert_eq!(sink.buffer().map(|b| &b[..]), Some(&b"abc"[..]));
    assert!(sink.accept(Bytes::from_static(b"x")).is_err());
    assert_eq!(sink.take(), Some(Bytes::from_static(b"abc")));
}

#[test]
fn file_sink_creates_parent_dirs() {
    let dir = scratch_dir("parents");
    let path = dir.join("nested").join("animation.mp4");
    let mut sink = FileSink::new(&path);
    sink.accept(Bytes::from_static(b"mp4")).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"mp4");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn file_sink_respects_overwrite_flag() {
    let dir = scratch_dir("overwrite");
    let path = dir.join("animation.mp4");
    FileSink::new(&path)
        .accept(Bytes::from_static(b"first"))
        .unwrap();

    let err = FileSink::new(&path)
        .with_overwrite(false)
        .accept(Bytes::from_static(b"second"))
        .unwrap_err();
    assert!(matches!(err, ReelError::Config(_)));
    assert_eq!(std::fs::read(&path).unwrap(), b"first");

    FileSink::new(&path)
        .accept(Bytes::from_static(b"third"))
        .unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"third");
    let _ = std::fs::remove_dir_all(&dir);
}
