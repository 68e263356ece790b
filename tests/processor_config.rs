use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use court_highlights::config::ProcessorConfig;
use court_highlights::loader::ModelBackend;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "HIGHLIGHT_CONFIG",
        "HIGHLIGHT_VIDEO_SRC",
        "HIGHLIGHT_MODEL_BACKEND",
        "HIGHLIGHT_SHOW_OVERLAY",
        "HIGHLIGHT_TARGET_FPS",
        "HIGHLIGHT_SNAPSHOT_DIR",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ProcessorConfig::load().expect("load defaults");
    assert_eq!(cfg.video.src, "stub://court");
    assert_eq!((cfg.video.width, cfg.video.height), (640, 360));
    assert!(cfg.video.show_overlay);
    assert!(cfg.video.autoplay);
    assert!(!cfg.video.loop_playback);
    assert_eq!(cfg.video.target_fps, 30);
    assert_eq!(cfg.models.backend, ModelBackend::Cpu);
    assert!(cfg.loop_options().snapshot.is_none());
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "video": {
            "src": "/var/lib/highlights/game.mp4",
            "width": 1280,
            "height": 720,
            "autoplay": false,
            "loop_playback": true,
            "target_fps": 24
        },
        "models": { "backend": "cpu" },
        "overlay": { "snapshot_every": 15 }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("HIGHLIGHT_CONFIG", file.path());
    std::env::set_var("HIGHLIGHT_SHOW_OVERLAY", "false");
    std::env::set_var("HIGHLIGHT_TARGET_FPS", "0");
    std::env::set_var("HIGHLIGHT_SNAPSHOT_DIR", "/tmp/overlay");

    let cfg = ProcessorConfig::load().expect("load config");

    assert_eq!(cfg.video.src, "/var/lib/highlights/game.mp4");
    assert_eq!((cfg.video.width, cfg.video.height), (1280, 720));
    assert!(!cfg.video.autoplay);
    assert!(!cfg.video.show_overlay);
    assert_eq!(cfg.video.target_fps, 0);

    let options = cfg.loop_options();
    assert!(options.loop_playback);
    let snapshot = options.snapshot.expect("snapshot settings");
    assert_eq!(snapshot.dir, PathBuf::from("/tmp/overlay"));
    assert_eq!(snapshot.every, 15);

    let file_cfg = cfg.file_config();
    assert_eq!(file_cfg.path, "/var/lib/highlights/game.mp4");
    assert_eq!(file_cfg.fps, 30);

    clear_env();
}

#[test]
fn unpaced_loop_keeps_scene_clock() -> anyhow::Result<()> {
    use court_highlights::playback::VideoSource;
    use court_highlights::FileSource;

    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    std::env::set_var("HIGHLIGHT_TARGET_FPS", "0");

    let cfg = ProcessorConfig::load_from(None)?;
    clear_env();
    assert_eq!(cfg.loop_options().target_fps, 0);

    let mut source = FileSource::new(cfg.file_config())?;
    source.connect()?;
    let mut times = Vec::new();
    for _ in 0..3 {
        times.push(source.next_frame()?.expect("frame").media_time);
    }
    for (i, t) in times.iter().enumerate() {
        assert!((t - i as f64 / 30.0).abs() < 1e-9, "media times {times:?}");
    }
    Ok(())
}

#[test]
fn reads_toml_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("highlights.toml");
    std::fs::write(
        &path,
        r#"
[video]
src = "stub://court"
max_frames = 120

[overlay]
font_path = "/usr/share/fonts/DejaVuSans.ttf"
"#,
    )
    .expect("write config");

    let cfg = ProcessorConfig::load_from(Some(&path)).expect("load toml");
    assert_eq!(cfg.video.max_frames, Some(120));
    assert_eq!(
        cfg.overlay.font_path,
        Some(PathBuf::from("/usr/share/fonts/DejaVuSans.ttf"))
    );
}

#[test]
fn rejects_invalid_settings() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HIGHLIGHT_MODEL_BACKEND", "webgl");
    assert!(ProcessorConfig::load().is_err());
    clear_env();

    std::env::set_var("HIGHLIGHT_MODEL_BACKEND", "tract");
    let err = ProcessorConfig::load().expect_err("tract needs model paths");
    assert!(err.to_string().contains("object_model"));
    clear_env();

    std::env::set_var("HIGHLIGHT_SHOW_OVERLAY", "sometimes");
    assert!(ProcessorConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "video": { "width": 0 } }"#)
        .expect("write config");
    assert!(ProcessorConfig::load_from(Some(file.path())).is_err());

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{ "video": { "scene_fps": 0 } }"#)
        .expect("write config");
    assert!(ProcessorConfig::load_from(Some(file.path())).is_err());
}
