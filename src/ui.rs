use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use court_highlights::loader::LoadProgress;

const LOAD_POLL: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Show model-load progress until the loader succeeds, fails or its thread exits.
    ///
    /// Returns `true` when the models are ready.
    pub fn track_load<T>(&self, progress: &LoadProgress, loader: &JoinHandle<T>) -> bool {
        let start = Instant::now();
        let bar = self.use_pretty().then(|| {
            let bar = ProgressBar::new(100);
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{msg} [{bar:30}] {pos:>3}%")
                .unwrap_or_else(|_| ProgressStyle::default_bar());
            bar.set_style(style);
            bar.set_message("Loading AI models");
            bar
        });

        let mut shown = None;
        while !progress.is_settled() && !loader.is_finished() {
            let percent = progress.percent();
            if shown != Some(percent) {
                match &bar {
                    Some(bar) => bar.set_position(percent as u64),
                    None => eprintln!("==> Loading AI models {}%", percent),
                }
                shown = Some(percent);
            }
            std::thread::sleep(LOAD_POLL);
        }

        let elapsed = format_duration(start.elapsed());
        let message = match progress.failure() {
            Some(reason) => format!("✘ model load failed: {} ({})", reason, elapsed),
            None if progress.is_ready() => format!("✔ models ready ({})", elapsed),
            None => format!("✘ model loader stopped at {}% ({})", progress.percent(), elapsed),
        };
        match bar {
            Some(bar) => {
                bar.set_position(progress.percent() as u64);
                bar.abandon_with_message(message);
            }
            None => eprintln!("{message}"),
        }
        progress.is_ready()
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use court_highlights::loader::{ModelLoader, ModelSettings};

    #[test]
    fn plain_mode_waits_for_loader() {
        let loader = ModelLoader::new(ModelSettings::default());
        let progress = loader.progress();
        let handle = std::thread::spawn(move || loader.load().is_ok());
        let ui = Ui::from_args(Some("plain"), false, false);
        assert!(ui.track_load(&progress, &handle));
        assert!(handle.join().unwrap());
    }

    #[test]
    fn stops_waiting_when_loader_thread_dies() {
        let progress = LoadProgress::new();
        let handle = std::thread::spawn(|| -> bool { panic!("plan build blew up") });
        let ui = Ui::from_args(Some("plain"), false, false);
        assert!(!ui.track_load(&progress, &handle));
        assert!(!progress.is_settled());
        assert!(handle.join().is_err());
    }

    #[test]
    fn formats_short_and_long_durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
