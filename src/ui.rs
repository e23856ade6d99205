use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// stderr progress for the command line tools.
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

    fn pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    fn spinner(template: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    }

    /// A named step; reports its duration when dropped.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty() {
            let spinner = Self::spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live frame/event counter for long-running loops.
    #[allow(dead_code)]
    pub fn monitor_status(&self, source: &str) -> MonitorStatus {
        let spinner = if self.pretty() {
            let spinner = Self::spinner("{spinner} [{elapsed_precise}] {msg}");
            spinner.set_message(format!("watching {source}"));
            Some(spinner)
        } else {
            eprintln!("==> watching {}", source);
            None
        };
        MonitorStatus {
            spinner,
            last_plain: Instant::now(),
        }
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

#[allow(dead_code)]
const PLAIN_STATUS_EVERY: Duration = Duration::from_secs(10);

#[allow(dead_code)]
pub struct MonitorStatus {
    spinner: Option<ProgressBar>,
    last_plain: Instant,
}

#[allow(dead_code)]
impl MonitorStatus {
    pub fn update(&mut self, frames: u64, events: u64, paused: bool) {
        let state = if paused { " (paused)" } else { "" };
        let line = format!("frames {frames} · events {events}{state}");
        match &self.spinner {
            Some(spinner) => spinner.set_message(line),
            None => {
                if self.last_plain.elapsed() >= PLAIN_STATUS_EVERY {
                    eprintln!("    {line}");
                    self.last_plain = Instant::now();
                }
            }
        }
    }

    pub fn finish(self, frames: u64, events: u64) {
        let line = format!("✔ {frames} frames, {events} events");
        match self.spinner {
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{line}"),
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
