use anyhow::Result;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::future::Future;
use std::time::Duration;

const SPINNER_TICKS_BRAILLE_COLORED: [&str; 8] = [
    "\x1b[1;96m⠁\x1b[0m",
    "\x1b[1;96m⠂\x1b[0m",
    "\x1b[1;96m⠄\x1b[0m",
    "\x1b[1;96m⡀\x1b[0m",
    "\x1b[1;96m⢀\x1b[0m",
    "\x1b[1;96m⠠\x1b[0m",
    "\x1b[1;96m⠐\x1b[0m",
    "\x1b[1;96m⠈\x1b[0m",
];

const SPINNER_TICKS_BRAILLE_PLAIN: [&str; 8] = ["⠁", "⠂", "⠄", "⡀", "⢀", "⠠", "⠐", "⠈"];
const SPINNER_TICKS_ASCII: &str = "|/-\\";

#[derive(Clone)]
pub struct ProgressState {
    multi: MultiProgress,
    style: ProgressStyle,
}

impl ProgressState {
    pub fn new(use_color: bool, enabled: bool) -> Self {
        let use_ascii = is_dumb_term();
        let multi = MultiProgress::new();
        if enabled {
            multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(15));
        } else {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }
        let style = ProgressStyle::with_template("{spinner} {msg}").unwrap();
        let style = if use_ascii {
            style.tick_chars(SPINNER_TICKS_ASCII)
        } else if use_color {
            style.tick_strings(&SPINNER_TICKS_BRAILLE_COLORED)
        } else {
            style.tick_strings(&SPINNER_TICKS_BRAILLE_PLAIN)
        };
        Self { multi, style }
    }

    fn spinner(&self, message: String) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(self.style.clone());
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    pub fn clear(&self) {
        let _ = self.multi.clear();
    }
}

fn is_dumb_term() -> bool {
    std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb"))
}

fn format_task_message(verb: &str, subject: &str) -> String {
    format!(
        "{} {}",
        verb.bright_cyan().bold(),
        subject.bright_white().bold()
    )
}

/// Runs a future under a spinner line, stamping the line with the
/// outcome. The spinner lives on stderr so piped stdout stays clean.
pub async fn run_with_spinner<T>(
    progress: &ProgressState,
    verb: &str,
    subject: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let message = format_task_message(verb, subject);
    let bar = progress.spinner(message);
    let result = fut.await;
    match &result {
        Ok(_) => bar.finish_with_message(format!(
            "{} {}",
            format_task_message(verb, subject),
            "done".bright_green().bold()
        )),
        Err(_) => bar.finish_with_message(format!(
            "{} {}",
            format_task_message(verb, subject),
            "failed".bright_red().bold()
        )),
    }
    result
}
