use std::io::IsTerminal;
use std::sync::Mutex;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use gantry_core::ManifestFile;
use gantry_updater::ProgressListener;
use indicatif::{ProgressBar, ProgressStyle};

pub(crate) fn print_status(status: &str, message: &str) {
    println!("{}", render_status_line(status, message));
}

pub(crate) fn print_error(message: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("{} {message}", colorize(error_style(), "error:"));
    } else {
        eprintln!("error: {message}");
    }
}

fn render_status_line(status: &str, message: &str) -> String {
    if std::io::stdout().is_terminal() {
        format!(
            "{} {message}",
            colorize(status_style(status), &format!("{status:>8}"))
        )
    } else {
        format!("{status}: {message}")
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "warn" => AnsiColor::BrightYellow,
        "error" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightCyan,
    };
    Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
}

fn error_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightRed.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Terminal implementation of the update progress listener: one byte-level
/// bar per file, plain status lines for the session milestones.
pub(crate) struct TerminalListener {
    active: Mutex<Option<ProgressBar>>,
}

impl TerminalListener {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
        }
    }
}

impl ProgressListener for TerminalListener {
    fn update_files(&self, files: &[ManifestFile]) {
        print_status("files", &format!("{} files tracked by the manifest", files.len()));
    }

    fn done_update(&self) {
        print_status("done", "update pass complete");
    }

    fn begin_file(&self, file: &ManifestFile) {
        if !std::io::stdout().is_terminal() {
            return;
        }

        let bar = ProgressBar::new(file.size.max(1));
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.cyan.bold} {msg:<28} [{bar:20.cyan/blue}] {bytes:>10}/{total_bytes:10}",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }
        bar.set_message(file.path.clone());
        bar.enable_steady_tick(Duration::from_millis(80));

        let Ok(mut active) = self.active.lock() else {
            return;
        };
        *active = Some(bar);
    }

    fn end_file(&self, file: &ManifestFile) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(bar) = active.take() {
                bar.finish_and_clear();
            }
        }
        print_status("synced", &file.path);
    }

    fn file_progress(&self, _file: &ManifestFile, transferred: u64) {
        let Ok(active) = self.active.lock() else {
            return;
        };
        if let Some(bar) = active.as_ref() {
            bar.set_position(transferred);
        }
    }
}
