//! Line-oriented terminal rendering of the registration widget.

#[cfg(test)]
#[path = "terminal_test.rs"]
mod terminal_test;

use std::io::Write;

use campus::registration::{AlertKind, ButtonDescriptor, RegistrationView, StatusPanel};
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct TerminalView<W> {
    out: W,
    base_url: String,
    assume_yes: bool,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W, base_url: &str, assume_yes: bool) -> Self {
        Self { out, base_url: base_url.trim_end_matches('/').to_owned(), assume_yes }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // A closed stdout is not worth aborting a submission over.
        let _ = writeln!(self.out, "{text}");
    }
}

#[async_trait::async_trait]
impl<W: Write + Send> RegistrationView for TerminalView<W> {
    fn render_button(&mut self, button: &ButtonDescriptor) {
        let suffix = if button.disabled { " (disabled)" } else { "" };
        self.line(&format!("[{}] {}{suffix}", button.state.as_str(), button.label));
    }

    fn render_status_panel(&mut self, panel: Option<StatusPanel>) {
        if let Some(panel) = panel {
            self.line(&panel.headline());
        }
    }

    fn show_alert(&mut self, kind: AlertKind, message: &str) {
        let prefix = match kind {
            AlertKind::Success => "ok",
            AlertKind::Danger => "error",
        };
        self.line(&format!("{prefix}: {message}"));
    }

    fn clear_alerts(&mut self) {}

    fn mark_field_invalid(&mut self, field: &str, message: &str) {
        self.line(&format!("  {field}: {message}"));
    }

    fn set_controls_busy(&mut self, busy: bool) {
        tracing::debug!(busy, "controls busy");
    }

    async fn confirm(&mut self, prompt: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        let _ = write!(self.out, "{prompt} [y/N] ");
        let _ = self.out.flush();

        let mut answer = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        if stdin.read_line(&mut answer).await.is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }

    fn open_modal(&mut self) {
        tracing::debug!("registration form opened");
    }

    fn hide_modal(&mut self) {}

    fn navigate(&mut self, url: &str) {
        let target = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_owned()
        } else {
            format!("{}{url}", self.base_url)
        };
        self.line(&format!("-> {target}"));
    }
}
