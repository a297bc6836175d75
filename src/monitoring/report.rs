/*!
 * Result Reporter
 *
 * Writes one report per finished job. A single mutex guards the writer so
 * reports from concurrent jobs never interleave.
 */

use crate::process::CommandResult;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

const BLUE: &str = "\x1b[34m";
const RESET: &str = "\x1b[0m";

/// Report layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Multi-line human-readable block
    Text,
    /// One JSON object per line
    Json,
}

/// Serializes result reports onto a shared writer
#[derive(Clone)]
pub struct ResultReporter {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    format: ReportFormat,
    color: bool,
}

impl ResultReporter {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
            format: ReportFormat::Text,
            color: false,
        }
    }

    /// Reporter on stderr, colored when `color` is set
    pub fn stderr(color: bool) -> Self {
        Self::new(io::stderr()).with_color(color)
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Write the report for one result
    ///
    /// The whole report is rendered first and written under the lock in one
    /// call.
    pub fn report(&self, result: &CommandResult) -> io::Result<()> {
        let rendered = match self.format {
            ReportFormat::Text => self.render_text(result),
            ReportFormat::Json => {
                let mut line = serde_json::to_string(result).map_err(io::Error::other)?;
                line.push('\n');
                line
            }
        };

        let mut writer = self.writer.lock();
        writer.write_all(rendered.as_bytes())?;
        writer.flush()
    }

    fn render_text(&self, result: &CommandResult) -> String {
        let command = if self.color {
            format!("{BLUE}{}{RESET}", result.command)
        } else {
            result.command.clone()
        };
        let status = result
            .exit_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "none".to_string());

        let mut out = format!(
            "command [{}] finished, ret = [{}], outcome = [{}], duration = [{:.3}s]\n",
            command,
            status,
            result.outcome.as_str(),
            result.duration_secs()
        );
        if let Some(signal) = result.signal {
            out.push_str(&format!("signal = [{}]\n", signal));
        }
        out.push_str(&format!("stdout = [{}]\n", result.stdout_str()));
        out.push_str(&format!("stderr = [{}]\n", result.stderr_str()));
        for error in &result.stream_errors {
            out.push_str(&format!("stream error = [{}]\n", error));
        }
        out
    }
}

impl std::fmt::Debug for ResultReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultReporter")
            .field("format", &self.format)
            .field("color", &self.color)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Outcome, SharedBuffer};
    use std::time::Duration;

    fn sample() -> CommandResult {
        CommandResult {
            command: "echo hi".into(),
            key: "echo hi".into(),
            stdout: b"hi\n".to_vec(),
            stderr: Vec::new(),
            exit_status: Some(0),
            signal: None,
            duration: Duration::from_millis(5),
            timed_out: false,
            killed: false,
            outcome: Outcome::Completed,
            started_at: None,
            stream_errors: Vec::new(),
        }
    }

    #[test]
    fn test_text_report() {
        let buffer = SharedBuffer::new();
        let reporter = ResultReporter::new(buffer.clone());
        reporter.report(&sample()).unwrap();

        let text = buffer.contents_lossy();
        assert!(text.starts_with("command [echo hi] finished, ret = [0], outcome = [completed]"));
        assert!(text.contains("stdout = [hi\n]\n"));
        assert!(text.ends_with("stderr = []\n"));
    }

    #[test]
    fn test_color_wraps_command() {
        let buffer = SharedBuffer::new();
        let reporter = ResultReporter::new(buffer.clone()).with_color(true);
        reporter.report(&sample()).unwrap();
        assert!(buffer.contents_lossy().contains("\x1b[34mecho hi\x1b[0m"));
    }

    #[test]
    fn test_json_report_is_one_line() {
        let buffer = SharedBuffer::new();
        let reporter = ResultReporter::new(buffer.clone()).with_format(ReportFormat::Json);
        reporter.report(&sample()).unwrap();

        let text = buffer.contents_lossy();
        assert_eq!(text.lines().count(), 1);
        let value: serde_json::Value = serde_json::from_str(text.trim_end()).unwrap();
        assert_eq!(value["exit_status"], 0);
        assert_eq!(value["stdout"], "hi\n");
    }
}
