//! Terminal rendering of the console session.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use ctlpanel_core::{ConsoleSink, LogEvent, Notice, RunState, WorkflowView};
use serde::Serialize;

/// Writes one line per event, notice and workflow change.
///
/// Text mode prints `HH:MM:SS.mmm  LEVEL component | message`; JSON mode
/// prints one object per line for piping into other tools.
pub struct TerminalSink<W> {
    out: W,
    json: bool,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum JsonLine<'a> {
    Event {
        at: DateTime<Utc>,
        event: &'a LogEvent,
    },
    Notice {
        message: String,
    },
    Workflow(&'a WorkflowView),
}

impl TerminalSink<std::io::Stdout> {
    pub fn stdout(json: bool) -> Self {
        Self::new(std::io::stdout(), json)
    }
}

impl<W: Write + Send> TerminalSink<W> {
    pub fn new(out: W, json: bool) -> Self {
        Self { out, json }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_json(&mut self, line: &JsonLine<'_>) {
        if let Ok(text) = serde_json::to_string(line) {
            let _ = writeln!(self.out, "{}", text);
        }
    }
}

/// Clock label for an event: its producer timestamp, else the time of receipt.
pub fn clock_label(event: &LogEvent) -> String {
    let at = event.emitted_at.unwrap_or_else(Utc::now);
    at.with_timezone(&Local).format("%H:%M:%S%.3f").to_string()
}

pub fn describe_view(view: &WorkflowView) -> String {
    let Some(latest) = &view.latest_run_id else {
        return "no completed build yet".to_string();
    };

    if view.promoted_visible {
        match &view.production_url {
            Some(url) => format!("{} is live in production: {}", latest, url),
            None => format!("{} is live in production", latest),
        }
    } else {
        let mut line = format!("{} is built and ready to deploy", latest);
        if let Some(url) = &view.preview_url {
            line.push_str(&format!(" (preview {})", url));
        }
        line
    }
}

impl<W: Write + Send> ConsoleSink for TerminalSink<W> {
    fn log_event(&mut self, event: &LogEvent, _state: &RunState) {
        if self.json {
            let at = event.emitted_at.unwrap_or_else(Utc::now);
            self.write_json(&JsonLine::Event { at, event });
        } else {
            let _ = writeln!(self.out, "{}  {}", clock_label(event), event.display_line());
        }
    }

    fn notice(&mut self, notice: &Notice) {
        if self.json {
            self.write_json(&JsonLine::Notice {
                message: notice.to_string(),
            });
        } else {
            let _ = writeln!(self.out, "!! {}", notice);
        }
    }

    fn workflow_changed(&mut self, view: &WorkflowView) {
        if self.json {
            self.write_json(&JsonLine::Workflow(view));
        } else {
            let _ = writeln!(self.out, ">> {}", describe_view(view));
        }
    }
}
