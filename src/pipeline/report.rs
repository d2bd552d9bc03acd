//! Predictions and where they go.

use crate::config::OutputFormat;
use crate::core::classifier::Label;
use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;

/// The result of one inference task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// `None` when the model returned an id outside the label map
    pub label: Option<Label>,
    pub label_id: i64,
    /// Sequence number of the window this prediction was made from
    pub window_sequence: u64,
    pub predicted_at: DateTime<Utc>,
    /// Time from dispatch to prediction
    #[serde(with = "latency_micros")]
    pub latency: Duration,
}

impl Prediction {
    /// Label name, or `Unknown` for unmapped ids.
    pub fn label_name(&self) -> &'static str {
        self.label.map_or("Unknown", |l| l.as_str())
    }
}

/// Receives every completed prediction.
///
/// Called from inference tasks, possibly concurrently.
pub trait Reporter: Send + Sync {
    fn report(&self, prediction: &Prediction);
}

/// Writes one line per prediction to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutReporter {
    format: OutputFormat,
}

impl StdoutReporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a prediction as a single line (without newline).
    pub fn render(&self, prediction: &Prediction) -> String {
        match self.format {
            OutputFormat::Text => format!("Predicted movement: {}", prediction.label_name()),
            OutputFormat::Json => {
                serde_json::to_string(prediction).unwrap_or_else(|e| error_line(&e))
            }
        }
    }
}

/// A JSON line standing in for a prediction that could not be serialized.
fn error_line(error: &dyn std::fmt::Display) -> String {
    serde_json::json!({ "error": error.to_string() }).to_string()
}

impl Reporter for StdoutReporter {
    fn report(&self, prediction: &Prediction) {
        let line = self.render(prediction);
        // Locking stdout keeps concurrent reports from interleaving.
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}") {
            tracing::warn!("Failed to write prediction: {e}");
        }
    }
}

/// Forwards predictions over a channel.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    sender: Sender<Prediction>,
}

impl ChannelReporter {
    pub fn new(sender: Sender<Prediction>) -> Self {
        Self { sender }
    }
}

impl Reporter for ChannelReporter {
    fn report(&self, prediction: &Prediction) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.try_send(prediction.clone());
    }
}

mod latency_micros {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_micros() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_micros(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(label_id: i64) -> Prediction {
        Prediction {
            label: Label::from_id(label_id),
            label_id,
            window_sequence: 7,
            predicted_at: Utc::now(),
            latency: Duration::from_micros(1500),
        }
    }

    #[test]
    fn test_text_rendering() {
        let reporter = StdoutReporter::new(OutputFormat::Text);
        assert_eq!(reporter.render(&prediction(2)), "Predicted movement: running");
        assert_eq!(reporter.render(&prediction(42)), "Predicted movement: Unknown");
    }

    #[test]
    fn test_json_rendering() {
        let reporter = StdoutReporter::new(OutputFormat::Json);
        let line = reporter.render(&prediction(3));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(value["label"], "walking");
        assert_eq!(value["label_id"], 3);
        assert_eq!(value["window_sequence"], 7);
        assert_eq!(value["latency"], 1500);
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_error_line_is_valid_json() {
        let line = error_line(&r#"bad "value" \ here"#);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["error"], r#"bad "value" \ here"#);
    }

    #[test]
    fn test_channel_reporter() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let reporter = ChannelReporter::new(tx);

        reporter.report(&prediction(1));
        assert_eq!(rx.try_recv().unwrap().label, Some(Label::Rest));

        drop(rx);
        reporter.report(&prediction(1));
    }
}
