use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for export orchestration events.
///
/// Decouples the export use case from specific output mechanisms so each
/// caller can observe an export without changing the orchestration code.
pub trait ExportLogger: Send {
    /// Report overall progress as a fraction in `[0, 1]`.
    fn progress(&mut self, fraction: f64);

    /// Record how long a named export stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. samples written).
    fn metric(&mut self, name: &str, value: f64);

    fn info(&mut self, message: &str);

    fn warn(&mut self, message: &str);

    /// Emit an end-of-export summary. Default: no-op.
    fn summary(&self) {}
}

/// Silent logger that discards all events.
pub struct NullExportLogger;

impl ExportLogger for NullExportLogger {
    fn progress(&mut self, _fraction: f64) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
    fn warn(&mut self, _message: &str) {}
}

/// Logger that forwards to the `log` facade, tracks per-stage timing and
/// metrics, and reports a summary when the export completes.
///
/// Progress lines are throttled to one per `throttle_percent` step.
pub struct LogExportLogger {
    throttle_percent: u32,
    last_logged_step: Option<u32>,
    timings: HashMap<String, f64>,
    metrics: HashMap<String, f64>,
    start_time: Instant,
    warnings: Vec<String>,
}

impl LogExportLogger {
    pub fn new(throttle_percent: u32) -> Self {
        Self {
            throttle_percent: throttle_percent.clamp(1, 100),
            last_logged_step: None,
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            warnings: Vec::new(),
        }
    }

    /// Returns the formatted summary string, or `None` if no data recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let mut lines = vec![format!("Export summary ({:.1}s total):", elapsed_ms / 1000.0)];

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, total_ms) in stages {
            lines.push(format!("  {stage:10}: {total_ms:8.0}ms"));
        }

        let mut metrics: Vec<_> = self.metrics.iter().collect();
        metrics.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in metrics {
            lines.push(format!("  {name}: {value}"));
        }

        for warning in &self.warnings {
            lines.push(format!("  warning: {warning}"));
        }

        Some(lines.join("\n"))
    }

    pub fn timing_for(&self, stage: &str) -> Option<f64> {
        self.timings.get(stage).copied()
    }

    pub fn metric_for(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }
}

impl Default for LogExportLogger {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ExportLogger for LogExportLogger {
    fn progress(&mut self, fraction: f64) {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        let step = percent / self.throttle_percent;
        if self.last_logged_step.map_or(true, |last| step > last) {
            self.last_logged_step = Some(step);
            log::info!("Exporting: {percent}%");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        *self.timings.entry(stage.to_string()).or_default() += duration_ms;
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics.insert(name.to_string(), value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn warn(&mut self, message: &str) {
        self.warnings.push(message.to_string());
        log::warn!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
