use std::collections::HashMap;
use std::time::Instant;

/// Cross-cutting logger for batch processing events.
///
/// Keeps the process use case independent of where its progress ends up
/// (log output, a caller's progress bar, nowhere).
pub trait PipelineLogger: Send {
    /// Report image-level progress. A run opens with `progress(0, total)`.
    fn progress(&mut self, current: usize, total: usize);

    /// Record how long a named stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (faces per image, cluster count).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&self) {}
}

/// Discards all events.
pub struct NullPipelineLogger;

impl PipelineLogger for NullPipelineLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Forwards events to the `log` facade and keeps per-stage timings for a
/// summary at the end of each run.
///
/// Progress is logged every `throttle_images` images and on the last one.
pub struct LogPipelineLogger {
    throttle_images: usize,
    timings: HashMap<String, Vec<f64>>,
    metrics: HashMap<String, Vec<f64>>,
    start_time: Instant,
    total_images: usize,
}

impl LogPipelineLogger {
    pub fn new(throttle_images: usize) -> Self {
        Self {
            throttle_images: throttle_images.max(1),
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            total_images: 0,
        }
    }

    /// Returns the formatted summary, or `None` if nothing was recorded.
    pub fn summary_string(&self) -> Option<String> {
        if self.timings.is_empty() && self.metrics.is_empty() {
            return None;
        }

        let elapsed_ms = self.start_time.elapsed().as_secs_f64() * 1000.0;
        let images = self.total_images;
        let mut lines = vec![format!(
            "Processing summary ({images} images, {:.1}s total):",
            elapsed_ms / 1000.0
        )];

        let mut stages: Vec<_> = self.timings.keys().collect();
        stages.sort();
        for stage in stages {
            let durations = &self.timings[stage];
            let total_ms: f64 = durations.iter().sum();
            let avg_ms = mean(durations);
            lines.push(format!(
                "  {stage:10}: avg {avg_ms:7.1}ms  total {total_ms:8.0}ms  ({} calls)",
                durations.len()
            ));
        }

        let mut names: Vec<_> = self.metrics.keys().collect();
        names.sort();
        for name in names {
            let values = &self.metrics[name];
            let total: f64 = values.iter().sum();
            lines.push(format!("  {name}: avg {:.1}, total {total:.0}", mean(values)));
        }

        if images > 0 && elapsed_ms > 0.0 {
            let rate = images as f64 / (elapsed_ms / 1000.0);
            lines.push(format!("  Throughput: {rate:.1} images/s"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<&[f64]> {
        self.timings.get(stage).map(|v| v.as_slice())
    }

    pub fn metrics_for(&self, name: &str) -> Option<&[f64]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

impl Default for LogPipelineLogger {
    fn default() -> Self {
        Self::new(25)
    }
}

impl PipelineLogger for LogPipelineLogger {
    fn progress(&mut self, current: usize, total: usize) {
        if current == 0 {
            // A new run starts; drop the previous run's figures.
            self.timings.clear();
            self.metrics.clear();
            self.start_time = Instant::now();
        }
        self.total_images = total;
        if total > 0 && (current % self.throttle_images == 0 || current == total) {
            let pct = current as f64 / total as f64 * 100.0;
            log::info!("Processing: {current}/{total} images ({pct:.1}%)");
        }
    }

    fn timing(&mut self, stage: &str, duration_ms: f64) {
        self.timings
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&self) {
        if let Some(text) = self.summary_string() {
            log::info!("\n\n{text}");
        }
    }
}
