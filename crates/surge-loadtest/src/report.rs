//! Stress test report: console rendering and JSON persistence

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surge_core::{EndpointSummary, SurgeError, SystemReport, WalkOutcome};

/// Everything a sweep produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub base_url: String,
    pub duration_per_level_secs: u64,
    pub endpoints: Vec<EndpointSummary>,
    pub system: SystemReport,
}

impl StressReport {
    /// Wall-clock length of the sweep in seconds
    pub fn elapsed_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Save as pretty-printed JSON
    pub fn save_json(&self, path: &Path) -> Result<(), SurgeError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a report saved by [`StressReport::save_json`]
    pub fn load_json(path: &Path) -> Result<Self, SurgeError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Print the full report
    pub fn print_report(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  SURGE STRESS TEST RESULTS                   ║");
        println!("╠══════════════════════════════════════════════════════════════╣");
        let started = self.started_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let elapsed = format!("{:.1}s", self.elapsed_secs());

        println!("║ Target:    {:<50}║", truncate(&self.base_url, 50));
        println!("║ Started:   {:<50}║", started);
        println!("║ Elapsed:   {:<50}║", elapsed);
        println!("║ Endpoints: {:<50}║", self.endpoints.len());
        println!("╚══════════════════════════════════════════════════════════════╝");

        for summary in &self.endpoints {
            print_endpoint_summary(summary);
        }
        print_system_report(&self.system);
    }
}

/// Print one endpoint's level table
pub fn print_endpoint_summary(summary: &EndpointSummary) {
    println!("\n═══════════════════════════════════════════════════════════════");
    println!("  {} {} {}", summary.method, summary.path, summary.name);
    if !summary.description.is_empty() {
        println!("  {}", summary.description);
    }
    println!("═══════════════════════════════════════════════════════════════");

    if let WalkOutcome::Skipped { reason } = &summary.outcome {
        println!("  Skipped: {}", reason);
        return;
    }

    println!(
        "{:>8} {:>12} {:>10} {:>10} {:>8} {:>8}",
        "Conns", "Req/s", "Avg (ms)", "p95 (ms)", "Err%", "Non-2xx"
    );
    println!("───────────────────────────────────────────────────────────────");
    for sample in &summary.samples {
        let marker = if Some(sample.connections) == summary.degradation_point {
            " ⚠"
        } else {
            ""
        };
        println!(
            "{:>8} {:>12.2} {:>10.2} {:>10.2} {:>8.2} {:>8}{}",
            sample.connections,
            sample.throughput,
            sample.latency_avg_ms,
            sample.latency_p95_ms,
            sample.error_rate * 100.0,
            sample.non_2xx(),
            marker
        );
    }
    println!("───────────────────────────────────────────────────────────────");

    match summary.degradation_point {
        Some(point) => println!("  Degradation point:   {} connections", point),
        None => println!("  Degradation point:   none detected"),
    }
    if let Some(optimal) = summary.optimal_connections {
        println!(
            "  Optimal concurrency: {} connections ({:.2} req/s)",
            optimal, summary.max_throughput
        );
    }
    if !summary.skipped_levels.is_empty() {
        let skipped: Vec<String> = summary.skipped_levels.iter().map(u32::to_string).collect();
        println!("  Skipped levels:      {}", skipped.join(", "));
    }
    match &summary.outcome {
        WalkOutcome::HardStopped { threshold } => println!("  Stopped early:       {}", threshold),
        WalkOutcome::Aborted { level, error } => {
            println!("  Aborted at {}:       {}", level, error)
        }
        WalkOutcome::Completed | WalkOutcome::Skipped { .. } => {}
    }
}

/// Print the system-wide analysis
pub fn print_system_report(report: &SystemReport) {
    println!("\n═══════════════════════════════════════════════════════════════");
    println!("                    SYSTEM BOTTLENECK ANALYSIS");
    println!("═══════════════════════════════════════════════════════════════");

    match (&report.bottleneck, report.recommended_concurrency_ceiling) {
        (Some(bottleneck), ceiling) => {
            println!(
                "  Bottleneck:          {} ({}) degrades at {} connections",
                bottleneck.name, bottleneck.path, bottleneck.degradation_point
            );
            if let Some(ceiling) = ceiling {
                println!("  Recommended ceiling: {} concurrent connections", ceiling);
            }
        }
        (None, _) => {
            println!("  ✅ No bottleneck detected");
            if let Some(max) = report.max_tested_connections {
                println!("  System handled up to {} concurrent connections", max);
            }
        }
    }

    if !report.top_performers.is_empty() {
        println!("\n  Top performers:");
        for (rank, performer) in report.top_performers.iter().enumerate() {
            let optimal = performer
                .optimal_connections
                .map(|c| format!(" @ {} connections", c))
                .unwrap_or_default();
            println!(
                "    {}. {:<24} {:>10.2} req/s{}",
                rank + 1,
                performer.name,
                performer.max_throughput,
                optimal
            );
        }
    }

    if !report.recommendations.is_empty() {
        println!("\n  Recommendations:");
        for advice in &report.recommendations {
            println!("    • {}", advice);
        }
    }

    println!("═══════════════════════════════════════════════════════════════\n");
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
