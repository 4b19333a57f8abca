//! Human-readable progress output on stdout

use surge_core::{ProgressEvent, ProgressSink, WalkOutcome};

/// Prints one line per walk step
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn on_event(&self, event: &ProgressEvent<'_>) {
        match event {
            ProgressEvent::WalkStarted { endpoint, levels } => {
                println!("\n═══════════════════════════════════════════════════════════════");
                println!("  {} ({} levels)", endpoint, levels.len());
                println!("═══════════════════════════════════════════════════════════════");
            }
            ProgressEvent::LevelStarted { connections, .. } => {
                println!("  → {:>6} connections ...", connections);
            }
            ProgressEvent::LevelCompleted { sample, verdict, .. } => {
                println!(
                    "    {:>10.2} req/s  avg {:>9.2}ms  p95 {:>9.2}ms  errors {:>6.2}%",
                    sample.throughput,
                    sample.latency_avg_ms,
                    sample.latency_p95_ms,
                    sample.error_rate * 100.0
                );
                if verdict.first_degradation {
                    println!("    ⚠️  Degradation detected at {} connections", sample.connections);
                }
                for signal in &verdict.signals {
                    println!("       - {}", signal);
                }
                if verdict.should_stop() {
                    println!("    ❌ Hard threshold reached, stopping escalation");
                }
            }
            ProgressEvent::LevelSkipped {
                connections, reason, ..
            } => {
                println!("  ⏭  {:>6} connections skipped: {}", connections, reason);
            }
            ProgressEvent::LevelFailed {
                connections, error, ..
            } => {
                println!("  ❌ {:>6} connections failed: {}", connections, error);
            }
            ProgressEvent::WalkFinished { summary } => match &summary.outcome {
                WalkOutcome::Skipped { reason } => {
                    println!("  ⏭  Endpoint skipped: {}", reason);
                }
                _ => match summary.degradation_point {
                    Some(point) => println!("  Degradation point: {} connections", point),
                    None => println!("  No degradation detected"),
                },
            },
        }
    }
}
