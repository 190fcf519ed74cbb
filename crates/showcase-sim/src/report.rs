use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use showcase_proto::controller::ControllerSnapshot;

use crate::host::HostStats;

/// Outcome of one simulated page session.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub generated_at: DateTime<Local>,
    pub seed: u64,
    pub elapsed_ms: u64,
    pub events: usize,
    pub loads_started: usize,
    pub loads_failed: usize,
    pub plays_requested: usize,
    pub plays_started: usize,
    pub plays_rejected: usize,
    pub releases: usize,
    pub peak_in_flight: usize,
    pub navigations: Vec<String>,
    pub violations: Vec<String>,
    /// Controller state just before teardown.
    pub final_state: ControllerSnapshot,
}

impl SimReport {
    pub fn new(
        seed: u64,
        elapsed: Duration,
        events: usize,
        stats: &HostStats,
        peak_in_flight: usize,
        violations: Vec<String>,
        final_state: ControllerSnapshot,
    ) -> Self {
        Self {
            generated_at: Local::now(),
            seed,
            elapsed_ms: elapsed.as_millis() as u64,
            events,
            loads_started: stats.loads_started,
            loads_failed: stats.loads_failed,
            plays_requested: stats.plays_requested,
            plays_started: stats.plays_started,
            plays_rejected: stats.plays_rejected,
            releases: stats.releases,
            peak_in_flight,
            navigations: stats.navigations.clone(),
            violations,
            final_state,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable summary for the terminal.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "{} seed={} elapsed={}ms events={}\n",
            self.generated_at.format("%H:%M:%S"),
            self.seed,
            self.elapsed_ms,
            self.events
        ));
        out.push_str(&format!(
            "loads: {} started, {} failed, peak {} in flight\n",
            self.loads_started, self.loads_failed, self.peak_in_flight
        ));
        out.push_str(&format!(
            "plays: {} requested, {} started, {} rejected; {} releases\n",
            self.plays_requested, self.plays_started, self.plays_rejected, self.releases
        ));
        for nav in &self.navigations {
            out.push_str(&format!("navigate: {}\n", nav));
        }
        for tile in &self.final_state.tiles {
            let marker = if self.final_state.playing == Some(tile.id) {
                " ▶"
            } else {
                ""
            };
            out.push_str(&format!(
                "  {:>4} {:<16} {:<9}{}{}\n",
                tile.id.to_string(),
                tile.key,
                tile.state.label(),
                if tile.visible { " visible" } else { "" },
                marker
            ));
        }
        if self.is_clean() {
            out.push_str("invariants: ok\n");
        } else {
            out.push_str(&format!("invariants: {} violation(s)\n", self.violations.len()));
            for v in &self.violations {
                out.push_str(&format!("  ! {}\n", v));
            }
        }
        out
    }
}
