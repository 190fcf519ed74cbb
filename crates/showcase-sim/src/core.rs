//! SimCore: single-owner event loop around the showcase controller.
//!
//! The controller and the `SimHost` are owned exclusively by this loop.
//! Scripted scroll steps, throttle ticks, and the host's load/play tasks all
//! talk to it through `SimEvent` messages on one mpsc channel, the way a
//! browser funnels everything through its event loop.
//!
//! After every event the invariant monitor compares the controller's view
//! with what the simulated media elements are actually doing.
use std::time::Duration;

use anyhow::Context;
use showcase_proto::config::Config;
use showcase_proto::controller::{Controller, ControllerSettings};
use showcase_proto::throttle::VisibilityBatcher;
use showcase_proto::tile::{LoadState, LoadTicket, TileId, TileKey, TileSpec, VisibilityChange};
use showcase_proto::ShowcaseError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::host::SimHost;
use crate::report::SimReport;
use crate::scenario::{MediaProfile, Step};

// ── SimEvent ──────────────────────────────────────────────────────────────────

/// All inputs into the SimCore loop.
#[derive(Debug)]
pub enum SimEvent {
    /// Raw observer edges, before throttling.
    Visibility(Vec<VisibilityChange>),
    /// The throttle window elapsed; flush whatever is pending.
    FlushTick,
    /// A media element finished (or failed) fetching.
    LoadSettled {
        tile: TileId,
        ticket: LoadTicket,
        ok: bool,
    },
    /// A play request settled.  `epoch` identifies the request.
    PlaySettled { tile: TileId, epoch: u64, allowed: bool },
    /// User clicked the tile body.
    Click(TileId),
    /// User clicked "view details".
    Details(TileId),
    /// End of scenario.
    Shutdown,
}

/// A scenario step with keys resolved to tile handles.
#[derive(Debug, Clone)]
pub struct ResolvedStep {
    pub at: Duration,
    pub visibility: Vec<VisibilityChange>,
    pub clicks: Vec<TileId>,
    pub details: Vec<TileId>,
}

// ── InvariantMonitor ──────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct InvariantMonitor {
    violations: Vec<String>,
    peak_in_flight: usize,
}

impl InvariantMonitor {
    fn check(&mut self, event: &str, controller: &Controller, host: &SimHost) {
        let cap = controller.settings().max_concurrent;
        let in_flight = controller.in_flight();
        self.peak_in_flight = self.peak_in_flight.max(in_flight);

        if in_flight > cap {
            self.flag(event, format!("{} loads in flight, cap is {}", in_flight, cap));
        }
        if host.playing_count() > 1 {
            self.flag(event, format!("{} tiles playing at once", host.playing_count()));
        }
        if host.fetching_count() != in_flight {
            self.flag(
                event,
                format!(
                    "host fetching {} but controller counts {}",
                    host.fetching_count(),
                    in_flight
                ),
            );
        }
        if let Some(tile) = controller.playing() {
            if !host.media(tile).is_some_and(|m| m.playing) {
                self.flag(event, format!("{} holds the slot but is not playing", tile));
            }
        }
        for idx in 0..controller.len() {
            let tile = TileId(idx);
            if controller.load_state(tile) == Some(LoadState::Error)
                && !host.media(tile).is_some_and(|m| m.error_shown)
            {
                self.flag(event, format!("{} failed without an error indicator", tile));
            }
        }
    }

    fn flag(&mut self, event: &str, what: String) {
        let line = format!("after {}: {}", event, what);
        warn!("monitor: {}", line);
        self.violations.push(line);
    }
}

// ── SimCore ───────────────────────────────────────────────────────────────────

pub struct SimCore {
    controller: Controller,
    host: SimHost,
    batcher: VisibilityBatcher,
    seed: u64,
    started: Instant,
    /// A FlushTick is already scheduled.
    flush_armed: bool,
    /// Channel to post our own timers back into the loop.
    event_tx: mpsc::Sender<SimEvent>,
    monitor: InvariantMonitor,
    events: usize,
}

impl SimCore {
    pub fn new(
        config: &Config,
        tiles: Vec<TileSpec>,
        profile: MediaProfile,
        seed: u64,
        event_tx: mpsc::Sender<SimEvent>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let count = tiles.len();
        let controller = Controller::new(ControllerSettings::from_config(config), tiles)
            .context("building controller")?;
        Ok(Self {
            controller,
            host: SimHost::new(count, profile, seed, event_tx.clone()),
            batcher: VisibilityBatcher::new(config.observer.throttle()),
            seed,
            started: Instant::now(),
            flush_armed: false,
            event_tx,
            monitor: InvariantMonitor::default(),
            events: 0,
        })
    }

    /// Map scenario keys onto tile handles.  Ratios below the threshold
    /// are passed through as-is; the controller decides what counts.
    pub fn resolve_steps(&self, steps: &[Step]) -> Result<Vec<ResolvedStep>, ShowcaseError> {
        let lookup = |raw: &String| -> Result<TileId, ShowcaseError> {
            TileKey::parse(raw)
                .and_then(|key| self.controller.tile_id(&key))
                .ok_or_else(|| ShowcaseError::UnknownTile(raw.clone()))
        };

        steps
            .iter()
            .map(|step| -> Result<ResolvedStep, ShowcaseError> {
                let mut visibility = Vec::new();
                for raw in &step.enter {
                    visibility.push(VisibilityChange {
                        tile: lookup(raw)?,
                        is_intersecting: step.ratio > 0.0,
                        ratio: step.ratio,
                    });
                }
                for raw in &step.exit {
                    visibility.push(VisibilityChange::exited(lookup(raw)?));
                }
                Ok(ResolvedStep {
                    at: Duration::from_millis(step.at_ms),
                    visibility,
                    clicks: step.click.iter().map(lookup).collect::<Result<_, _>>()?,
                    details: step.details.iter().map(lookup).collect::<Result<_, _>>()?,
                })
            })
            .collect()
    }

    pub async fn run(mut self, mut event_rx: mpsc::Receiver<SimEvent>) -> anyhow::Result<SimReport> {
        info!(
            "SimCore: starting with {} tiles, seed {}",
            self.controller.len(),
            self.seed
        );
        self.started = Instant::now();
        self.controller.initialize(&mut self.host)?;
        self.monitor.check("initialize", &self.controller, &self.host);

        loop {
            let Some(evt) = event_rx.recv().await else {
                info!("SimCore: event channel closed, shutting down");
                break;
            };
            self.events += 1;

            let label = match evt {
                SimEvent::Shutdown => {
                    info!("SimCore: shutdown requested");
                    break;
                }

                SimEvent::Visibility(changes) => {
                    debug!("SimCore: {} observer edges", changes.len());
                    self.batcher.extend(changes);
                    self.flush_visibility();
                    "visibility"
                }

                SimEvent::FlushTick => {
                    self.flush_armed = false;
                    self.flush_visibility();
                    "flush"
                }

                SimEvent::LoadSettled { tile, ticket, ok } => {
                    self.host.finish_load(tile, ticket, ok);
                    if ok {
                        self.controller.on_load_ready(&mut self.host, tile, ticket);
                    } else {
                        self.controller
                            .on_load_failed(&mut self.host, tile, ticket, "network error");
                    }
                    "load settled"
                }

                SimEvent::PlaySettled {
                    tile,
                    epoch,
                    allowed,
                } => {
                    let outcome = self.host.finish_play(tile, epoch, allowed);
                    self.controller.on_play_settled(&mut self.host, tile, outcome);
                    "play settled"
                }

                SimEvent::Click(tile) => {
                    self.controller.on_tile_click(&mut self.host, tile);
                    "click"
                }

                SimEvent::Details(tile) => {
                    self.controller.on_details_request(&mut self.host, tile);
                    "details"
                }
            };

            self.monitor.check(label, &self.controller, &self.host);
        }

        let final_state = self.controller.snapshot();
        self.batcher.clear();
        self.controller.teardown(&mut self.host)?;
        self.monitor.check("teardown", &self.controller, &self.host);
        if !self.host.observing().is_empty() {
            self.monitor
                .flag("teardown", "observer still connected".to_string());
        }

        Ok(SimReport::new(
            self.seed,
            self.started.elapsed(),
            self.events,
            self.host.stats(),
            self.monitor.peak_in_flight,
            self.monitor.violations,
            final_state,
        ))
    }

    /// Hand pending edges to the controller if the throttle allows,
    /// otherwise make sure a tick is scheduled for when it will.
    fn flush_visibility(&mut self) {
        let now = self.started.elapsed();
        if let Some(batch) = self.batcher.take_due(now) {
            debug!("SimCore: flushing {} edges", batch.len());
            self.controller.on_visibility_batch(&mut self.host, &batch);
        }

        let Some(delay) = self.batcher.next_due(now) else {
            return;
        };
        if self.flush_armed {
            return;
        }
        self.flush_armed = true;
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SimEvent::FlushTick).await;
        });
    }
}

/// Replay `steps` on their schedule, then wait `settle` and ask the loop to
/// shut down.
pub fn spawn_script(
    steps: Vec<ResolvedStep>,
    settle: Duration,
    event_tx: mpsc::Sender<SimEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let origin = Instant::now();
        for step in steps {
            tokio::time::sleep_until(origin + step.at).await;
            if !step.visibility.is_empty()
                && event_tx
                    .send(SimEvent::Visibility(step.visibility))
                    .await
                    .is_err()
            {
                return;
            }
            for tile in step.clicks {
                if event_tx.send(SimEvent::Click(tile)).await.is_err() {
                    return;
                }
            }
            for tile in step.details {
                if event_tx.send(SimEvent::Details(tile)).await.is_err() {
                    return;
                }
            }
        }
        tokio::time::sleep(settle).await;
        let _ = event_tx.send(SimEvent::Shutdown).await;
    })
}
