//! Drives the controller with randomly ordered visibility edges, load
//! completions and play settlements, and checks the invariants after every
//! step.  Seeds are fixed so failures reproduce.

mod common;

use common::{legal_transition, ModelHost};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use showcase_proto::config::{ClickMode, ExitPolicy};
use showcase_proto::controller::{Controller, ControllerSettings};
use showcase_proto::manifest::parse_tiles_from_toml_str;
use showcase_proto::tile::{LoadState, TileId, TileKey, TileSpec, VisibilityChange};

const GRID: &str = r#"
[[tile]]
category = "恒温杯"
id = "1"
src = "videos/thermo/1.mp4"

[[tile]]
category = "恒温杯"
id = "2"
src = "videos/thermo/2.mp4"

[[tile]]
category = "家电"
id = "1"
src = "videos/appliance/1.mp4"
"#;

fn grid(n: usize) -> Vec<TileSpec> {
    (0..n)
        .map(|i| TileSpec::new("电脑", i.to_string(), format!("videos/computer/{}.mp4", i)))
        .collect()
}

struct Run {
    controller: Controller,
    host: ModelHost,
    states: Vec<LoadState>,
    cancel_in_flight: bool,
    release_on_exit: bool,
}

impl Run {
    fn new(settings: ControllerSettings, tiles: Vec<TileSpec>) -> Self {
        let n = tiles.len();
        let cancel_in_flight = settings.cancel_in_flight;
        let release_on_exit = settings.on_exit == ExitPolicy::Release;
        let mut controller = Controller::new(settings, tiles).unwrap();
        let mut host = ModelHost::new(n);
        controller.initialize(&mut host).unwrap();
        Self {
            controller,
            host,
            states: vec![LoadState::Unloaded; n],
            cancel_in_flight,
            release_on_exit,
        }
    }

    fn check(&mut self, step: &str) {
        let c = &self.controller;
        let cap = c.settings().max_concurrent;

        assert!(c.in_flight() <= cap, "{}: in-flight {} > cap {}", step, c.in_flight(), cap);
        assert!(self.host.playing_count() <= 1, "{}: two tiles playing", step);
        assert_eq!(self.host.fetching_count(), c.in_flight(), "{}: fetch count drift", step);

        let loading = (0..c.len())
            .filter(|i| c.load_state(TileId(*i)) == Some(LoadState::Loading))
            .count();
        assert_eq!(loading, c.in_flight(), "{}: loading count drift", step);

        match c.playing() {
            Some(t) => {
                assert!(self.host.media[t.0].playing, "{}: slot holder not playing", step);
                assert_eq!(c.load_state(t), Some(LoadState::Loaded));
            }
            None => assert_eq!(self.host.playing_count(), 0, "{}: orphan playback", step),
        }

        for i in 0..c.len() {
            let now = c.load_state(TileId(i)).unwrap();
            let before = self.states[i];
            assert!(
                legal_transition(before, now, self.cancel_in_flight, self.release_on_exit),
                "{}: tile {} went {:?} -> {:?}",
                step,
                i,
                before,
                now
            );
            if now == LoadState::Error {
                assert!(self.host.media[i].error_shown);
            }
            self.states[i] = now;
        }
    }
}

fn random_run(seed: u64, settings: ControllerSettings, tiles: usize, steps: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut run = Run::new(settings, grid(tiles));
    let mut visible = vec![false; tiles];

    for step in 0..steps {
        let label = format!("seed {} step {}", seed, step);
        match rng.gen_range(0..10) {
            0..=3 => {
                // one throttled batch touching distinct tiles
                let mut changes = Vec::new();
                let start = rng.gen_range(0..tiles);
                let len = rng.gen_range(1..=3usize.min(tiles));
                for k in 0..len {
                    let t = (start + k) % tiles;
                    visible[t] = !visible[t];
                    changes.push(if visible[t] {
                        VisibilityChange::entered(TileId(t))
                    } else {
                        VisibilityChange::exited(TileId(t))
                    });
                }
                run.controller.on_visibility_batch(&mut run.host, &changes);
            }
            4..=6 => {
                if !run.host.pending_loads.is_empty() {
                    let idx = rng.gen_range(0..run.host.pending_loads.len());
                    let ok = rng.gen_bool(0.8);
                    run.host.complete_load(&mut run.controller, idx, ok);
                }
            }
            7..=8 => {
                if !run.host.pending_plays.is_empty() {
                    let idx = rng.gen_range(0..run.host.pending_plays.len());
                    let allowed = rng.gen_bool(0.7);
                    run.host.settle_play(&mut run.controller, idx, allowed);
                }
            }
            _ => {
                let t = TileId(rng.gen_range(0..tiles));
                run.controller.on_tile_click(&mut run.host, t);
            }
        }
        run.check(&label);
    }

    run.controller.teardown(&mut run.host).unwrap();
    assert_eq!(run.controller.in_flight(), 0);
    assert_eq!(run.controller.queue_len(), 0);
    assert_eq!(run.host.playing_count(), 0);
    assert!(run.host.media.iter().all(|m| m.src.is_none()));
    assert!(run.host.observing.is_empty());

    // Leftover completions after teardown change nothing.
    while !run.host.pending_loads.is_empty() {
        run.host.complete_load(&mut run.controller, 0, true);
    }
    while !run.host.pending_plays.is_empty() {
        run.host.settle_play(&mut run.controller, 0, true);
    }
    assert_eq!(run.host.playing_count(), 0);
    assert!(run.host.media.iter().all(|m| m.src.is_none()));
}

#[test]
fn random_interleavings_keep_invariants() {
    for seed in 0..40 {
        for cap in 1..=3 {
            let settings = ControllerSettings {
                max_concurrent: cap,
                ..ControllerSettings::default()
            };
            random_run(seed, settings, 6, 300);
        }
    }
}

#[test]
fn random_interleavings_with_cancellation() {
    for seed in 100..130 {
        let settings = ControllerSettings {
            max_concurrent: 2,
            cancel_in_flight: true,
            ..ControllerSettings::default()
        };
        random_run(seed, settings, 5, 300);
    }
}

#[test]
fn random_interleavings_retain_and_legacy_click() {
    for seed in 200..230 {
        let settings = ControllerSettings {
            max_concurrent: 1,
            on_exit: ExitPolicy::Retain,
            click: ClickMode::Legacy,
            ..ControllerSettings::default()
        };
        random_run(seed, settings, 4, 300);
    }
}

#[test]
fn manifest_grid_all_visible_with_cap_one() {
    let tiles = parse_tiles_from_toml_str(GRID).unwrap();
    let settings = ControllerSettings {
        max_concurrent: 1,
        ..ControllerSettings::default()
    };
    let mut run = Run::new(settings, tiles);
    let ids: Vec<TileId> = ["恒温杯/1", "恒温杯/2", "家电/1"]
        .iter()
        .map(|k| run.controller.tile_id(&TileKey::parse(k).unwrap()).unwrap())
        .collect();

    let batch: Vec<_> = ids.iter().map(|t| VisibilityChange::entered(*t)).collect();
    run.controller.on_visibility_batch(&mut run.host, &batch);
    run.check("batch");
    assert_eq!(run.controller.load_state(ids[0]), Some(LoadState::Loading));
    assert_eq!(run.controller.load_state(ids[1]), Some(LoadState::Queued));
    assert_eq!(run.controller.load_state(ids[2]), Some(LoadState::Queued));

    run.host.complete_load(&mut run.controller, 0, true);
    run.check("first ready");
    assert_eq!(run.controller.load_state(ids[1]), Some(LoadState::Loading));

    run.host.complete_load(&mut run.controller, 0, false);
    run.check("second failed");
    assert!(run.host.media[ids[1].0].error_shown);
    assert_eq!(run.controller.load_state(ids[2]), Some(LoadState::Loading));

    // first tile's play request is still out; the third finishes and steals it
    run.host.complete_load(&mut run.controller, 0, true);
    run.check("third ready");
    assert_eq!(run.controller.pending_play(), Some(ids[2]));
    run.host.settle_play(&mut run.controller, 0, true);
    run.check("stale settle");
    assert_eq!(run.controller.playing(), None);
    run.host.settle_play(&mut run.controller, 0, true);
    run.check("winner settles");
    assert_eq!(run.controller.playing(), Some(ids[2]));
    assert!(!run.host.media[ids[2].0].placeholder_visible);
}
