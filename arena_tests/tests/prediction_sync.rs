//! Client prediction driven against a live simulation, without sockets.
//!
//! Each tick is followed by `frame_hz / tick_hz` render frames, the way the
//! client sees snapshots arrive between frames.

use arena_client::{input::LocalInput, prediction::ClientView};
use arena_server::Simulation;
use arena_shared::{
    config::ArenaConfig,
    dice::ScriptedDice,
    entity::EntityId,
    intent::Intent,
    math::{distance, Vec2},
    render::RenderedEntity,
};

const LOCAL: EntityId = EntityId(1);
const REMOTE: EntityId = EntityId(2);

fn config(tick_hz: u32, frame_hz: u32) -> ArenaConfig {
    ArenaConfig {
        tick_hz,
        frame_hz,
        ..ArenaConfig::default()
    }
}

fn setup(cfg: &ArenaConfig) -> (Simulation, ClientView) {
    let mut sim = Simulation::new(cfg.rules.clone(), Box::new(ScriptedDice::default()));
    sim.create_entity(LOCAL, Some("me"));
    sim.create_entity(REMOTE, Some("other"));
    let mut view = ClientView::new(LOCAL);
    view.apply_snapshot(&sim.tick());
    (sim, view)
}

fn rendered(frame: &[RenderedEntity], id: EntityId) -> Vec2 {
    frame
        .iter()
        .find(|r| r.id == id)
        .map(|r| r.position)
        .expect("entity rendered")
}

#[test]
fn long_moves_never_render_backwards() {
    for (tick_hz, frame_hz) in [(30, 60), (20, 60), (30, 30)] {
        let cfg = config(tick_hz, frame_hz);
        let tuning = cfg.prediction_tuning();
        let frames_per_tick = frame_hz / tick_hz;
        let (mut sim, mut view) = setup(&cfg);

        let spawn = cfg.rules.spawn;
        let goal = spawn.offset(200.0, 0.0);
        let remote_goal = spawn.offset(0.0, -120.0);

        let input = LocalInput::MoveTo(goal);
        input.seed_prediction(&mut view, &cfg.rules);
        sim.apply_intent(LOCAL, input.to_intent());
        sim.apply_intent(REMOTE, Intent::Move { target: remote_goal });

        let mut local_left = distance(spawn, goal);
        let mut remote_left = distance(spawn, remote_goal);
        let mut worst_attempts = 0;

        for tick in 0..120 {
            assert!(view.apply_snapshot(&sim.tick()));
            for _ in 0..frames_per_tick {
                let frame = view.frame(&tuning);

                let now = distance(rendered(&frame, LOCAL), goal);
                assert!(
                    now <= local_left + 1e-3,
                    "{tick_hz}/{frame_hz}: local moved away at tick {tick}: {local_left} -> {now}"
                );
                local_left = now;

                let now = distance(rendered(&frame, REMOTE), remote_goal);
                assert!(
                    now <= remote_left + 1e-3,
                    "{tick_hz}/{frame_hz}: remote moved away at tick {tick}: {remote_left} -> {now}"
                );
                remote_left = now;

                if let Some(p) = view.predictor(LOCAL) {
                    worst_attempts = worst_attempts.max(p.convergence_attempts());
                }
            }
        }

        let p = view.predictor(LOCAL).expect("local predictor");
        assert!(p.client_target().is_none());
        assert_eq!(p.rendered(), goal);
        assert!(
            worst_attempts < tuning.retry_ceiling,
            "{tick_hz}/{frame_hz}: watchdog nearly fired ({worst_attempts} attempts)"
        );
        assert_eq!(view.predictor(REMOTE).map(|p| p.rendered()), Some(remote_goal));
    }
}

#[test]
fn cancel_mid_walk_stays_with_the_server() {
    let cfg = ArenaConfig::default();
    let tuning = cfg.prediction_tuning();
    let frames_per_tick = cfg.frame_hz / cfg.tick_hz;
    let (mut sim, mut view) = setup(&cfg);

    let input = LocalInput::MoveTo(cfg.rules.spawn.offset(200.0, 0.0));
    input.seed_prediction(&mut view, &cfg.rules);
    sim.apply_intent(LOCAL, input.to_intent());

    let mut last = cfg.rules.spawn;
    for tick in 0..40 {
        if tick == 20 {
            LocalInput::Cancel.seed_prediction(&mut view, &cfg.rules);
            sim.apply_intent(LOCAL, LocalInput::Cancel.to_intent());
        }
        view.apply_snapshot(&sim.tick());
        for _ in 0..frames_per_tick {
            let now = rendered(&view.frame(&tuning), LOCAL);
            assert!(
                now.x + cfg.rules.move_speed >= last.x,
                "jumped back at tick {tick}: {} -> {}",
                last.x,
                now.x
            );
            last = now;
        }
    }

    let server = sim.world().get(LOCAL).expect("local entity").position;
    assert_eq!(last, server);
    assert!(server.x < cfg.rules.spawn.x + 200.0);
}
