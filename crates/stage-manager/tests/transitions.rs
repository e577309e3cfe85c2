//! End-to-end transition scenarios against a launcher-like container.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use stage_manager::{
    AnimationFlags, AnimationOutcome, Animator, AnimatorListener, Interpolator, Looper,
    ManagerSettings, PendingAnimation, State, StateAnimationConfig, StateError, StateHandler,
    StateListener, StateManager, StatefulContainer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Overview,
    AllApps,
}

impl State for Mode {
    fn transition_duration(&self, _container: &dyn StatefulContainer<Self>, entering: bool) -> Duration {
        match (self, entering) {
            (Mode::Idle, _) => Duration::from_millis(150),
            (Mode::Overview, true) => Duration::from_millis(200),
            (Mode::Overview, false) => Duration::from_millis(100),
            (Mode::AllApps, true) => Duration::from_millis(300),
            (Mode::AllApps, false) => Duration::from_millis(120),
        }
    }

    fn should_disable_restore(&self) -> bool {
        matches!(self, Mode::AllApps)
    }
}

type Log = Arc<Mutex<Vec<String>>>;

struct Scrim {
    log: Log,
    alpha: Arc<Mutex<f32>>,
}

impl StateHandler<Mode> for Scrim {
    fn set_state(&self, state: Mode) {
        self.log.lock().push(format!("scrim set {state:?}"));
        *self.alpha.lock() = target_alpha(state);
    }

    fn set_state_with_animation(
        &self,
        to_state: Mode,
        config: &StateAnimationConfig,
        animation: &mut PendingAnimation,
    ) {
        self.log.lock().push(format!(
            "scrim animate {to_state:?} {}ms",
            config.duration.as_millis()
        ));
        let from = *self.alpha.lock();
        let alpha = self.alpha.clone();
        animation.add_float(from, target_alpha(to_state), Interpolator::Linear, move |v| {
            *alpha.lock() = v
        });
    }
}

fn target_alpha(state: Mode) -> f32 {
    match state {
        Mode::Idle => 0.0,
        Mode::Overview => 0.5,
        Mode::AllApps => 1.0,
    }
}

struct Launcher {
    log: Log,
    scrim: Arc<Scrim>,
}

impl StatefulContainer<Mode> for Launcher {
    fn collect_state_handlers(&self) -> Vec<Arc<dyn StateHandler<Mode>>> {
        vec![self.scrim.clone()]
    }

    fn on_state_set_start(&self, state: Mode) {
        self.log.lock().push(format!("container start {state:?}"));
    }

    fn on_state_set_end(&self, state: Mode) {
        self.log.lock().push(format!("container end {state:?}"));
    }

    fn on_repeat_state_set_aborted(&self, state: Mode) {
        self.log.lock().push(format!("repeat aborted {state:?}"));
    }
}

struct Recorder {
    log: Log,
    completions: AtomicUsize,
}

impl StateListener<Mode> for Recorder {
    fn on_state_transition_start(&self, to_state: Mode) {
        self.log.lock().push(format!("listener start {to_state:?}"));
    }

    fn on_state_transition_complete(&self, final_state: Mode) {
        self.completions.fetch_add(1, Ordering::SeqCst);
        self.log.lock().push(format!("listener complete {final_state:?}"));
    }
}

struct Fixture {
    manager: Arc<StateManager<Mode>>,
    looper: Looper,
    log: Log,
    recorder: Arc<Recorder>,
    alpha: Arc<Mutex<f32>>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_settings(ManagerSettings::default())
    }

    fn with_settings(settings: ManagerSettings) -> Self {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let alpha = Arc::new(Mutex::new(0.0));
        let scrim = Arc::new(Scrim {
            log: log.clone(),
            alpha: alpha.clone(),
        });
        let launcher = Arc::new(Launcher {
            log: log.clone(),
            scrim,
        });
        let looper = Looper::new(Duration::from_millis(10));
        let manager = StateManager::with_settings(launcher, looper.clone(), Mode::Idle, settings);
        let recorder = Arc::new(Recorder {
            log: log.clone(),
            completions: AtomicUsize::new(0),
        });
        manager.add_state_listener(recorder.clone());
        Self {
            manager,
            looper,
            log,
            recorder,
            alpha,
        }
    }

    fn events(&self) -> String {
        self.log.lock().join("\n")
    }

    fn completions(&self) -> usize {
        self.recorder.completions.load(Ordering::SeqCst)
    }

    fn listener_events(&self) -> Vec<String> {
        self.log
            .lock()
            .iter()
            .filter(|e| e.starts_with("listener"))
            .cloned()
            .collect()
    }
}

fn outcome_slot() -> (Arc<Mutex<Vec<AnimationOutcome>>>, impl FnOnce(AnimationOutcome) + Send + 'static) {
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let o = outcomes.clone();
    (outcomes, move |outcome| o.lock().push(outcome))
}

#[test]
fn test_event_log_of_a_round_trip() {
    let f = Fixture::new();

    f.manager.go_to_state(Mode::Overview);
    f.looper.advance(Duration::from_millis(200));
    f.manager.go_to_state(Mode::Overview);
    f.manager.go_to_state_animated(Mode::Idle, false);

    insta::assert_snapshot!(f.events(), @r"
    scrim animate Overview 200ms
    container start Overview
    listener start Overview
    container end Overview
    listener complete Overview
    repeat aborted Overview
    container start Idle
    listener start Idle
    scrim set Idle
    container end Idle
    listener complete Idle
    ");
}

#[test]
fn test_repeat_request_completes_synchronously() {
    let f = Fixture::new();
    let (outcomes, on_complete) = outcome_slot();

    f.manager.go_to_state_then(Mode::Idle, true, on_complete);

    assert_eq!(*outcomes.lock(), vec![AnimationOutcome::Finished]);
    assert!(f.listener_events().is_empty());
    assert!(!f.manager.is_in_transition());
}

#[test]
fn test_second_request_wins() {
    let f = Fixture::new();
    let (first, on_first) = outcome_slot();
    let (second, on_second) = outcome_slot();

    f.manager.go_to_state_then(Mode::Overview, true, on_first);
    f.looper.advance(Duration::from_millis(50));
    f.manager.go_to_state_then(Mode::AllApps, true, on_second);
    f.looper.advance(Duration::from_millis(300));

    assert_eq!(*first.lock(), vec![AnimationOutcome::Cancelled]);
    assert_eq!(*second.lock(), vec![AnimationOutcome::Finished]);
    assert_eq!(f.completions(), 1);
    assert_eq!(f.manager.current_stable_state(), Mode::AllApps);
    assert_eq!(*f.alpha.lock(), 1.0);
}

#[test]
fn test_cancel_with_nothing_running() {
    let f = Fixture::new();
    let change_id = f.manager.change_id();

    f.manager.cancel_animation();
    f.manager.cancel_animation();

    assert!(f.manager.current_animation().is_none());
    assert!(f.manager.playback_controller().is_none());
    assert_eq!(f.manager.change_id(), change_id + 2);
    assert!(f.events().is_empty());
}

#[test]
fn test_cancel_callback_starting_a_transition() {
    let f = Fixture::new();
    let weak: Weak<StateManager<Mode>> = Arc::downgrade(&f.manager);

    f.manager.go_to_state_then(Mode::Overview, true, move |outcome| {
        if outcome == AnimationOutcome::Cancelled {
            if let Some(manager) = weak.upgrade() {
                manager.go_to_state(Mode::Idle);
            }
        }
    });
    f.manager.go_to_state(Mode::AllApps);

    assert_eq!(f.manager.state(), Mode::AllApps);
    assert_eq!(f.manager.target_state(), Some(Mode::AllApps));
    assert!(f.manager.is_in_transition());

    f.looper.advance(Duration::from_millis(300));
    assert_eq!(
        f.listener_events(),
        vec![
            "listener start Overview",
            "listener start Idle",
            "listener start AllApps",
            "listener complete AllApps",
        ]
    );
    assert!(f.manager.is_in_stable_state(Mode::AllApps));
}

/// Installs a fresh animation every time it is cancelled.
struct Reinstaller {
    manager: Weak<StateManager<Mode>>,
    looper: Looper,
}

impl Reinstaller {
    fn animation(manager: Weak<StateManager<Mode>>, looper: &Looper) -> Animator {
        let animation = Animator::empty(looper, Duration::from_millis(100));
        animation.add_listener(Arc::new(Reinstaller {
            manager,
            looper: looper.clone(),
        }));
        animation
    }
}

impl AnimatorListener for Reinstaller {
    fn on_cancel(&self, _animator: &Animator) {
        if let Some(manager) = self.manager.upgrade() {
            let next = Reinstaller::animation(self.manager.clone(), &self.looper);
            manager.set_current_animation(next, &[]);
        }
    }
}

#[test]
fn test_cancellation_is_capped() {
    let f = Fixture::with_settings(ManagerSettings {
        max_cancel_iterations: 4,
    });
    let first = Reinstaller::animation(Arc::downgrade(&f.manager), &f.looper);
    f.manager.set_current_animation(first, &[]);

    assert_eq!(
        f.manager.try_cancel_animation(),
        Err(StateError::CancellationDidNotSettle { iterations: 4 })
    );
    assert!(f.manager.is_in_transition());
}

#[test]
fn test_delayed_transition() {
    let f = Fixture::new();
    f.manager.go_to_state_delayed(Mode::Overview, Duration::from_millis(50));
    assert!(!f.manager.is_in_transition());

    f.looper.advance(Duration::from_millis(40));
    assert_eq!(f.manager.state(), Mode::Idle);

    f.looper.advance(Duration::from_millis(10));
    assert_eq!(f.manager.state(), Mode::Overview);
    assert_eq!(*f.alpha.lock(), 0.0);

    // Runs for its full duration after the delay
    f.looper.advance(Duration::from_millis(190));
    assert!(f.manager.is_in_transition());
    f.looper.advance(Duration::from_millis(10));
    assert!(f.manager.is_in_stable_state(Mode::Overview));
}

#[test]
fn test_superseded_delayed_transition_never_starts() {
    let f = Fixture::new();
    let (outcomes, on_complete) = outcome_slot();
    f.manager.go_to_state_with(
        Mode::Overview,
        true,
        Duration::from_millis(50),
        Some(Box::new(on_complete)),
    );
    f.manager.go_to_state_animated(Mode::AllApps, false);

    f.looper.advance(Duration::from_millis(300));
    assert_eq!(f.manager.state(), Mode::AllApps);
    assert!(outcomes.lock().is_empty());
    assert!(!f.events().contains("Overview"));
}

#[test]
fn test_scenario_idle_to_overview() {
    let f = Fixture::new();
    f.manager.go_to_state_animated(Mode::Overview, true);

    assert!(f.manager.is_in_transition());
    assert_eq!(f.manager.state(), Mode::Overview);
    assert_eq!(f.manager.current_stable_state(), Mode::Idle);
    assert!(!f.manager.is_in_stable_state(Mode::Overview));

    f.looper.advance(Duration::from_millis(100));
    assert!((*f.alpha.lock() - 0.25).abs() < 1e-3);

    f.looper.advance(Duration::from_millis(100));
    assert!(!f.manager.is_in_transition());
    assert_eq!(f.manager.current_stable_state(), Mode::Overview);
    assert_eq!(f.manager.last_state(), Mode::Overview);
    assert!(f.manager.is_in_stable_state(Mode::Overview));
}

#[test]
fn test_scrubbed_transition_settles_forward() {
    let f = Fixture::new();
    let controller = f.manager.create_animation_to_new_workspace_with(
        Mode::Overview,
        Duration::from_millis(200),
        AnimationFlags::empty(),
    );
    assert!(f.manager.animation_config().is_user_controlled());
    assert_eq!(f.manager.state(), Mode::Idle);

    controller.set_play_fraction(0.5);
    assert_eq!(*f.alpha.lock(), 0.25);

    controller.animate_to_progress(1.0, Duration::from_millis(50));
    assert_eq!(f.manager.state(), Mode::Overview);
    f.looper.advance(Duration::from_millis(50));

    assert!(f.manager.is_in_stable_state(Mode::Overview));
    assert!(f.manager.playback_controller().is_none());
    assert_eq!(f.completions(), 1);
}

#[test]
fn test_scrubbed_transition_settles_back() {
    let f = Fixture::new();
    let controller = f.manager.create_animation_to_new_workspace(
        Mode::Overview,
        StateAnimationConfig::new(Duration::from_millis(200)),
    );
    controller.set_play_fraction(0.3);
    controller.animate_to_progress(0.0, Duration::from_millis(30));
    f.looper.advance(Duration::from_millis(30));

    assert_eq!(f.completions(), 0);
    assert_eq!(f.manager.current_stable_state(), Mode::Idle);
    assert_eq!(f.manager.state(), Mode::Idle);
    assert!(f.manager.is_in_stable_state(Mode::Idle));
    assert!(!f.manager.is_in_transition());
    assert_eq!(*f.alpha.lock(), 0.0);

    // The abandoned target is reachable again
    f.manager.go_to_state(Mode::Overview);
    assert!(f.manager.is_in_transition());
    f.looper.advance(Duration::from_millis(200));
    assert!(f.manager.is_in_stable_state(Mode::Overview));
    assert_eq!(*f.alpha.lock(), 0.5);
    assert_eq!(f.completions(), 1);
    assert!(!f.events().contains("repeat aborted"));
}

#[test]
fn test_move_to_rest_state_ignored_while_user_controlled() {
    let f = Fixture::new();
    f.manager.go_to_state_animated(Mode::AllApps, false);
    let controller = f.manager.create_animation_to_new_workspace_with(
        Mode::Overview,
        Duration::from_millis(200),
        AnimationFlags::empty(),
    );

    f.manager.move_to_rest_state(false);

    assert_eq!(f.manager.state(), Mode::AllApps);
    assert!(f
        .manager
        .playback_controller()
        .is_some_and(|c| c.ptr_eq(&controller)));
}

#[test]
fn test_move_to_rest_state_leaves_unrestorable_state() {
    let f = Fixture::new();
    f.manager.set_rest_state(Some(Mode::Overview));
    f.manager.go_to_state_animated(Mode::AllApps, false);
    assert_eq!(f.manager.last_state(), Mode::AllApps);

    f.manager.move_to_rest_state(false);
    assert!(f.manager.is_in_stable_state(Mode::Overview));
    assert_eq!(f.manager.last_state(), Mode::Idle);

    f.manager.move_to_rest_state(false);
    assert!(f.manager.is_in_stable_state(Mode::Overview));
}

#[test]
fn test_back_gesture_reaches_handlers() {
    #[derive(Default)]
    struct Back(Mutex<Vec<String>>);

    impl StateHandler<Mode> for Back {
        fn set_state(&self, _state: Mode) {}

        fn set_state_with_animation(
            &self,
            _to_state: Mode,
            _config: &StateAnimationConfig,
            _animation: &mut PendingAnimation,
        ) {
        }

        fn on_back_started(&self, to_state: Mode) {
            self.0.lock().push(format!("started {to_state:?}"));
        }

        fn on_back_progressed(&self, to_state: Mode, progress: f32) {
            self.0.lock().push(format!("progressed {to_state:?} {progress}"));
        }

        fn on_back_cancelled(&self, to_state: Mode) {
            self.0.lock().push(format!("cancelled {to_state:?}"));
        }
    }

    struct Host(Arc<Back>);

    impl StatefulContainer<Mode> for Host {
        fn collect_state_handlers(&self) -> Vec<Arc<dyn StateHandler<Mode>>> {
            vec![self.0.clone()]
        }
    }

    let back = Arc::new(Back::default());
    let manager = StateManager::new(Arc::new(Host(back.clone())), Looper::default(), Mode::Idle);
    manager.on_back_started(Mode::Idle);
    manager.on_back_progressed(Mode::Idle, 1.5);
    manager.on_back_cancelled(Mode::Idle);

    assert_eq!(
        *back.0.lock(),
        vec!["started Idle", "progressed Idle 1", "cancelled Idle"]
    );
}
