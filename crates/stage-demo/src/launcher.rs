//! A launcher-like container with three states.
//!
//! The launcher renders into a [`Frame`] of animated properties. Each
//! [`SurfaceHandler`] owns a subset of those properties and contributes one
//! segment per property to every transition.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use stage_core::AnimationSettings;
use stage_manager::{
    Animator, AtomicAnimationFactory, AtomicAnimationProvider, Interpolator, Looper,
    PendingAnimation, PropertyId, State, StateAnimationConfig, StateHandler, StateListener,
    StatefulContainer,
};

/// Property ids understood by [`Frame`].
pub mod property {
    use stage_manager::PropertyId;

    pub const WORKSPACE_SCALE: PropertyId = 0;
    pub const WORKSPACE_ALPHA: PropertyId = 1;
    pub const SCRIM_ALPHA: PropertyId = 2;
    pub const ALL_APPS_PROGRESS: PropertyId = 3;
    pub const HOTSEAT_OFFSET: PropertyId = 4;
}

/// Element animation slot for the hotseat bounce.
pub const HOTSEAT_BOUNCE: usize = 0;
const ELEMENT_SLOTS: usize = 1;

/// Share of the way towards the back target shown while the gesture is in progress.
const BACK_PREVIEW: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LauncherState {
    Normal,
    Overview,
    AllApps,
}

impl State for LauncherState {
    fn transition_duration(&self, _container: &dyn StatefulContainer<Self>, entering: bool) -> Duration {
        let millis = match (self, entering) {
            (LauncherState::Normal, _) => 250,
            (LauncherState::Overview, true) => 250,
            (LauncherState::Overview, false) => 200,
            (LauncherState::AllApps, true) => 320,
            (LauncherState::AllApps, false) => 250,
        };
        Duration::from_millis(millis)
    }

    // All apps remembers where it was opened from.
    fn history_for_state(&self, previous: Self) -> Self {
        match self {
            LauncherState::AllApps => previous,
            _ => *self,
        }
    }

    fn should_disable_restore(&self) -> bool {
        matches!(self, LauncherState::AllApps)
    }
}

/// Rendered launcher properties.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub workspace_scale: f32,
    pub workspace_alpha: f32,
    pub scrim_alpha: f32,
    pub all_apps_progress: f32,
    pub hotseat_offset: f32,
}

impl Frame {
    /// Resting values of `state`.
    pub fn for_state(state: LauncherState) -> Self {
        let (workspace_scale, workspace_alpha, scrim_alpha, all_apps_progress) = match state {
            LauncherState::Normal => (1.0, 1.0, 0.0, 0.0),
            LauncherState::Overview => (0.7, 1.0, 0.4, 0.0),
            LauncherState::AllApps => (0.94, 0.0, 0.8, 1.0),
        };
        Self {
            workspace_scale,
            workspace_alpha,
            scrim_alpha,
            all_apps_progress,
            hotseat_offset: 0.0,
        }
    }

    pub fn get(&self, id: PropertyId) -> f32 {
        match id {
            property::WORKSPACE_SCALE => self.workspace_scale,
            property::WORKSPACE_ALPHA => self.workspace_alpha,
            property::SCRIM_ALPHA => self.scrim_alpha,
            property::ALL_APPS_PROGRESS => self.all_apps_progress,
            property::HOTSEAT_OFFSET => self.hotseat_offset,
            _ => 0.0,
        }
    }

    pub fn set(&mut self, id: PropertyId, value: f32) {
        match id {
            property::WORKSPACE_SCALE => self.workspace_scale = value,
            property::WORKSPACE_ALPHA => self.workspace_alpha = value,
            property::SCRIM_ALPHA => self.scrim_alpha = value,
            property::ALL_APPS_PROGRESS => self.all_apps_progress = value,
            property::HOTSEAT_OFFSET => self.hotseat_offset = value,
            _ => {}
        }
    }
}

type Surface = Arc<Mutex<Frame>>;

/// Applies a fixed set of frame properties.
pub struct SurfaceHandler {
    name: &'static str,
    properties: &'static [PropertyId],
    surface: Surface,
    /// Values when the back gesture started.
    back_origin: Mutex<Option<Vec<f32>>>,
}

impl SurfaceHandler {
    fn new(name: &'static str, properties: &'static [PropertyId], surface: Surface) -> Self {
        Self {
            name,
            properties,
            surface,
            back_origin: Mutex::new(None),
        }
    }
}

impl StateHandler<LauncherState> for SurfaceHandler {
    fn set_state(&self, state: LauncherState) {
        tracing::trace!("{}: set {:?}", self.name, state);
        let target = Frame::for_state(state);
        let mut frame = self.surface.lock();
        for &property in self.properties {
            frame.set(property, target.get(property));
        }
    }

    fn set_state_with_animation(
        &self,
        to_state: LauncherState,
        config: &StateAnimationConfig,
        animation: &mut PendingAnimation,
    ) {
        tracing::trace!("{}: animate to {:?}", self.name, to_state);
        let target = Frame::for_state(to_state);
        let current = *self.surface.lock();
        for &property in self.properties {
            let surface = self.surface.clone();
            animation.add_float(
                current.get(property),
                target.get(property),
                config.interpolator(property, Interpolator::Linear),
                move |v| surface.lock().set(property, v),
            );
        }
    }

    fn on_back_started(&self, _to_state: LauncherState) {
        let frame = *self.surface.lock();
        *self.back_origin.lock() = Some(self.properties.iter().map(|&p| frame.get(p)).collect());
    }

    fn on_back_progressed(&self, to_state: LauncherState, progress: f32) {
        let Some(origin) = self.back_origin.lock().clone() else {
            return;
        };
        let target = Frame::for_state(to_state);
        let mut frame = self.surface.lock();
        for (&property, from) in self.properties.iter().zip(origin) {
            let to = target.get(property);
            frame.set(property, from + (to - from) * progress * BACK_PREVIEW);
        }
    }

    fn on_back_cancelled(&self, _to_state: LauncherState) {
        let Some(origin) = self.back_origin.lock().take() else {
            return;
        };
        let mut frame = self.surface.lock();
        for (&property, value) in self.properties.iter().zip(origin) {
            frame.set(property, value);
        }
    }
}

/// Interpolator presets, duration scaling and the hotseat bounce.
struct LauncherAnimations {
    settings: AnimationSettings,
    surface: Surface,
}

impl AtomicAnimationProvider<LauncherState> for LauncherAnimations {
    fn create_state_element_animation(&self, index: usize, values: &[f32], looper: &Looper) -> Option<Animator> {
        if index != HOTSEAT_BOUNCE {
            return None;
        }
        let (&from, &to) = (values.first()?, values.last()?);
        let mut builder = PendingAnimation::new(self.settings.scale(Duration::from_millis(150)));
        let surface = self.surface.clone();
        builder.add_float(from, to, Interpolator::Overshoot, move |v| {
            surface.lock().set(property::HOTSEAT_OFFSET, v)
        });
        Some(builder.build_anim(looper))
    }

    fn prepare_for_atomic_animation(
        &self,
        from: LauncherState,
        to: LauncherState,
        config: &mut StateAnimationConfig,
    ) {
        config.duration = self.settings.scale(config.duration);
        match (from, to) {
            (_, LauncherState::AllApps) => {
                config.set_interpolator(property::ALL_APPS_PROGRESS, Interpolator::Decelerate);
                config.set_interpolator(property::WORKSPACE_ALPHA, Interpolator::Accelerate);
            }
            (LauncherState::AllApps, _) => {
                config.set_interpolator(property::ALL_APPS_PROGRESS, Interpolator::Accelerate);
                config.set_interpolator(property::WORKSPACE_ALPHA, Interpolator::Decelerate);
            }
            (_, LauncherState::Overview) => {
                config.set_interpolator(property::WORKSPACE_SCALE, Interpolator::Overshoot);
            }
            _ => {
                config.set_interpolator(property::WORKSPACE_SCALE, Interpolator::AccelerateDecelerate);
            }
        }
    }
}

/// The demo container.
pub struct Launcher {
    settings: AnimationSettings,
    surface: Surface,
    handlers: Vec<Arc<SurfaceHandler>>,
}

impl Launcher {
    pub fn new(settings: AnimationSettings) -> Self {
        let surface = Arc::new(Mutex::new(Frame::for_state(LauncherState::Normal)));
        let handlers = vec![
            Arc::new(SurfaceHandler::new(
                "workspace",
                &[property::WORKSPACE_SCALE, property::WORKSPACE_ALPHA],
                surface.clone(),
            )),
            Arc::new(SurfaceHandler::new(
                "scrim",
                &[property::SCRIM_ALPHA],
                surface.clone(),
            )),
            Arc::new(SurfaceHandler::new(
                "all_apps",
                &[property::ALL_APPS_PROGRESS],
                surface.clone(),
            )),
        ];
        Self {
            settings,
            surface,
            handlers,
        }
    }

    /// Snapshot of the rendered properties.
    pub fn frame(&self) -> Frame {
        *self.surface.lock()
    }
}

impl StatefulContainer<LauncherState> for Launcher {
    fn collect_state_handlers(&self) -> Vec<Arc<dyn StateHandler<LauncherState>>> {
        self.handlers
            .iter()
            .map(|h| h.clone() as Arc<dyn StateHandler<LauncherState>>)
            .collect()
    }

    fn create_atomic_animation_factory(&self) -> AtomicAnimationFactory<LauncherState> {
        AtomicAnimationFactory::with_provider(
            ELEMENT_SLOTS,
            LauncherAnimations {
                settings: self.settings.clone(),
                surface: self.surface.clone(),
            },
        )
    }

    fn should_animate_state_change(&self) -> bool {
        self.settings.enabled
    }

    fn on_state_set_start(&self, state: LauncherState) {
        tracing::debug!("Launcher entering {:?}", state);
    }

    fn on_state_set_end(&self, state: LauncherState) {
        tracing::debug!("Launcher settled in {:?}", state);
    }

    fn on_repeat_state_set_aborted(&self, state: LauncherState) {
        tracing::debug!("Launcher already in {:?}", state);
    }
}

/// Logs every transition.
pub struct LoggingListener;

impl StateListener<LauncherState> for LoggingListener {
    fn on_state_transition_start(&self, to_state: LauncherState) {
        tracing::info!("Transition to {:?} started", to_state);
    }

    fn on_state_transition_complete(&self, final_state: LauncherState) {
        tracing::info!("Transition to {:?} complete", final_state);
    }
}
