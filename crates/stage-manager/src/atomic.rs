//! Per-element animations that run alongside (not inside) a transition.
//!
//! A container reserves a fixed number of slots. Each slot holds at most one
//! animator: creating a new one for an occupied slot cancels the occupant,
//! and an animator that ends clears its own slot.

use parking_lot::Mutex;
use std::sync::Arc;

use stage_anim::{Animator, Looper};
use stage_core::StateError;

use crate::config::StateAnimationConfig;
use crate::state::State;

/// Builds the per-element animations of a container.
pub trait AtomicAnimationProvider<S: State>: Send + Sync {
    /// Build the animation for slot `index`, or `None` if this slot has none.
    fn create_state_element_animation(
        &self,
        _index: usize,
        _values: &[f32],
        _looper: &Looper,
    ) -> Option<Animator> {
        None
    }

    /// Adjust `config` before an atomic animation from `from` to `to` is built.
    fn prepare_for_atomic_animation(&self, _from: S, _to: S, _config: &mut StateAnimationConfig) {}
}

/// Fixed set of animation slots backed by an optional provider.
pub struct AtomicAnimationFactory<S: State> {
    slots: Arc<Mutex<Vec<Option<Animator>>>>,
    provider: Option<Box<dyn AtomicAnimationProvider<S>>>,
}

impl<S: State> AtomicAnimationFactory<S> {
    /// A factory with `slot_count` slots and no provider.
    pub fn new(slot_count: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(vec![None; slot_count])),
            provider: None,
        }
    }

    pub fn with_provider<P>(slot_count: usize, provider: P) -> Self
    where
        P: AtomicAnimationProvider<S> + 'static,
    {
        Self {
            slots: Arc::new(Mutex::new(vec![None; slot_count])),
            provider: Some(Box::new(provider)),
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Number of occupied slots.
    pub fn active_slots(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }

    /// The animator occupying slot `index`, if any.
    pub fn state_element_animation(&self, index: usize) -> Option<Animator> {
        self.slots.lock().get(index).cloned().flatten()
    }

    pub fn prepare_for_atomic_animation(&self, from: S, to: S, config: &mut StateAnimationConfig) {
        if let Some(provider) = &self.provider {
            provider.prepare_for_atomic_animation(from, to, config);
        }
    }

    /// Build the animator for slot `index`, cancelling whatever held the slot.
    ///
    /// The returned animator is not started.
    pub fn create_state_element_animation(
        &self,
        index: usize,
        values: &[f32],
        looper: &Looper,
    ) -> Result<Animator, StateError> {
        let slots = self.slot_count();
        if index >= slots {
            return Err(StateError::ElementSlotOutOfRange { index, slots });
        }
        self.cancel_state_element_animation(index);

        let animation = self
            .provider
            .as_ref()
            .and_then(|p| p.create_state_element_animation(index, values, looper))
            .ok_or(StateError::UnknownElementAnimation { index })?;

        let id = animation.id();
        let weak_slots = Arc::downgrade(&self.slots);
        animation.on_end(move |_| {
            if let Some(slots) = weak_slots.upgrade() {
                let mut slots = slots.lock();
                if let Some(slot) = slots.get_mut(index) {
                    if slot.as_ref().is_some_and(|a| a.id() == id) {
                        *slot = None;
                    }
                }
            }
        });

        if let Some(slot) = self.slots.lock().get_mut(index) {
            *slot = Some(animation.clone());
        }
        tracing::trace!("Element animation {} installed in slot {}", id, index);
        Ok(animation)
    }

    /// Cancel and clear slot `index`. Out-of-range indices are ignored.
    pub fn cancel_state_element_animation(&self, index: usize) {
        let previous = self.slots.lock().get_mut(index).and_then(Option::take);
        if let Some(previous) = previous {
            previous.cancel();
        }
    }

    /// Cancel every occupied slot.
    pub fn cancel_all_state_element_animation(&self) {
        let occupied: Vec<Animator> = self
            .slots
            .lock()
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        for animation in occupied {
            animation.cancel();
        }
    }
}

impl<S: State> std::fmt::Debug for AtomicAnimationFactory<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slots = self.slots.lock();
        f.debug_struct("AtomicAnimationFactory")
            .field("slots", &slots.len())
            .field("active", &slots.iter().filter(|s| s.is_some()).count())
            .field("has_provider", &self.provider.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stage_anim::{AnimationOutcome, Interpolator, PendingAnimation};
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Idle,
    }

    impl State for Mode {
        fn transition_duration(
            &self,
            _container: &dyn crate::container::StatefulContainer<Self>,
            _entering: bool,
        ) -> Duration {
            Duration::ZERO
        }
    }

    /// Slot 0 fades between the given values; slot 1 has no animation.
    struct Fades;

    impl AtomicAnimationProvider<Mode> for Fades {
        fn create_state_element_animation(
            &self,
            index: usize,
            values: &[f32],
            looper: &Looper,
        ) -> Option<Animator> {
            if index != 0 || values.len() < 2 {
                return None;
            }
            let mut builder = PendingAnimation::new(Duration::from_millis(40));
            builder.add_float(values[0], values[1], Interpolator::Linear, |_| {});
            Some(builder.build_anim(looper))
        }
    }

    fn factory() -> (AtomicAnimationFactory<Mode>, Looper) {
        (
            AtomicAnimationFactory::with_provider(2, Fades),
            Looper::new(Duration::from_millis(10)),
        )
    }

    #[test]
    fn test_new_animation_cancels_occupant() {
        let (factory, looper) = factory();
        let first = factory
            .create_state_element_animation(0, &[0.0, 1.0], &looper)
            .unwrap();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let o = outcomes.clone();
        first.on_end(move |outcome| o.lock().push(outcome));
        first.start();

        let second = factory
            .create_state_element_animation(0, &[1.0, 0.0], &looper)
            .unwrap();
        assert_eq!(*outcomes.lock(), vec![AnimationOutcome::Cancelled]);
        assert!(factory
            .state_element_animation(0)
            .is_some_and(|a| a.ptr_eq(&second)));
    }

    #[test]
    fn test_slot_clears_when_animation_ends() {
        let (factory, looper) = factory();
        let anim = factory
            .create_state_element_animation(0, &[0.0, 1.0], &looper)
            .unwrap();
        anim.start();
        assert_eq!(factory.active_slots(), 1);

        looper.advance(Duration::from_millis(40));
        assert_eq!(factory.active_slots(), 0);
    }

    #[test]
    fn test_errors() {
        let (factory, looper) = factory();
        assert_eq!(
            factory
                .create_state_element_animation(1, &[], &looper)
                .unwrap_err(),
            StateError::UnknownElementAnimation { index: 1 }
        );
        assert_eq!(
            factory
                .create_state_element_animation(5, &[], &looper)
                .unwrap_err(),
            StateError::ElementSlotOutOfRange { index: 5, slots: 2 }
        );
        assert_eq!(AtomicAnimationFactory::<Mode>::new(0).slot_count(), 0);
    }

    #[test]
    fn test_cancel_all() {
        let (factory, looper) = factory();
        let anim = factory
            .create_state_element_animation(0, &[0.0, 1.0], &looper)
            .unwrap();
        anim.start();

        factory.cancel_all_state_element_animation();
        assert_eq!(factory.active_slots(), 0);
        assert!(anim.is_ended());
        looper.advance(Duration::from_millis(50));
        assert!(looper.is_idle());
    }
}
