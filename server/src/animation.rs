//! Frame-driven animation scheduler.
//!
//! Animations carry a task value instead of callbacks. `tick()` advances
//! every running animation and hands back the resulting events in
//! registration order; the owner dispatches them. Because events are a
//! snapshot, handlers may freely stop or schedule animations while
//! dispatching. A handler should skip `Tick` events for which `is_stale()`
//! reports true (stopped earlier in the same batch).

use std::collections::BTreeMap;

/// Upper bound on the per-tick catch-up factor after a slow frame.
pub const MAX_CATCH_UP: f64 = 2.0;

/// Handle returned by `schedule`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnimationId(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum AnimationEvent<T> {
    /// `fraction` is `count / duration`, unclamped; the last tick of a
    /// finite animation reports a value >= 1. Infinite animations report 0.
    Tick {
        id: AnimationId,
        task: T,
        count: f64,
        fraction: f64,
    },
    Complete {
        id: AnimationId,
        task: T,
        forced: bool,
    },
}

impl<T> AnimationEvent<T> {
    pub fn id(&self) -> AnimationId {
        match self {
            AnimationEvent::Tick { id, .. } | AnimationEvent::Complete { id, .. } => *id,
        }
    }
}

#[derive(Debug, Clone)]
struct Animation<T> {
    task: T,
    start: f64,
    count: f64,
    step: f64,
    duration: f64,
    running: bool,
}

#[derive(Debug, Clone)]
pub struct Animations<T> {
    animations: BTreeMap<AnimationId, Animation<T>>,
    /// Stopped since the last `tick()`.
    stopped: Vec<AnimationId>,
    next_id: u64,
}

impl<T> Default for Animations<T> {
    fn default() -> Self {
        Self {
            animations: BTreeMap::new(),
            stopped: Vec::new(),
            next_id: 1,
        }
    }
}

impl<T: Clone> Animations<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` for `duration` steps, starting at 0 with step 1.
    pub fn schedule(&mut self, duration: f64, task: T) -> AnimationId {
        self.schedule_with(0.0, 1.0, duration, task)
    }

    pub fn schedule_with(&mut self, start: f64, step: f64, duration: f64, task: T) -> AnimationId {
        let id = AnimationId(self.next_id);
        self.next_id += 1;
        self.animations.insert(
            id,
            Animation {
                task,
                start,
                count: start,
                step,
                duration,
                running: true,
            },
        );
        id
    }

    /// Never completes on its own; only `stop` ends it.
    pub fn schedule_infinite(&mut self, task: T) -> AnimationId {
        self.schedule(f64::INFINITY, task)
    }

    /// Remove the animation. Returns its completion event if it was running.
    pub fn stop(&mut self, id: AnimationId, forced: bool) -> Option<AnimationEvent<T>> {
        let animation = self.animations.remove(&id)?;
        self.stopped.push(id);
        animation.running.then(|| AnimationEvent::Complete {
            id,
            task: animation.task,
            forced,
        })
    }

    /// Force-stop every animation whose task matches.
    pub fn stop_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<AnimationEvent<T>> {
        let ids: Vec<AnimationId> = self
            .animations
            .iter()
            .filter(|(_, a)| pred(&a.task))
            .map(|(id, _)| *id)
            .collect();
        ids.into_iter().filter_map(|id| self.stop(id, true)).collect()
    }

    /// Re-arm a live or paused animation from its start count with the
    /// same task. Completed and stopped animations are gone, so this
    /// returns false for them.
    pub fn restart(&mut self, id: AnimationId) -> bool {
        match self.animations.get_mut(&id) {
            Some(animation) => {
                animation.count = animation.start;
                animation.running = true;
                true
            }
            None => false,
        }
    }

    /// Hold the animation in place. `restart` sets it running again.
    pub fn pause(&mut self, id: AnimationId) {
        if let Some(animation) = self.animations.get_mut(&id) {
            animation.running = false;
        }
    }

    pub fn is_active(&self, id: AnimationId) -> bool {
        self.animations.contains_key(&id)
    }

    /// True for an animation stopped after the current batch of events
    /// was produced.
    pub fn is_stale(&self, id: AnimationId) -> bool {
        self.stopped.contains(&id)
    }

    pub fn task(&self, id: AnimationId) -> Option<&T> {
        self.animations.get(&id).map(|a| &a.task)
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Drop everything without completion events.
    pub fn clear(&mut self) {
        self.stopped.extend(self.animations.keys().copied());
        self.animations.clear();
    }

    /// Advance all running animations by `step × min(fps_ratio, 2)`.
    pub fn tick(&mut self, fps_ratio: f64) -> Vec<AnimationEvent<T>> {
        let ratio = if fps_ratio.is_finite() {
            fps_ratio.clamp(0.0, MAX_CATCH_UP)
        } else {
            1.0
        };

        self.stopped.clear();
        let mut events = Vec::new();
        let mut finished = Vec::new();
        for (id, animation) in self.animations.iter_mut() {
            if !animation.running {
                continue;
            }
            let fraction = if animation.duration.is_infinite() {
                0.0
            } else {
                animation.count / animation.duration
            };
            events.push(AnimationEvent::Tick {
                id: *id,
                task: animation.task.clone(),
                count: animation.count,
                fraction,
            });
            if animation.count >= animation.duration {
                finished.push(*id);
                events.push(AnimationEvent::Complete {
                    id: *id,
                    task: animation.task.clone(),
                    forced: false,
                });
            } else {
                animation.count += animation.step * ratio;
            }
        }
        for id in finished {
            self.animations.remove(&id);
        }
        events
    }
}
