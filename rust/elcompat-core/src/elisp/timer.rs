//! Timer registrations.
//!
//! The manager only keeps records; wall-clock scheduling belongs to the
//! driver, which asks for [`TimerManager::due`] timers and hands each id to
//! `Evaluator::fire_timer`.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use super::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Clone, Debug)]
pub struct Timer {
    pub id: TimerId,
    /// `None` for one-shot timers.
    pub period: Option<Duration>,
    /// Symbol or function value.
    pub callback: Value,
    pub args: Vec<Value>,
    pub active: bool,
    pub next_fire: Instant,
    pub idle: bool,
}

#[derive(Debug)]
pub struct TimerManager {
    timers: BTreeMap<TimerId, Timer>,
    next_id: u64,
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerManager {
    pub fn new() -> Self {
        Self {
            timers: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn add(
        &mut self,
        delay: Duration,
        period: Option<Duration>,
        callback: Value,
        args: Vec<Value>,
        idle: bool,
        now: Instant,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.insert(
            id,
            Timer {
                id,
                period: period.filter(|p| !p.is_zero()),
                callback,
                args,
                active: true,
                next_fire: now + delay,
                idle,
            },
        );
        tracing::debug!(timer = id.0, ?delay, ?period, "timer registered");
        id
    }

    pub fn get(&self, id: TimerId) -> Option<&Timer> {
        self.timers.get(&id)
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.get(&id).is_some_and(|t| t.active)
    }

    /// Deactivate and forget a timer.  Returns false for unknown ids.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn deactivate(&mut self, id: TimerId) {
        if let Some(timer) = self.timers.get_mut(&id) {
            timer.active = false;
        }
    }

    /// Change a repeating timer's period (used by `gamegrid-set-timer`).
    pub fn set_period(&mut self, id: TimerId, period: Duration, now: Instant) {
        if let Some(timer) = self.timers.get_mut(&id) {
            timer.period = Some(period);
            timer.next_fire = now + period;
        }
    }

    /// Active timers in registration order.
    pub fn active_ids(&self) -> Vec<TimerId> {
        self.timers
            .values()
            .filter(|t| t.active)
            .map(|t| t.id)
            .collect()
    }

    /// Active timers whose fire time has passed, earliest first.
    pub fn due(&self, now: Instant) -> Vec<TimerId> {
        let mut due: Vec<&Timer> = self
            .timers
            .values()
            .filter(|t| t.active && t.next_fire <= now)
            .collect();
        due.sort_by_key(|t| (t.next_fire, t.id));
        due.into_iter().map(|t| t.id).collect()
    }

    /// Record a firing: repeating timers are rescheduled, one-shots go
    /// inactive.
    pub fn mark_fired(&mut self, id: TimerId, now: Instant) {
        if let Some(timer) = self.timers.get_mut(&id) {
            match timer.period {
                Some(period) => timer.next_fire = now + period,
                None => timer.active = false,
            }
        }
    }

    /// Time until the earliest active timer, if any.
    pub fn next_deadline(&self, now: Instant) -> Option<Duration> {
        self.timers
            .values()
            .filter(|t| t.active)
            .map(|t| t.next_fire.saturating_duration_since(now))
            .min()
    }
}

/// Seconds value (integer or float) as a duration; negatives clamp to zero.
pub fn seconds(value: &Value) -> Option<Duration> {
    let secs = value.as_number_f64()?;
    if !secs.is_finite() {
        return None;
    }
    Some(Duration::from_secs_f64(secs.max(0.0)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_timers_deactivate_after_firing() {
        let now = Instant::now();
        let mut timers = TimerManager::new();
        let once = timers.add(Duration::ZERO, None, Value::symbol("tick"), vec![], false, now);
        let every = timers.add(
            Duration::from_millis(10),
            Some(Duration::from_millis(10)),
            Value::symbol("tock"),
            vec![],
            false,
            now,
        );
        assert_eq!(timers.due(now), vec![once]);
        timers.mark_fired(once, now);
        assert!(!timers.is_active(once));

        let later = now + Duration::from_millis(10);
        assert_eq!(timers.due(later), vec![every]);
        timers.mark_fired(every, later);
        assert!(timers.is_active(every));
        assert!(timers.due(later).is_empty());
        assert_eq!(timers.active_ids(), vec![every]);
    }

    #[test]
    fn zero_period_means_one_shot() {
        let now = Instant::now();
        let mut timers = TimerManager::new();
        let id = timers.add(Duration::ZERO, Some(Duration::ZERO), Value::Nil, vec![], false, now);
        assert!(timers.get(id).unwrap().period.is_none());
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
    }

    #[test]
    fn seconds_accepts_ints_and_floats() {
        assert_eq!(seconds(&Value::Int(2)), Some(Duration::from_secs(2)));
        assert_eq!(seconds(&Value::Float(0.5)), Some(Duration::from_millis(500)));
        assert_eq!(seconds(&Value::Int(-1)), Some(Duration::ZERO));
        assert_eq!(seconds(&Value::Nil), None);
    }
}
