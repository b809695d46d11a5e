//! Parameter timelines evaluated at absolute engine time.
//!
//! A timeline holds a value before its first event and a sorted list of
//! breakpoints after it. Ramps interpolate from the previous breakpoint; a
//! ramp with no breakpoint before it acts as a step at its own time.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ramp {
    Step,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Breakpoint {
    time: f64,
    value: f32,
    ramp: Ramp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Automation {
    initial: f32,
    points: Vec<Breakpoint>,
}

impl Automation {
    pub fn new(value: f32) -> Self {
        Self {
            initial: value,
            points: Vec::new(),
        }
    }

    pub fn set_value_at(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Breakpoint {
            time,
            value,
            ramp: Ramp::Step,
        })
    }

    pub fn linear_ramp_to(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Breakpoint {
            time,
            value,
            ramp: Ramp::Linear,
        })
    }

    /// Exponential ramps need both endpoints non-zero with the same sign;
    /// otherwise the segment falls back to linear.
    pub fn exponential_ramp_to(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(Breakpoint {
            time,
            value,
            ramp: Ramp::Exponential,
        })
    }

    fn insert(&mut self, point: Breakpoint) -> &mut Self {
        let index = self.points.partition_point(|p| p.time <= point.time);
        self.points.insert(index, point);
        self
    }

    /// Freezes the timeline at its current value and drops every event.
    pub fn cancel_and_hold(&mut self, now: f64) -> f32 {
        let held = self.value_at(now);
        self.initial = held;
        self.points.clear();
        held
    }

    /// Drops every event at or after `time`, keeping earlier history.
    pub fn cancel_from(&mut self, time: f64) {
        let keep = self.points.partition_point(|p| p.time < time);
        self.points.truncate(keep);
    }

    /// Time of the last breakpoint, if any.
    pub fn end_time(&self) -> Option<f64> {
        self.points.last().map(|p| p.time)
    }

    pub fn final_value(&self) -> f32 {
        self.points.last().map_or(self.initial, |p| p.value)
    }

    pub fn value_at(&self, time: f64) -> f32 {
        let next = self.points.partition_point(|p| p.time <= time);

        let Some(upcoming) = self.points.get(next) else {
            return self.final_value();
        };

        let (from_time, from_value) = match next.checked_sub(1) {
            Some(prev) => (self.points[prev].time, self.points[prev].value),
            None => {
                // Before the first breakpoint only the initial value holds.
                return self.initial;
            }
        };

        let span = upcoming.time - from_time;
        if span <= 0.0 {
            return upcoming.value;
        }
        let frac = ((time - from_time) / span) as f32;

        match upcoming.ramp {
            Ramp::Step => from_value,
            Ramp::Linear => from_value + (upcoming.value - from_value) * frac,
            Ramp::Exponential => {
                if from_value * upcoming.value > 0.0 {
                    from_value * (upcoming.value / from_value).powf(frac)
                } else {
                    from_value + (upcoming.value - from_value) * frac
                }
            }
        }
    }
}

impl Default for Automation {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_initial_value_before_first_event() {
        let mut param = Automation::new(0.5);
        param.set_value_at(1.0, 2.0);
        assert_eq!(param.value_at(1.9), 0.5);
        assert_eq!(param.value_at(2.0), 1.0);
        assert_eq!(param.value_at(10.0), 1.0);
    }

    #[test]
    fn ramps_interpolate_between_breakpoints() {
        let mut param = Automation::new(0.0);
        param.set_value_at(0.0, 0.0).linear_ramp_to(1.0, 1.0);
        assert!((param.value_at(0.25) - 0.25).abs() < 1e-6);

        let mut sweep = Automation::new(0.0);
        sweep.set_value_at(100.0, 0.0).exponential_ramp_to(400.0, 2.0);
        assert!((sweep.value_at(1.0) - 200.0).abs() < 1e-2);
    }

    #[test]
    fn exponential_to_zero_falls_back_to_linear() {
        let mut param = Automation::new(0.0);
        param.set_value_at(1.0, 0.0).exponential_ramp_to(0.0, 1.0);
        assert!((param.value_at(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cancel_and_hold_freezes_mid_ramp() {
        let mut param = Automation::new(0.0);
        param.set_value_at(0.0, 0.0).linear_ramp_to(1.0, 1.0);
        let held = param.cancel_and_hold(0.5);
        assert!((held - 0.5).abs() < 1e-6);
        assert_eq!(param.value_at(5.0), held);
        assert_eq!(param.end_time(), None);
    }

    #[test]
    fn events_stay_sorted_regardless_of_insert_order() {
        let mut param = Automation::new(0.0);
        param.set_value_at(3.0, 3.0);
        param.set_value_at(1.0, 1.0);
        assert_eq!(param.value_at(1.5), 1.0);
        assert_eq!(param.end_time(), Some(3.0));
        param.cancel_from(2.0);
        assert_eq!(param.final_value(), 1.0);
    }
}
