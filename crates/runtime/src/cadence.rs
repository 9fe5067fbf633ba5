/// Display-loop cadence for screen-space label evaluation.
///
/// The host calls [`EvaluationCadence::tick`] once per display refresh. An
/// evaluation is due when state is dirty and the tick lands on the cadence, or
/// immediately after [`EvaluationCadence::request_now`]. Rapid camera movement
/// only marks the cadence dirty, so at most one evaluation starts every
/// `every_n_ticks` refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationCadence {
    every_n_ticks: u64,
    tick: u64,
    dirty: bool,
    urgent: bool,
}

impl EvaluationCadence {
    pub fn new(every_n_ticks: u64) -> Self {
        Self {
            every_n_ticks: every_n_ticks.max(1),
            tick: 0,
            // The first cadence tick always evaluates.
            dirty: true,
            urgent: false,
        }
    }

    pub fn every_n_ticks(&self) -> u64 {
        self.every_n_ticks
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.urgent
    }

    /// Something on screen changed; evaluate on the next cadence tick.
    pub fn request(&mut self) {
        self.dirty = true;
    }

    /// Evaluate on the very next tick regardless of cadence.
    pub fn request_now(&mut self) {
        self.urgent = true;
    }

    /// Advance one display refresh. Returns `true` when an evaluation should
    /// start on this tick; the pending request is consumed.
    pub fn tick(&mut self) -> bool {
        self.tick = self.tick.wrapping_add(1);

        let on_cadence = self.tick % self.every_n_ticks == 0;
        let due = self.urgent || (self.dirty && on_cadence);
        if due {
            tracing::trace!(tick = self.tick, urgent = self.urgent, "label evaluation due");
            self.dirty = false;
            self.urgent = false;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::EvaluationCadence;

    fn due_ticks(c: &mut EvaluationCadence, n: usize) -> Vec<u64> {
        let mut out = Vec::new();
        for _ in 0..n {
            if c.tick() {
                out.push(c.tick_count());
            }
        }
        out
    }

    #[test]
    fn first_cadence_tick_evaluates_once() {
        let mut c = EvaluationCadence::new(4);
        assert_eq!(due_ticks(&mut c, 12), vec![4]);
    }

    #[test]
    fn requests_coalesce_until_next_cadence_tick() {
        let mut c = EvaluationCadence::new(3);
        assert_eq!(due_ticks(&mut c, 3), vec![3]);
        c.request();
        c.tick();
        c.request();
        c.request();
        assert_eq!(due_ticks(&mut c, 4), vec![6]);
    }

    #[test]
    fn request_now_bypasses_cadence() {
        let mut c = EvaluationCadence::new(10);
        assert_eq!(due_ticks(&mut c, 10), vec![10]);
        c.request_now();
        assert!(c.tick());
        assert!(!c.is_dirty());
    }

    #[test]
    fn zero_cadence_is_clamped() {
        let mut c = EvaluationCadence::new(0);
        assert_eq!(c.every_n_ticks(), 1);
        assert!(c.tick());
        assert!(!c.tick());
    }
}
