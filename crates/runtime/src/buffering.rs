/// Countdown publication of per-frame results for an N-buffered renderer.
///
/// The renderer keeps `buffers_in_flight` copies of every GPU-side result
/// buffer and writes one per drawn frame. [`Published::take`] hands a value
/// out exactly `buffers_in_flight` times and then reports "nothing new" until
/// the next publish.
#[derive(Debug, Clone)]
pub struct Published<T> {
    value: Option<T>,
    remaining: usize,
    buffers_in_flight: usize,
    generation: u64,
}

impl<T> Published<T> {
    pub fn new(buffers_in_flight: usize) -> Self {
        Self {
            value: None,
            remaining: 0,
            buffers_in_flight: buffers_in_flight.max(1),
            generation: 0,
        }
    }

    pub fn buffers_in_flight(&self) -> usize {
        self.buffers_in_flight
    }

    /// Number of times a publish happened. Superseded values are dropped.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Replaces the current value and rearms the countdown.
    pub fn publish(&mut self, value: T) {
        self.value = Some(value);
        self.remaining = self.buffers_in_flight;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Returns the latest value while slots still need it.
    pub fn take(&mut self) -> Option<&T> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.value.as_ref()
    }

    /// Latest value without touching the countdown.
    pub fn latest(&self) -> Option<&T> {
        self.value.as_ref()
    }
}
