/// Fixed upper bound on a per-evaluation resource (points, transforms, tiles).
///
/// Ceilings are sized once from configuration and mirror fixed-size GPU
/// buffers, so a request above the ceiling must be retried later instead of
/// being truncated.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Ceiling {
    resource: &'static str,
    max: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CapacityExceeded {
    pub resource: &'static str,
    pub requested: usize,
    pub max: usize,
}

impl std::fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} over capacity: requested={} max={}",
            self.resource, self.requested, self.max
        )
    }
}

impl std::error::Error for CapacityExceeded {}

impl Ceiling {
    pub fn new(resource: &'static str, max: usize) -> Self {
        Self { resource, max }
    }

    pub fn admits(&self, requested: usize) -> bool {
        requested <= self.max
    }

    /// Checks `requested` against the ceiling.
    pub fn check(&self, requested: usize) -> Result<(), CapacityExceeded> {
        if !self.admits(requested) {
            return Err(CapacityExceeded {
                resource: self.resource,
                requested,
                max: self.max,
            });
        }
        Ok(())
    }
}
