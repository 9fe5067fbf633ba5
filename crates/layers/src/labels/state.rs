use foundation::ids::LabelId;
use foundation::time::Time;
use rustc_hash::{FxHashMap, FxHashSet};

/// Visibility of one label and the time its current state began.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LabelIntersection {
    pub hide: bool,
    pub created_time: f32,
}

impl LabelIntersection {
    pub fn new(hide: bool, created_time: f32) -> Self {
        Self { hide, created_time }
    }
}

/// Layout the renderer reads per label instance.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LabelIntersectionGpu {
    pub hide: u32,
    pub created_time: f32,
}

impl From<LabelIntersection> for LabelIntersectionGpu {
    fn from(s: LabelIntersection) -> Self {
        Self {
            hide: s.hide as u32,
            created_time: s.created_time,
        }
    }
}

/// Per-id show/hide state kept across evaluations.
#[derive(Debug, Clone, Default)]
pub struct IntersectionStore {
    states: FxHashMap<LabelId, LabelIntersection>,
}

impl IntersectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: LabelId) -> Option<LabelIntersection> {
        self.states.get(&id).copied()
    }

    pub fn put(&mut self, id: LabelId, state: LabelIntersection) {
        self.states.insert(id, state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Records a collision outcome. A changed outcome restarts the fade at
    /// `now`; an unchanged one keeps its timestamp. A label seen for the first
    /// time starts shown at `now`, or hidden at `0`.
    pub fn resolve(&mut self, id: LabelId, hide: bool, now: Time) -> LabelIntersection {
        let state = match self.get(id) {
            Some(prev) if prev.hide == hide => prev,
            Some(_) => LabelIntersection::new(hide, now.seconds()),
            None if hide => LabelIntersection::new(true, 0.0),
            None => LabelIntersection::new(false, now.seconds()),
        };
        self.put(id, state);
        state
    }

    /// Hides a label whose tile is no longer current.
    ///
    /// A label that was shown fades out from `now`. One already hidden keeps
    /// its timestamp. An unknown label is hidden at `0`, so it never fades in
    /// or out.
    pub fn force_hidden(&mut self, id: LabelId, now: Time) -> LabelIntersection {
        let state = match self.get(id) {
            Some(prev) if prev.hide => prev,
            Some(_) => LabelIntersection::new(true, now.seconds()),
            None => LabelIntersection::new(true, 0.0),
        };
        self.put(id, state);
        state
    }

    /// Forgets ids that are no longer carried by any held tile.
    pub fn retain_ids(&mut self, live: &FxHashSet<LabelId>) {
        self.states.retain(|id, _| live.contains(id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sighting() {
        let mut store = IntersectionStore::new();
        assert_eq!(
            store.resolve(LabelId(1), false, Time(3.0)),
            LabelIntersection::new(false, 3.0)
        );
        assert_eq!(
            store.resolve(LabelId(2), true, Time(3.0)),
            LabelIntersection::new(true, 0.0)
        );
    }

    #[test]
    fn transition_refreshes_time_and_repeat_preserves_it() {
        let mut store = IntersectionStore::new();
        store.resolve(LabelId(1), false, Time(1.0));
        assert_eq!(
            store.resolve(LabelId(1), false, Time(2.0)),
            LabelIntersection::new(false, 1.0)
        );
        assert_eq!(
            store.resolve(LabelId(1), true, Time(3.0)),
            LabelIntersection::new(true, 3.0)
        );
        assert_eq!(
            store.resolve(LabelId(1), true, Time(4.0)),
            LabelIntersection::new(true, 3.0)
        );
    }

    #[test]
    fn force_hidden_rules() {
        let mut store = IntersectionStore::new();
        assert_eq!(
            store.force_hidden(LabelId(9), Time(5.0)),
            LabelIntersection::new(true, 0.0)
        );

        store.resolve(LabelId(1), false, Time(1.0));
        assert_eq!(
            store.force_hidden(LabelId(1), Time(2.0)),
            LabelIntersection::new(true, 2.0)
        );
        assert_eq!(
            store.force_hidden(LabelId(1), Time(4.0)),
            LabelIntersection::new(true, 2.0)
        );
    }

    #[test]
    fn retain_drops_unlisted_ids() {
        let mut store = IntersectionStore::new();
        store.resolve(LabelId(1), false, Time(1.0));
        store.resolve(LabelId(2), false, Time(1.0));
        let live: FxHashSet<LabelId> = [LabelId(2)].into_iter().collect();
        store.retain_ids(&live);
        assert_eq!(store.len(), 1);
        assert!(store.get(LabelId(1)).is_none());
    }

    #[test]
    fn gpu_form_is_eight_bytes() {
        let gpu = LabelIntersectionGpu::from(LabelIntersection::new(true, 1.5));
        assert_eq!(gpu.hide, 1);
        assert_eq!(std::mem::size_of::<LabelIntersectionGpu>(), 8);
    }
}
