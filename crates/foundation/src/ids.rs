use serde::{Deserialize, Serialize};

/// Stable label identity, shared by every tile that carries the same label.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabelId(pub u64);

impl LabelId {
    pub fn new(n: u64) -> Self {
        LabelId(n)
    }
}

impl std::fmt::Display for LabelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "label#{}", self.0)
    }
}
