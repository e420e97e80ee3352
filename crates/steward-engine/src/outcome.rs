use serde::{Deserialize, Serialize};
use steward_store::Loaded;

/// Result of an engine call plus any recovery warnings raised while
/// loading the state it touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub value: T,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        Outcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }

    /// Move this outcome's warnings into `sink` and return the value.
    pub fn drain_into(self, sink: &mut Vec<String>) -> T {
        sink.extend(self.warnings);
        self.value
    }
}

impl<T> From<Loaded<T>> for Outcome<T> {
    fn from(loaded: Loaded<T>) -> Self {
        Self {
            value: loaded.data,
            warnings: loaded.warning.into_iter().collect(),
        }
    }
}
