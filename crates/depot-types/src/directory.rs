use serde::{Deserialize, Serialize};

/// A namespace node under which images are organized.
///
/// Directory names are slash-separated paths without a leading slash,
/// e.g. `users/alice`. Creation is idempotent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    pub name: String,
}

impl Directory {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The parent directory name, or `None` for a top-level directory.
    pub fn parent(&self) -> Option<&str> {
        self.name.rsplit_once('/').map(|(parent, _)| parent)
    }
}
