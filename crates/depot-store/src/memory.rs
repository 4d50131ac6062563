use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};
use std::sync::{Arc, RwLock};

use depot_types::Digest;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{AddObjectOutcome, AddObjectRequest, ObjectStore, ObjectsReader};

/// In-memory, `HashMap`-based object store.
///
/// Intended for tests, replicas with small working sets, and embedding.
/// Bodies are held behind `Arc` so readers never copy blob content.
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<Digest, Arc<[u8]>>>,
}

impl InMemoryObjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
        }
    }

    /// Sorted list of all stored digests.
    pub fn all_digests(&self) -> Vec<Digest> {
        let map = self.objects.read().expect("lock poisoned");
        let mut digests: Vec<Digest> = map.keys().copied().collect();
        digests.sort();
        digests
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn add_objects(&self, requests: Vec<AddObjectRequest>) -> StoreResult<Vec<AddObjectOutcome>> {
        let mut map = self.objects.write().expect("lock poisoned");
        let mut outcomes = Vec::with_capacity(requests.len());
        for request in requests {
            let computed = Digest::of(&request.data);
            if let Some(expected) = request.expected {
                if expected != computed {
                    debug!(%expected, %computed, "rejecting corrupt object");
                    outcomes.push(AddObjectOutcome::Corrupt { expected, computed });
                    continue;
                }
            }
            if map.contains_key(&computed) {
                outcomes.push(AddObjectOutcome::Present(computed));
            } else {
                map.insert(computed, Arc::from(request.data));
                outcomes.push(AddObjectOutcome::Stored(computed));
            }
        }
        Ok(outcomes)
    }

    fn check_objects(&self, digests: &[Digest]) -> StoreResult<Vec<bool>> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(digests.iter().map(|d| map.contains_key(d)).collect())
    }

    fn get_objects(&self, digests: &[Digest]) -> StoreResult<Box<dyn ObjectsReader>> {
        let map = self.objects.read().expect("lock poisoned");
        let mut bodies = VecDeque::with_capacity(digests.len());
        for digest in digests {
            match map.get(digest) {
                Some(body) => bodies.push_back(Arc::clone(body)),
                None => return Err(StoreError::NotFound(*digest)),
            }
        }
        Ok(Box::new(InMemoryObjectsReader {
            bodies,
            current: Arc::from(Vec::new()),
        }))
    }

    fn delete_object(&self, digest: &Digest) -> StoreResult<bool> {
        let mut map = self.objects.write().expect("lock poisoned");
        Ok(map.remove(digest).is_some())
    }

    fn object_count(&self) -> StoreResult<u64> {
        Ok(self.objects.read().expect("lock poisoned").len() as u64)
    }

    fn total_bytes(&self) -> StoreResult<u64> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.values().map(|body| body.len() as u64).sum())
    }
}

/// Reader over bodies captured at `get_objects` time. The `Arc` bodies are
/// shared with the store, so no content is copied.
struct InMemoryObjectsReader {
    bodies: VecDeque<Arc<[u8]>>,
    current: Arc<[u8]>,
}

impl ObjectsReader for InMemoryObjectsReader {
    fn next_object(&mut self) -> StoreResult<(u64, Box<dyn Read + Send + '_>)> {
        let body = self.bodies.pop_front().ok_or(StoreError::ReaderExhausted)?;
        let size = body.len() as u64;
        self.current = body;
        Ok((size, Box::new(Cursor::new(self.current.as_ref()))))
    }

    fn remaining(&self) -> usize {
        self.bodies.len()
    }
}
