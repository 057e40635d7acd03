use std::sync::{Arc, RwLock};

use super::schema::Schema;

/// Holds the current schema snapshot and swaps it atomically on refresh.
/// Readers clone the `Arc` and never block on a refresh in progress; the
/// lock is only held for the pointer copy.
#[derive(Debug)]
pub struct SchemaRegistry {
    current: RwLock<Arc<Schema>>,
}

impl SchemaRegistry {
    pub fn new(schema: Schema) -> Self {
        SchemaRegistry {
            current: RwLock::new(Arc::new(schema)),
        }
    }

    pub fn snapshot(&self) -> Arc<Schema> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            // A poisoned lock still holds a valid snapshot.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, schema: Schema) {
        let next = Arc::new(schema);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
