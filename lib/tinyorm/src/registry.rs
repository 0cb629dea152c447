//! Process-wide cache of table metadata.

use std::any::{Any, TypeId};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::{ConfigError, Entity, TableMeta};

type Entry<T> = Result<Arc<TableMeta<T>>, ConfigError>;

/// Table metadata by mapped type, built on first use.
///
/// Safe to share across threads. A type's metadata is built at most once per
/// registry even under concurrent first use, and a failed build is cached like
/// a successful one.
#[derive(Default)]
pub struct Registry {
    tables: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table<T: Entity>(&self) -> Result<Arc<TableMeta<T>>, ConfigError> {
        let id = TypeId::of::<T>();
        let entry = match self.tables.get(&id) {
            Some(entry) => Arc::clone(entry.value()),
            None => {
                let entry = self.tables.entry(id).or_insert_with(|| {
                    let built: Entry<T> = TableMeta::<T>::describe().map(Arc::new);
                    match &built {
                        Ok(meta) => debug!(
                            type_name = meta.type_name(),
                            table = %meta.name(),
                            columns = meta.column_names().len(),
                            "registered table"
                        ),
                        Err(e) => debug!(
                            type_name = std::any::type_name::<T>(),
                            error = %e,
                            "table registration failed"
                        ),
                    }
                    Arc::new(built)
                });
                Arc::clone(entry.value())
            }
        };

        match entry.downcast_ref::<Entry<T>>() {
            Some(entry) => entry.clone(),
            // Entries are keyed by TypeId, so this never holds another type.
            None => TableMeta::<T>::describe().map(Arc::new),
        }
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("tables", &self.tables.len())
            .finish()
    }
}
