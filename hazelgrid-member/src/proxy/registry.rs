//! Lookup of map proxies by name.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::map::MapProxy;
use crate::node::NodeEngine;

/// Hands out one shared [`MapProxy`] per map name.
#[derive(Debug)]
pub struct ProxyRegistry {
    engine: Arc<NodeEngine>,
    maps: RwLock<HashMap<String, Arc<MapProxy>>>,
}

impl ProxyRegistry {
    pub(crate) fn new(engine: Arc<NodeEngine>) -> Self {
        Self {
            engine,
            maps: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the proxy for `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<MapProxy> {
        if let Some(proxy) = self
            .maps
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(proxy);
        }
        let mut maps = self.maps.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            maps.entry(name.to_string())
                .or_insert_with(|| Arc::new(MapProxy::new(name, Arc::clone(&self.engine)))),
        )
    }

    /// Returns the number of proxies created so far.
    pub fn len(&self) -> usize {
        self.maps.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no proxy has been created.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
