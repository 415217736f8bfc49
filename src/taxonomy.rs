//! Taxonomies: bidirectional ordinal/name tables.
//!
//! A taxonomy lets a stream carry compact 16-bit ordinals instead of field
//! names; the receiver resolves the same taxonomy id and recovers the names.
//! Taxonomy id 0 always means "no taxonomy".

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};

/// A bidirectional mapping between field names and ordinals.
///
/// The two directions must agree: if `name_for(o)` yields `n`, then
/// `ordinal_for(n)` yields `o` again.
pub trait Taxonomy: Send + Sync {
    /// The field name assigned to `ordinal`, if any.
    fn name_for(&self, ordinal: i16) -> Option<&str>;

    /// The ordinal assigned to `name`, if any.
    fn ordinal_for(&self, name: &str) -> Option<i16>;
}

/// Maps 16-bit taxonomy ids to taxonomies.
///
/// Implementations must return `None` for id 0.
pub trait TaxonomyResolver: Send + Sync {
    fn resolve(&self, taxonomy_id: i16) -> Option<Arc<dyn Taxonomy>>;
}

/// A [`Taxonomy`] backed by a pair of hash maps.
#[derive(Clone, Debug, Default)]
pub struct MapTaxonomy {
    by_ordinal: HashMap<i16, String>,
    by_name: HashMap<String, i16>,
}

impl MapTaxonomy {
    /// Build a taxonomy from (ordinal, name) pairs. Fails if an ordinal or a
    /// name appears twice with different partners, which would make the two
    /// directions disagree.
    pub fn new<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i16, S)>,
        S: Into<String>,
    {
        let mut by_ordinal = HashMap::new();
        let mut by_name = HashMap::new();
        for (ordinal, name) in entries {
            let name = name.into();
            if let Some(prev) = by_ordinal.get(&ordinal) {
                if *prev != name {
                    return Err(Error::AlreadyRegistered(format!(
                        "taxonomy ordinal {} maps to both {:?} and {:?}",
                        ordinal, prev, name
                    )));
                }
                continue;
            }
            if let Some(prev) = by_name.get(&name) {
                return Err(Error::AlreadyRegistered(format!(
                    "taxonomy name {:?} maps to both ordinal {} and {}",
                    name, prev, ordinal
                )));
            }
            by_name.insert(name.clone(), ordinal);
            by_ordinal.insert(ordinal, name);
        }
        Ok(MapTaxonomy {
            by_ordinal,
            by_name,
        })
    }

    pub fn len(&self) -> usize {
        self.by_ordinal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ordinal.is_empty()
    }
}

impl Taxonomy for MapTaxonomy {
    fn name_for(&self, ordinal: i16) -> Option<&str> {
        self.by_ordinal.get(&ordinal).map(String::as_str)
    }

    fn ordinal_for(&self, name: &str) -> Option<i16> {
        self.by_name.get(name).copied()
    }
}

/// A [`TaxonomyResolver`] backed by a hash map of taxonomies.
#[derive(Clone, Default)]
pub struct MapResolver {
    taxonomies: HashMap<i16, Arc<dyn Taxonomy>>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a taxonomy under `id`. Id 0 is reserved for "no taxonomy";
    /// duplicate ids fail.
    pub fn register(&mut self, id: i16, taxonomy: Arc<dyn Taxonomy>) -> Result<()> {
        if id == 0 {
            return Err(Error::AlreadyRegistered(
                "taxonomy id 0 is reserved for \"no taxonomy\"".to_string(),
            ));
        }
        if self.taxonomies.contains_key(&id) {
            return Err(Error::AlreadyRegistered(format!(
                "taxonomy id {} registered twice",
                id
            )));
        }
        debug!(taxonomy_id = id, "registered taxonomy");
        self.taxonomies.insert(id, taxonomy);
        Ok(())
    }
}

impl TaxonomyResolver for MapResolver {
    fn resolve(&self, taxonomy_id: i16) -> Option<Arc<dyn Taxonomy>> {
        if taxonomy_id == 0 {
            return None;
        }
        self.taxonomies.get(&taxonomy_id).cloned()
    }
}

/// The resolver used when no taxonomies are configured: resolves nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoResolver;

impl TaxonomyResolver for NoResolver {
    fn resolve(&self, _taxonomy_id: i16) -> Option<Arc<dyn Taxonomy>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn both_directions_agree() {
        let tax = MapTaxonomy::new([(1, "price"), (2, "size")]).unwrap();
        assert_eq!(tax.name_for(1), Some("price"));
        assert_eq!(tax.ordinal_for("price"), Some(1));
        assert_eq!(tax.name_for(3), None);
        assert_eq!(tax.ordinal_for("side"), None);
    }

    #[test]
    fn conflicting_entries_rejected() {
        assert_matches!(
            MapTaxonomy::new([(1, "price"), (1, "size")]),
            Err(Error::AlreadyRegistered(_))
        );
        assert_matches!(
            MapTaxonomy::new([(1, "price"), (2, "price")]),
            Err(Error::AlreadyRegistered(_))
        );
        // An exact duplicate pair is harmless.
        assert!(MapTaxonomy::new([(1, "price"), (1, "price")]).is_ok());
    }

    #[test]
    fn resolver_never_resolves_zero() {
        let mut resolver = MapResolver::new();
        let tax = Arc::new(MapTaxonomy::new([(1, "price")]).unwrap());
        resolver.register(1, tax).unwrap();
        assert!(resolver.resolve(1).is_some());
        assert!(resolver.resolve(0).is_none());
        assert!(resolver.resolve(2).is_none());
        assert_matches!(
            resolver.register(0, Arc::new(MapTaxonomy::default())),
            Err(Error::AlreadyRegistered(_))
        );
    }
}
