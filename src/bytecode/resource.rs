use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A constant or name stored in a module's resource table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resource {
    /// The "no value" singleton.
    None,
    Integer(i32),
    String(Vec<u8>),
    Identifier(Vec<u8>),
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::None => write!(f, "none"),
            Resource::Integer(n) => write!(f, "{}", n),
            Resource::String(s) => write!(f, "{:?}", String::from_utf8_lossy(s)),
            Resource::Identifier(name) => write!(f, "{}", String::from_utf8_lossy(name)),
        }
    }
}

/// Interning table handing out small stable ids.
///
/// Interning an equal value twice returns the same id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Resource>", into = "Vec<Resource>")]
pub struct ResourcePool {
    items: Vec<Resource>,
    index: HashMap<Resource, u32>,
}

impl From<Vec<Resource>> for ResourcePool {
    fn from(items: Vec<Resource>) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(i, r)| (r.clone(), i as u32))
            .collect();
        Self { items, index }
    }
}

impl From<ResourcePool> for Vec<Resource> {
    fn from(pool: ResourcePool) -> Self {
        pool.items
    }
}

impl ResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, resource: Resource) -> u32 {
        if let Some(&id) = self.index.get(&resource) {
            return id;
        }
        let id = self.items.len() as u32;
        self.items.push(resource.clone());
        self.index.insert(resource, id);
        id
    }

    pub fn intern_string(&mut self, bytes: &[u8]) -> u32 {
        self.intern(Resource::String(bytes.to_vec()))
    }

    pub fn intern_integer(&mut self, value: i32) -> u32 {
        self.intern(Resource::Integer(value))
    }

    pub fn intern_identifier(&mut self, name: &[u8]) -> u32 {
        self.intern(Resource::Identifier(name.to_vec()))
    }

    pub fn intern_none(&mut self) -> u32 {
        self.intern(Resource::None)
    }

    /// Id of an already interned identifier.
    pub fn find_identifier(&self, name: &[u8]) -> Option<u32> {
        self.index
            .get(&Resource::Identifier(name.to_vec()))
            .copied()
    }

    pub fn get(&self, id: u32) -> Option<&Resource> {
        self.items.get(id as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Resource)> {
        self.items.iter().enumerate().map(|(i, r)| (i as u32, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_reused() {
        let mut pool = ResourcePool::new();
        let a = pool.intern_integer(7);
        let b = pool.intern_string(b"7");
        let c = pool.intern_integer(7);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_identifier_and_string_are_distinct() {
        let mut pool = ResourcePool::new();
        let s = pool.intern_string(b"arg");
        let i = pool.intern_identifier(b"arg");
        assert_ne!(s, i);
        assert_eq!(pool.get(i), Some(&Resource::Identifier(b"arg".to_vec())));
    }

    #[test]
    fn test_none_is_a_singleton() {
        let mut pool = ResourcePool::new();
        let first = pool.intern_none();
        pool.intern_integer(0);
        assert_eq!(pool.intern_none(), first);
        assert_eq!(pool.get(first), Some(&Resource::None));
    }

    #[test]
    fn test_rebuilt_pool_keeps_ids() {
        let mut pool = ResourcePool::new();
        let id = pool.intern_string(b"x");
        pool.intern_none();
        let items: Vec<Resource> = pool.into();
        let mut rebuilt = ResourcePool::from(items);
        assert_eq!(rebuilt.intern_string(b"x"), id);
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(Resource::String(b"hi\n".to_vec()).to_string(), "\"hi\\n\"");
        assert_eq!(Resource::Integer(-1).to_string(), "-1");
        assert_eq!(Resource::Identifier(b"a".to_vec()).to_string(), "a");
    }
}
