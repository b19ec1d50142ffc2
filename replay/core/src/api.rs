//! Registry of graphics APIs known to a replay session.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of an API, usually derived from its name.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiId(pub u32);

impl fmt::Display for ApiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Api {
    pub id: ApiId,
    pub name: String,
    /// Small index used in replay `Call` instructions.
    pub index: u8,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("api {0} is already registered")]
    DuplicateId(ApiId),

    #[error("an api named '{0}' is already registered")]
    DuplicateName(String),

    #[error("api index {0} is already in use")]
    DuplicateIndex(u8),
}

/// Explicit replacement for global API registration: sessions build one of
/// these and share it through [`GlobalState`](crate::state::GlobalState).
#[derive(Debug, Clone, Default)]
pub struct ApiRegistry {
    apis: Vec<Api>,
    by_id: HashMap<ApiId, usize>,
    by_name: HashMap<String, usize>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, api: Api) -> Result<ApiId, RegistryError> {
        if self.by_id.contains_key(&api.id) {
            return Err(RegistryError::DuplicateId(api.id));
        }
        if self.by_name.contains_key(&api.name) {
            return Err(RegistryError::DuplicateName(api.name));
        }
        if self.apis.iter().any(|a| a.index == api.index) {
            return Err(RegistryError::DuplicateIndex(api.index));
        }
        tracing::debug!(id = %api.id, name = %api.name, index = api.index, "registering api");
        let slot = self.apis.len();
        self.by_id.insert(api.id, slot);
        self.by_name.insert(api.name.clone(), slot);
        let id = api.id;
        self.apis.push(api);
        Ok(id)
    }

    pub fn by_id(&self, id: ApiId) -> Option<&Api> {
        self.by_id.get(&id).map(|&i| &self.apis[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&Api> {
        self.by_name.get(name).map(|&i| &self.apis[i])
    }

    /// Registered APIs in registration order.
    pub fn iter(&self) -> std::slice::Iter<'_, Api> {
        self.apis.iter()
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(id: u32, name: &str, index: u8) -> Api {
        Api {
            id: ApiId(id),
            name: name.into(),
            index,
        }
    }

    #[test]
    fn test_lookup() {
        let mut reg = ApiRegistry::new();
        reg.register(api(1, "gles", 1)).unwrap();
        reg.register(api(2, "vulkan", 2)).unwrap();
        assert_eq!(reg.by_name("vulkan").map(|a| a.id), Some(ApiId(2)));
        assert_eq!(reg.by_id(ApiId(1)).map(|a| a.name.as_str()), Some("gles"));
        assert!(reg.by_id(ApiId(3)).is_none());
        let names: Vec<_> = reg.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, ["gles", "vulkan"]);
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut reg = ApiRegistry::new();
        reg.register(api(1, "gles", 1)).unwrap();
        assert_eq!(
            reg.register(api(1, "other", 2)),
            Err(RegistryError::DuplicateId(ApiId(1)))
        );
        assert_eq!(
            reg.register(api(2, "gles", 2)),
            Err(RegistryError::DuplicateName("gles".into()))
        );
        assert_eq!(
            reg.register(api(2, "vulkan", 1)),
            Err(RegistryError::DuplicateIndex(1))
        );
        assert_eq!(reg.len(), 1);
    }
}
