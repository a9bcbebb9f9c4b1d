use crate::common::RoleEntry;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Storage for login roles
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Get a copy of a role, taken under the read lock
    async fn get_role(&self, name: &str) -> Option<RoleEntry>;

    /// Create or replace a role
    async fn set_role(&self, name: &str, entry: RoleEntry);

    /// Names of all configured roles
    async fn role_names(&self) -> Vec<String>;
}

/// Default implementation of RoleStore
#[derive(Clone)]
pub struct DefaultRoleStore {
    roles: Arc<RwLock<HashMap<String, RoleEntry>>>,
}

impl DefaultRoleStore {
    pub fn new() -> Self {
        Self {
            roles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn from_roles(roles: HashMap<String, RoleEntry>) -> Self {
        Self {
            roles: Arc::new(RwLock::new(roles)),
        }
    }
}

#[async_trait]
impl RoleStore for DefaultRoleStore {
    async fn get_role(&self, name: &str) -> Option<RoleEntry> {
        let roles = self.roles.read().await;
        roles.get(name).cloned()
    }

    async fn set_role(&self, name: &str, entry: RoleEntry) {
        let mut roles = self.roles.write().await;
        roles.insert(name.to_string(), entry);
        info!("Role stored: {}", name);
    }

    async fn role_names(&self) -> Vec<String> {
        let roles = self.roles.read().await;
        let mut names: Vec<String> = roles.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for DefaultRoleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AuthType;

    #[tokio::test]
    async fn test_role_lifecycle() {
        let store = DefaultRoleStore::new();
        assert!(store.get_role("dev").await.is_none());

        let entry = RoleEntry {
            auth_type: AuthType::Iam,
            bound_iam_principal_arn: vec!["arn:aws:iam::123456789012:role/Dev".to_string()],
        };
        store.set_role("dev", entry.clone()).await;
        assert_eq!(store.get_role("dev").await, Some(entry));

        let replaced = RoleEntry {
            auth_type: AuthType::Ec2,
            bound_iam_principal_arn: Vec::new(),
        };
        store.set_role("dev", replaced.clone()).await;
        assert_eq!(store.get_role("dev").await, Some(replaced));
        assert_eq!(store.role_names().await, vec!["dev".to_string()]);
    }

    #[tokio::test]
    async fn test_get_role_returns_a_copy() {
        let store = DefaultRoleStore::new();
        store.set_role("dev", RoleEntry::default()).await;

        let mut copy = store.get_role("dev").await.unwrap();
        copy.bound_iam_principal_arn.push("arn:aws:iam::1:role/x".to_string());

        assert!(store
            .get_role("dev")
            .await
            .unwrap()
            .bound_iam_principal_arn
            .is_empty());
    }
}
