//! Role ARN history
//!
//! Bounded most-recently-used list of previously assumed roles, persisted
//! in the durable store. Unique by ARN; overflow evicts the least recently
//! used entry.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::store::{KeyValueStore, keys};

use super::errors::FederationError;

pub const DEFAULT_HISTORY_MAX: usize = 10;

/// One remembered role
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleHistoryItem {
    pub arn: String,
    pub role_name: String,
    pub account_id: String,
    /// Last use time (epoch milliseconds)
    pub last_used: i64,
    pub use_count: u32,
}

/// Parsed components of an IAM role ARN
struct RoleArnParts {
    account_id: String,
    role_name: String,
}

/// Validate `arn:{partition}:iam::{account}:role/{path}` shape
fn parse_role_arn(arn: &str) -> Option<RoleArnParts> {
    let mut parts = arn.splitn(6, ':');
    let prefix = parts.next()?;
    let partition = parts.next()?;
    let service = parts.next()?;
    let region = parts.next()?;
    let account = parts.next()?;
    let resource = parts.next()?;

    if prefix != "arn" || service != "iam" || !region.is_empty() {
        return None;
    }
    if partition.is_empty()
        || !partition
            .chars()
            .all(|c| c.is_ascii_lowercase() || c == '-')
    {
        return None;
    }
    if account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let path = resource.strip_prefix("role/")?;
    let role_name = path.rsplit('/').next()?;
    if role_name.is_empty() {
        return None;
    }

    Some(RoleArnParts {
        account_id: account.to_string(),
        role_name: role_name.to_string(),
    })
}

pub struct RoleHistory {
    store: Arc<dyn KeyValueStore>,
    max: usize,
}

impl RoleHistory {
    pub fn new(store: Arc<dyn KeyValueStore>, max: usize) -> Self {
        Self {
            store,
            max: max.max(1),
        }
    }

    fn load(&self) -> Result<Vec<RoleHistoryItem>, FederationError> {
        let Some(raw) = self.store.get(keys::ROLE_HISTORY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!("Role history is undecodable ({}), resetting", e);
                self.store.remove(keys::ROLE_HISTORY)?;
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, items: &[RoleHistoryItem]) -> Result<(), FederationError> {
        let raw = serde_json::to_string(items).map_err(crate::error::StorageError::from)?;
        self.store.set(keys::ROLE_HISTORY, &raw)?;
        Ok(())
    }

    /// Record a role use. Invalid ARNs are rejected without mutation;
    /// an existing entry moves to the front with its count incremented.
    pub fn add_role_arn(&self, arn: &str) -> Result<RoleHistoryItem, FederationError> {
        let parts =
            parse_role_arn(arn).ok_or_else(|| FederationError::InvalidRoleArn(arn.to_string()))?;

        let mut items = self.load()?;
        let now = Utc::now().timestamp_millis();

        let item = match items.iter().position(|i| i.arn == arn) {
            Some(pos) => {
                let mut existing = items.remove(pos);
                existing.use_count += 1;
                existing.last_used = now;
                existing
            }
            None => RoleHistoryItem {
                arn: arn.to_string(),
                role_name: parts.role_name,
                account_id: parts.account_id,
                last_used: now,
                use_count: 1,
            },
        };

        items.insert(0, item.clone());
        items.truncate(self.max);
        self.save(&items)?;
        Ok(item)
    }

    /// All remembered roles, most recently used first
    pub fn list(&self) -> Result<Vec<RoleHistoryItem>, FederationError> {
        self.load()
    }

    /// Look up one entry by ARN
    pub fn get(&self, arn: &str) -> Result<Option<RoleHistoryItem>, FederationError> {
        Ok(self.load()?.into_iter().find(|i| i.arn == arn))
    }

    /// Remove an entry; returns whether it existed
    pub fn remove(&self, arn: &str) -> Result<bool, FederationError> {
        let mut items = self.load()?;
        let before = items.len();
        items.retain(|i| i.arn != arn);
        let removed = items.len() != before;
        if removed {
            self.save(&items)?;
        }
        Ok(removed)
    }

    /// Merge imported entries by ARN (counts summed, recency maximized),
    /// re-sort by recency and re-trim. Entries with invalid ARNs are
    /// skipped. Returns the number of entries merged in.
    pub fn import(&self, imported: Vec<RoleHistoryItem>) -> Result<usize, FederationError> {
        let mut items = self.load()?;
        let mut merged = 0usize;

        for entry in imported {
            if parse_role_arn(&entry.arn).is_none() {
                tracing::warn!("Skipping history import entry with invalid ARN: {}", entry.arn);
                continue;
            }
            match items.iter_mut().find(|i| i.arn == entry.arn) {
                Some(existing) => {
                    existing.use_count += entry.use_count;
                    existing.last_used = existing.last_used.max(entry.last_used);
                }
                None => items.push(entry),
            }
            merged += 1;
        }

        items.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        items.truncate(self.max);
        self.save(&items)?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const ARN: &str = "arn:aws:iam::123456789012:role/MyRole";

    fn history() -> RoleHistory {
        RoleHistory::new(MemoryStore::shared(), DEFAULT_HISTORY_MAX)
    }

    #[test]
    fn test_add_new_role() {
        let history = history();
        let item = history.add_role_arn(ARN).unwrap();
        assert_eq!(item.role_name, "MyRole");
        assert_eq!(item.account_id, "123456789012");
        assert_eq!(item.use_count, 1);
        assert_eq!(history.list().unwrap().len(), 1);
    }

    #[test]
    fn test_add_twice_increments_and_stays_front() {
        let history = history();
        history.add_role_arn(ARN).unwrap();
        history
            .add_role_arn("arn:aws:iam::123456789012:role/Other")
            .unwrap();
        history.add_role_arn(ARN).unwrap();

        let items = history.list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].arn, ARN);
        assert_eq!(items[0].use_count, 2);
        assert_eq!(items[1].use_count, 1);
    }

    #[test]
    fn test_invalid_arn_rejected_without_mutation() {
        let history = history();
        history.add_role_arn(ARN).unwrap();

        let err = history.add_role_arn("not-an-arn").unwrap_err();
        assert!(matches!(err, FederationError::InvalidRoleArn(_)));
        assert_eq!(history.list().unwrap().len(), 1);
    }

    #[test]
    fn test_overflow_evicts_least_recent() {
        let history = RoleHistory::new(MemoryStore::shared(), 3);
        for i in 0..4 {
            history
                .add_role_arn(&format!("arn:aws:iam::123456789012:role/Role{i}"))
                .unwrap();
        }
        let items = history.list().unwrap();
        assert_eq!(items.len(), 3);
        // Role0 was the oldest and is gone
        assert!(items.iter().all(|i| i.role_name != "Role0"));
        assert_eq!(items[0].role_name, "Role3");
    }

    #[test]
    fn test_get_and_remove() {
        let history = history();
        history.add_role_arn(ARN).unwrap();
        assert!(history.get(ARN).unwrap().is_some());
        assert!(history.remove(ARN).unwrap());
        assert!(history.get(ARN).unwrap().is_none());
        assert!(!history.remove(ARN).unwrap());
    }

    #[test]
    fn test_import_merges_by_arn() {
        let history = history();
        history.add_role_arn(ARN).unwrap();
        let existing = history.get(ARN).unwrap().unwrap();

        let merged = history
            .import(vec![
                RoleHistoryItem {
                    arn: ARN.to_string(),
                    role_name: "MyRole".to_string(),
                    account_id: "123456789012".to_string(),
                    last_used: existing.last_used + 5000,
                    use_count: 4,
                },
                RoleHistoryItem {
                    arn: "arn:aws:iam::999999999999:role/Imported".to_string(),
                    role_name: "Imported".to_string(),
                    account_id: "999999999999".to_string(),
                    last_used: 1,
                    use_count: 2,
                },
                RoleHistoryItem {
                    arn: "bogus".to_string(),
                    role_name: "x".to_string(),
                    account_id: "0".to_string(),
                    last_used: 1,
                    use_count: 1,
                },
            ])
            .unwrap();

        // The bogus entry was skipped
        assert_eq!(merged, 2);
        let items = history.list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].arn, ARN);
        assert_eq!(items[0].use_count, 5);
        assert_eq!(items[1].role_name, "Imported");
    }

    #[test]
    fn test_corrupted_history_resets() {
        let store = MemoryStore::shared();
        store.set(keys::ROLE_HISTORY, "{nope").unwrap();
        let history = RoleHistory::new(store, DEFAULT_HISTORY_MAX);
        assert!(history.list().unwrap().is_empty());
    }

    #[test]
    fn test_parse_role_arn_accepts_paths_and_partitions() {
        let parts =
            parse_role_arn("arn:aws-us-gov:iam::123456789012:role/path/to/Admin").unwrap();
        assert_eq!(parts.role_name, "Admin");
        assert_eq!(parts.account_id, "123456789012");
    }

    #[test]
    fn test_parse_role_arn_rejects_bad_shapes() {
        // Wrong service
        assert!(parse_role_arn("arn:aws:s3::123456789012:role/X").is_none());
        // Region must be empty for IAM
        assert!(parse_role_arn("arn:aws:iam:us-east-1:123456789012:role/X").is_none());
        // Account must be 12 digits
        assert!(parse_role_arn("arn:aws:iam::12345:role/X").is_none());
        assert!(parse_role_arn("arn:aws:iam::12345678901a:role/X").is_none());
        // Resource must be a role
        assert!(parse_role_arn("arn:aws:iam::123456789012:user/X").is_none());
        // Empty role name
        assert!(parse_role_arn("arn:aws:iam::123456789012:role/").is_none());
    }
}
