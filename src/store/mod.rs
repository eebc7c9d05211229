//! Remote list store abstraction.
//!
//! The [`ListStore`] trait covers the three operations a reconciliation needs:
//! resolve the list by name, read it completely, and replace it wholesale.

mod cloudflare;

use async_trait::async_trait;

pub use cloudflare::CloudflareListStore;

use crate::error::SyncError;

/// Acknowledgement of a full replace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceConfirmation {
    /// Bulk operation handle, when the store reports one
    pub operation_id: Option<String>,
}

/// Trait for list stores
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Find a list by exact (case-sensitive) name, creating it if absent
    async fn get_or_create_list(&self, name: &str) -> Result<String, SyncError>;

    /// Read every `ip` in the list, never more than the safety ceiling
    /// (`expected_count_hint` when given, otherwise the store default)
    async fn get_all_items(
        &self,
        list_id: &str,
        expected_count_hint: Option<usize>,
    ) -> Result<Vec<String>, SyncError>;

    /// Replace the whole list contents with `items`
    async fn replace_all_items(
        &self,
        list_id: &str,
        items: &[String],
    ) -> Result<ReplaceConfirmation, SyncError>;
}
