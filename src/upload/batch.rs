//! Batch state
//!
//! An immutable, ordered sequence of items. Every change builds a new
//! sequence; readers holding an older snapshot are never affected.

use super::{ItemId, UploadItem};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BatchState {
    items: Arc<[UploadItem]>,
}

impl Default for BatchState {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::new()),
        }
    }
}

impl BatchState {
    pub fn from_items(items: Vec<UploadItem>) -> Self {
        Self {
            items: Arc::from(items),
        }
    }

    /// Snapshot of the items, in insertion order
    pub fn items(&self) -> Arc<[UploadItem]> {
        Arc::clone(&self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    /// New state with `items` appended
    #[must_use]
    pub fn appended(&self, items: Vec<UploadItem>) -> Self {
        let mut next = Vec::with_capacity(self.items.len() + items.len());
        next.extend(self.items.iter().cloned());
        next.extend(items);
        Self::from_items(next)
    }

    /// New state without `id`, or `None` if it is not tracked
    #[must_use]
    pub fn without(&self, id: ItemId) -> Option<Self> {
        let index = self.position(id)?;
        let mut next = self.items.to_vec();
        next.remove(index);
        Some(Self::from_items(next))
    }

    /// New state with `id` replaced by `f(item)`.
    ///
    /// Returns `None` when the item is gone or `f` declines the change.
    #[must_use]
    pub fn with_item<F>(&self, id: ItemId, f: F) -> Option<(Self, UploadItem)>
    where
        F: FnOnce(&UploadItem) -> Option<UploadItem>,
    {
        let index = self.position(id)?;
        let updated = f(&self.items[index])?;
        let mut next = self.items.to_vec();
        next[index] = updated.clone();
        Some((Self::from_items(next), updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::{ItemStatus, SourceFile};

    fn item(id: u64) -> UploadItem {
        UploadItem::new(
            ItemId(id),
            SourceFile::new(format!("{}.png", id), "image/png", vec![0u8; 4]),
        )
    }

    #[test]
    fn test_append_preserves_order() {
        let state = BatchState::default().appended(vec![item(1), item(2)]);
        let state = state.appended(vec![item(3)]);
        assert_eq!(state.ids(), vec![ItemId(1), ItemId(2), ItemId(3)]);
    }

    #[test]
    fn test_update_does_not_touch_snapshot() {
        let state = BatchState::from_items(vec![item(1), item(2)]);
        let snapshot = state.items();

        let (next, updated) = state
            .with_item(ItemId(2), |it| it.begin().ok())
            .unwrap();

        assert_eq!(updated.status, ItemStatus::Uploading);
        assert_eq!(next.get(ItemId(2)).unwrap().status, ItemStatus::Uploading);
        assert_eq!(snapshot[1].status, ItemStatus::Pending);
    }

    #[test]
    fn test_missing_item_is_noop() {
        let state = BatchState::from_items(vec![item(1)]);
        assert!(state.with_item(ItemId(9), |it| Some(it.clone())).is_none());
        assert!(state.without(ItemId(9)).is_none());
    }

    #[test]
    fn test_without_removes_only_target() {
        let state = BatchState::from_items(vec![item(1), item(2), item(3)]);
        let next = state.without(ItemId(2)).unwrap();
        assert_eq!(next.ids(), vec![ItemId(1), ItemId(3)]);
        assert_eq!(state.len(), 3);
    }
}
