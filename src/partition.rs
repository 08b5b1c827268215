//! Batch partitioning into platform-sized groups

use crate::types::MediaItem;

/// Most items the platform accepts in one media group
pub const MAX_GROUP_SIZE: usize = 10;

/// A contiguous slice of the batch delivered as one logical unit
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Group<'a> {
    /// Index of the group within the batch
    pub index: usize,
    /// Batch position of the first item
    pub offset: usize,
    /// Items in submission order
    pub items: &'a [MediaItem],
}

impl<'a> Group<'a> {
    /// Batch positions covered by the group
    pub fn positions(&self) -> Vec<usize> {
        (self.offset..self.offset + self.items.len()).collect()
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the group holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split `items` into consecutive groups of at most `max` items
///
/// Concatenating the groups reproduces `items` exactly. An empty batch yields no
/// groups; a `max` of zero is treated as one.
pub fn partition(items: &[MediaItem], max: usize) -> Vec<Group<'_>> {
    let size = max.max(1);
    items
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| Group {
            index,
            offset: index * size,
            items: chunk,
        })
        .collect()
}
