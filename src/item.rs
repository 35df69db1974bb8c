//! item.rs - Adapter over the host's item graph
//!
//! The appraisal core never owns or mutates host items. The integration
//! layer implements [`ItemNode`] once for a cheap handle type (an `Rc`, an
//! `Arc`, an index into an arena) and the algorithms only go through it.

/// Read-only view of one item in the host inventory.
///
/// Handles returned by [`ItemNode::attachments`] and
/// [`ItemNode::stored_items`] may lead back to an item already seen; the
/// graph is not trusted to be acyclic.
pub trait ItemNode {
    /// Identity of this particular item instance
    fn instance_id(&self) -> &str;

    /// Template id used to look up prices
    fn type_id(&self) -> &str;

    fn stack_count(&self) -> i64;

    fn width(&self) -> u32 {
        1
    }

    fn height(&self) -> u32 {
        1
    }

    /// Backpacks, cases, rigs: anything with storage grids
    fn is_container(&self) -> bool {
        false
    }

    /// Attachment-tree children (mods on a weapon, plates in armor)
    fn attachments(&self) -> Vec<Self>
    where
        Self: Sized;

    /// Items stored inside this item's grids
    fn stored_items(&self) -> Vec<Self>
    where
        Self: Sized;
}
