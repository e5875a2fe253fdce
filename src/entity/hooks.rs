//! Life-cycle events.

use std::fmt;

use super::Model;
use crate::error::OrmResult;

/// A life-cycle hook. Returning an error from a `*ing` hook aborts the
/// operation before any SQL is issued.
pub type Hook = fn(&mut Model) -> OrmResult<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    Saving,
    Saved,
    Creating,
    Created,
    Updating,
    Updated,
    Deleting,
    Deleted,
    Restoring,
    Restored,
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelEvent::Saving => "saving",
            ModelEvent::Saved => "saved",
            ModelEvent::Creating => "creating",
            ModelEvent::Created => "created",
            ModelEvent::Updating => "updating",
            ModelEvent::Updated => "updated",
            ModelEvent::Deleting => "deleting",
            ModelEvent::Deleted => "deleted",
            ModelEvent::Restoring => "restoring",
            ModelEvent::Restored => "restored",
        };
        f.write_str(name)
    }
}
