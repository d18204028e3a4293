//! Translation of raw backend events into change signals.

use notify::EventKind;
use notify::event::ModifyKind;

use crate::error::WatchError;

/// Kind of change the backend reported for the watched directory.
///
/// Only used to decide whether a raw event changes the directory's contents
/// and for debug logging. Consumers are never told which kind occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// An entry was added.
    Created,

    /// An entry was removed.
    Removed,

    /// An entry was renamed or moved in or out of the directory.
    Renamed,

    /// An entry's data was written.
    Written,

    /// The backend reported a modification without saying what kind.
    Unspecified,
}

impl ChangeKind {
    /// Classify a raw event kind. Returns `None` for access-only and
    /// metadata-only events, which leave the directory's contents untouched.
    pub fn classify(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::Create(_) => Some(Self::Created),
            EventKind::Remove(_) => Some(Self::Removed),
            EventKind::Modify(modify_kind) => match modify_kind {
                ModifyKind::Name(_) => Some(Self::Renamed),
                ModifyKind::Data(_) => Some(Self::Written),
                ModifyKind::Metadata(_) => None,
                ModifyKind::Any | ModifyKind::Other => Some(Self::Unspecified),
            },
            EventKind::Access(_) => None,
            EventKind::Any | EventKind::Other => Some(Self::Unspecified),
        }
    }
}

/// Message passed from the detection context to the delivery thread.
#[derive(Debug)]
pub(crate) enum Signal {
    /// The directory's contents changed.
    Changed,

    /// The backend reported an error while watching.
    Failed(WatchError),

    /// The session ended; the delivery thread should exit.
    Shutdown,
}

impl Signal {
    /// Translate one raw backend notification into at most one signal.
    pub(crate) fn from_raw(res: notify::Result<notify::Event>) -> Option<Self> {
        match res {
            Ok(event) => ChangeKind::classify(event.kind).map(|_| Self::Changed),
            Err(e) => Some(Self::Failed(WatchError::Backend(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{
        AccessKind, AccessMode, CreateKind, DataChange, MetadataKind, RemoveKind, RenameMode,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_write_class_kinds() {
        assert_eq!(
            ChangeKind::classify(EventKind::Create(CreateKind::File)),
            Some(ChangeKind::Created)
        );
        assert_eq!(
            ChangeKind::classify(EventKind::Remove(RemoveKind::Any)),
            Some(ChangeKind::Removed)
        );
        assert_eq!(
            ChangeKind::classify(EventKind::Modify(ModifyKind::Name(RenameMode::Both))),
            Some(ChangeKind::Renamed)
        );
        assert_eq!(
            ChangeKind::classify(EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(ChangeKind::Written)
        );
        assert_eq!(
            ChangeKind::classify(EventKind::Any),
            Some(ChangeKind::Unspecified)
        );
    }

    #[test]
    fn test_access_and_metadata_are_ignored() {
        assert_eq!(
            ChangeKind::classify(EventKind::Access(AccessKind::Close(AccessMode::Write))),
            None
        );
        assert_eq!(
            ChangeKind::classify(EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::Permissions
            ))),
            None
        );
    }

    #[test]
    fn test_signal_translation() {
        let created = notify::Event::new(EventKind::Create(CreateKind::File));
        assert!(matches!(
            Signal::from_raw(Ok(created)),
            Some(Signal::Changed)
        ));

        let opened = notify::Event::new(EventKind::Access(AccessKind::Open(AccessMode::Read)));
        assert!(Signal::from_raw(Ok(opened)).is_none());

        let failed = Signal::from_raw(Err(notify::Error::generic("queue overflow")));
        assert!(matches!(
            failed,
            Some(Signal::Failed(WatchError::Backend(_)))
        ));
    }
}
