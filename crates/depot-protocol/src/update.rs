use depot_types::Directory;

use crate::error::ProtocolError;
use crate::message::{ImageUpdate, Operation};

/// A classified update-stream record.
///
/// Wire records ([`ImageUpdate`]) overload `AddImage` with an empty name
/// as the end-of-initial-list sentinel and carry the directory payload as
/// an option. Classification turns those conventions into explicit
/// variants so session dispatch is exhaustive, and turns a `MakeDirectory`
/// record without a payload into a fatal
/// [`ProtocolError::MissingDirectory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Update {
    AddImage { name: String },
    /// The initial full image list has been sent.
    InitialListComplete,
    DeleteImage { name: String },
    MakeDirectory { directory: Directory },
}

impl TryFrom<ImageUpdate> for Update {
    type Error = ProtocolError;

    fn try_from(record: ImageUpdate) -> Result<Self, Self::Error> {
        match record.operation {
            Operation::AddImage if record.name.is_empty() => Ok(Self::InitialListComplete),
            Operation::AddImage => Ok(Self::AddImage { name: record.name }),
            Operation::DeleteImage => Ok(Self::DeleteImage { name: record.name }),
            Operation::MakeDirectory => match record.directory {
                Some(directory) => Ok(Self::MakeDirectory { directory }),
                None => Err(ProtocolError::MissingDirectory),
            },
        }
    }
}
