use std::time::Duration;

use chrono::{DateTime, Utc};
use depot_types::{Digest, Directory, Image};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// Update operations carried on the replication stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    AddImage,
    DeleteImage,
    MakeDirectory,
}

/// One record on the long-lived update stream.
///
/// An `AddImage` record with an empty name is the sentinel marking the end
/// of the initial full image list. See [`Update`](crate::Update) for the
/// classified form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUpdate {
    pub operation: Operation,
    pub name: String,
    pub directory: Option<Directory>,
}

impl ImageUpdate {
    pub fn add_image(name: impl Into<String>) -> Self {
        Self {
            operation: Operation::AddImage,
            name: name.into(),
            directory: None,
        }
    }

    /// The end-of-initial-list sentinel.
    pub fn initial_list_complete() -> Self {
        Self::add_image("")
    }

    pub fn delete_image(name: impl Into<String>) -> Self {
        Self {
            operation: Operation::DeleteImage,
            name: name.into(),
            directory: None,
        }
    }

    pub fn make_directory(directory: Directory) -> Self {
        Self {
            operation: Operation::MakeDirectory,
            name: String::new(),
            directory: Some(directory),
        }
    }
}

/// Opens the update stream. `ignore_expiring` asks the upstream to omit
/// expiring images entirely (archive mode).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStreamRequest {
    pub ignore_expiring: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetImageRequest {
    pub name: String,
    pub timeout: Duration,
    /// Skip the filesystem tree in the reply if the image is expiring;
    /// used by archivers that will discard such images anyway.
    pub ignore_filesystem_if_expiring: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetImageResponse {
    pub image: Option<Image>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetImageExpirationRequest {
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetImageExpirationResponse {
    /// `None` means the image never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// One blob to add, with the digest the content is expected to hash to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPayload {
    pub data: Vec<u8>,
    pub expected_digest: Option<Digest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddObjectsRequest {
    pub objects: Vec<ObjectPayload>,
}

/// Per-object result of an add batch, in request order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddObjectResult {
    Added(Digest),
    AlreadyPresent(Digest),
    Rejected { expected: Digest, computed: Digest },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddObjectsResponse {
    pub results: Vec<AddObjectResult>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckObjectsRequest {
    pub digests: Vec<Digest>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckObjectsResponse {
    pub present: Vec<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectsRequest {
    pub digests: Vec<Digest>,
}

/// Sizes of the requested objects, in request order. The bodies follow as
/// one [`DepotMessage::ObjectData`] frame per object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetObjectsResponse {
    pub sizes: Vec<u64>,
}

/// Envelope over every message in the depot protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepotMessage {
    UpdateStreamRequest(UpdateStreamRequest),
    ImageUpdate(ImageUpdate),
    GetImageRequest(GetImageRequest),
    GetImageResponse(GetImageResponse),
    GetImageExpirationRequest(GetImageExpirationRequest),
    GetImageExpirationResponse(GetImageExpirationResponse),
    AddObjectsRequest(AddObjectsRequest),
    AddObjectsResponse(AddObjectsResponse),
    CheckObjectsRequest(CheckObjectsRequest),
    CheckObjectsResponse(CheckObjectsResponse),
    GetObjectsRequest(GetObjectsRequest),
    GetObjectsResponse(GetObjectsResponse),
    ObjectData { data: Vec<u8> },
    Error { code: u32, message: String },
}

impl DepotMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::UpdateStreamRequest(_) => 1,
            Self::ImageUpdate(_) => 2,
            Self::GetImageRequest(_) => 3,
            Self::GetImageResponse(_) => 4,
            Self::GetImageExpirationRequest(_) => 5,
            Self::GetImageExpirationResponse(_) => 6,
            Self::AddObjectsRequest(_) => 7,
            Self::AddObjectsResponse(_) => 8,
            Self::CheckObjectsRequest(_) => 9,
            Self::CheckObjectsResponse(_) => 10,
            Self::GetObjectsRequest(_) => 11,
            Self::GetObjectsResponse(_) => 12,
            Self::ObjectData { .. } => 13,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UpdateStreamRequest(_) => "UpdateStreamRequest",
            Self::ImageUpdate(_) => "ImageUpdate",
            Self::GetImageRequest(_) => "GetImageRequest",
            Self::GetImageResponse(_) => "GetImageResponse",
            Self::GetImageExpirationRequest(_) => "GetImageExpirationRequest",
            Self::GetImageExpirationResponse(_) => "GetImageExpirationResponse",
            Self::AddObjectsRequest(_) => "AddObjectsRequest",
            Self::AddObjectsResponse(_) => "AddObjectsResponse",
            Self::CheckObjectsRequest(_) => "CheckObjectsRequest",
            Self::CheckObjectsResponse(_) => "CheckObjectsResponse",
            Self::GetObjectsRequest(_) => "GetObjectsRequest",
            Self::GetObjectsResponse(_) => "GetObjectsResponse",
            Self::ObjectData { .. } => "ObjectData",
            Self::Error { .. } => "Error",
        }
    }
}
