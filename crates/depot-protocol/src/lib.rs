//! Wire protocol for depot replication.
//!
//! Defines the records exchanged between an upstream image server and a
//! downstream replica: the long-lived update stream
//! ([`ImageUpdate`] records, classified into the [`Update`] sum type),
//! the image and object RPC request/response pairs, and the
//! length-framed [`DepotCodec`] used to put them on the wire.
//!
//! The transport that carries these frames (dialing, authentication) is
//! outside this crate; so is the server side.

pub mod codec;
pub mod error;
pub mod message;
pub mod update;

pub use codec::DepotCodec;
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    AddObjectResult, AddObjectsRequest, AddObjectsResponse, CheckObjectsRequest,
    CheckObjectsResponse, DepotMessage, GetImageExpirationRequest, GetImageExpirationResponse,
    GetImageRequest, GetImageResponse, GetObjectsRequest, GetObjectsResponse, ImageUpdate,
    ObjectPayload, Operation, UpdateStreamRequest, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
pub use update::Update;
