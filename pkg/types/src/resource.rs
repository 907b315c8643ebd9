use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Something that can be exclusively held.
/// Stored at `/registry/resources/<id>`; immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    pub id: Uuid,
    /// Type tag, e.g. "bed" or "operating-room"
    #[serde(rename = "type")]
    pub kind: String,
    /// Caller-supplied external id, unique within `kind`
    pub identifier: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResourceRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub identifier: String,
}
