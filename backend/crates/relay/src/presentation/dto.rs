//! API DTOs (Data Transfer Objects)

use kernel::MessageId;
use serde::{Deserialize, Serialize};

/// Part stored / message accepted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message_id: MessageId,
}
