//! API DTOs (Data Transfer Objects)
//!
//! Shared by the inbound handlers and by the outbound peer client, so every
//! type here derives both directions.

use crate::domain::entities::Ticket;
use pow::ProofOfWork;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Ticket request
// ============================================================================

/// Ticket request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    /// Sender address hash
    pub from: String,
    /// Recipient address hash
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    /// Ticket being resumed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<Uuid>,
    /// Solution to the ticket's challenge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<u64>,
}

/// Challenge the sender must solve before uploading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDto {
    pub bits: u8,
    /// Base64 challenge bytes
    pub challenge: String,
    pub expires_at_ms: i64,
}

impl From<&ProofOfWork> for ChallengeDto {
    fn from(pow: &ProofOfWork) -> Self {
        Self {
            bits: pow.bits,
            challenge: pow.challenge_b64(),
            expires_at_ms: pow.expires_at_ms,
        }
    }
}

/// Ticket response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketResponse {
    pub ticket_id: Uuid,
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_of_work: Option<ChallengeDto>,
}

impl From<&Ticket> for TicketResponse {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticket_id: ticket.id().into(),
            valid: ticket.is_valid(),
            // A solved challenge is of no further use to the caller.
            proof_of_work: ticket
                .proof_of_work()
                .filter(|_| !ticket.is_valid())
                .map(ChallengeDto::from),
        }
    }
}

// ============================================================================
// Account ticket
// ============================================================================

/// Outbound ticket request from an authenticated local client
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTicketRequest {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub subscription_id: Option<String>,
}
