//! Domain Entities

use crate::domain::value_objects::SubscriptionId;
use chrono::{DateTime, Utc};
use kernel::{AddressHash, TicketId};
use pow::ProofOfWork;
use serde::{Deserialize, Serialize};

/// Admission ticket for one `(from, to)` pair.
///
/// `from`/`to` never change after creation and `valid` only ever goes from
/// `false` to `true`; the fields are private so nothing else can break that.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    id: TicketId,
    from: AddressHash,
    to: AddressHash,
    subscription_id: Option<SubscriptionId>,
    valid: bool,
    proof_of_work: Option<ProofOfWork>,
    created_at: DateTime<Utc>,
}

impl Ticket {
    /// A ticket that is usable right away (subscription or trusted sender).
    pub fn validated(
        from: AddressHash,
        to: AddressHash,
        subscription_id: Option<SubscriptionId>,
    ) -> Self {
        Self {
            id: TicketId::new(),
            from,
            to,
            subscription_id,
            valid: true,
            proof_of_work: None,
            created_at: Utc::now(),
        }
    }

    /// A ticket that becomes usable once `challenge` is solved.
    pub fn with_challenge(from: AddressHash, to: AddressHash, challenge: ProofOfWork) -> Self {
        Self {
            id: TicketId::new(),
            from,
            to,
            subscription_id: None,
            valid: false,
            proof_of_work: Some(challenge),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> TicketId {
        self.id
    }

    pub fn from(&self) -> &AddressHash {
        &self.from
    }

    pub fn to(&self) -> &AddressHash {
        &self.to
    }

    pub fn subscription_id(&self) -> Option<&SubscriptionId> {
        self.subscription_id.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn proof_of_work(&self) -> Option<&ProofOfWork> {
        self.proof_of_work.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn matches(&self, from: &AddressHash, to: &AddressHash) -> bool {
        &self.from == from && &self.to == to
    }

    /// Offer a solution to the ticket's challenge.
    ///
    /// Only a proof that actually solves the challenge is recorded, so a
    /// wrong guess does not burn the ticket. Returns the resulting validity.
    pub fn submit_proof(&mut self, proof: u64) -> bool {
        if self.valid {
            return true;
        }
        let Some(pow) = self.proof_of_work.as_mut() else {
            return false;
        };
        if pow.accepts(proof) {
            pow.set_proof(proof);
        }
        if pow.has_done_work() && pow.is_valid() {
            self.valid = true;
        }
        self.valid
    }
}
