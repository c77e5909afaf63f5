//! Issue Ticket Use Case

use crate::application::config::TicketConfig;
use crate::domain::entities::Ticket;
use crate::domain::repository::{AccountRepository, SubscriptionRepository, TicketRepository};
use crate::domain::value_objects::SubscriptionId;
use crate::error::{TicketError, TicketResult};
use kernel::{AddressHash, TicketId};
use pow::issue_challenge;
use std::sync::Arc;

/// Input for a ticket request from a sending server or client
#[derive(Debug, Clone)]
pub struct IssueTicketInput {
    pub from: AddressHash,
    pub to: AddressHash,
    pub subscription_id: Option<SubscriptionId>,
    pub ticket_id: Option<TicketId>,
    pub proof: Option<u64>,
}

/// Issue Ticket Use Case
pub struct IssueTicketUseCase<T, S, A>
where
    T: TicketRepository,
    S: SubscriptionRepository,
    A: AccountRepository,
{
    ticket_repo: Arc<T>,
    subscription_repo: Arc<S>,
    account_repo: Arc<A>,
    config: Arc<TicketConfig>,
}

impl<T, S, A> IssueTicketUseCase<T, S, A>
where
    T: TicketRepository + Sync,
    S: SubscriptionRepository + Sync,
    A: AccountRepository + Sync,
{
    pub fn new(
        ticket_repo: Arc<T>,
        subscription_repo: Arc<S>,
        account_repo: Arc<A>,
        config: Arc<TicketConfig>,
    ) -> Self {
        Self {
            ticket_repo,
            subscription_repo,
            account_repo,
            config,
        }
    }

    /// Direct grant for senders this server already trusts (its own
    /// authenticated accounts). The recipient may live anywhere.
    pub async fn issue_for_remote(
        &self,
        from: AddressHash,
        to: AddressHash,
        subscription_id: Option<SubscriptionId>,
    ) -> TicketResult<Ticket> {
        let ticket = Ticket::validated(from, to, subscription_id);
        self.ticket_repo.store(&ticket).await?;

        tracing::info!(ticket_id = %ticket.id(), "Issued validated outbound ticket");

        Ok(ticket)
    }

    /// Admission path for mail addressed to an account hosted here.
    pub async fn issue_or_resume_local(&self, input: IssueTicketInput) -> TicketResult<Ticket> {
        if !self.account_repo.exists(&input.to).await? {
            return Err(TicketError::RecipientNotLocal);
        }

        if let Some(subscription_id) = input.subscription_id.as_ref()
            && self
                .subscription_repo
                .has(&input.from, &input.to, subscription_id)
                .await?
        {
            let ticket = Ticket::validated(input.from, input.to, input.subscription_id);
            self.ticket_repo.store(&ticket).await?;

            tracing::info!(ticket_id = %ticket.id(), "Issued ticket through subscription");

            return Ok(ticket);
        }

        let Some(ticket_id) = input.ticket_id else {
            let ticket = Ticket::with_challenge(input.from, input.to, issue_challenge(&self.config.pow));
            self.ticket_repo.store(&ticket).await?;

            tracing::info!(
                ticket_id = %ticket.id(),
                difficulty = self.config.pow.difficulty_bits(),
                "Issued ticket pending proof of work"
            );

            return Ok(ticket);
        };

        let mut ticket = self
            .ticket_repo
            .fetch(ticket_id)
            .await?
            .ok_or(TicketError::TicketNotFound)?;

        if !ticket.matches(&input.from, &input.to) {
            return Err(TicketError::AddressMismatch);
        }

        if !ticket.is_valid()
            && let Some(proof) = input.proof
        {
            if ticket.submit_proof(proof) {
                self.ticket_repo.store(&ticket).await?;
                tracing::info!(ticket_id = %ticket.id(), "Ticket validated by proof of work");
            } else {
                tracing::debug!(ticket_id = %ticket.id(), "Rejected proof of work");
            }
        }

        Ok(ticket)
    }
}
