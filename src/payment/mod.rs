//! Payment transaction coordinator
//!
//! Applies a remotely confirmed payment to the local mirror exactly once:
//! insert the payment row under its ledger-assigned id and flip its receipt
//! token from AVAILABLE to CONSUMED inside one transaction. Never talks to
//! the network; the caller is responsible for holding a remote
//! acknowledgment before invoking `record_payment`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::db::{payments, receipts, LocalDb, PaymentRow, ReceiptTokenRow, TokenStatus};
use crate::error::{LedgerError, Result};

/// Input for recording a remotely acknowledged payment
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Ledger-assigned payment id from the acknowledgment
    pub id: i64,
    pub amount: i64,
    pub kind: String,
    /// Server-side payment timestamp (RFC 3339)
    pub paid_at: String,
    pub reason: Option<String>,
    pub merchant_id: Option<i64>,
    pub stall_id: Option<i64>,
    pub session_id: i64,
    pub agent_id: i64,
    pub receipt_token_id: i64,
}

/// Result of a successful `record_payment`
#[derive(Debug, Clone)]
pub struct RecordedPayment {
    pub payment: PaymentRow,
    pub token: ReceiptTokenRow,
}

/// Coordinates payment creation and receipt-token consumption
pub struct PaymentCoordinator {
    db: Arc<LocalDb>,
}

impl PaymentCoordinator {
    pub fn new(db: Arc<LocalDb>) -> Self {
        Self { db }
    }

    /// Record a payment and consume its receipt token, atomically.
    ///
    /// Fails with `TokenNotFound` / `TokenAlreadyConsumed` before touching
    /// the payment table, and with `DuplicatePaymentId` when this remote id
    /// was already applied locally. On any failure the transaction rolls
    /// back and no partial state is visible.
    pub fn record_payment(&self, input: NewPayment) -> Result<RecordedPayment> {
        self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| LedgerError::Store(format!("Transaction failed: {}", e)))?;

            let token = receipts::get_token(&tx, input.receipt_token_id)?
                .ok_or(LedgerError::TokenNotFound(input.receipt_token_id))?;

            if token.status != TokenStatus::Available {
                return Err(LedgerError::TokenAlreadyConsumed(token.id));
            }

            let row = PaymentRow {
                id: input.id,
                amount: input.amount,
                kind: input.kind.clone(),
                paid_at: input.paid_at.clone(),
                reason: input.reason.clone(),
                merchant_id: input.merchant_id,
                stall_id: input.stall_id,
                session_id: input.session_id,
                agent_id: input.agent_id,
                receipt_token_id: input.receipt_token_id,
            };

            payments::insert_payment(&tx, &row)?;

            let consumed_at = Utc::now().to_rfc3339();
            receipts::mark_consumed(&tx, token.id, row.id, &consumed_at)?;

            let payment = payments::get_payment(&tx, row.id)?
                .ok_or_else(|| LedgerError::Store("Payment missing after insert".to_string()))?;
            let token = receipts::get_token(&tx, input.receipt_token_id)?
                .ok_or(LedgerError::TokenNotFound(input.receipt_token_id))?;

            tx.commit()
                .map_err(|e| LedgerError::Store(format!("Commit failed: {}", e)))?;

            info!(
                payment_id = payment.id,
                token_id = token.id,
                amount = payment.amount,
                "Payment recorded"
            );

            Ok(RecordedPayment { payment, token })
        })
    }

    /// Compensating cancellation: delete the payment row and reset its
    /// receipt token to AVAILABLE, inside one transaction. Never invoked
    /// automatically.
    pub fn cancel_payment(&self, payment_id: i64) -> Result<()> {
        self.db.with_conn_mut(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| LedgerError::Store(format!("Transaction failed: {}", e)))?;

            let payment = payments::get_payment(&tx, payment_id)?
                .ok_or(LedgerError::PaymentNotFound(payment_id))?;

            // Token first: its payment link must be cleared before the
            // payment row it references can go away
            receipts::reset_token(&tx, payment.receipt_token_id)?;
            payments::delete_payment(&tx, payment_id)?;

            tx.commit()
                .map_err(|e| LedgerError::Store(format!("Commit failed: {}", e)))?;

            warn!(
                payment_id,
                token_id = payment.receipt_token_id,
                "Payment cancelled, receipt token released"
            );

            Ok(())
        })
    }
}
