// SPDX-FileCopyrightText: 2026 Solace Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Audit sink trait: append-only transaction log.

use async_trait::async_trait;

use crate::error::SolaceError;
use crate::types::AuditEntry;

/// Append-only audit trail consumed by every mutating operation.
///
/// Entries are never updated or deleted. For primary actions the record
/// call is part of the transition; for secondary copies (e.g. the draft
/// generation transcript) failures surface as degraded-success warnings
/// rather than undoing the primary action.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), SolaceError>;
}
