//! Domain model for pass templates, issued instances and the sync ledger.
//!
//! # Responsibility
//! - Define the canonical records shared by the store, synthesizer and services.
//! - Keep per-type shapes explicit so invalid type/child combinations are
//!   unrepresentable where possible.
//!
//! # Invariants
//! - A template's class type is derived from its `details` variant; there is
//!   no separate, possibly disagreeing, type column in memory.
//! - An instance's `details` variant must match its template's class type.

pub mod instance;
pub mod notification;
pub mod template;
pub mod validation;
