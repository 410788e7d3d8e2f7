//! Service layer
//!
//! Services own behaviour; repositories and artifact providers own storage.

pub mod ledger;

pub use ledger::AuthLedger;
