//! Conversion ledger for Artesia.
//!
//! The ledger couples a credit debit to an external transformation call:
//!
//! 1. The credit is debited and a `Processing` conversion is committed in one
//!    atomic store write.
//! 2. The transformation service runs, bounded by a timeout.
//! 3. The conversion is reconciled: `Completed` on success, or `Failed` with
//!    the credit refunded in one atomic store write.
//!
//! Steps 2 and 3 run on a detached task so a caller that goes away cannot
//! leave a debited conversion behind. Records stranded by a crash are
//! reconciled by [`Ledger::recover_interrupted`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod error;
mod ledger;

pub use error::ConversionError;
pub use ledger::{recover_interrupted, ConversionReceipt, Ledger, LedgerOptions};
