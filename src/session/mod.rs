pub mod ledger;
pub mod recorder;
pub mod slot;
pub mod transcript;

pub use ledger::{RestoreOrigin, RestoreRequest, SessionLedger};
pub use recorder::SessionRecorder;
pub use slot::SessionSlot;
