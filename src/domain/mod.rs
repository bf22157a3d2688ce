mod catalog;
mod client;
mod event;
mod ledger;
mod money;

pub use catalog::*;
pub use client::*;
pub use event::*;
pub use ledger::*;
pub use money::*;
