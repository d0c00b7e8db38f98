pub mod engine;
pub mod ledger;
pub mod receiver;
pub mod reporting;
