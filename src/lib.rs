pub mod config;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod provisioning;
pub mod storage;
