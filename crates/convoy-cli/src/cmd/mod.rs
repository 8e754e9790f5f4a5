pub mod build;
pub mod config;
pub mod history;
pub mod ingress;
pub mod init;
pub mod reconcile;
pub mod serve;
pub mod status;
pub mod trigger;
pub mod unit;
