pub mod events;
pub mod ingress;
pub mod status;
pub mod units;
pub mod webhook;
