// Job Relay - Core
//
// Polls the job board for newly published postings and broadcasts each one
// exactly once to Telegram, WhatsApp and Facebook.
//
// Domains hold the distribution logic; the kernel holds the infrastructure
// seams (stores, publishers, scheduler) behind Base* traits.

pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
