//! Client for the Tigo Conecta plan catalog: session handling, plan
//! catalog, contract requests and customer/advisor chat, all served by a
//! hosted backend.

pub mod auth;
pub mod backend;
pub mod chat;
pub mod config;
pub mod contracts;
pub mod errors;
pub mod models;
pub mod plans;
pub mod session;
pub mod state;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use errors::AppError;
pub use state::AppState;
