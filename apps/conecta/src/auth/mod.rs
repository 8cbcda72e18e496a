pub mod repository;
pub mod service;

pub use repository::{AuthRepository, BackendAuthRepository, BackendProfileRepository, ProfileRepository};
pub use service::{AuthService, RegisterOutcome, RegisterRequest};
