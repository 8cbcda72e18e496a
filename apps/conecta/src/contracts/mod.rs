pub mod repository;
pub mod service;

pub use repository::{BackendContractRepository, ContractFilter, ContractRepository};
pub use service::ContractService;
