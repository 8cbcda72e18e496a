pub mod repository;
pub mod service;

pub use repository::{BackendPlanRepository, PlanRepository};
pub use service::PlanService;
