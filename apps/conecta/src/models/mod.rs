pub mod contract;
pub mod message;
pub mod plan;
pub mod profile;

pub use contract::{ContractRequest, ContractStatus, NewContractRequest, RequesterSummary};
pub use message::{Message, NewMessage};
pub use plan::{NewPlan, Plan, PlanChanges};
pub use profile::{Profile, ProfileChanges, Role};
