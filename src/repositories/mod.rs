pub mod opportunity_repository;

pub use opportunity_repository::{
    InMemoryOpportunityStore, OpportunityStore, SeaOrmOpportunityStore,
};

#[cfg(test)]
pub use opportunity_repository::MockOpportunityStore;
