//! Member contributions into funds.

mod core;
mod endpoints;
mod operations;

pub use core::{
    Contribution, ContributionBatch, ContributionFilter, ContributionItem, ContributionUpdate,
    create_contribution_table, get_contribution, get_contributions,
};
pub use endpoints::{
    create_contributions_endpoint, delete_contribution_endpoint, get_contributions_endpoint,
    update_contribution_endpoint,
};
pub use operations::{create_contributions, delete_contribution, update_contribution};
