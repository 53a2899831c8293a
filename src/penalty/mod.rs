//! Penalties levied on members.

mod core;
mod endpoints;
mod operations;

pub use core::{
    NewPenalty, Penalty, PenaltyFilter, PenaltyStatus, PenaltyUpdate, create_penalty_table,
    get_penalties, get_penalty,
};
pub use endpoints::{
    create_penalty_endpoint, delete_penalty_endpoint, get_penalties_endpoint,
    update_penalty_endpoint, update_penalty_status_endpoint,
};
pub use operations::{create_penalty, delete_penalty, set_penalty_status, update_penalty};
