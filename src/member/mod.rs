//! Members of the savings group and their running balances.

mod core;
mod endpoints;

pub use core::{
    Member, MemberStatus, NewMember, adjust_member_balance, create_member, create_member_table,
    delete_member, get_all_members, get_member, update_member,
};
pub use endpoints::{
    create_member_endpoint, delete_member_endpoint, get_member_endpoint, get_members_endpoint,
    update_member_endpoint,
};
