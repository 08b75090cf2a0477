//! Share tokens, local persistence and the live planner sessions.

pub mod codec;
mod planners;
mod session;
pub mod store;

pub use planners::{
    CashflowEdit, CashflowPlanner, CashflowSession, EXPENSES_KEY, MEMBERS_KEY, MemberPatch,
    ONE_OFFS_KEY, OneOffPatch, RETIREMENT_KEY, RetirementEdit, RetirementPlanner,
    RetirementSession,
};
pub use session::{Planner, QueryParams, Session};
