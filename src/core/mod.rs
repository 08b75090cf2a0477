mod cashflow;
mod retirement;
mod types;
pub mod units;

pub use cashflow::{
    CashflowSummary, DEFAULT_HORIZON, default_members, default_one_offs, project_cashflow,
    summarize_cashflow,
};
pub use retirement::{
    MAX_LIFE_AGE, MAX_RETIRE_AGE, MIN_CURRENT_AGE, RATE_EPSILON, REQUIRED_MARGIN,
    RetirementSummary, annuity_present_value, project_retirement, real_rate, summarize_retirement,
};
pub use types::{
    AssetRow, Assumptions, CashflowPlan, EmptyMembers, Expense, ExpenseKey, Expenses,
    InvalidExpenses, Member, Members, OneOff, RemoveMemberError, RetirementInputs,
    RetirementProjection, YearRow,
};
