use serde::Serialize;

use super::codec::{decode_token, encode_token};
use super::session::{Planner, QueryParams, Session, forget_keys, resolve, save_records};
use super::store::LocalStore;
use crate::core::units::{
    MAX_YEN, clamp_horizon, clamp_non_neg, clamp_range, clamp_unit, clamp_year, clamp_yen,
    finite_or_zero,
};
use crate::core::{
    Assumptions, CashflowPlan, ExpenseKey, Expenses, MAX_LIFE_AGE, MAX_RETIRE_AGE, MIN_CURRENT_AGE, Member,
    Members, OneOff, RemoveMemberError, RetirementInputs, RetirementProjection, YearRow, project_cashflow,
    project_retirement,
};
use crate::error::{CodecError, PlanError};

pub const MEMBERS_KEY: &str = "cashflow.members";
pub const EXPENSES_KEY: &str = "cashflow.expenses";
pub const ONE_OFFS_KEY: &str = "cashflow.oneoffs";
pub const RETIREMENT_KEY: &str = "retirement.inputs";

pub type CashflowSession<S> = Session<CashflowPlanner, S>;
pub type RetirementSession<S> = Session<RetirementPlanner, S>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberPatch {
    pub name: Option<String>,
    pub birth_year: Option<i32>,
    pub base_income: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OneOffPatch {
    pub year: Option<i32>,
    pub label: Option<String>,
    pub amount: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CashflowEdit {
    StartYear(i32),
    Horizon(i64),
    Inflation(f64),
    SalaryGrowth(f64),
    ReturnRate(f64),
    InitialSavings(i64),
    TakeHomeRate(f64),
    AddMember,
    UpdateMember { id: String, patch: MemberPatch },
    RemoveMember(String),
    ExpenseAmount { key: ExpenseKey, amount: i64 },
    AddOneOff,
    UpdateOneOff { id: String, patch: OneOffPatch },
    RemoveOneOff(String),
}

/// Smallest `{prefix}{n}` with `n >= 1` not already taken.
fn next_id<'a>(prefix: &str, taken: impl Iterator<Item = &'a str> + Clone) -> String {
    let mut n = 1;
    loop {
        let candidate = format!("{prefix}{n}");
        if !taken.clone().any(|id| id == candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Out-of-range years are pulled into `MIN_YEAR..=MAX_YEAR`; anything that is
/// not an integer is ignored.
fn parse_year(raw: &str) -> Option<i32> {
    raw.trim().parse::<i64>().ok().map(clamp_year)
}

fn parse_horizon(raw: &str) -> Option<u32> {
    let years = raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;
    Some(clamp_horizon(years.floor() as i64))
}

#[derive(Serialize)]
struct CashflowQuery<'a> {
    y: i32,
    n: u32,
    a: &'a str,
    m: &'a str,
    e: &'a str,
    o: &'a str,
}

#[derive(Serialize)]
struct RetirementQuery<'a> {
    q: &'a str,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CashflowPlanner;

impl Planner for CashflowPlanner {
    type Model = CashflowPlan;
    type Edit = CashflowEdit;
    type Projection = Vec<YearRow>;

    fn defaults(this_year: i32) -> CashflowPlan {
        CashflowPlan::defaults(this_year)
    }

    fn load(query: &QueryParams, store: &dyn LocalStore, defaults: CashflowPlan) -> CashflowPlan {
        let assumptions = query
            .get("a")
            .and_then(|token| {
                decode_token::<Assumptions>(token)
                    .map_err(|e| tracing::debug!(error = %e, "discarding assumptions token"))
                    .ok()
            })
            .map_or(defaults.assumptions, Assumptions::normalized);

        CashflowPlan {
            start_year: query.get("y").and_then(parse_year).unwrap_or(defaults.start_year),
            horizon: query.get("n").and_then(parse_horizon).unwrap_or(defaults.horizon),
            members: resolve(query, "m", store, MEMBERS_KEY)
                .map_or(defaults.members, Members::normalized),
            expenses: resolve(query, "e", store, EXPENSES_KEY)
                .map_or(defaults.expenses, Expenses::normalized),
            one_offs: resolve::<Vec<OneOff>>(query, "o", store, ONE_OFFS_KEY).map_or(
                defaults.one_offs,
                |one_offs| one_offs.into_iter().map(OneOff::normalized).collect(),
            ),
            assumptions,
        }
    }

    fn project(plan: &CashflowPlan, _this_year: i32) -> Vec<YearRow> {
        project_cashflow(plan)
    }

    fn apply(plan: &mut CashflowPlan, edit: CashflowEdit, this_year: i32) -> Result<(), PlanError> {
        let assumptions = &mut plan.assumptions;
        match edit {
            CashflowEdit::StartYear(year) => plan.start_year = clamp_year(year.into()),
            CashflowEdit::Horizon(years) => plan.horizon = clamp_horizon(years),
            CashflowEdit::Inflation(rate) => assumptions.inflation = finite_or_zero(rate),
            CashflowEdit::SalaryGrowth(rate) => assumptions.salary_growth = finite_or_zero(rate),
            CashflowEdit::ReturnRate(rate) => assumptions.return_rate = finite_or_zero(rate),
            CashflowEdit::InitialSavings(yen) => {
                assumptions.initial_savings = clamp_yen(yen) as f64;
            }
            CashflowEdit::TakeHomeRate(rate) => assumptions.take_home_rate = clamp_unit(rate),
            CashflowEdit::AddMember => {
                let id = next_id("m", plan.members.iter().map(|m| m.id.as_str()));
                let name = format!("Member {}", plan.members.len() + 1);
                plan.members.push(Member {
                    id,
                    name,
                    birth_year: this_year - 30,
                    base_income: 0,
                });
            }
            CashflowEdit::UpdateMember { id, patch } => {
                let member = plan
                    .members
                    .get_mut(&id)
                    .ok_or_else(|| PlanError::UnknownMember(id.clone()))?;
                if let Some(name) = patch.name {
                    member.name = name;
                }
                if let Some(year) = patch.birth_year {
                    member.birth_year = clamp_year(year.into());
                }
                if let Some(income) = patch.base_income {
                    member.base_income = income.clamp(0, MAX_YEN);
                }
            }
            CashflowEdit::RemoveMember(id) => {
                plan.members.remove(&id).map_err(|e| match e {
                    RemoveMemberError::Last => PlanError::LastMember,
                    RemoveMemberError::Unknown => PlanError::UnknownMember(id.clone()),
                })?;
            }
            CashflowEdit::ExpenseAmount { key, amount } => plan.expenses.set_amount(key, amount),
            CashflowEdit::AddOneOff => {
                let id = next_id("o", plan.one_offs.iter().map(|o| o.id.as_str()));
                plan.one_offs.push(OneOff {
                    id,
                    year: plan.start_year,
                    label: String::new(),
                    amount: 0,
                });
            }
            CashflowEdit::UpdateOneOff { id, patch } => {
                let one_off = plan
                    .one_offs
                    .iter_mut()
                    .find(|o| o.id == id)
                    .ok_or_else(|| PlanError::UnknownOneOff(id.clone()))?;
                if let Some(year) = patch.year {
                    one_off.year = clamp_year(year.into());
                }
                if let Some(label) = patch.label {
                    one_off.label = label;
                }
                if let Some(amount) = patch.amount {
                    one_off.amount = clamp_yen(amount);
                }
            }
            CashflowEdit::RemoveOneOff(id) => {
                let before = plan.one_offs.len();
                plan.one_offs.retain(|o| o.id != id);
                if plan.one_offs.len() == before {
                    return Err(PlanError::UnknownOneOff(id));
                }
            }
        }
        Ok(())
    }

    fn share_query(plan: &CashflowPlan) -> Result<String, CodecError> {
        let a = encode_token(&plan.assumptions)?;
        let m = encode_token(&plan.members)?;
        let e = encode_token(&plan.expenses)?;
        let o = encode_token(&plan.one_offs)?;
        let query = CashflowQuery {
            y: plan.start_year,
            n: plan.horizon,
            a: &a,
            m: &m,
            e: &e,
            o: &o,
        };
        Ok(serde_urlencoded::to_string(&query)?)
    }

    fn persist(plan: &CashflowPlan, store: &mut dyn LocalStore) {
        save_records(
            store,
            [
                (MEMBERS_KEY, serde_json::to_string(&plan.members)),
                (EXPENSES_KEY, serde_json::to_string(&plan.expenses)),
                (ONE_OFFS_KEY, serde_json::to_string(&plan.one_offs)),
            ],
        );
    }

    fn forget(store: &mut dyn LocalStore) {
        forget_keys(store, &[MEMBERS_KEY, EXPENSES_KEY, ONE_OFFS_KEY]);
    }
}

/// A single retirement input change. Values arrive as typed into the form
/// and are clamped on the way in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetirementEdit {
    CurrentAge(f64),
    RetireAge(f64),
    LifeAge(f64),
    BasicPension(f64),
    EarningsPension(f64),
    Spending(f64),
    AssetsNow(f64),
    MonthlySaving(f64),
    LumpSum(f64),
    NominalReturn(f64),
    Inflation(f64),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RetirementPlanner;

impl Planner for RetirementPlanner {
    type Model = RetirementInputs;
    type Edit = RetirementEdit;
    type Projection = RetirementProjection;

    fn defaults(_this_year: i32) -> RetirementInputs {
        RetirementInputs::default()
    }

    fn load(
        query: &QueryParams,
        store: &dyn LocalStore,
        defaults: RetirementInputs,
    ) -> RetirementInputs {
        resolve::<RetirementInputs>(query, "q", store, RETIREMENT_KEY)
            .map_or(defaults, RetirementInputs::normalized)
    }

    fn project(inputs: &RetirementInputs, this_year: i32) -> RetirementProjection {
        project_retirement(inputs, this_year)
    }

    fn apply(
        inputs: &mut RetirementInputs,
        edit: RetirementEdit,
        _this_year: i32,
    ) -> Result<(), PlanError> {
        match edit {
            RetirementEdit::CurrentAge(age) => {
                inputs.current_age = clamp_range(age, MIN_CURRENT_AGE, MAX_RETIRE_AGE);
            }
            RetirementEdit::RetireAge(age) => {
                inputs.retire_age = clamp_range(age, inputs.current_age, MAX_RETIRE_AGE);
            }
            RetirementEdit::LifeAge(age) => {
                let floor = inputs.retire_age.max(inputs.current_age);
                inputs.life_age = clamp_range(age, floor, MAX_LIFE_AGE);
            }
            RetirementEdit::BasicPension(yen) => inputs.basic_pension_monthly = clamp_non_neg(yen),
            RetirementEdit::EarningsPension(yen) => {
                inputs.earnings_pension_monthly = clamp_non_neg(yen);
            }
            RetirementEdit::Spending(yen) => inputs.spending_monthly = clamp_non_neg(yen),
            RetirementEdit::AssetsNow(yen) => inputs.assets_now = clamp_non_neg(yen),
            RetirementEdit::MonthlySaving(yen) => inputs.monthly_saving = clamp_non_neg(yen),
            RetirementEdit::LumpSum(yen) => inputs.lump_sum = clamp_non_neg(yen),
            RetirementEdit::NominalReturn(pct) => inputs.nominal_return_pct = finite_or_zero(pct),
            RetirementEdit::Inflation(pct) => inputs.inflation_pct = finite_or_zero(pct),
        }
        // Raising the current age may push it past the later ages.
        *inputs = inputs.normalized();
        Ok(())
    }

    fn share_query(inputs: &RetirementInputs) -> Result<String, CodecError> {
        let q = encode_token(inputs)?;
        Ok(serde_urlencoded::to_string(&RetirementQuery { q: &q })?)
    }

    fn persist(inputs: &RetirementInputs, store: &mut dyn LocalStore) {
        save_records(store, [(RETIREMENT_KEY, serde_json::to_string(inputs))]);
    }

    fn forget(store: &mut dyn LocalStore) {
        forget_keys(store, &[RETIREMENT_KEY]);
    }
}
