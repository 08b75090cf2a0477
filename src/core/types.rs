use serde::{Deserialize, Serialize};

use super::units::{MAX_YEN, clamp_unit, clamp_year, clamp_yen, finite_or_zero};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub name: String,
    pub birth_year: i32,
    pub base_income: i64,
}

impl Member {
    pub fn normalized(mut self) -> Self {
        self.birth_year = clamp_year(self.birth_year.into());
        self.base_income = self.base_income.clamp(0, MAX_YEN);
        self
    }
}

/// Household members. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Member>", into = "Vec<Member>")]
pub struct Members(Vec<Member>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("member list must not be empty")]
pub struct EmptyMembers;

impl TryFrom<Vec<Member>> for Members {
    type Error = EmptyMembers;

    fn try_from(members: Vec<Member>) -> Result<Self, Self::Error> {
        if members.is_empty() {
            return Err(EmptyMembers);
        }
        Ok(Self(members))
    }
}

impl From<Members> for Vec<Member> {
    fn from(value: Members) -> Self {
        value.0
    }
}

impl Members {
    pub fn single(member: Member) -> Self {
        Self(vec![member])
    }

    pub fn normalized(self) -> Self {
        Self(self.0.into_iter().map(Member::normalized).collect())
    }

    pub fn as_slice(&self) -> &[Member] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Member> {
        self.0.iter()
    }

    pub fn push(&mut self, member: Member) {
        self.0.push(member);
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Member> {
        self.0.iter_mut().find(|m| m.id == id)
    }

    /// Removes the member with `id`. The last remaining member is never removed.
    pub fn remove(&mut self, id: &str) -> Result<Member, RemoveMemberError> {
        let index = self
            .0
            .iter()
            .position(|m| m.id == id)
            .ok_or(RemoveMemberError::Unknown)?;
        if self.0.len() == 1 {
            return Err(RemoveMemberError::Last);
        }
        Ok(self.0.remove(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMemberError {
    Unknown,
    Last,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseKey {
    Basic,
    Housing,
    Car,
    Education,
    Insurance,
    Other,
}

impl ExpenseKey {
    pub const ALL: [ExpenseKey; 6] = [
        ExpenseKey::Basic,
        ExpenseKey::Housing,
        ExpenseKey::Car,
        ExpenseKey::Education,
        ExpenseKey::Insurance,
        ExpenseKey::Other,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub key: ExpenseKey,
    pub label: String,
    pub amount: i64,
}

/// The six recurring expense categories, each key exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Expense>", into = "Vec<Expense>")]
pub struct Expenses(pub(super) Vec<Expense>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("expected each of the {} expense categories exactly once", ExpenseKey::ALL.len())]
pub struct InvalidExpenses;

impl TryFrom<Vec<Expense>> for Expenses {
    type Error = InvalidExpenses;

    fn try_from(expenses: Vec<Expense>) -> Result<Self, Self::Error> {
        if expenses.len() != ExpenseKey::ALL.len() {
            return Err(InvalidExpenses);
        }
        for key in ExpenseKey::ALL {
            if expenses.iter().filter(|e| e.key == key).count() != 1 {
                return Err(InvalidExpenses);
            }
        }
        Ok(Self(expenses))
    }
}

impl From<Expenses> for Vec<Expense> {
    fn from(value: Expenses) -> Self {
        value.0
    }
}

impl Expenses {
    pub fn as_slice(&self) -> &[Expense] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expense> {
        self.0.iter()
    }

    /// Only the amount of a category is mutable. Amounts are never negative.
    pub fn set_amount(&mut self, key: ExpenseKey, amount: i64) {
        if let Some(expense) = self.0.iter_mut().find(|e| e.key == key) {
            expense.amount = amount.clamp(0, MAX_YEN);
        }
    }

    pub fn normalized(mut self) -> Self {
        for expense in &mut self.0 {
            expense.amount = expense.amount.clamp(0, MAX_YEN);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneOff {
    pub id: String,
    pub year: i32,
    pub label: String,
    pub amount: i64,
}

impl OneOff {
    pub fn normalized(mut self) -> Self {
        self.year = clamp_year(self.year.into());
        self.amount = clamp_yen(self.amount);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assumptions {
    pub inflation: f64,
    pub salary_growth: f64,
    pub return_rate: f64,
    pub initial_savings: f64,
    #[serde(default = "legacy_take_home_rate")]
    pub take_home_rate: f64,
}

// Records written before the take-home ratio existed were projected at 100%.
fn legacy_take_home_rate() -> f64 {
    1.0
}

impl Assumptions {
    pub fn normalized(mut self) -> Self {
        self.inflation = finite_or_zero(self.inflation);
        self.salary_growth = finite_or_zero(self.salary_growth);
        self.return_rate = finite_or_zero(self.return_rate);
        self.initial_savings = finite_or_zero(self.initial_savings).clamp(-MAX_YEN as f64, MAX_YEN as f64);
        self.take_home_rate = clamp_unit(self.take_home_rate);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashflowPlan {
    pub start_year: i32,
    pub horizon: u32,
    pub members: Members,
    pub expenses: Expenses,
    pub one_offs: Vec<OneOff>,
    pub assumptions: Assumptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRow {
    pub year: i32,
    pub ages: String,
    pub income: i64,
    pub expense: i64,
    pub net: i64,
    pub savings: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementInputs {
    pub current_age: u32,
    pub retire_age: u32,
    pub life_age: u32,
    pub basic_pension_monthly: i64,
    pub earnings_pension_monthly: i64,
    pub spending_monthly: i64,
    pub assets_now: i64,
    pub monthly_saving: i64,
    pub lump_sum: i64,
    pub nominal_return_pct: f64,
    pub inflation_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRow {
    pub year: i32,
    pub age: u32,
    pub assets: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProjection {
    pub start_year: i32,
    pub rows: Vec<AssetRow>,
    pub real_rate: f64,
    pub monthly_pension: i64,
    pub monthly_gap: i64,
    pub annual_shortfall: i64,
    pub required_at_retire: f64,
    pub required_with_margin: i64,
    pub fire_age: Option<u32>,
    pub exhaustion_age: Option<u32>,
}
