use super::types::{
    Assumptions, CashflowPlan, Expense, ExpenseKey, Expenses, Member, Members, OneOff, YearRow,
};
use super::units::round_yen;

impl ExpenseKey {
    pub fn default_label(self) -> &'static str {
        match self {
            ExpenseKey::Basic => "Basic living",
            ExpenseKey::Housing => "Housing",
            ExpenseKey::Car => "Car",
            ExpenseKey::Education => "Education",
            ExpenseKey::Insurance => "Insurance",
            ExpenseKey::Other => "Other",
        }
    }

    fn default_amount(self) -> i64 {
        match self {
            ExpenseKey::Basic => 2_400_000,
            ExpenseKey::Housing => 1_800_000,
            ExpenseKey::Car => 300_000,
            ExpenseKey::Education => 0,
            ExpenseKey::Insurance => 240_000,
            ExpenseKey::Other => 300_000,
        }
    }
}

pub const DEFAULT_HORIZON: u32 = 20;

pub fn default_members(this_year: i32) -> Members {
    Members::single(Member {
        id: "m1".to_string(),
        name: "Primary".to_string(),
        birth_year: this_year - 32,
        base_income: 6_000_000,
    })
}

impl Default for Expenses {
    fn default() -> Self {
        Expenses(
            ExpenseKey::ALL
                .iter()
                .map(|&key| Expense {
                    key,
                    label: key.default_label().to_string(),
                    amount: key.default_amount(),
                })
                .collect(),
        )
    }
}

pub fn default_one_offs(this_year: i32) -> Vec<OneOff> {
    vec![OneOff {
        id: "o1".to_string(),
        year: this_year + 3,
        label: "Moving costs".to_string(),
        amount: -300_000,
    }]
}

impl Default for Assumptions {
    fn default() -> Self {
        Self {
            inflation: 0.02,
            salary_growth: 0.01,
            return_rate: 0.02,
            initial_savings: 2_000_000.0,
            take_home_rate: 0.8,
        }
    }
}

impl CashflowPlan {
    pub fn defaults(this_year: i32) -> Self {
        Self {
            start_year: this_year,
            horizon: DEFAULT_HORIZON,
            members: default_members(this_year),
            expenses: Expenses::default(),
            one_offs: default_one_offs(this_year),
            assumptions: Assumptions::default(),
        }
    }
}

/// Projects one row per year from `start_year` for `horizon` years.
///
/// The balance carried into the next year is the rounded `savings` of the
/// previous row, so rounding compounds year over year.
pub fn project_cashflow(plan: &CashflowPlan) -> Vec<YearRow> {
    let horizon = plan.horizon.max(1);
    let assumptions = &plan.assumptions;
    let mut rows = Vec::with_capacity(horizon as usize);
    let mut savings = assumptions.initial_savings;

    for offset in 0..horizon {
        let year = plan.start_year.saturating_add(offset as i32);
        let t = offset as i32;

        let salary_factor = (1.0 + assumptions.salary_growth).powi(t);
        let recurring_income: f64 = plan
            .members
            .iter()
            .map(|m| m.base_income as f64 * salary_factor * assumptions.take_home_rate)
            .sum();

        let price_factor = (1.0 + assumptions.inflation).powi(t);
        let recurring_expense: f64 = plan
            .expenses
            .iter()
            .map(|e| e.amount as f64 * price_factor)
            .sum();

        let (one_off_in, one_off_out) = one_off_flows(&plan.one_offs, year);

        let income = recurring_income + one_off_in;
        let expense = recurring_expense + one_off_out;
        let net = income - expense;

        let closing = round_yen(savings * (1.0 + assumptions.return_rate) + net);
        savings = closing as f64;

        rows.push(YearRow {
            year,
            ages: ages_label(&plan.members, year),
            income: round_yen(income),
            expense: round_yen(expense),
            net: round_yen(net),
            savings: closing,
        });
    }

    rows
}

fn one_off_flows(one_offs: &[OneOff], year: i32) -> (f64, f64) {
    one_offs
        .iter()
        .filter(|o| o.year == year)
        .fold((0.0, 0.0), |(inflow, outflow), o| {
            if o.amount > 0 {
                (inflow + o.amount as f64, outflow)
            } else {
                (inflow, outflow + o.amount.unsigned_abs() as f64)
            }
        })
}

fn ages_label(members: &Members, year: i32) -> String {
    members
        .iter()
        .map(|m| year.saturating_sub(m.birth_year).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CashflowSummary {
    pub first_year_income: i64,
    pub first_year_expense: i64,
    pub first_year_net: i64,
    pub final_year: i32,
    pub final_savings: i64,
}

pub fn summarize_cashflow(plan: &CashflowPlan, rows: &[YearRow]) -> CashflowSummary {
    let first = rows.first();
    CashflowSummary {
        first_year_income: first.map_or(0, |r| r.income),
        first_year_expense: first.map_or(0, |r| r.expense),
        first_year_net: first.map_or(0, |r| r.net),
        final_year: plan.start_year.saturating_add(plan.horizon.max(1) as i32 - 1),
        final_savings: rows.last().map_or(0, |r| r.savings),
    }
}
