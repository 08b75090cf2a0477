use super::types::{AssetRow, RetirementInputs, RetirementProjection};
use super::units::{MAX_YEN, clamp_range, finite_or_zero, round_yen};

/// Below this magnitude the real rate is treated as zero.
pub const RATE_EPSILON: f64 = 1e-9;
pub const REQUIRED_MARGIN: f64 = 1.10;

pub const MIN_CURRENT_AGE: u32 = 18;
pub const MAX_RETIRE_AGE: u32 = 100;
pub const MAX_LIFE_AGE: u32 = 110;

impl Default for RetirementInputs {
    fn default() -> Self {
        Self {
            current_age: 32,
            retire_age: 65,
            life_age: 95,
            basic_pension_monthly: 69_308,
            earnings_pension_monthly: 90_000,
            spending_monthly: 250_000,
            assets_now: 5_000_000,
            monthly_saving: 50_000,
            lump_sum: 0,
            nominal_return_pct: 4.0,
            inflation_pct: 1.5,
        }
    }
}

impl RetirementInputs {
    /// Clamps every field into its valid range, keeping
    /// `current_age <= retire_age <= life_age` and money within `0..=MAX_YEN`.
    pub fn normalized(self) -> Self {
        let current_age = clamp_range(self.current_age as f64, MIN_CURRENT_AGE, MAX_RETIRE_AGE);
        let retire_age = clamp_range(self.retire_age as f64, current_age, MAX_RETIRE_AGE);
        let life_age = clamp_range(self.life_age as f64, retire_age, MAX_LIFE_AGE);
        Self {
            current_age,
            retire_age,
            life_age,
            basic_pension_monthly: self.basic_pension_monthly.clamp(0, MAX_YEN),
            earnings_pension_monthly: self.earnings_pension_monthly.clamp(0, MAX_YEN),
            spending_monthly: self.spending_monthly.clamp(0, MAX_YEN),
            assets_now: self.assets_now.clamp(0, MAX_YEN),
            monthly_saving: self.monthly_saving.clamp(0, MAX_YEN),
            lump_sum: self.lump_sum.clamp(0, MAX_YEN),
            nominal_return_pct: finite_or_zero(self.nominal_return_pct),
            inflation_pct: finite_or_zero(self.inflation_pct),
        }
    }
}

/// Fisher relation on percent inputs.
pub fn real_rate(nominal_return_pct: f64, inflation_pct: f64) -> f64 {
    (1.0 + nominal_return_pct / 100.0) / (1.0 + inflation_pct / 100.0) - 1.0
}

/// Present value of `years` annual payments of `annual` at `rate`.
pub fn annuity_present_value(annual: f64, rate: f64, years: u32) -> f64 {
    if annual == 0.0 {
        return 0.0;
    }
    if rate.abs() > RATE_EPSILON {
        annual * (1.0 - (1.0 + rate).powi(-(years as i32))) / rate
    } else {
        annual * years as f64
    }
}

/// Projects assets from the current age through life expectancy.
///
/// Accumulation rows record the balance at the start of each year. The
/// retirement row records the balance after the lump sum. Decumulation rows
/// record the balance at the end of each year.
pub fn project_retirement(inputs: &RetirementInputs, start_year: i32) -> RetirementProjection {
    let r = real_rate(inputs.nominal_return_pct, inputs.inflation_pct);

    let monthly_pension = inputs
        .basic_pension_monthly
        .max(0)
        .saturating_add(inputs.earnings_pension_monthly.max(0));
    let monthly_gap = inputs.spending_monthly.saturating_sub(monthly_pension);
    let annual_shortfall = monthly_gap.saturating_mul(12).max(0);

    let payout_years = inputs.life_age.saturating_sub(inputs.retire_age);
    let required_at_retire = annuity_present_value(annual_shortfall as f64, r, payout_years);
    let required_with_margin = round_yen(required_at_retire * REQUIRED_MARGIN);

    let year_of = |age: u32| start_year + (age as i32 - inputs.current_age as i32);
    let capacity = inputs.life_age.saturating_sub(inputs.current_age) as usize + 1;
    let mut rows = Vec::with_capacity(capacity);
    let mut assets = inputs.assets_now as f64;
    let mut fire_age = None;
    let mut exhaustion_age = None;

    let annual_saving = inputs.monthly_saving.saturating_mul(12) as f64;
    for age in inputs.current_age..inputs.retire_age {
        rows.push(AssetRow {
            year: year_of(age),
            age,
            assets: round_yen(assets),
        });
        if fire_age.is_none() && required_with_margin > 0 && assets >= required_with_margin as f64 {
            fire_age = Some(age);
        }
        assets = round_yen(assets * (1.0 + r) + annual_saving) as f64;
    }

    assets += inputs.lump_sum as f64;
    rows.push(AssetRow {
        year: year_of(inputs.retire_age),
        age: inputs.retire_age,
        assets: round_yen(assets),
    });

    let annual_pension = monthly_pension.saturating_mul(12) as f64;
    let annual_spend = inputs.spending_monthly.saturating_mul(12) as f64;
    for age in inputs.retire_age + 1..=inputs.life_age {
        let closing = round_yen(assets * (1.0 + r) + annual_pension - annual_spend);
        assets = closing as f64;
        rows.push(AssetRow {
            year: year_of(age),
            age,
            assets: closing,
        });
        if exhaustion_age.is_none() && closing < 0 {
            exhaustion_age = Some(age);
        }
    }

    RetirementProjection {
        start_year,
        rows,
        real_rate: r,
        monthly_pension,
        monthly_gap,
        annual_shortfall,
        required_at_retire,
        required_with_margin,
        fire_age,
        exhaustion_age,
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSummary {
    pub monthly_pension: String,
    pub monthly_gap: String,
    pub annual_shortfall: String,
    pub required_with_margin: String,
    pub real_rate: String,
    pub fire_age: String,
    pub exhaustion_age: String,
    pub retire_age: String,
}

pub fn summarize_retirement(
    inputs: &RetirementInputs,
    projection: &RetirementProjection,
) -> RetirementSummary {
    use super::units::{percent_label, yen_label};

    let has_gap = projection.monthly_gap > 0;
    RetirementSummary {
        monthly_pension: yen_label(projection.monthly_pension as f64),
        monthly_gap: if has_gap {
            yen_label(projection.monthly_gap as f64)
        } else {
            "no shortfall".to_string()
        },
        annual_shortfall: yen_label(projection.annual_shortfall as f64),
        required_with_margin: yen_label(projection.required_with_margin as f64),
        real_rate: percent_label(projection.real_rate),
        fire_age: projection
            .fire_age
            .map_or_else(|| "not reached".to_string(), |age| age.to_string()),
        exhaustion_age: projection
            .exhaustion_age
            .map_or_else(|| "not exhausted".to_string(), |age| age.to_string()),
        retire_age: inputs.retire_age.to_string(),
    }
}
