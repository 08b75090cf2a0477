//! CSV downloads of both projections, monetary columns in man-yen.

use crate::core::units::{DISPLAY_UNIT_LABEL, to_display};
use crate::core::{CashflowPlan, RetirementInputs, RetirementProjection, YearRow};
use crate::error::ExportError;

const BOM: &[u8] = "\u{feff}".as_bytes();
const RETIREMENT_NOTE: &str = "retirement (lump sum applied)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvExport {
    pub filename: String,
    pub body: Vec<u8>,
}

fn writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(BOM.to_vec())
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, ExportError> {
    writer.into_inner().map_err(|e| ExportError::Flush(e.error().to_string()))
}

fn money_header(name: &str) -> String {
    format!("{name} [{DISPLAY_UNIT_LABEL}]")
}

pub fn cashflow_csv(plan: &CashflowPlan, rows: &[YearRow]) -> Result<CsvExport, ExportError> {
    let mut out = writer();
    out.write_record([
        "Year".to_string(),
        "Ages".to_string(),
        money_header("Income (A)"),
        money_header("Expenses (B)"),
        money_header("Net (A-B)"),
        money_header("Savings"),
    ])?;
    for row in rows {
        out.write_record([
            row.year.to_string(),
            row.ages.clone(),
            to_display(row.income as f64).to_string(),
            to_display(row.expense as f64).to_string(),
            to_display(row.net as f64).to_string(),
            to_display(row.savings as f64).to_string(),
        ])?;
    }
    Ok(CsvExport {
        filename: format!("cashflow_{}_{}y_man.csv", plan.start_year, plan.horizon),
        body: finish(out)?,
    })
}

pub fn retirement_csv(
    inputs: &RetirementInputs,
    projection: &RetirementProjection,
) -> Result<CsvExport, ExportError> {
    let mut out = writer();
    out.write_record([
        "Year".to_string(),
        "Age".to_string(),
        money_header("Assets"),
        "Note".to_string(),
    ])?;
    for row in &projection.rows {
        let note = if row.age == inputs.retire_age {
            RETIREMENT_NOTE
        } else {
            ""
        };
        out.write_record([
            row.year.to_string(),
            row.age.to_string(),
            to_display(row.assets as f64).to_string(),
            note.to_string(),
        ])?;
    }
    Ok(CsvExport {
        filename: format!(
            "retirement_{}_{}-{}_man.csv",
            projection.start_year, inputs.current_age, inputs.life_age
        ),
        body: finish(out)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{project_cashflow, project_retirement};

    fn text(export: &CsvExport) -> &str {
        std::str::from_utf8(&export.body).unwrap()
    }

    #[test]
    fn cashflow_export_has_bom_header_and_man_yen_rows() {
        let mut plan = CashflowPlan::defaults(2025);
        plan.horizon = 3;
        let rows = project_cashflow(&plan);
        let export = cashflow_csv(&plan, &rows).unwrap();

        assert_eq!(export.filename, "cashflow_2025_3y_man.csv");
        assert!(export.body.starts_with(BOM));

        let body = text(&export).trim_start_matches('\u{feff}');
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            "Year,Ages,Income (A) [万円],Expenses (B) [万円],Net (A-B) [万円],Savings [万円]"
        );
        let first = &rows[0];
        assert_eq!(
            lines[1],
            format!(
                "2025,{},{},{},{},{}",
                first.ages,
                to_display(first.income as f64),
                to_display(first.expense as f64),
                to_display(first.net as f64),
                to_display(first.savings as f64)
            )
        );
        assert!(!body.contains('\r'));
    }

    #[test]
    fn multi_member_ages_stay_in_one_column() {
        let mut plan = CashflowPlan::defaults(2025);
        plan.horizon = 1;
        plan.members.push(crate::core::Member {
            id: "m2".to_string(),
            name: "Partner".to_string(),
            birth_year: 1995,
            base_income: 0,
        });
        let rows = project_cashflow(&plan);
        let export = cashflow_csv(&plan, &rows).unwrap();
        assert!(text(&export).contains("\n2025,32/30,"));
    }

    #[test]
    fn retirement_export_marks_the_retirement_row() {
        let inputs = RetirementInputs {
            current_age: 60,
            retire_age: 62,
            life_age: 64,
            ..RetirementInputs::default()
        };
        let projection = project_retirement(&inputs, 2025);
        let export = retirement_csv(&inputs, &projection).unwrap();

        assert_eq!(export.filename, "retirement_2025_60-64_man.csv");
        let body = text(&export).trim_start_matches('\u{feff}');
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "Year,Age,Assets [万円],Note");
        assert_eq!(lines.len(), projection.rows.len() + 1);

        let marked: Vec<&&str> = lines.iter().filter(|l| l.ends_with(RETIREMENT_NOTE)).collect();
        assert_eq!(marked.len(), 1);
        assert!(marked[0].starts_with("2027,62,"));
    }
}
