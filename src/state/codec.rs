//! Share tokens: JSON, percent-escaped, then base64.
//!
//! The escaping step leaves exactly the characters a browser's
//! `encodeURIComponent` leaves alone, so tokens written by the web planner
//! decode here and vice versa.

use base64::{Engine, engine::general_purpose::STANDARD};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::CodecError;

const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_token<T: Serialize + ?Sized>(value: &T) -> Result<String, CodecError> {
    let json = serde_json::to_string(value)?;
    let escaped = utf8_percent_encode(&json, URI_COMPONENT).to_string();
    Ok(STANDARD.encode(escaped))
}

pub fn decode_token<T: DeserializeOwned>(token: &str) -> Result<T, CodecError> {
    // Form decoding turns an unescaped `+` into a space.
    let token = token.trim().replace(' ', "+");
    let bytes = STANDARD.decode(token)?;
    let escaped = String::from_utf8(bytes).map_err(|_| CodecError::Utf8)?;
    let json = percent_decode_str(&escaped)
        .decode_utf8()
        .map_err(|_| CodecError::Utf8)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::units::MAX_YEN;
    use crate::core::{
        Assumptions, Expense, ExpenseKey, Expenses, Member, Members, OneOff, RetirementInputs,
    };
    use proptest::collection::vec;
    use proptest::prelude::{any, prop_assert_eq, proptest};

    #[test]
    fn token_is_ascii_and_query_safe_after_form_encoding() {
        let members = Members::single(Member {
            id: "m1".to_string(),
            name: "山田 太郎".to_string(),
            birth_year: 1990,
            base_income: 5_000_000,
        });
        let token = encode_token(&members).expect("encodes");
        assert!(token.is_ascii());

        let decoded: Members = decode_token(&token).expect("decodes");
        assert_eq!(decoded, members);
    }

    #[test]
    fn decodes_token_written_by_browser() {
        // btoa(encodeURIComponent('[{"id":"o1","year":2028,"label":"引越し","amount":-300000}]'))
        let json = r#"[{"id":"o1","year":2028,"label":"引越し","amount":-300000}]"#;
        let escaped = utf8_percent_encode(json, URI_COMPONENT).to_string();
        assert!(escaped.starts_with("%5B%7B%22id%22%3A%22o1%22%2C"));
        assert!(escaped.contains("%E5%BC%95"));

        let token = STANDARD.encode(&escaped);
        let decoded: Vec<OneOff> = decode_token(&token).expect("decodes");
        assert_eq!(decoded[0].label, "引越し");
        assert_eq!(decoded[0].amount, -300_000);
    }

    #[test]
    fn space_in_token_is_read_as_plus() {
        let assumptions = Assumptions::default();
        let token = encode_token(&assumptions).expect("encodes");
        let mangled = token.replace('+', " ");
        let decoded: Assumptions = decode_token(&mangled).expect("decodes");
        assert_eq!(decoded, assumptions);
    }

    #[test]
    fn malformed_tokens_are_errors() {
        assert!(matches!(
            decode_token::<Assumptions>("***"),
            Err(CodecError::Base64(_))
        ));
        let not_json = STANDARD.encode("hello");
        assert!(matches!(
            decode_token::<Assumptions>(&not_json),
            Err(CodecError::Json(_))
        ));
        let bad_escape = STANDARD.encode("%FF%FE");
        assert!(matches!(
            decode_token::<Assumptions>(&bad_escape),
            Err(CodecError::Utf8)
        ));
    }

    #[test]
    fn schema_mismatch_is_rejected() {
        let empty = encode_token(&Vec::<Member>::new()).expect("encodes");
        assert!(decode_token::<Members>(&empty).is_err());

        let mut expenses: Vec<crate::core::Expense> = Expenses::default().into();
        expenses.pop();
        let short = encode_token(&expenses).expect("encodes");
        assert!(decode_token::<Expenses>(&short).is_err());

        let wrong_shape = encode_token(&RetirementInputs::default()).expect("encodes");
        assert!(decode_token::<Vec<OneOff>>(&wrong_shape).is_err());
    }

    #[test]
    fn missing_take_home_rate_decodes_as_full_income() {
        let legacy = r#"{"inflation":0.02,"salaryGrowth":0.01,"returnRate":0.02,"initialSavings":2000000}"#;
        let token = STANDARD.encode(utf8_percent_encode(legacy, URI_COMPONENT).to_string());
        let decoded: Assumptions = decode_token(&token).expect("decodes");
        assert_eq!(decoded.take_home_rate, 1.0);
        assert_eq!(decoded.initial_savings, 2_000_000.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_members_expenses_and_one_offs_round_trip(
            name in "\\PC{0,24}",
            label in "\\PC{0,24}",
            expense_labels in vec("\\PC{0,24}", ExpenseKey::ALL.len()),
            expense_amounts in vec(0i64..=MAX_YEN, ExpenseKey::ALL.len()),
            birth_year in 1900i32..2100,
            base_income in 0i64..1_000_000_000,
            year in 1900i32..2200,
            amount in any::<i64>(),
        ) {
            let members = Members::single(Member {
                id: "m1".to_string(),
                name,
                birth_year,
                base_income,
            });
            let one_offs = vec![OneOff { id: "o1".to_string(), year, label, amount }];
            let expenses = Expenses::try_from(
                ExpenseKey::ALL
                    .iter()
                    .zip(expense_labels)
                    .zip(expense_amounts)
                    .map(|((&key, label), amount)| Expense { key, label, amount })
                    .collect::<Vec<_>>(),
            )
            .unwrap();

            let decoded: Members = decode_token(&encode_token(&members).unwrap()).unwrap();
            prop_assert_eq!(decoded, members);
            let decoded: Vec<OneOff> = decode_token(&encode_token(&one_offs).unwrap()).unwrap();
            prop_assert_eq!(decoded, one_offs);
            let decoded: Expenses = decode_token(&encode_token(&expenses).unwrap()).unwrap();
            prop_assert_eq!(decoded, expenses);
        }

        #[test]
        fn prop_assumptions_and_retirement_inputs_round_trip(
            inflation in -1.0f64..1.0,
            salary_growth in -1.0f64..1.0,
            return_rate in -1.0f64..1.0,
            initial_savings in -1e12f64..1e12,
            take_home_rate in 0.0f64..=1.0,
            current_age in 18u32..100,
            assets_now in 0i64..10_000_000_000,
            nominal_return_pct in -20.0f64..20.0,
        ) {
            let assumptions = Assumptions { inflation, salary_growth, return_rate, initial_savings, take_home_rate };
            let decoded: Assumptions = decode_token(&encode_token(&assumptions).unwrap()).unwrap();
            prop_assert_eq!(decoded, assumptions);

            let inputs = RetirementInputs {
                current_age,
                retire_age: current_age,
                life_age: current_age,
                assets_now,
                nominal_return_pct,
                ..RetirementInputs::default()
            };
            let decoded: RetirementInputs = decode_token(&encode_token(&inputs).unwrap()).unwrap();
            prop_assert_eq!(decoded, inputs);
        }
    }
}
