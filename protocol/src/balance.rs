//! Display helpers for billing amounts.
//!
//! The billing API reports `total_usage` in hundredths of a dollar.

/// Round to a whole number of cents and convert to dollars.
pub fn format_balance(raw: f64) -> f64 {
    let dollars = raw.round() / 100.0;
    // keep "-0" out of the rendered text
    if dollars == 0.0 {
        0.0
    } else {
        dollars
    }
}

/// `$` followed by the shortest decimal rendering of [`format_balance`].
pub fn balance_text(raw: f64) -> String {
    format!("${}", format_balance(raw))
}
