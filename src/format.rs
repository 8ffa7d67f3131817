use crate::models::SweepPoint;
use serde::Serialize;

/// Display strings for one sweep row. The numeric `SweepPoint` stays the
/// source of truth for charts and recommendations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedPoint {
    pub num_units: String,
    pub ptu_capacity_tpm: String,
    pub ptu_input_tokens: String,
    pub ptu_output_tokens: String,
    pub paygo_input_tokens: String,
    pub paygo_output_tokens: String,
    pub ptu_total_pct: String,
    pub ptu_monthly_cost: String,
    pub paygo_monthly_cost: String,
    pub total_monthly_cost: String,
    pub utilization_pct: String,
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn thousands(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Rounds to the nearest integer and groups thousands.
pub fn thousands_f64(value: f64) -> String {
    let rounded = value.round();
    let sign = if rounded < 0.0 { "-" } else { "" };
    format!("{sign}{}", group_thousands(&format!("{:.0}", rounded.abs())))
}

pub fn currency(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((&fixed, "00"));
    format!("{sign}${}.{cents}", group_thousands(whole))
}

pub fn percent(value: f64) -> String {
    format!("{value:.1}%")
}

pub fn signed_percent(value: f64) -> String {
    format!("{value:+.1}%")
}

/// Compact K/M/B rendering for headline metrics.
pub fn large_number(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{value:.0}")
    }
}

pub fn format_point(point: &SweepPoint) -> FormattedPoint {
    FormattedPoint {
        num_units: point.num_units.to_string(),
        ptu_capacity_tpm: thousands_f64(point.ptu_capacity_tpm),
        ptu_input_tokens: thousands(point.ptu_input_tokens),
        ptu_output_tokens: thousands(point.ptu_output_tokens),
        paygo_input_tokens: thousands(point.paygo_input_tokens),
        paygo_output_tokens: thousands(point.paygo_output_tokens),
        ptu_total_pct: percent(point.ptu_total_pct),
        ptu_monthly_cost: currency(point.ptu_monthly_cost),
        paygo_monthly_cost: currency(point.paygo_monthly_cost),
        total_monthly_cost: currency(point.total_monthly_cost),
        utilization_pct: percent(point.utilization_pct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_groups_digits() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_000), "1,000");
        assert_eq!(thousands(1_234_567), "1,234,567");
        assert_eq!(thousands_f64(45_000.4), "45,000");
        assert_eq!(thousands_f64(-1_500.0), "-1,500");
    }

    #[test]
    fn currency_uses_two_decimals() {
        assert_eq!(currency(0.0), "$0.00");
        assert_eq!(currency(1234.5), "$1,234.50");
        assert_eq!(currency(3315.0), "$3,315.00");
        assert_eq!(currency(-42.129), "-$42.13");
    }

    #[test]
    fn percent_rounds_to_one_decimal() {
        assert_eq!(percent(100.0), "100.0%");
        assert_eq!(percent(42.46), "42.5%");
        assert_eq!(signed_percent(12.34), "+12.3%");
        assert_eq!(signed_percent(-3.0), "-3.0%");
    }

    #[test]
    fn large_number_picks_suffix() {
        assert_eq!(large_number(950.0), "950");
        assert_eq!(large_number(1_260.0), "1.3K");
        assert_eq!(large_number(3_400_000.0), "3.4M");
        assert_eq!(large_number(5_600_000_000.0), "5.6B");
    }

    #[test]
    fn formatting_leaves_numbers_untouched() {
        let point = SweepPoint {
            num_units: 15,
            ptu_capacity_tpm: 45_000.0,
            ptu_input_tokens: 1_234_567,
            ptu_output_tokens: 89,
            paygo_input_tokens: 0,
            paygo_output_tokens: 10_000,
            ptu_total_pct: 99.19,
            ptu_monthly_cost: 3315.0,
            paygo_monthly_cost: 12.35,
            total_monthly_cost: 3327.35,
            utilization_pct: 7.26,
        };
        let before = point;
        let formatted = format_point(&point);

        assert_eq!(point, before);
        assert_eq!(formatted.ptu_capacity_tpm, "45,000");
        assert_eq!(formatted.ptu_input_tokens, "1,234,567");
        assert_eq!(formatted.ptu_total_pct, "99.2%");
        assert_eq!(formatted.total_monthly_cost, "$3,327.35");
        assert_eq!(formatted.utilization_pct, "7.3%");
    }
}
