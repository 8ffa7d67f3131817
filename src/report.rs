use crate::error::AppError;
use crate::format::{currency, large_number, percent, signed_percent, thousands};
use crate::models::SweepPoint;
use crate::service::AnalysisReport;
use std::fmt::Write as _;

const TABLE_HEADERS: [&str; 11] = [
    "PTUs",
    "PTU Capacity (TPM)",
    "PTU Input Tokens",
    "PTU Output Tokens",
    "PAYGO Input Tokens",
    "PAYGO Output Tokens",
    "% Tokens by PTU",
    "PTU Monthly Cost",
    "PAYGO Monthly Cost",
    "Total Monthly Cost",
    "Utilization %",
];

const CSV_HEADER: &str = "num_ptus,ptu_capacity_tpm,ptu_input_tokens,ptu_output_tokens,\
paygo_input_tokens,paygo_output_tokens,ptu_total_pct,ptu_monthly_cost_usd,\
paygo_monthly_cost_usd,total_monthly_cost_usd,utilization_pct,\
ptu_total_pct_formatted,utilization_pct_formatted";

pub fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn csv_row(point: &SweepPoint) -> String {
    format!(
        "{},{},{},{},{},{},{:.4},{:.2},{:.2},{:.2},{:.4},{},{}",
        point.num_units,
        point.ptu_capacity_tpm,
        point.ptu_input_tokens,
        point.ptu_output_tokens,
        point.paygo_input_tokens,
        point.paygo_output_tokens,
        point.ptu_total_pct,
        point.ptu_monthly_cost,
        point.paygo_monthly_cost,
        point.total_monthly_cost,
        point.utilization_pct,
        csv_field(&percent(point.ptu_total_pct)),
        csv_field(&percent(point.utilization_pct)),
    )
}

/// One row per sweep point, raw numbers first, display percentages last.
pub fn to_csv(points: &[SweepPoint]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for point in points {
        out.push_str(&csv_row(point));
        out.push('\n');
    }
    out
}

pub fn to_json(report: &AnalysisReport) -> Result<String, AppError> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn render_table(report: &AnalysisReport) -> String {
    let rows: Vec<[String; 11]> = report
        .formatted
        .iter()
        .map(|f| {
            [
                f.num_units.clone(),
                f.ptu_capacity_tpm.clone(),
                f.ptu_input_tokens.clone(),
                f.ptu_output_tokens.clone(),
                f.paygo_input_tokens.clone(),
                f.paygo_output_tokens.clone(),
                f.ptu_total_pct.clone(),
                f.ptu_monthly_cost.clone(),
                f.paygo_monthly_cost.clone(),
                f.total_monthly_cost.clone(),
                f.utilization_pct.clone(),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.len());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = TABLE_HEADERS
        .iter()
        .zip(widths)
        .map(|(h, w)| format!("{h:>w$}"))
        .collect();
    out.push_str(&header.join("  "));
    out.push('\n');
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&rule.join("  "));
    out.push('\n');
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(c, w)| format!("{c:>w$}"))
            .collect();
        out.push_str(&cells.join("  "));
        out.push('\n');
    }
    out
}

/// Human-readable report: dataset overview, sweep table and recommendation.
pub fn render_text(report: &AnalysisReport) -> String {
    let s = &report.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Dataset Overview");
    let _ = writeln!(out, "  Peak TPM:            {}", thousands(s.peak_tpm));
    let _ = writeln!(out, "  Total input tokens:  {}", thousands(s.total_input_tokens));
    let _ = writeln!(out, "  Total output tokens: {}", thousands(s.total_output_tokens));
    let _ = writeln!(out, "  Total requests:      {}", thousands(s.total_requests as u64));
    let _ = writeln!(out, "  Dataset duration:    {:.1} days", s.dataset_days);
    let _ = writeln!(out, "  Average TPM:         {}", large_number(s.average_tpm));
    let _ = writeln!(out);

    let _ = writeln!(
        out,
        "PTU Analysis ({}, {} TPM/PTU, output weight {:.2}, {}/PTU/month)",
        report.model,
        thousands(report.capacity_tpm_per_unit.round() as u64),
        report.output_weight,
        currency(report.final_ptu_monthly_price),
    );
    out.push_str(&render_table(report));
    if report.aborted {
        let _ = writeln!(out, "(sweep stopped early; results are partial)");
    }

    if let Some(rec) = &report.recommendation {
        let _ = writeln!(out);
        let _ = writeln!(out, "Traffic Optimization");
        let _ = writeln!(out, "  Recommended PTU count:  {}", rec.num_units);
        let _ = writeln!(out, "  % of optimized tokens:  {}", percent(rec.ptu_total_pct));
        let vs_paygo = rec
            .cost_diff_pct
            .map(|pct| format!(" ({} vs PAYGO)", signed_percent(pct)))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  Total monthly cost:     {}{vs_paygo}",
            currency(rec.total_monthly_cost)
        );
    }

    out
}
