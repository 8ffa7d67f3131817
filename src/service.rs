use crate::aggregate::{minute_demand, summarize, token_total};
use crate::error::AppError;
use crate::format::{format_point, FormattedPoint};
use crate::models::{DatasetSummary, Recommendation, SweepPoint, UsageRecord};
use crate::pricing::ModelPricing;
use crate::simulation::cost::{aggregate_costs, CostInputs};
use crate::simulation::sweep::{sweep, SweepConfig};
use crate::simulation::SweepObserver;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub pricing: ModelPricing,
    pub sweep: SweepConfig,
    pub final_ptu_monthly_price: f64,
}

impl AnalysisRequest {
    fn validate(&self) -> Result<(), AppError> {
        self.sweep.validate()?;
        let price = self.final_ptu_monthly_price;
        if !price.is_finite() || price < 0.0 {
            return Err(AppError::InvalidConfiguration(format!(
                "final PTU monthly price must be >= 0, got {price}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub model: String,
    pub output_weight: f64,
    pub capacity_tpm_per_unit: f64,
    pub final_ptu_monthly_price: f64,
    pub summary: DatasetSummary,
    pub points: Vec<SweepPoint>,
    pub formatted: Vec<FormattedPoint>,
    pub recommendation: Option<Recommendation>,
    pub aborted: bool,
}

/// Runs the whole pipeline: minute aggregation, sweep, cost enrichment and
/// recommendation.
pub fn run_analysis(
    records: &[UsageRecord],
    request: &AnalysisRequest,
    observer: &dyn SweepObserver,
) -> Result<AnalysisReport, AppError> {
    request.validate()?;
    token_total(records)?;

    let weight = request.sweep.output_weight;
    let series = minute_demand(records, weight);
    let summary = summarize(records, &series)?;

    observer.on_status("Running PTU simulation...");
    let run = sweep(&series, &request.sweep, observer)?;

    let inputs = CostInputs {
        dataset_days: summary.dataset_days,
        final_ptu_monthly_price: request.final_ptu_monthly_price,
        input_price_per_1k: request.pricing.input_per_1k,
        output_price_per_1k: request.pricing.output_per_1k,
    };
    let points: Vec<SweepPoint> = run
        .totals
        .iter()
        .map(|t| aggregate_costs(t, &inputs))
        .collect();
    let formatted = points.iter().map(format_point).collect();
    let recommendation = recommend(&points);

    tracing::info!(
        points = points.len(),
        recommended = recommendation.as_ref().map(|r| r.num_units),
        "analysis complete"
    );

    Ok(AnalysisReport {
        model: request.pricing.model.clone(),
        output_weight: weight,
        capacity_tpm_per_unit: request.sweep.capacity_tpm_per_unit,
        final_ptu_monthly_price: request.final_ptu_monthly_price,
        summary,
        points,
        formatted,
        recommendation,
        aborted: run.aborted,
    })
}

/// Picks the PTU count whose total cost sits closest to PAYGO-only, preferring
/// configurations at or above it. Needs the zero-unit baseline.
pub fn recommend(points: &[SweepPoint]) -> Option<Recommendation> {
    let paygo_only_cost = points.iter().find(|p| p.num_units == 0)?.total_monthly_cost;
    let candidates = points.iter().filter(|p| p.num_units > 0);
    let diff = |p: &SweepPoint| p.total_monthly_cost - paygo_only_cost;

    let above = candidates
        .clone()
        .filter(|p| diff(*p) >= 0.0)
        .min_by(|a, b| diff(*a).total_cmp(&diff(*b)));
    let chosen = match above {
        Some(p) => p,
        None => candidates.min_by(|a, b| diff(*a).abs().total_cmp(&diff(*b).abs()))?,
    };

    let cost_diff_pct = if paygo_only_cost > 0.0 {
        Some(diff(chosen) / paygo_only_cost * 100.0)
    } else {
        None
    };

    Some(Recommendation {
        num_units: chosen.num_units,
        ptu_total_pct: chosen.ptu_total_pct,
        total_monthly_cost: chosen.total_monthly_cost,
        paygo_only_cost,
        cost_diff_pct,
    })
}
