pub mod aggregate;
pub mod catalog;
pub mod incentives;
pub mod summary;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};

pub use self::summary::{
    format_money, AgreementSummary, PricedLineItem, PricingInput, PricingTraceStep, ServiceCost,
    CONTRACT_YEARS,
};

pub trait PricingEngine: Send + Sync {
    fn summarize(&self, input: &PricingInput<'_>) -> AgreementSummary;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn summarize(&self, input: &PricingInput<'_>) -> AgreementSummary {
        summary::summarize(input)
    }
}

pub fn summarize_with_audit<P, S>(
    engine: &P,
    input: &PricingInput<'_>,
    sink: &S,
    audit: &AuditContext,
) -> AgreementSummary
where
    P: PricingEngine,
    S: AuditSink,
{
    let summary = engine.summarize(input);
    sink.emit(
        AuditEvent::new(
            audit.agreement_id.clone(),
            audit.correlation_id.clone(),
            "pricing.summary_evaluated",
            AuditCategory::Pricing,
            audit.actor.clone(),
            AuditOutcome::Success,
        )
        .with_metadata("annual_total", summary.annual_total.to_string())
        .with_metadata("contract_total", summary.contract_total.to_string())
        .with_metadata("selected", summary.incentive.selected.to_string()),
    );
    summary
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::audit::{AuditContext, InMemoryAuditSink};
    use crate::domain::agreement::AgreementId;
    use crate::domain::service::{Frequency, ServiceSelections, ServiceType};
    use crate::pricing::catalog::fixtures::{chute, site};
    use crate::pricing::{
        summarize_with_audit, AgreementSummary, DeterministicPricingEngine, PricingEngine,
        PricingInput,
    };

    #[test]
    fn engine_interface_can_be_substituted() {
        struct FlatEngine;

        impl PricingEngine for FlatEngine {
            fn summarize(&self, input: &PricingInput<'_>) -> AgreementSummary {
                let mut summary = crate::pricing::summary::summarize(input);
                summary.annual_total = Decimal::ONE;
                summary
            }
        }

        let sites = vec![site("a", vec![("a1", vec![chute("c1", 650, 1)])])];
        let selections = ServiceSelections::default();
        let input = PricingInput {
            sites: &sites,
            selections: &selections,
            incentives: true,
            currency: "AUD",
        };

        assert_eq!(FlatEngine.summarize(&input).annual_total, Decimal::ONE);
        assert_eq!(DeterministicPricingEngine.summarize(&input).annual_total, Decimal::ZERO);
    }

    #[test]
    fn audited_summary_records_totals() {
        let sites = vec![site("a", vec![("a1", vec![chute("c1", 650, 1)])])];
        let mut selections = ServiceSelections::default();
        selections.set_frequency(ServiceType::ChuteCleaning, Frequency::Quarterly);
        let input = PricingInput {
            sites: &sites,
            selections: &selections,
            incentives: true,
            currency: "AUD",
        };
        let sink = InMemoryAuditSink::default();

        let summary = summarize_with_audit(
            &DeterministicPricingEngine,
            &input,
            &sink,
            &AuditContext::new(Some(AgreementId("SA-7".to_string())), "req-7", "pricing"),
        );

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "pricing.summary_evaluated");
        assert_eq!(events[0].metadata.get("annual_total"), Some(&summary.annual_total.to_string()));
    }
}
