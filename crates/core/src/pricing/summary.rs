use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::agreement::Site;
use crate::domain::service::{Frequency, ServiceSelections, ServiceType};
use crate::pricing::aggregate::{row_visit_cost, service_annual_cost};
use crate::pricing::catalog::{project, LineItem};
use crate::pricing::incentives::{applied_discount_pct, progress, IncentiveProgress};

pub const CONTRACT_YEARS: u32 = 2;

#[derive(Clone, Debug)]
pub struct PricingInput<'a> {
    pub sites: &'a [Site],
    pub selections: &'a ServiceSelections,
    pub incentives: bool,
    pub currency: &'a str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub stage: String,
    pub detail: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PricedLineItem {
    #[serde(flatten)]
    pub line: LineItem,
    /// Customer-entered quantity, odour control rows only.
    pub units: Option<u32>,
    pub visit_cost: Decimal,
    pub annual_cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceCost {
    pub service_type: ServiceType,
    pub label: String,
    pub frequency: Frequency,
    pub visits_per_year: u32,
    pub line_items: Vec<PricedLineItem>,
    pub annual_cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgreementSummary {
    pub currency: String,
    /// Service types with catalog rows; types without rows are left out.
    pub services: Vec<ServiceCost>,
    pub incentive: IncentiveProgress,
    pub incentives_enabled: bool,
    pub discount_pct: Decimal,
    pub annual_subtotal: Decimal,
    pub discount_amount: Decimal,
    pub annual_total: Decimal,
    pub contract_years: u32,
    pub contract_total: Decimal,
    pub trace: Vec<PricingTraceStep>,
}

impl AgreementSummary {
    pub fn service(&self, service_type: ServiceType) -> Option<&ServiceCost> {
        self.services.iter().find(|service| service.service_type == service_type)
    }

    pub fn selected_services(&self) -> impl Iterator<Item = &ServiceCost> {
        self.services.iter().filter(|service| service.frequency.is_set())
    }
}

/// Pure projection of the current selections onto priced figures. Nothing is
/// rounded here; see [`format_money`].
pub fn summarize(input: &PricingInput<'_>) -> AgreementSummary {
    let mut services = Vec::new();
    let mut trace = Vec::new();

    for service_type in ServiceType::ALL {
        let rows = project(input.sites, service_type);
        if rows.is_empty() {
            continue;
        }

        let frequency = input.selections.frequency(service_type);
        let visits = Decimal::from(frequency.multiplier());
        let units = &input.selections.odour_units;
        let annual_cost = service_annual_cost(service_type, &rows, frequency, units);

        let line_items = rows
            .into_iter()
            .map(|line| {
                let visit_cost = row_visit_cost(&line.service, units);
                let row_units = match service_type {
                    ServiceType::OdourControl => Some(units.get(line.service.id())),
                    _ => None,
                };
                let row_annual =
                    if frequency.is_set() { visit_cost * visits } else { Decimal::ZERO };
                PricedLineItem { line, units: row_units, visit_cost, annual_cost: row_annual }
            })
            .collect();

        trace.push(PricingTraceStep {
            stage: service_type.as_str().to_string(),
            detail: format!("sum(row visit cost) x {} visits/yr", frequency.multiplier()),
            amount: annual_cost,
        });

        services.push(ServiceCost {
            service_type,
            label: service_type.label().to_string(),
            frequency,
            visits_per_year: frequency.multiplier(),
            line_items,
            annual_cost,
        });
    }

    let annual_subtotal: Decimal = services.iter().map(|service| service.annual_cost).sum();
    let incentive = progress(input.selections.selected_count());
    let discount_pct = applied_discount_pct(incentive.tier, input.incentives);
    let discount_amount = annual_subtotal * discount_pct / Decimal::ONE_HUNDRED;
    let annual_total = annual_subtotal - discount_amount;
    let contract_total = annual_total * Decimal::from(CONTRACT_YEARS);

    trace.push(PricingTraceStep {
        stage: "annual_subtotal".to_string(),
        detail: "sum(service annual cost)".to_string(),
        amount: annual_subtotal,
    });
    trace.push(PricingTraceStep {
        stage: "discount".to_string(),
        detail: match incentive.tier {
            Some(tier) if input.incentives => format!("{} tier at {discount_pct}%", tier.label()),
            Some(tier) => format!("{} tier reached, incentives disabled", tier.label()),
            None => "no tier reached".to_string(),
        },
        amount: discount_amount,
    });
    trace.push(PricingTraceStep {
        stage: "contract_total".to_string(),
        detail: format!("annual total x {CONTRACT_YEARS} years"),
        amount: contract_total,
    });

    AgreementSummary {
        currency: input.currency.to_string(),
        services,
        incentive,
        incentives_enabled: input.incentives,
        discount_pct,
        annual_subtotal,
        discount_amount,
        annual_total,
        contract_years: CONTRACT_YEARS,
        contract_total,
        trace,
    }
}

/// Renders `1234.5` as `$1,234.50`.
pub fn format_money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}${grouped}.{cents}", if negative { "-" } else { "" })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{format_money, summarize, PricingInput, CONTRACT_YEARS};
    use crate::domain::service::{Frequency, ServiceSelections, ServiceType};
    use crate::pricing::catalog::fixtures::{
        bins, chute, equipment, hopper, id, odour, pressure_clean, site,
    };
    use crate::pricing::incentives::IncentiveTier;

    fn dec(value: i64) -> Decimal {
        Decimal::new(value, 0)
    }

    fn input<'a>(
        sites: &'a [crate::domain::agreement::Site],
        selections: &'a ServiceSelections,
        incentives: bool,
    ) -> PricingInput<'a> {
        PricingInput { sites, selections, incentives, currency: "AUD" }
    }

    fn full_catalog() -> Vec<crate::domain::agreement::Site> {
        vec![site(
            "a",
            vec![(
                "a1",
                vec![
                    chute("c1", 650, 1),
                    equipment("e1", 100, 1),
                    hopper("h1", 100, 2),
                    pressure_clean("w1", 100),
                    bins("b1", 100, 1),
                    odour("o1", 100),
                ],
            )],
        )]
    }

    #[test]
    fn basic_tier_discount_example() {
        let sites = vec![site(
            "a",
            vec![("a1", vec![chute("c1", 650, 1), bins("b1", 0, 1), hopper("h1", 0, 1)])],
        )];
        let mut selections = ServiceSelections::default();
        selections.set_frequency(ServiceType::ChuteCleaning, Frequency::Quarterly);
        selections.set_frequency(ServiceType::BinCleaning, Frequency::Yearly);
        selections.set_frequency(ServiceType::HopperDoorInspection, Frequency::Yearly);

        let summary = summarize(&input(&sites, &selections, true));

        assert_eq!(summary.incentive.tier, Some(IncentiveTier::Basic));
        assert_eq!(summary.annual_subtotal, dec(2600));
        assert_eq!(summary.annual_total, dec(2470));
        assert_eq!(summary.contract_total, dec(4940));
        assert_eq!(summary.contract_years, CONTRACT_YEARS);
    }

    #[test]
    fn tiers_are_informational_without_incentives() {
        let sites = full_catalog();
        let mut selections = ServiceSelections::default();
        for service_type in ServiceType::ALL {
            selections.set_frequency(service_type, Frequency::Yearly);
        }
        selections.odour_units.set(id("o1"), 1);

        let summary = summarize(&input(&sites, &selections, false));

        assert_eq!(summary.incentive.tier, Some(IncentiveTier::Pro));
        assert_eq!(summary.discount_pct, Decimal::ZERO);
        assert_eq!(summary.annual_subtotal, dec(1150));
        assert_eq!(summary.annual_total, summary.annual_subtotal);
    }

    #[test]
    fn dropping_below_threshold_removes_discount_immediately() {
        let sites = full_catalog();
        let mut selections = ServiceSelections::default();
        selections.set_frequency(ServiceType::ChuteCleaning, Frequency::Yearly);
        selections.set_frequency(ServiceType::BinCleaning, Frequency::Yearly);
        selections.set_frequency(ServiceType::EquipmentMaintenance, Frequency::Yearly);
        assert_eq!(summarize(&input(&sites, &selections, true)).discount_pct, dec(5));

        selections.set_frequency(ServiceType::EquipmentMaintenance, Frequency::Unset);
        let summary = summarize(&input(&sites, &selections, true));
        assert_eq!(summary.incentive.tier, None);
        assert_eq!(summary.discount_amount, Decimal::ZERO);
    }

    #[test]
    fn services_without_catalog_rows_are_omitted() {
        let sites = vec![site("a", vec![("a1", vec![odour("o1", 180)])])];
        let mut selections = ServiceSelections::default();
        selections.set_frequency(ServiceType::OdourControl, Frequency::Quarterly);
        selections.odour_units.set(id("o1"), 2);

        let summary = summarize(&input(&sites, &selections, true));

        assert_eq!(summary.services.len(), 1);
        assert!(summary.service(ServiceType::ChuteCleaning).is_none());
        let odour = summary.service(ServiceType::OdourControl).expect("odour section");
        assert_eq!(odour.annual_cost, dec(1440));
        assert_eq!(odour.line_items[0].units, Some(2));
    }

    #[test]
    fn recomputing_is_idempotent() {
        let sites = full_catalog();
        let mut selections = ServiceSelections::default();
        selections.set_frequency(ServiceType::ChuteCleaning, Frequency::SixMonthly);
        selections.set_frequency(ServiceType::OdourControl, Frequency::Quarterly);
        selections.odour_units.set(id("o1"), 3);

        let first = summarize(&input(&sites, &selections, true));
        let second = summarize(&input(&sites, &selections, true));

        assert_eq!(first, second);
    }

    #[test]
    fn money_is_rounded_only_when_formatted() {
        assert_eq!(format_money(Decimal::new(123_450, 2)), "$1,234.50");
        assert_eq!(format_money(Decimal::new(10_005, 3)), "$10.01");
        assert_eq!(format_money(Decimal::ZERO), "$0.00");
        assert_eq!(format_money(dec(1_000_000)), "$1,000,000.00");
        assert_eq!(format_money(dec(-2470)), "-$2,470.00");
    }
}
