use rust_decimal::Decimal;

use crate::domain::service::{Frequency, OdourControlUnits, Service, ServiceType};
use crate::pricing::catalog::LineItem;

/// Cost of one visit for one row, before the frequency multiplier.
///
/// Chute cleaning multiplies by the chute count but hopper door inspection
/// does not, even though both rows carry `chutes`. Keep them separate.
pub fn row_visit_cost(service: &Service, odour_units: &OdourControlUnits) -> Decimal {
    match service {
        Service::ChuteCleaning(row) => row.price * Decimal::from(row.chutes),
        Service::HopperDoorInspection(row) => row.price,
        Service::EquipmentMaintenance(row) => row.price * Decimal::from(row.quantity),
        Service::BinCleaning(row) => row.price * Decimal::from(row.quantity),
        Service::WasteRoomPressureClean(row) => row.price,
        Service::OdourControl(row) => row.price * Decimal::from(odour_units.get(&row.id)),
    }
}

/// Annual cost of a catalog-priced service type: `sum(visit cost) * f`.
/// Odour control rows price at zero here; see [`odour_control_annual_cost`].
pub fn annual_cost(items: &[LineItem], frequency: Frequency) -> Decimal {
    let no_units = OdourControlUnits::default();
    visit_total(items, &no_units) * Decimal::from(frequency.multiplier())
}

/// `sum(unit price * customer quantity) * f`. Zero while no frequency is
/// chosen, whatever quantities were typed.
pub fn odour_control_annual_cost(
    items: &[LineItem],
    frequency: Frequency,
    units: &OdourControlUnits,
) -> Decimal {
    if !frequency.is_set() {
        return Decimal::ZERO;
    }
    visit_total(items, units) * Decimal::from(frequency.multiplier())
}

pub fn service_annual_cost(
    service_type: ServiceType,
    items: &[LineItem],
    frequency: Frequency,
    units: &OdourControlUnits,
) -> Decimal {
    match service_type {
        ServiceType::OdourControl => odour_control_annual_cost(items, frequency, units),
        _ => annual_cost(items, frequency),
    }
}

fn visit_total(items: &[LineItem], units: &OdourControlUnits) -> Decimal {
    items.iter().map(|item| row_visit_cost(&item.service, units)).sum()
}
