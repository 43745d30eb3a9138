use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::agreement::{BuildingId, Site, SiteId};
use crate::domain::service::{Service, ServiceType};

/// A catalog row with the site and building it belongs to.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub site_id: SiteId,
    pub site_name: String,
    pub building_id: BuildingId,
    pub building_name: String,
    pub service: Service,
}

/// Flattens Site -> Building -> Service into the rows of one service type,
/// in tree order.
pub fn project(sites: &[Site], service_type: ServiceType) -> Vec<LineItem> {
    sites
        .iter()
        .flat_map(|site| {
            site.buildings.iter().flat_map(move |building| {
                building
                    .services
                    .iter()
                    .filter(move |service| service.service_type() == service_type)
                    .map(move |service| LineItem {
                        site_id: site.id.clone(),
                        site_name: site.name.clone(),
                        building_id: building.id.clone(),
                        building_name: building.name.clone(),
                        service: service.clone(),
                    })
            })
        })
        .collect()
}

pub fn project_all(sites: &[Site]) -> BTreeMap<ServiceType, Vec<LineItem>> {
    ServiceType::ALL
        .iter()
        .map(|service_type| (*service_type, project(sites, *service_type)))
        .collect()
}

/// Service types that have at least one catalog row.
pub fn offered_service_types(sites: &[Site]) -> Vec<ServiceType> {
    ServiceType::ALL
        .into_iter()
        .filter(|service_type| {
            sites
                .iter()
                .flat_map(|site| &site.buildings)
                .flat_map(|building| &building.services)
                .any(|service| service.service_type() == *service_type)
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rust_decimal::Decimal;

    use crate::domain::agreement::{Building, BuildingId, PostalAddress, Site, SiteId, SiteKind};
    use crate::domain::contact::Contact;
    use crate::domain::service::{
        BinCleaning, ChuteCleaning, EquipmentMaintenance, HopperDoorInspection, LineItemId,
        OdourControl, Service, WasteRoomPressureClean,
    };

    pub fn id(raw: &str) -> LineItemId {
        LineItemId(raw.to_string())
    }

    pub fn chute(row: &str, price: i64, chutes: u32) -> Service {
        Service::ChuteCleaning(ChuteCleaning {
            id: id(row),
            levels: "1-20".to_string(),
            chutes,
            price: Decimal::new(price, 0),
        })
    }

    pub fn hopper(row: &str, price: i64, chutes: u32) -> Service {
        Service::HopperDoorInspection(HopperDoorInspection {
            id: id(row),
            levels: "1-20".to_string(),
            chutes,
            price: Decimal::new(price, 0),
        })
    }

    pub fn equipment(row: &str, price: i64, quantity: u32) -> Service {
        Service::EquipmentMaintenance(EquipmentMaintenance {
            id: id(row),
            equipment: "Compactor".to_string(),
            quantity,
            price: Decimal::new(price, 0),
        })
    }

    pub fn pressure_clean(row: &str, price: i64) -> Service {
        Service::WasteRoomPressureClean(WasteRoomPressureClean {
            id: id(row),
            area: "Basement waste room".to_string(),
            price: Decimal::new(price, 0),
        })
    }

    pub fn bins(row: &str, price: i64, quantity: u32) -> Service {
        Service::BinCleaning(BinCleaning {
            id: id(row),
            bin_size: "240L".to_string(),
            quantity,
            price: Decimal::new(price, 0),
        })
    }

    pub fn odour(row: &str, price: i64) -> Service {
        Service::OdourControl(OdourControl { id: id(row), price: Decimal::new(price, 0) })
    }

    pub fn site(site_id: &str, buildings: Vec<(&str, Vec<Service>)>) -> Site {
        Site {
            id: SiteId(site_id.to_string()),
            name: format!("Site {site_id}"),
            address: PostalAddress {
                street: "1 George St".to_string(),
                suburb: "Sydney".to_string(),
                state: "NSW".to_string(),
                postcode: "2000".to_string(),
            },
            kind: SiteKind::Existing,
            buildings: buildings
                .into_iter()
                .map(|(building_id, services)| Building {
                    id: BuildingId(building_id.to_string()),
                    name: format!("Building {building_id}"),
                    services,
                })
                .collect(),
            contacts: vec![Contact::default()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{bins, chute, odour, site};
    use super::{offered_service_types, project, project_all};
    use crate::domain::service::ServiceType;

    #[test]
    fn projection_is_order_stable_and_annotated() {
        let sites = vec![
            site("a", vec![("a1", vec![chute("c1", 650, 1), bins("b1", 20, 4)])]),
            site("b", vec![("b1", vec![chute("c2", 700, 2)]), ("b2", vec![chute("c3", 100, 1)])]),
        ];

        let rows = project(&sites, ServiceType::ChuteCleaning);

        let ids: Vec<&str> = rows.iter().map(|row| row.service.id().0.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(rows[1].site_name, "Site b");
        assert_eq!(rows[2].building_name, "Building b2");
        assert_eq!(rows[2].building_id.0, "b2");
    }

    #[test]
    fn empty_tree_projects_to_empty_lists() {
        assert!(project(&[], ServiceType::OdourControl).is_empty());
        assert!(project_all(&[]).values().all(Vec::is_empty));
        assert!(offered_service_types(&[]).is_empty());
    }

    #[test]
    fn offered_types_follow_catalog_contents() {
        let sites = vec![site("a", vec![("a1", vec![odour("o1", 180), bins("b1", 20, 4)])])];

        assert_eq!(
            offered_service_types(&sites),
            vec![ServiceType::BinCleaning, ServiceType::OdourControl]
        );
    }
}
