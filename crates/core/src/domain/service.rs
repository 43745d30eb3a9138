use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineItemId(pub String);

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    ChuteCleaning,
    EquipmentMaintenance,
    HopperDoorInspection,
    WasteRoomPressureClean,
    BinCleaning,
    OdourControl,
}

impl ServiceType {
    pub const ALL: [ServiceType; 6] = [
        ServiceType::ChuteCleaning,
        ServiceType::EquipmentMaintenance,
        ServiceType::HopperDoorInspection,
        ServiceType::WasteRoomPressureClean,
        ServiceType::BinCleaning,
        ServiceType::OdourControl,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::ChuteCleaning => "Chute Cleaning",
            Self::EquipmentMaintenance => "Equipment Maintenance",
            Self::HopperDoorInspection => "Hopper Door Inspection",
            Self::WasteRoomPressureClean => "Waste Room Pressure Clean",
            Self::BinCleaning => "Bin Cleaning",
            Self::OdourControl => "Odour Control",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChuteCleaning => "chute_cleaning",
            Self::EquipmentMaintenance => "equipment_maintenance",
            Self::HopperDoorInspection => "hopper_door_inspection",
            Self::WasteRoomPressureClean => "waste_room_pressure_clean",
            Self::BinCleaning => "bin_cleaning",
            Self::OdourControl => "odour_control",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One priced catalog row. Each variant carries only the fields its pricing
/// formula reads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Service {
    ChuteCleaning(ChuteCleaning),
    EquipmentMaintenance(EquipmentMaintenance),
    HopperDoorInspection(HopperDoorInspection),
    WasteRoomPressureClean(WasteRoomPressureClean),
    BinCleaning(BinCleaning),
    OdourControl(OdourControl),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChuteCleaning {
    pub id: LineItemId,
    #[serde(default)]
    pub levels: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub chutes: u32,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquipmentMaintenance {
    pub id: LineItemId,
    #[serde(default)]
    pub equipment: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub quantity: u32,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HopperDoorInspection {
    pub id: LineItemId,
    #[serde(default)]
    pub levels: String,
    /// Display only. The row price already covers every chute on the row.
    #[serde(default, deserialize_with = "lenient_count")]
    pub chutes: u32,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WasteRoomPressureClean {
    pub id: LineItemId,
    #[serde(default)]
    pub area: String,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BinCleaning {
    pub id: LineItemId,
    #[serde(default)]
    pub bin_size: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub quantity: u32,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Decimal,
}

/// Catalog rows carry a unit price only; the quantity comes from the customer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OdourControl {
    pub id: LineItemId,
    #[serde(deserialize_with = "lenient_price")]
    pub price: Decimal,
}

impl Service {
    pub fn service_type(&self) -> ServiceType {
        match self {
            Self::ChuteCleaning(_) => ServiceType::ChuteCleaning,
            Self::EquipmentMaintenance(_) => ServiceType::EquipmentMaintenance,
            Self::HopperDoorInspection(_) => ServiceType::HopperDoorInspection,
            Self::WasteRoomPressureClean(_) => ServiceType::WasteRoomPressureClean,
            Self::BinCleaning(_) => ServiceType::BinCleaning,
            Self::OdourControl(_) => ServiceType::OdourControl,
        }
    }

    pub fn id(&self) -> &LineItemId {
        match self {
            Self::ChuteCleaning(row) => &row.id,
            Self::EquipmentMaintenance(row) => &row.id,
            Self::HopperDoorInspection(row) => &row.id,
            Self::WasteRoomPressureClean(row) => &row.id,
            Self::BinCleaning(row) => &row.id,
            Self::OdourControl(row) => &row.id,
        }
    }

    pub fn unit_price(&self) -> Decimal {
        match self {
            Self::ChuteCleaning(row) => row.price,
            Self::EquipmentMaintenance(row) => row.price,
            Self::HopperDoorInspection(row) => row.price,
            Self::WasteRoomPressureClean(row) => row.price,
            Self::BinCleaning(row) => row.price,
            Self::OdourControl(row) => row.price,
        }
    }
}

/// Recurrence chosen for a whole service type. `null`, non-string and
/// unknown values deserialize to `Unset` so a bad selection prices at zero
/// instead of failing the total.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Frequency {
    #[serde(rename = "yearly")]
    Yearly,
    #[serde(rename = "six-monthly")]
    SixMonthly,
    #[serde(rename = "quarterly")]
    Quarterly,
    #[default]
    #[serde(rename = "unset")]
    Unset,
}

impl<'de> Deserialize<'de> for Frequency {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match raw {
            Some(serde_json::Value::String(text)) => Self::parse(&text),
            _ => Self::Unset,
        })
    }
}

impl Frequency {
    /// Visits per year.
    pub fn multiplier(self) -> u32 {
        match self {
            Self::Yearly => 1,
            Self::SixMonthly => 2,
            Self::Quarterly => 4,
            Self::Unset => 0,
        }
    }

    pub fn is_set(self) -> bool {
        self != Self::Unset
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Yearly => "Yearly",
            Self::SixMonthly => "Six-monthly",
            Self::Quarterly => "Quarterly",
            Self::Unset => "Not selected",
        }
    }

    /// Lenient parse used for raw form input.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "yearly" => Self::Yearly,
            "six-monthly" | "six_monthly" | "sixmonthly" => Self::SixMonthly,
            "quarterly" => Self::Quarterly,
            _ => Self::Unset,
        }
    }
}

impl FromStr for Frequency {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(value))
    }
}

/// Resolves a raw selection to its annual visit multiplier. Never fails.
pub fn resolve_multiplier(raw: Option<&str>) -> u32 {
    raw.map(Frequency::parse).unwrap_or_default().multiplier()
}

/// Customer-entered odour control quantities keyed by catalog row.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OdourControlUnits(BTreeMap<LineItemId, u32>);

impl OdourControlUnits {
    pub fn get(&self, id: &LineItemId) -> u32 {
        self.0.get(id).copied().unwrap_or(0)
    }

    pub fn set(&mut self, id: LineItemId, units: u32) {
        self.0.insert(id, units);
    }

    /// Stores raw numeric input; anything that is not a non-negative integer
    /// is stored as zero.
    pub fn set_raw(&mut self, id: LineItemId, raw: &str) -> u32 {
        let units = parse_units(raw);
        self.0.insert(id, units);
        units
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Keeps quantities for `rows` only.
    pub fn retain_rows(&mut self, rows: &[LineItemId]) {
        self.0.retain(|id, _| rows.contains(id));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Frequency choices and odour control quantities for one form session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSelections {
    #[serde(default)]
    pub frequencies: BTreeMap<ServiceType, Frequency>,
    #[serde(default)]
    pub odour_units: OdourControlUnits,
}

impl ServiceSelections {
    pub fn frequency(&self, service_type: ServiceType) -> Frequency {
        self.frequencies.get(&service_type).copied().unwrap_or_default()
    }

    pub fn set_frequency(&mut self, service_type: ServiceType, frequency: Frequency) {
        if frequency.is_set() {
            self.frequencies.insert(service_type, frequency);
        } else {
            self.frequencies.remove(&service_type);
        }
    }

    /// Number of service types with a frequency chosen.
    pub fn selected_count(&self) -> usize {
        ServiceType::ALL
            .iter()
            .filter(|service_type| self.frequency(**service_type).is_set())
            .count()
    }

    /// Drops choices the catalog cannot price: frequencies for types outside
    /// `offered` and quantities for rows outside `odour_rows`.
    pub fn restrict_to(&mut self, offered: &[ServiceType], odour_rows: &[LineItemId]) {
        self.frequencies
            .retain(|service_type, frequency| frequency.is_set() && offered.contains(service_type));
        self.odour_units.retain_rows(odour_rows);
    }
}

fn parse_units(raw: &str) -> u32 {
    let trimmed = raw.trim();
    if let Ok(units) = trimmed.parse::<u32>() {
        return units;
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 && value.fract() == 0.0 => {
            value.min(u32::MAX as f64) as u32
        }
        _ => 0,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(number) => match number.as_u64() {
            Some(count) => count.min(u64::from(u32::MAX)) as u32,
            None => number.as_f64().map(|value| parse_units(&value.to_string())).unwrap_or(0),
        },
        serde_json::Value::String(text) => parse_units(&text),
        _ => 0,
    })
}

fn lenient_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(number) => Decimal::from_str(&number.to_string())
            .or_else(|_| Decimal::from_scientific(&number.to_string()))
            .unwrap_or(Decimal::ZERO),
        serde_json::Value::String(text) => {
            let cleaned: String =
                text.trim().chars().filter(|ch| *ch != '$' && *ch != ',').collect();
            Decimal::from_str(&cleaned).unwrap_or(Decimal::ZERO)
        }
        _ => Decimal::ZERO,
    };
    Ok(parsed.max(Decimal::ZERO))
}
