use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncentiveTier {
    Basic,
    Essential,
    Pro,
}

impl IncentiveTier {
    pub const ALL: [IncentiveTier; 3] =
        [IncentiveTier::Basic, IncentiveTier::Essential, IncentiveTier::Pro];

    /// Selected service types needed to unlock the tier.
    pub fn threshold(self) -> usize {
        match self {
            Self::Basic => 3,
            Self::Essential => 4,
            Self::Pro => 6,
        }
    }

    /// Discount as a whole percentage.
    pub fn discount_pct(self) -> Decimal {
        match self {
            Self::Basic => Decimal::new(5, 0),
            Self::Essential => Decimal::new(10, 0),
            Self::Pro => Decimal::new(15, 0),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::Essential => "Essential",
            Self::Pro => "Pro",
        }
    }
}

pub fn tier_for(selected: usize) -> Option<IncentiveTier> {
    match selected {
        0..=2 => None,
        3 => Some(IncentiveTier::Basic),
        4 | 5 => Some(IncentiveTier::Essential),
        _ => Some(IncentiveTier::Pro),
    }
}

/// Discount percentage actually applied. Tiers only discount when the
/// agreement has incentives switched on.
pub fn applied_discount_pct(tier: Option<IncentiveTier>, incentives: bool) -> Decimal {
    match tier {
        Some(tier) if incentives => tier.discount_pct(),
        _ => Decimal::ZERO,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncentiveProgress {
    pub selected: usize,
    pub tier: Option<IncentiveTier>,
    pub next_tier: Option<IncentiveTier>,
    pub services_to_next_tier: usize,
}

pub fn progress(selected: usize) -> IncentiveProgress {
    let tier = tier_for(selected);
    let next_tier =
        IncentiveTier::ALL.into_iter().find(|candidate| candidate.threshold() > selected);
    let services_to_next_tier =
        next_tier.map(|next| next.threshold().saturating_sub(selected)).unwrap_or(0);

    IncentiveProgress { selected, tier, next_tier, services_to_next_tier }
}
