//! Performance targets attached to intervals.

use hashctl_core::Uuid;
use serde::{Deserialize, Serialize};

/// Accounting window for an energy budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Day,
    Week,
    Month,
}

impl BudgetPeriod {
    pub const ALL: [BudgetPeriod; 3] = [BudgetPeriod::Day, BudgetPeriod::Week, BudgetPeriod::Month];
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetPeriod::Day => write!(f, "day"),
            BudgetPeriod::Week => write!(f, "week"),
            BudgetPeriod::Month => write!(f, "month"),
        }
    }
}

/// Target operating attributes for a device while an interval applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceLimit {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    /// Power limit (watts) the device should be set to.
    #[serde(default)]
    pub power_limit: Option<u32>,
    /// Maximum energy (kWh) per local day.
    #[serde(default)]
    pub daily_power_budget: Option<u32>,
    /// Maximum energy (kWh) per ISO week.
    #[serde(default)]
    pub weekly_power_budget: Option<u32>,
    /// Maximum energy (kWh) per calendar month.
    #[serde(default)]
    pub monthly_power_budget: Option<u32>,
}

impl PerformanceLimit {
    pub fn with_power_limit(watts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: None,
            power_limit: Some(watts),
            daily_power_budget: None,
            weekly_power_budget: None,
            monthly_power_budget: None,
        }
    }

    pub fn budget(&self, period: BudgetPeriod) -> Option<u32> {
        match period {
            BudgetPeriod::Day => self.daily_power_budget,
            BudgetPeriod::Week => self.weekly_power_budget,
            BudgetPeriod::Month => self.monthly_power_budget,
        }
    }

    pub fn has_budget(&self) -> bool {
        BudgetPeriod::ALL.iter().any(|p| self.budget(*p).is_some())
    }
}
