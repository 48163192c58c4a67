use chrono::DateTime;
use chrono_tz::Tz;

/// Inputs to one interval evaluation: when, and how warm it is.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub moment: DateTime<Tz>,
    /// Ambient temperature in °C, if known.
    pub temperature: Option<f64>,
}

impl Scenario {
    pub fn at(moment: DateTime<Tz>) -> Self {
        Self {
            moment,
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn temperature_f(&self) -> Option<f64> {
        self.temperature.map(|c| c * 9.0 / 5.0 + 32.0)
    }
}
