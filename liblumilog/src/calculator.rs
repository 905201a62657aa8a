//! Closed-form beam physics: HER/LER scaling, bunch currents and the luminosity model.
//!
//! Luminosity is evaluated per sample as
//!
//! ```text
//! product    = (ler / nb * 1000) * (her / nb * 1000)     [mA^2]
//! luminosity = product * L_sp(product) * nb / normalization
//! ```
//!
//! where `nb` is the bunch count of the active regime and `L_sp` is the specific
//! luminosity, either a constant or a fitted function of the bunch current product.
use serde::{Deserialize, Serialize};

use super::constants::{
    DEFAULT_LSP_AMPLITUDE, DEFAULT_LSP_OFFSET, DEFAULT_LSP_RATE, DEFAULT_LSP_SCALE, MILLI_PER_UNIT,
};
use super::series::DerivedValue;

/// HER current implied by a LER current and the design HER/LER ratio
pub fn scale_her_from_ler(ler_current: f64, ratio: f64) -> f64 {
    ler_current * ratio
}

/// Current per bunch in mA. The bunch count is always a positive configured constant.
pub fn bunch_current(total_current: f64, bunch_count: f64) -> f64 {
    total_current / bunch_count * MILLI_PER_UNIT
}

/// Specific luminosity as a function of the bunch current product (mA^2)
pub trait SpecificLuminosity: Send + Sync {
    fn at(&self, product: f64) -> f64;
}

impl<F> SpecificLuminosity for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn at(&self, product: f64) -> f64 {
        self(product)
    }
}

/// The configurable specific luminosity models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuminosityModel {
    Constant {
        value: f64,
    },
    /// `(amplitude * exp(rate * x) + offset) * scale`
    Exponential {
        amplitude: f64,
        rate: f64,
        offset: f64,
        scale: f64,
    },
}

impl Default for LuminosityModel {
    fn default() -> Self {
        Self::Exponential {
            amplitude: DEFAULT_LSP_AMPLITUDE,
            rate: DEFAULT_LSP_RATE,
            offset: DEFAULT_LSP_OFFSET,
            scale: DEFAULT_LSP_SCALE,
        }
    }
}

impl SpecificLuminosity for LuminosityModel {
    fn at(&self, product: f64) -> f64 {
        match self {
            Self::Constant { value } => *value,
            Self::Exponential {
                amplitude,
                rate,
                offset,
                scale,
            } => (amplitude * (rate * product).exp() + offset) * scale,
        }
    }
}

/// Before or after collisions started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRegime {
    PreCollision,
    Colliding,
}

/// Which fill pattern the instantaneous LER current implies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrentRegime {
    FillingScheme,
    Nominal,
}

/// The state a sample is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionState {
    PreCollision,
    FillingScheme,
    Nominal,
}

/// Maps every (time, current) regime pair to the state it is evaluated in
pub fn collision_state(time: TimeRegime, current: CurrentRegime) -> CollisionState {
    match (time, current) {
        (TimeRegime::PreCollision, CurrentRegime::FillingScheme) => CollisionState::PreCollision,
        (TimeRegime::PreCollision, CurrentRegime::Nominal) => CollisionState::PreCollision,
        (TimeRegime::Colliding, CurrentRegime::FillingScheme) => CollisionState::FillingScheme,
        (TimeRegime::Colliding, CurrentRegime::Nominal) => CollisionState::Nominal,
    }
}

/// The date and current cutoffs that select a formula branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegimeThreshold {
    /// Seconds since the reference epoch; samples at or before this are pre-collision
    pub collision_start: f64,
    /// LER currents strictly below this use the filling scheme bunch count
    pub filling_current: f64,
}

impl RegimeThreshold {
    pub fn time_regime(&self, as_of_time: f64) -> TimeRegime {
        if as_of_time > self.collision_start {
            TimeRegime::Colliding
        } else {
            TimeRegime::PreCollision
        }
    }

    /// Only ever looks at the input LER current
    pub fn current_regime(&self, ler_current: f64) -> CurrentRegime {
        if ler_current < self.filling_current {
            CurrentRegime::FillingScheme
        } else {
            CurrentRegime::Nominal
        }
    }
}

/// A bunch count together with the specific luminosity used for it
pub struct BunchScheme {
    pub bunch_count: f64,
    pub model: Box<dyn SpecificLuminosity>,
}

impl BunchScheme {
    pub fn new(bunch_count: f64, model: impl SpecificLuminosity + 'static) -> Self {
        Self {
            bunch_count,
            model: Box::new(model),
        }
    }
}

impl std::fmt::Debug for BunchScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BunchScheme")
            .field("bunch_count", &self.bunch_count)
            .finish_non_exhaustive()
    }
}

/// Evaluates the bunch current product and luminosity for each sample.
#[derive(Debug)]
pub struct LuminosityCalculator {
    threshold: RegimeThreshold,
    nominal: BunchScheme,
    filling: BunchScheme,
    normalization: f64,
}

impl LuminosityCalculator {
    pub fn new(
        threshold: RegimeThreshold,
        nominal: BunchScheme,
        filling: BunchScheme,
        normalization: f64,
    ) -> Self {
        Self {
            threshold,
            nominal,
            filling,
            normalization,
        }
    }

    pub fn threshold(&self) -> &RegimeThreshold {
        &self.threshold
    }

    pub fn classify(&self, ler_current: f64, as_of_time: f64) -> CollisionState {
        collision_state(
            self.threshold.time_regime(as_of_time),
            self.threshold.current_regime(ler_current),
        )
    }

    /// Returns (bunch current product, luminosity) for a single sample
    pub fn luminosity_and_product(
        &self,
        ler_current: f64,
        her_current: f64,
        as_of_time: f64,
    ) -> (DerivedValue, DerivedValue) {
        let scheme = match self.classify(ler_current, as_of_time) {
            CollisionState::PreCollision => {
                return (DerivedValue::NotColliding, DerivedValue::NotColliding)
            }
            CollisionState::FillingScheme => &self.filling,
            CollisionState::Nominal => &self.nominal,
        };
        let product = bunch_current(ler_current, scheme.bunch_count)
            * bunch_current(her_current, scheme.bunch_count);
        let luminosity =
            product * scheme.model.at(product) * scheme.bunch_count / self.normalization;
        (DerivedValue::Valid(product), DerivedValue::Valid(luminosity))
    }
}
