// Unit conversion
pub const MILLI_PER_UNIT: f64 = 1000.0;

// SuperKEKB design values
pub const DEFAULT_HER_TO_LER_RATIO: f64 = 1.83 / 2.58;
pub const DEFAULT_NOMINAL_BUNCH_COUNT: f64 = 2346.0;
pub const DEFAULT_FILLING_BUNCH_COUNT: f64 = 393.0;

// Specific luminosity fit, (A * exp(k * x) + C) * scale, x in mA^2
pub const DEFAULT_LSP_AMPLITUDE: f64 = 4.77727;
pub const DEFAULT_LSP_RATE: f64 = -2.4878;
pub const DEFAULT_LSP_OFFSET: f64 = 4.33312;
pub const DEFAULT_LSP_SCALE: f64 = 1.0e31;

/// Luminosity is reported in units of 1e35 cm^-2 s^-1
pub const DEFAULT_LUMINOSITY_NORMALIZATION: f64 = 1.0e35;

pub const DEFAULT_REFERENCE_DATE: &str = "1995-01-01";
pub const DEFAULT_COLLISION_START: &str = "2024-10-22";

// Names and styles of the series derived from the beam current channel
pub const HER_NAME: &str = "her";
pub const LER_BUNCH_NAME: &str = "ler_bunch_current";
pub const HER_BUNCH_NAME: &str = "her_bunch_current";
pub const PRODUCT_NAME: &str = "bunch_current_product";
pub const LUMINOSITY_NAME: &str = "luminosity";
pub const DERIVED_SERIES_NAMES: [&str; 5] = [
    HER_NAME,
    LER_BUNCH_NAME,
    HER_BUNCH_NAME,
    PRODUCT_NAME,
    LUMINOSITY_NAME,
];
pub const HER_STYLE: u32 = 4;
pub const PRODUCT_STYLE: u32 = 1;
pub const LUMINOSITY_STYLE: u32 = 44;

/// The marker older consumers expect in place of pre-collision values
pub const LEGACY_SENTINEL: f64 = -100.0;

/// Version of the exported series layout
pub const FORMAT_VERSION: &str = "1.0";
