// Reference configuration of the tunnel simulation.
pub const DEFAULT_RIGHT_CARS: u32 = 10;
pub const DEFAULT_LEFT_CARS: u32 = 10;

pub const DEFAULT_CAR_SPEED: u32 = 1;
pub const DEFAULT_TUNNEL_LENGTH: u32 = 4;
pub const DEFAULT_CONCURRENT_CARS: u32 = 4;

// One unit of tunnel length at speed 1 takes this long to cross.
pub const DEFAULT_TIME_UNIT_MS: u64 = 1000;

// Longest crossing a configuration may ask for (one year).
pub const MAX_CROSSING_SECS: f64 = 365.0 * 24.0 * 3600.0;
