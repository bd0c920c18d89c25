/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;

/// Cross-power magnitude below which a spectral bin is treated as empty.
pub const CROSS_POWER_FLOOR: f64 = 1e-12;

/// Curvature below which paraboloid peak refinement is skipped.
pub const PARABOLA_CURVATURE_FLOOR: f64 = 1e-12;

/// Cumulative shifts closer than this to an integer are snapped to it before
/// the bounding-box crop takes ceil/floor.
pub const INTEGER_SNAP_TOLERANCE: f64 = 1e-6;

/// Probe values at or above `1 - PROBE_VALID_TOLERANCE` count as valid data.
pub const PROBE_VALID_TOLERANCE: f32 = 1e-4;

/// Default minimum phase-correlation peak height accepted as a confident
/// estimate. The peak of a normalized correlation surface lies in [0, 1].
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.01;

/// Default supervisor poll tick for the batch coordinator.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default time without any progress message after which the worker is
/// considered dead.
pub const DEFAULT_LIVENESS_TIMEOUT_MS: u64 = 120_000;

/// Default upper frame index; past-the-end values are clamped.
pub const DEFAULT_INDEX_MAX: usize = 99_999;

/// Frames re-read at each chunk boundary during parallel shift estimation.
pub const CHUNK_OVERLAP: usize = 1;

/// File names of the shift diagnostics tables.
pub const SHIFTS_TABLE_NAME: &str = "shifts.txt";
pub const CUMULATIVE_SHIFTS_TABLE_NAME: &str = "shifts_cumul.txt";
