/// Marker written into aggregate rows for values that could not be measured.
pub const UNAVAILABLE: &str = "unavailable";

/// Directory under a night holding raw frames.
pub const DEFAULT_RAW_DIR: &str = "CR2";

/// Directory under a night holding sidecar metadata files.
pub const DEFAULT_METADATA_DIR: &str = "CR2info";

/// Directory under a night holding dark calibration frames.
pub const DEFAULT_DARK_DIR: &str = "Darks";

/// Extension of sidecar metadata files.
pub const SIDECAR_EXTENSION: &str = "info";

/// Raw frame file names look like `IMG0_0001.CR2`.
pub const DEFAULT_FRAME_PREFIX: &str = "IMG0_";
pub const DEFAULT_FRAME_DIGITS: usize = 4;
pub const DEFAULT_FRAME_EXTENSION: &str = "CR2";

/// Name of the symlink pointing at tonight's HTML table.
pub const DEFAULT_TONIGHT_LINK: &str = "tonight.html";

/// Seconds slept between directory listings.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;

/// Seconds waited after spotting new frames so the camera can finish
/// writing them.
pub const DEFAULT_SETTLE_INTERVAL_SECS: u64 = 5;

/// Local hour after which the monitor considers the night over.
pub const DEFAULT_CUTOFF_HOUR: u32 = 7;

/// Wait before each sidecar lookup attempt: immediate, +10 s, +20 s.
pub const DEFAULT_METADATA_RETRY_SECS: [u64; 3] = [0, 10, 20];

/// Upper bound on one frame's measurement subprocess.
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 240;

/// Upper bound on the raw conversion subprocess.
pub const DEFAULT_CONVERT_TIMEOUT_SECS: u64 = 60;

/// Upper bound on the astrometric solver.
pub const DEFAULT_SOLVE_TIMEOUT_SECS: u64 = 90;

/// Upper bound on source extraction.
pub const DEFAULT_EXTRACT_TIMEOUT_SECS: u64 = 60;

/// Time a timed-out process group gets between SIGTERM and SIGKILL.
pub const TERMINATE_GRACE_MS: u64 = 2000;

/// How often a running subprocess is polled for completion.
pub const TOOL_POLL_INTERVAL_MS: u64 = 100;

/// Arcseconds per radian.
pub const ARCSEC_PER_RADIAN: f64 = 206_264.806_247_096_36;

/// Minimum pixel count to split per-pixel work across Rayon threads.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Lower/upper percentiles used to stretch rendered JPEGs.
pub const JPEG_STRETCH_LOW: f32 = 0.005;
pub const JPEG_STRETCH_HIGH: f32 = 0.995;

/// JPEG quality (0-100).
pub const JPEG_QUALITY: u8 = 85;
