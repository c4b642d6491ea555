/// Device id used when a GPX file carries no `<metadata><device>`.
pub const FALLBACK_DEVICE_ID: &str = "import_gpx";

/// Every imported point is labelled with this provider.
pub const PROVIDER: &str = "gps";

/// One row of the `trkpt` table, minus the per-file device id.
#[derive(Debug, Clone, PartialEq)]
pub struct Trkpt {
    /// Epoch milliseconds.
    pub time: i64,
    pub lat: f64,
    pub lon: f64,
    pub accuracy: f64,
    pub ele: Option<f64>,
    pub sat: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GpxFile {
    pub device_id: String,
    pub points: Vec<Trkpt>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub files: usize,
    pub points: usize,
    pub inserted: usize,
    pub duplicates: usize,
}
