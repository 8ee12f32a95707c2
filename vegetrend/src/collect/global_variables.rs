use std::path::PathBuf;

/// Sentinel-2 surface-reflectance collection the composites are drawn from.
pub const S2_COLLECTION: &str = "COPERNICUS/S2_SR_HARMONIZED";

/// Scene property used to rank candidates; the least-cloudy scene wins.
pub const CLOUD_PROPERTY: &str = "CLOUDY_PIXEL_PERCENTAGE";

/// Near-infrared / red band pair for the normalized difference.
pub const NIR_BAND: &str = "B8";
pub const RED_BAND: &str = "B4";

/// True-color bands and reflectance stretch for rendered thumbnails.
pub const THUMB_BANDS: [&str; 3] = ["B4", "B3", "B2"];
pub const THUMB_MIN: f64 = 0.0;
pub const THUMB_MAX: f64 = 3000.0;

/// Sampling scale for index reductions, in meters per pixel.
pub const REDUCE_SCALE_M: f64 = 30.0;

/// Default REST endpoint of the imagery provider.
pub const DEFAULT_BASE_URL: &str = "https://earthengine.googleapis.com/v1/";

/// Where rendered yearly composites land.
pub const IMAGE_OUTPUT_DIR: &str = "static/images";

pub fn image_output_path() -> PathBuf {
    PathBuf::from(IMAGE_OUTPUT_DIR)
}
