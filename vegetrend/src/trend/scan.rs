use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate};
use geo::Point;
use serde::Serialize;

use crate::collect::global_variables::{NIR_BAND, RED_BAND, REDUCE_SCALE_M};
use crate::collect::{CompositeImage, ImageryProvider};
use crate::commons::cancel::CancelToken;
use crate::error::{StoreError, TrendError};
use crate::geo_core::{region_from_center, TileGrid, DEFAULT_TILE_SIZE_M};
use crate::imagery::ImageStore;
use crate::progress::ProgressSink;
use crate::trend::tiles::{reduce_year, score_tiles};

/// Average NDVI of one scanned year. `None` when no tile in that year
/// produced a usable value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyScore {
    pub year: i32,
    pub score: Option<f64>,
}

/// Multi-year NDVI scan of a fixed area around a center coordinate.
///
/// One instance handles one request: validate the inputs, then `run`
/// walks a trailing window of years oldest first, scoring each year's
/// least-cloudy composite tile by tile and storing a rendered snapshot
/// of it. Results are read back through [`scores`](Self::scores) and
/// [`image_paths`](Self::image_paths).
pub struct VegetationTrend {
    center: Point<f64>,
    area_m2: f64,
    window: usize,
    current_year: i32,
    tile_size_m: f64,
    reduce_scale_m: f64,
    scores: Vec<YearlyScore>,
    image_paths: Vec<PathBuf>,
}

impl VegetationTrend {
    /// Create a scan for `area_m2` square meters centered on
    /// (`lat`, `lon`). The window defaults to 4 years ending in the
    /// current local year.
    pub fn new(lat: f64, lon: f64, area_m2: f64) -> Result<Self, TrendError> {
        if !(area_m2 > 0.0) {
            return Err(TrendError::InvalidArea(area_m2));
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(TrendError::InvalidCoordinate { lat, lon });
        }
        Ok(VegetationTrend {
            center: Point::new(lon, lat),
            area_m2,
            window: 4,
            current_year: Local::now().year(),
            tile_size_m: DEFAULT_TILE_SIZE_M,
            reduce_scale_m: REDUCE_SCALE_M,
            scores: Vec::new(),
            image_paths: Vec::new(),
        })
    }

    /// Number of years to scan, ending at the current year. Minimum 1.
    pub fn set_window(&mut self, years: usize) {
        self.window = years.max(1);
    }

    /// Pin the final year of the window instead of reading the clock.
    pub fn set_current_year(&mut self, year: i32) {
        self.current_year = year;
    }

    /// Run the scan. Consumes and returns `self` so results can be read
    /// off the returned instance.
    pub fn run(
        mut self,
        provider: &dyn ImageryProvider,
        store: &dyn ImageStore,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<Self, TrendError> {
        self.run_internal(provider, store, progress, cancel)?;
        Ok(self)
    }

    /// Internal run method that can be called mutably.
    pub fn run_internal(
        &mut self,
        provider: &dyn ImageryProvider,
        store: &dyn ImageStore,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), TrendError> {
        self.scores.clear();
        self.image_paths.clear();

        let (lat, lon) = (self.center.y(), self.center.x());
        let first_year = self.current_year - (self.window as i32 - 1);

        for year in first_year..=self.current_year {
            if cancel.is_cancelled() {
                return Err(TrendError::Cancelled);
            }

            let (start, end) = year_bounds(year)?;
            progress.emit(&format!(
                "Fetching images for lat {}, lon {}; {} -> {}",
                lat, lon, start, end
            ));

            // The bounding region only depends on the request inputs, but
            // it is rebuilt every year on purpose: each iteration is a
            // self-contained fetch.
            let region = region_from_center(self.center, self.area_m2)?;
            let composite = provider.fetch_composite(&region, start, end)?;

            match persist_composite(provider, store, &composite, year) {
                Ok(path) => {
                    progress.emit(&format!("Image saved: {}", path.display()));
                    self.image_paths.push(path);
                }
                Err(err) => {
                    // The yearly score does not depend on the stored
                    // snapshot; report and keep scoring.
                    log::warn!("composite snapshot for {} was not stored: {}", year, err);
                    progress.emit(&format!(
                        "Warning: composite image for {} was not stored: {}",
                        year, err
                    ));
                }
            }

            let ndvi = provider.normalized_difference(&composite, NIR_BAND, RED_BAND)?;

            let grid = TileGrid::build(self.center, self.area_m2, self.tile_size_m)?;
            progress.emit(&format!(
                "Dividing the area into {} x {} tiles of {} m",
                grid.tiles_per_axis(),
                grid.tiles_per_axis(),
                self.tile_size_m
            ));

            let tile_scores = score_tiles(
                provider,
                &ndvi,
                &grid,
                self.reduce_scale_m,
                progress,
                cancel,
            )?;
            let average = reduce_year(&tile_scores);

            match average {
                Some(value) => progress.emit(&format!(
                    "Calculation success for {}; average NDVI: {}",
                    year, value
                )),
                None => progress.emit(&format!("No tile produced a score for {}", year)),
            }
            self.scores.push(YearlyScore {
                year,
                score: average,
            });
        }

        Ok(())
    }

    /// Yearly averages, oldest year first.
    pub fn scores(&self) -> &[YearlyScore] {
        &self.scores
    }

    /// Stored snapshot paths, oldest year first. A year whose snapshot
    /// failed to persist contributes no entry.
    pub fn image_paths(&self) -> &[PathBuf] {
        &self.image_paths
    }

    pub fn center(&self) -> Point<f64> {
        self.center
    }

    pub fn area_m2(&self) -> f64 {
        self.area_m2
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }
}

fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate), TrendError> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    match (start, end) {
        (Some(start), Some(end)) => Ok((start, end)),
        _ => Err(TrendError::InvalidWindow(year)),
    }
}

/// Render the composite through the provider and hand the bytes to the
/// store. Both halves count as persistence for error purposes.
fn persist_composite(
    provider: &dyn ImageryProvider,
    store: &dyn ImageStore,
    image: &CompositeImage,
    year: i32,
) -> Result<PathBuf, StoreError> {
    let png = provider
        .render_thumbnail(image)
        .map_err(|source| StoreError::Render { year, source })?;
    store.store(year, &png)
}
