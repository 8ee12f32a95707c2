pub mod gee;
pub mod global_variables;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::geo_core::BoundingBox;

/// Description of a least-cloudy composite scene held by the provider.
///
/// The provider keeps the pixels server-side; this handle carries the
/// selection (collection, clip region, date interval) that every later
/// call re-submits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeImage {
    pub collection: String,
    pub region: BoundingBox,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A per-pixel normalized-difference band derived from a composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexImage {
    pub composite: CompositeImage,
    pub nir_band: String,
    pub red_band: String,
    /// Band name the reduction result is published under.
    pub name: String,
}

/// Remote imagery and analytics capability the scan depends on.
///
/// Transport, auth and API failures surface as [`ProviderError`] and abort
/// the request. A region the provider simply has no pixels for is not a
/// failure: `reduce_region_mean` returns `Ok(None)` and the caller treats
/// the tile as absent.
pub trait ImageryProvider: Send + Sync {
    /// Select the least-cloudy composite clipped to `region` for the
    /// half-open date interval `[start, end]`.
    ///
    /// A range with no matching scene still yields a handle; the emptiness
    /// shows up as absent reductions downstream.
    fn fetch_composite(
        &self,
        region: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CompositeImage, ProviderError>;

    /// Per-pixel `(nir - red) / (nir + red)` over the composite.
    fn normalized_difference(
        &self,
        image: &CompositeImage,
        nir_band: &str,
        red_band: &str,
    ) -> Result<IndexImage, ProviderError>;

    /// Spatial mean of the index over `region`, sampled at `scale_m`
    /// meters per pixel. `Ok(None)` when the region holds no usable
    /// pixels (outside coverage, fully cloud-masked, no scene).
    fn reduce_region_mean(
        &self,
        index: &IndexImage,
        region: &BoundingBox,
        scale_m: f64,
    ) -> Result<Option<f64>, ProviderError>;

    /// True-color PNG rendering of the composite.
    fn render_thumbnail(&self, image: &CompositeImage) -> Result<Vec<u8>, ProviderError>;
}
