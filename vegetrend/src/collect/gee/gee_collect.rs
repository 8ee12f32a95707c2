use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use chrono::NaiveDate;
#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::collect::global_variables::{
    CLOUD_PROPERTY, DEFAULT_BASE_URL, S2_COLLECTION, THUMB_BANDS, THUMB_MAX, THUMB_MIN,
};
use crate::collect::{CompositeImage, ImageryProvider, IndexImage};
use crate::error::ProviderError;
use crate::geo_core::BoundingBox;

/// Blocking client for the Earth Engine REST surface.
///
/// Composites and index images are kept as expression descriptions and
/// re-submitted with every `value:compute` call; nothing is cached between
/// calls. Authentication is a bearer token; public test deployments may run
/// without one.
pub struct GeeCollect {
    client: Client,
    base_url: Url,
    project: String,
    token: Option<String>,
}

impl GeeCollect {
    pub fn new(project: impl Into<String>) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(GeeCollect {
            client,
            base_url: Url::parse(DEFAULT_BASE_URL)?,
            project: project.into(),
            token: None,
        })
    }

    /// Build a client from `GEE_PROJECT`, and optionally `GEE_TOKEN` and
    /// `GEE_BASE_URL`.
    pub fn from_env() -> Result<Self, ProviderError> {
        let project = std::env::var("GEE_PROJECT")
            .map_err(|_| ProviderError::Auth("GEE_PROJECT is not set".to_string()))?;
        let mut collect = GeeCollect::new(project)?;
        if let Ok(token) = std::env::var("GEE_TOKEN") {
            collect = collect.with_token(token);
        }
        if let Ok(base) = std::env::var("GEE_BASE_URL") {
            collect = collect.with_base_url(&base)?;
        }
        Ok(collect)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base: &str) -> Result<Self, ProviderError> {
        // A trailing slash keeps Url::join from eating the last path segment.
        self.base_url = if base.ends_with('/') {
            Url::parse(base)?
        } else {
            Url::parse(&format!("{}/", base))?
        };
        Ok(self)
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn check_status(response: Response) -> Result<Response, ProviderError> {
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!(
                "provider rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ProviderError::Api { status, body });
        }
        Ok(response)
    }

    fn post_json(&self, url: Url, body: &Value) -> Result<Value, ProviderError> {
        log::debug!("POST {}", url);
        let response = self.authorize(self.client.post(url)).json(body).send()?;
        let response = Self::check_status(response)?;
        Ok(response.json()?)
    }

    /// Download a body in 8 KiB chunks, with a progress bar when the length
    /// is known.
    fn get_bytes(&self, url: Url) -> Result<Vec<u8>, ProviderError> {
        log::debug!("GET {}", url);
        let response = self.authorize(self.client.get(url)).send()?;
        let mut response = Self::check_status(response)?;

        #[cfg(feature = "indicatif")]
        let pb = response.content_length().map(|len| {
            let pb = ProgressBar::new(len);
            pb.set_style(progress_style());
            pb.set_message("Rendering composite");
            pb
        });

        let mut bytes = Vec::new();
        let mut buffer = [0u8; 8192];
        loop {
            match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => {
                    bytes.extend_from_slice(&buffer[..n]);
                    #[cfg(feature = "indicatif")]
                    if let Some(ref pb) = pb {
                        pb.inc(n as u64);
                    }
                }
                Err(e) => return Err(ProviderError::Io(e)),
            }
        }

        #[cfg(feature = "indicatif")]
        if let Some(ref pb) = pb {
            pb.finish_and_clear();
        }

        Ok(bytes)
    }
}

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{bar:30}] {bytes}/{total_bytes}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Closed polygon ring for a rectangle, as provider request geometry.
fn region_geometry(region: &BoundingBox) -> geojson::Geometry {
    let ring = vec![
        vec![region.min_x, region.min_y],
        vec![region.max_x, region.min_y],
        vec![region.max_x, region.max_y],
        vec![region.min_x, region.max_y],
        vec![region.min_x, region.min_y],
    ];
    geojson::Geometry::new(geojson::Value::Polygon(vec![ring]))
}

/// Expression picking the least-cloudy scene of the collection for the
/// date interval, clipped to the selection region.
fn composite_expression(image: &CompositeImage) -> Value {
    json!({
        "imageCollection": &image.collection,
        "filterBounds": region_geometry(&image.region),
        "filterDate": {
            "start": image.start.to_string(),
            "end": image.end.to_string(),
        },
        "sort": { "property": CLOUD_PROPERTY, "ascending": true },
        "first": true,
        "clip": region_geometry(&image.region),
    })
}

fn index_expression(index: &IndexImage) -> Value {
    json!({
        "image": composite_expression(&index.composite),
        "normalizedDifference": {
            "bands": [&index.nir_band, &index.red_band],
            "rename": &index.name,
        },
    })
}

fn reduce_request(index: &IndexImage, region: &BoundingBox, scale_m: f64) -> Value {
    json!({
        "expression": {
            "image": index_expression(index),
            "reduceRegion": {
                "reducer": "MEAN",
                "geometry": region_geometry(region),
                "scale": scale_m,
            },
        },
    })
}

fn thumbnail_request(image: &CompositeImage) -> Value {
    json!({
        "expression": composite_expression(image),
        "fileFormat": "PNG",
        "bandIds": THUMB_BANDS,
        "visualizationOptions": {
            "ranges": [{ "min": THUMB_MIN, "max": THUMB_MAX }],
        },
    })
}

/// `value:compute` answer. Band values come back keyed by band name and
/// are null for regions without usable pixels.
#[derive(Debug, Deserialize)]
struct ComputeResponse {
    #[serde(default)]
    result: Option<HashMap<String, Option<f64>>>,
}

#[derive(Debug, Deserialize)]
struct ThumbnailResponse {
    name: String,
}

impl ImageryProvider for GeeCollect {
    fn fetch_composite(
        &self,
        region: &BoundingBox,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CompositeImage, ProviderError> {
        Ok(CompositeImage {
            collection: S2_COLLECTION.to_string(),
            region: *region,
            start,
            end,
        })
    }

    fn normalized_difference(
        &self,
        image: &CompositeImage,
        nir_band: &str,
        red_band: &str,
    ) -> Result<IndexImage, ProviderError> {
        Ok(IndexImage {
            composite: image.clone(),
            nir_band: nir_band.to_string(),
            red_band: red_band.to_string(),
            name: "NDVI".to_string(),
        })
    }

    fn reduce_region_mean(
        &self,
        index: &IndexImage,
        region: &BoundingBox,
        scale_m: f64,
    ) -> Result<Option<f64>, ProviderError> {
        let url = self.endpoint(&format!("projects/{}/value:compute", self.project))?;
        let body = reduce_request(index, region, scale_m);
        let answer = self.post_json(url, &body)?;
        let parsed: ComputeResponse = serde_json::from_value(answer)?;
        Ok(parsed
            .result
            .and_then(|bands| bands.get(&index.name).copied().flatten()))
    }

    fn render_thumbnail(&self, image: &CompositeImage) -> Result<Vec<u8>, ProviderError> {
        let url = self.endpoint(&format!("projects/{}/thumbnails", self.project))?;
        let body = thumbnail_request(image);
        let answer = self.post_json(url, &body)?;
        let thumb: ThumbnailResponse = serde_json::from_value(answer)?;
        let pixels = self.endpoint(&format!("{}:getPixels", thumb.name))?;
        self.get_bytes(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composite() -> CompositeImage {
        CompositeImage {
            collection: S2_COLLECTION.to_string(),
            region: BoundingBox::new(-1.2, 46.1, -1.1, 46.2),
            start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
        }
    }

    fn index() -> IndexImage {
        IndexImage {
            composite: composite(),
            nir_band: "B8".to_string(),
            red_band: "B4".to_string(),
            name: "NDVI".to_string(),
        }
    }

    #[test]
    fn test_region_geometry_ring_is_closed() {
        let geom = region_geometry(&BoundingBox::new(0.0, 1.0, 2.0, 3.0));
        match geom.value {
            geojson::Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 5);
                assert_eq!(rings[0].first(), rings[0].last());
            }
            other => panic!("expected polygon, got {:?}", other),
        }
    }

    #[test]
    fn test_composite_expression_carries_selection() {
        let expr = composite_expression(&composite());
        assert_eq!(expr["imageCollection"], S2_COLLECTION);
        assert_eq!(expr["filterDate"]["start"], "2023-01-01");
        assert_eq!(expr["filterDate"]["end"], "2023-12-31");
        assert_eq!(expr["sort"]["property"], CLOUD_PROPERTY);
        assert_eq!(expr["first"], true);
    }

    #[test]
    fn test_reduce_request_shape() {
        let body = reduce_request(&index(), &composite().region, 30.0);
        let reduce = &body["expression"]["reduceRegion"];
        assert_eq!(reduce["reducer"], "MEAN");
        assert_eq!(reduce["scale"], 30.0);
        let nd = &body["expression"]["image"]["normalizedDifference"];
        assert_eq!(nd["bands"][0], "B8");
        assert_eq!(nd["bands"][1], "B4");
        assert_eq!(nd["rename"], "NDVI");
    }

    #[test]
    fn test_thumbnail_request_uses_true_color_stretch() {
        let body = thumbnail_request(&composite());
        assert_eq!(body["fileFormat"], "PNG");
        assert_eq!(body["bandIds"][0], "B4");
        assert_eq!(body["bandIds"][2], "B2");
        assert_eq!(body["visualizationOptions"]["ranges"][0]["max"], 3000.0);
    }

    #[test]
    fn test_compute_response_value_present() {
        let parsed: ComputeResponse =
            serde_json::from_str(r#"{"result":{"NDVI":0.42}}"#).unwrap();
        let bands = parsed.result.unwrap();
        assert_eq!(bands.get("NDVI").copied().flatten(), Some(0.42));
    }

    #[test]
    fn test_compute_response_value_absent() {
        let parsed: ComputeResponse =
            serde_json::from_str(r#"{"result":{"NDVI":null}}"#).unwrap();
        let bands = parsed.result.unwrap();
        assert_eq!(bands.get("NDVI").copied().flatten(), None);

        let parsed: ComputeResponse = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert!(parsed.result.is_none());

        let parsed: ComputeResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.result.is_none());
    }

    #[test]
    fn test_endpoint_join_keeps_base_path() {
        let collect = GeeCollect::new("demo").unwrap();
        let url = collect.endpoint("projects/demo/value:compute").unwrap();
        assert_eq!(
            url.as_str(),
            "https://earthengine.googleapis.com/v1/projects/demo/value:compute"
        );
    }

    #[test]
    fn test_with_base_url_accepts_missing_slash() {
        let collect = GeeCollect::new("demo")
            .unwrap()
            .with_base_url("http://localhost:8080/v1")
            .unwrap();
        let url = collect.endpoint("projects/demo/thumbnails").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/v1/projects/demo/thumbnails");
    }
}
