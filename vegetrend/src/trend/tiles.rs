use crate::collect::{ImageryProvider, IndexImage};
use crate::commons::cancel::CancelToken;
use crate::error::TrendError;
use crate::geo_core::TileGrid;
use crate::progress::ProgressSink;

/// Score every tile of the grid with a spatial mean of the index.
///
/// Tiles are visited in grid order, one blocking provider round-trip each.
/// A tile the provider has no value for is recorded as `None` and later
/// excluded from the yearly mean; a provider error aborts the whole
/// request. One progress line goes out before and one after each tile.
pub fn score_tiles(
    provider: &dyn ImageryProvider,
    index: &IndexImage,
    grid: &TileGrid,
    scale_m: f64,
    progress: &dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<Vec<Option<f64>>, TrendError> {
    let total = grid.len();
    let mut scores = Vec::with_capacity(total);

    for (idx, tile) in grid.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(TrendError::Cancelled);
        }
        let number = idx + 1;
        progress.emit(&format!("Processing tile {} of {}", number, total));

        let score = provider.reduce_region_mean(index, &tile.bounds, scale_m)?;
        match score {
            Some(value) => {
                progress.emit(&format!(
                    "Processed tile {} of {}; score: {}",
                    number, total, value
                ));
            }
            None => {
                progress.emit(&format!(
                    "Processed tile {} of {}; no usable pixels",
                    number, total
                ));
            }
        }
        scores.push(score);
    }

    Ok(scores)
}

/// Mean of the tile scores that are present.
///
/// `None` when nothing scored; an all-absent year is valid output, not an
/// error.
pub fn reduce_year(scores: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = scores.iter().copied().flatten().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::NaiveDate;
    use geo::Point;

    use super::*;
    use crate::collect::CompositeImage;
    use crate::error::ProviderError;
    use crate::geo_core::{BoundingBox, DEFAULT_TILE_SIZE_M};
    use crate::progress::NullProgress;

    /// Provider whose reductions replay a fixed sequence of answers.
    struct SequenceProvider {
        answers: Vec<Option<f64>>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl SequenceProvider {
        fn new(answers: Vec<Option<f64>>) -> Self {
            SequenceProvider {
                answers,
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            SequenceProvider {
                answers: Vec::new(),
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    impl ImageryProvider for SequenceProvider {
        fn fetch_composite(
            &self,
            region: &BoundingBox,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<CompositeImage, ProviderError> {
            Ok(CompositeImage {
                collection: "TEST".to_string(),
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
            _index: &IndexImage,
            _region: &BoundingBox,
            _scale_m: f64,
        ) -> Result<Option<f64>, ProviderError> {
            if self.fail {
                return Err(ProviderError::Auth("stub outage".to_string()));
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answers[call % self.answers.len()])
        }

        fn render_thumbnail(&self, _image: &CompositeImage) -> Result<Vec<u8>, ProviderError> {
            Ok(b"png".to_vec())
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl ProgressSink for Recorder {
        fn emit(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn ndvi_index(provider: &SequenceProvider) -> IndexImage {
        let region = BoundingBox::new(-1.2, 46.1, -1.1, 46.2);
        let composite = provider
            .fetch_composite(
                &region,
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            )
            .unwrap();
        provider.normalized_difference(&composite, "B8", "B4").unwrap()
    }

    fn grid() -> TileGrid {
        // 2 x 2 tiles
        TileGrid::build(Point::new(-1.15, 46.16), 1000.0, DEFAULT_TILE_SIZE_M).unwrap()
    }

    #[test]
    fn test_absent_tiles_are_kept_as_none() {
        let provider =
            SequenceProvider::new(vec![Some(0.2), None, Some(0.4), None]);
        let index = ndvi_index(&provider);
        let progress = Recorder::default();
        let scores = score_tiles(
            &provider,
            &index,
            &grid(),
            30.0,
            &progress,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(scores, vec![Some(0.2), None, Some(0.4), None]);
        let mean = reduce_year(&scores).unwrap();
        assert!((mean - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_two_progress_lines_per_tile() {
        let provider = SequenceProvider::new(vec![Some(0.5)]);
        let index = ndvi_index(&provider);
        let progress = Recorder::default();
        score_tiles(
            &provider,
            &index,
            &grid(),
            30.0,
            &progress,
            &CancelToken::new(),
        )
        .unwrap();

        let lines = progress.0.lock().unwrap();
        assert_eq!(lines.len(), 8);
        assert!(lines[0].contains("Processing tile 1 of 4"));
        assert!(lines[1].contains("score: 0.5"));
        assert!(lines[6].contains("Processing tile 4 of 4"));
    }

    #[test]
    fn test_absent_tile_progress_mentions_missing_pixels() {
        let provider = SequenceProvider::new(vec![None]);
        let index = ndvi_index(&provider);
        let progress = Recorder::default();
        score_tiles(
            &provider,
            &index,
            &grid(),
            30.0,
            &progress,
            &CancelToken::new(),
        )
        .unwrap();
        let lines = progress.0.lock().unwrap();
        assert!(lines[1].contains("no usable pixels"));
    }

    #[test]
    fn test_provider_error_is_fatal() {
        let provider = SequenceProvider::failing();
        let index = ndvi_index(&provider);
        let result = score_tiles(
            &provider,
            &index,
            &grid(),
            30.0,
            &NullProgress,
            &CancelToken::new(),
        );
        assert!(matches!(result, Err(TrendError::Provider(_))));
    }

    #[test]
    fn test_cancelled_token_stops_before_first_tile() {
        let provider = SequenceProvider::new(vec![Some(0.5)]);
        let index = ndvi_index(&provider);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = score_tiles(
            &provider,
            &index,
            &grid(),
            30.0,
            &NullProgress,
            &cancel,
        );
        assert!(matches!(result, Err(TrendError::Cancelled)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reduce_year_mean_and_empty() {
        assert_eq!(reduce_year(&[]), None);
        assert_eq!(reduce_year(&[None, None]), None);
        let mean = reduce_year(&[Some(0.2), Some(0.4)]).unwrap();
        assert!((mean - 0.3).abs() < 1e-12);
        assert_eq!(reduce_year(&[Some(0.6), None]), Some(0.6));
    }
}
