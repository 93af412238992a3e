//! The scan manager (§4.9): orchestrates one frame end to end (search →
//! trace → sample → decode → resolve → analyze), owns the per-run scratch
//! and temporal state, and caches one immutable [`EffectiveConfig`]
//! snapshot that is rebuilt only when the configuration store notifies a
//! change (§5: "the core treats configuration as an immutable snapshot
//! during a frame"; §6.1: the core registers to invalidate its cache).
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use deckscan_core::geometry::IVec;
use deckscan_core::rolling::RollingWindowArray;
use deckscan_core::ImageBuffer;
use deckscan_iface::time::duration_to_ms;
use deckscan_iface::{CodeDefinition, ConfigStore, PausableClock, PerformanceStats, ScanMetadata, ScanReport, StatusCode, SubscriptionId};
use deckscan_imageprocs::search_lines::{SearchLineGenerator, SearchLineParams};

use crate::decode::{self, DecodeParams};
use crate::errors::{AnalyzeOutcome, DecodeOutcome, SearchOutcome};
use crate::history::{HistoryParams, TemporalHistory};
use crate::mark_lines::{self, MarkLineParams, SampleMode};
use crate::matcher::{self, MatchParams};
use crate::resolve;
use crate::trace::{self, TraceParams};

/// A cached, per-frame-immutable read of every config key the scan
/// manager consumes (§6.1, §5). Cached by [`ScanManager`] across frames and
/// rebuilt only once the store notifies a change.
#[derive(Copy, Clone, Debug)]
pub struct EffectiveConfig
{
    pub edge_minimum_threshold: i32,
    pub search_lines: SearchLineParams,
    pub max_deck_match_error: f64,
    pub edge_rolling_min_max_window_multiplier: f64,
    pub edge_peak_rolling_average_overlap: i32,
    pub edge_sensitivity: f64,
    pub trace_edge_sensitivity: f64,
    pub trace_max_stray: f64,
    pub base_max_edge_trace_misses: i32,
    pub trace_backup_distance: i32,
    pub temporal_expiration_ms: u64,
    pub battery_saver_start_ms: u64,
    pub battery_saver_interval_ms: u64,
    pub use_landmark_contours: bool,
    pub enable_sharpness_detection: bool,
    pub minimum_sharpness_unit_scalar_threshold: f64,
    pub resample_bit_column_length_multiplier: f64,
    pub mark_line_average_offset_multiplier: f64,
    pub genocide_scale_factor: f64,
    pub min_samples_per_card: f64,
    pub history: HistoryParams
}

impl EffectiveConfig
{
    /// Read every key this pipeline consumes out of `store` (§6.1),
    /// relying on the store's own zero-default fallback for anything
    /// missing or mistyped.
    #[must_use]
    pub fn snapshot(store: &ConfigStore) -> EffectiveConfig
    {
        EffectiveConfig {
            edge_minimum_threshold: store.get_roll("edge.minimum_threshold"),
            search_lines: SearchLineParams {
                rotation_steps: store.get_real("search.line_rotation_steps").round().max(1.0) as usize,
                rotation_density: store.get_real("search.line_rotation_density"),
                min_angle_degrees: store.get_real("search.line_min_angle_cutoff"),
                max_angle_degrees: store.get_real("search.line_max_angle_cutoff"),
                linear_steps: store.get_real("search.line_linear_steps").round().max(1.0) as usize,
                linear_density: store.get_real("search.line_linear_density"),
                linear_limit_scalar: store.get_real("search.line_linear_limit_scalar"),
                bidirectional: store.get_bool("search.line_bidirectional"),
                horizontal_weight_adjustment: store.get_real("search.line_horizontal_weight_adjustment")
            },
            max_deck_match_error: store.get_real("search.max_deck_match_error"),
            edge_rolling_min_max_window_multiplier: store.get_real("search.edge_detection_deck_rolling_min_max_window_multiplier"),
            edge_peak_rolling_average_overlap: store.get_int("search.edge_detection_peak_rolling_average_overlap") as i32,
            edge_sensitivity: store.get_fixed("search.edge_detection_edge_sensitivity").to_real(),
            trace_edge_sensitivity: store.get_fixed("search.trace_marks_edge_sensitivity").to_real(),
            trace_max_stray: store.get_fixed("search.trace_marks_max_stray").to_real(),
            base_max_edge_trace_misses: store.get_int("search.base_max_edge_trace_misses") as i32,
            trace_backup_distance: store.get_int("search.trace_mark_backup_distance") as i32,
            temporal_expiration_ms: duration_to_ms(store.get_time("search.temporal_expiration_ms")),
            battery_saver_start_ms: store.get_int("search.battery_saver_start_ms").max(0) as u64,
            battery_saver_interval_ms: store.get_int("search.battery_saver_interval_ms").max(0) as u64,
            use_landmark_contours: store.get_bool("search.use_landmark_contours"),
            enable_sharpness_detection: store.get_bool("decode.enable_sharpness_detection"),
            minimum_sharpness_unit_scalar_threshold: store.get_fixed("decode.minimum_sharpness_unit_scalar_threshold").to_real(),
            resample_bit_column_length_multiplier: store.get_fixed("decode.resample_bit_column_length_multiplier").to_real(),
            mark_line_average_offset_multiplier: store.get_fixed("decode.mark_line_average_offset_multiplier").to_real(),
            genocide_scale_factor: store.get_fixed("resolve.genocide_scale_factor").to_real(),
            min_samples_per_card: store.get_real("deck.min_samples_per_card"),
            history: HistoryParams {
                max_history_age_ms: store.get_int("analysis.max_history_age_ms").max(0) as u64,
                min_history_entries: store.get_int("analysis.min_history_entries").max(0) as usize,
                missing_card_popularity: store.get_fixed("analysis.missing_card_popularity").to_real(),
                minimum_confidence_factor_threshold: store.get_real("analysis.minimum_confidence_factor_threshold"),
                high_confidence_factor_threshold: store.get_real("analysis.high_confidence_factor_threshold"),
                enable_low_confidence_reports: store.get_bool("analysis.enable_low_confidence_reports")
            }
        }
    }
}

/// The matched deck's offset/angle, reused as the next frame's starting
/// bias while still fresh (§3, §4.9).
#[derive(Copy, Clone, Debug)]
pub struct TemporalState
{
    pub offset: IVec,
    pub angle: f64,
    pub valid_at_ms: u64
}

impl TemporalState
{
    #[must_use]
    pub fn is_expired(&self, now_ms: u64, expiration_ms: u64) -> bool
    {
        now_ms.saturating_sub(self.valid_at_ms) > expiration_ms
    }
}

/// What one `scan` call produced (§6.4, §7): the frame's status/counter
/// pair, a deck-order report when the history analyzer succeeded, and the
/// frame's timing breakdown.
#[derive(Debug)]
pub struct FrameResult
{
    pub metadata: ScanMetadata,
    pub report: Option<ScanReport>,
    pub performance: PerformanceStats
}

/// Owns every piece of state that persists across frames: the search-line
/// cache, temporal offset/angle bias, battery-saver bookkeeping, the
/// frame counter and the temporal history analyzer (§5).
pub struct ScanManager
{
    search_lines: SearchLineGenerator,
    history: TemporalHistory,
    frame_count: u64,
    report_count: u64,
    temporal_state: Option<TemporalState>,
    last_found_ms: Option<u64>,
    last_scan_started_ms: Option<u64>,
    effective_cache: Option<EffectiveConfig>,
    config_dirty: Arc<AtomicBool>,
    config_subscription: Option<SubscriptionId>
}

impl Default for ScanManager
{
    fn default() -> ScanManager
    {
        ScanManager::new()
    }
}

impl ScanManager
{
    #[must_use]
    pub fn new() -> ScanManager
    {
        ScanManager {
            search_lines: SearchLineGenerator::new(),
            history: TemporalHistory::new(),
            frame_count: 0,
            report_count: 0,
            temporal_state: None,
            last_found_ms: None,
            last_scan_started_ms: None,
            effective_cache: None,
            config_dirty: Arc::new(AtomicBool::new(true)),
            config_subscription: None
        }
    }

    /// Read `config` into a fresh [`EffectiveConfig`], registering a
    /// change-notification callback the first time this manager sees a
    /// given store so later calls only rebuild once `config_dirty` has
    /// been raised by a `set`/`reload` in between frames (§6.1, §4.10).
    fn effective_config(&mut self, config: &mut ConfigStore) -> EffectiveConfig
    {
        if self.config_subscription.is_none()
        {
            let dirty = Arc::clone(&self.config_dirty);
            self.config_subscription = Some(config.register(move |_| dirty.store(true, Ordering::Relaxed)));
        }
        if self.config_dirty.swap(false, Ordering::Relaxed)
        {
            self.effective_cache = None;
        }
        *self.effective_cache.get_or_insert_with(|| EffectiveConfig::snapshot(config))
    }

    #[must_use]
    pub fn frame_count(&self) -> u64
    {
        self.frame_count
    }

    #[must_use]
    pub fn history(&self) -> &TemporalHistory
    {
        &self.history
    }

    /// Whether the battery saver is currently throttling scans, and
    /// whether this particular `now_ms` falls on one of its allowed
    /// intervals. Always allowed while not yet throttling.
    fn battery_saver_permits(&self, now_ms: u64, config: &EffectiveConfig) -> bool
    {
        let Some(last_found) = self.last_found_ms else {
            return true;
        };
        if now_ms.saturating_sub(last_found) < config.battery_saver_start_ms
        {
            return true;
        }
        let Some(last_attempt) = self.last_scan_started_ms else {
            return true;
        };
        now_ms.saturating_sub(last_attempt) >= config.battery_saver_interval_ms
    }

    fn window_sizes(definition: &dyn CodeDefinition, height: usize, config: &EffectiveConfig) -> (usize, usize)
    {
        let scale = height as f64 / 720.0;
        let mark_count = definition.mark_definitions().len().max(1) as f64;
        let window_size = ((definition.calc_min_sample_width(1.0) / mark_count) * scale).round().max(1.0) as usize;
        let min_max_window_size = (window_size as f64 * config.edge_rolling_min_max_window_multiplier).round().max(1.0) as usize;
        (window_size, min_max_window_size)
    }

    /// Process one frame (§4.9). Advances the frame counter unconditionally;
    /// the battery saver can skip the actual search/decode work but never
    /// skips the counter or the timing record.
    pub fn scan(&mut self, image: &ImageBuffer<'_, u8>, definition: &dyn CodeDefinition, config: &mut ConfigStore, clock: &dyn PausableClock) -> FrameResult
    {
        let wall_start = Instant::now();
        let now_ms = clock.pausable_time_ms();
        let frame_to_frame_ms = now_ms.saturating_sub(self.last_scan_started_ms.unwrap_or(now_ms));
        self.frame_count += 1;

        let effective = self.effective_config(config);

        let (status, report) = if !self.battery_saver_permits(now_ms, &effective)
        {
            (StatusCode::NF, None)
        }
        else
        {
            self.last_scan_started_ms = Some(now_ms);
            self.run_pipeline(image, definition, &effective, now_ms)
        };

        let scan_elapsed = wall_start.elapsed();
        FrameResult {
            metadata: ScanMetadata {
                frame_count: self.frame_count,
                status_code: status
            },
            report,
            performance: PerformanceStats {
                scan_ms: scan_elapsed,
                full_frame_ms: scan_elapsed,
                frame_to_frame_ms: std::time::Duration::from_millis(frame_to_frame_ms)
            }
        }
    }

    /// Search → trace → sample → decode → resolve → analyze for one frame
    /// once the battery saver has cleared it to run (§4.9 steps 2-6).
    fn run_pipeline(&mut self, image: &ImageBuffer<'_, u8>, definition: &dyn CodeDefinition, config: &EffectiveConfig, now_ms: u64) -> (StatusCode, Option<ScanReport>)
    {
        match self.search(image, definition, config, now_ms)
        {
            SearchOutcome::NotFound => (StatusCode::NF, None),
            SearchOutcome::TooSmall => (StatusCode::TS, None),
            SearchOutcome::Decodable(mark_lines) =>
            {
                let format = definition.format();
                let decode_params = DecodeParams {
                    enable_sharpness_detection: config.enable_sharpness_detection,
                    minimum_sharpness_unit_scalar_threshold: config.minimum_sharpness_unit_scalar_threshold,
                    resample_bit_column_length_multiplier: config.resample_bit_column_length_multiplier,
                    max_card_count: format.max_card_count,
                    min_card_count: format.min_card_count,
                    min_sample_height: definition.calc_min_sample_height(1.0, format.min_card_count).round().max(4.0) as usize
                };

                match decode::decode(&mark_lines, definition, decode_params)
                {
                    DecodeOutcome::NotSharp => (StatusCode::NS, None),
                    DecodeOutcome::TooFewCards => (StatusCode::TF, None),
                    DecodeOutcome::GeneralFailure(_) => (StatusCode::GF, None),
                    DecodeOutcome::Decoded(deck) =>
                    {
                        self.last_found_ms = Some(now_ms);
                        let resolved = resolve::resolve(&deck, config.genocide_scale_factor);
                        self.history.add_entry(&resolved.resolved_indices(), format, now_ms, &config.history);
                        self.classify(format, &resolved, config)
                    }
                }
            }
        }
    }

    /// Run the history analyzer and translate its outcome into a status
    /// code plus, on success, a [`ScanReport`] with per-index robustness
    /// pulled from this frame's resolved runs (§4.8, §6.4, §7).
    fn classify(&mut self, format: &deckscan_iface::Format, resolved: &decode::Deck, config: &EffectiveConfig) -> (StatusCode, Option<ScanReport>)
    {
        match self.history.analyze(&config.history)
        {
            AnalyzeOutcome::Inconclusive => (StatusCode::IN, None),
            AnalyzeOutcome::InsufficientHistory => (StatusCode::NH, None),
            AnalyzeOutcome::InsufficientConfidence => (StatusCode::NC, None),
            AnalyzeOutcome::SuccessLowConfidence { indices, confidence } =>
            {
                (StatusCode::RL, Some(self.build_report(format, indices, confidence, resolved, false)))
            }
            AnalyzeOutcome::SuccessHighConfidence { indices, confidence } =>
            {
                (StatusCode::RH, Some(self.build_report(format, indices, confidence, resolved, true)))
            }
        }
    }

    fn build_report(&mut self, format: &deckscan_iface::Format, indices: Vec<usize>, confidence: f64, resolved: &decode::Deck, high_confidence: bool) -> ScanReport
    {
        self.report_count += 1;
        let robustness = indices
            .iter()
            .map(|&index| resolved.cards.iter().find(|card| card.card_index == index).map_or(0, |card| card.robustness))
            .collect();
        ScanReport {
            high_confidence,
            format_id: format.name.clone(),
            confidence_factor: confidence,
            indices,
            robustness,
            report_count: self.report_count
        }
    }

    /// The search → trace → sample loop of §4.9 step 2. Returns as soon as
    /// one search line produces a decodable set of mark lines, or the
    /// first `TooSmall` rejection (which aborts the whole frame, not just
    /// this search line).
    fn search(&mut self, image: &ImageBuffer<'_, u8>, definition: &dyn CodeDefinition, config: &EffectiveConfig, now_ms: u64) -> SearchOutcome
    {
        let format = definition.format();
        let (offset, angle) = match self.temporal_state
        {
            Some(state) if !state.is_expired(now_ms, config.temporal_expiration_ms) => (state.offset, state.angle),
            _ => (IVec::new(0, 0), 0.0)
        };

        let width = image.width();
        let height = image.height();
        let (window_size, min_max_window_size) = Self::window_sizes(definition, height, config);
        let mut scratch = RollingWindowArray::new();

        let specs = self.search_lines.lines_for(width, height, format.reversible, config.search_lines).to_vec();

        for spec in &specs
        {
            let Some(line) = spec.get_line(image, offset, angle) else {
                continue;
            };

            let match_params = MatchParams {
                window_size,
                min_max_window_size,
                overlap: config.edge_peak_rolling_average_overlap,
                sensitivity: config.edge_sensitivity,
                minimum_threshold: config.edge_minimum_threshold,
                invert_luma: format.invert_luma,
                max_deck_match_error: config.max_deck_match_error
            };
            let Some(result) = matcher::match_deck(definition, &line, match_params, &mut scratch) else {
                continue;
            };

            let angle_normal = (spec.angle_degrees.to_radians()).cos().abs().max(1e-6);
            let deck_width = result.location.span_samples() as f64;
            if deck_width < definition.calc_min_sample_width(angle_normal)
            {
                return SearchOutcome::TooSmall;
            }

            let scale = height as f64 / 720.0;
            let trace_params = TraceParams {
                edge_sensitivity: config.trace_edge_sensitivity,
                max_stray_ratio: config.trace_max_stray,
                max_edge_trace_misses: (f64::from(config.base_max_edge_trace_misses) * scale).round().max(1.0) as i32,
                backup_distance: config.trace_backup_distance,
                smooth_contours: config.use_landmark_contours
            };
            let Some(contours) = trace::trace_landmarks(image, &result, definition, trace_params) else {
                continue;
            };

            let min_height = definition.calc_min_sample_height(angle_normal, format.min_card_count);
            if trace::traced_height(&contours) < min_height
            {
                return SearchOutcome::TooSmall;
            }

            let mark_line_params = MarkLineParams {
                mode: if config.use_landmark_contours { SampleMode::Contoured } else { SampleMode::Linear },
                average_offset_multiplier: config.mark_line_average_offset_multiplier
            };
            if let Ok(mark_lines) = mark_lines::sample_mark_lines(image, &contours, definition, mark_line_params)
            {
                self.temporal_state = Some(TemporalState {
                    offset: deck_offset(&result, image),
                    angle: spec.angle_degrees,
                    valid_at_ms: now_ms
                });
                return SearchOutcome::Decodable(mark_lines);
            }
        }

        SearchOutcome::NotFound
    }
}

/// The matched deck's center, relative to the frame's own center, used as
/// the next frame's temporal search bias.
fn deck_offset(result: &deckscan_iface::DeckMatchResult, image: &ImageBuffer<'_, u8>) -> IVec
{
    let Some((first, last)) = result.location.marks.first().zip(result.location.marks.last()) else {
        return IVec::new(0, 0);
    };
    let a = first.center();
    let b = last.center();
    let deck_center = IVec::new((a.x + b.x) / 2, (a.y + b.y) / 2);
    let rect_center = image.rect().center().round_to_ivec();
    deck_center - rect_center
}
