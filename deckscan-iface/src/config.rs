//! An in-process, typed configuration store (§6.1, §4.10).
//!
//! The distilled specification treats the configuration store as an
//! external collaborator; this module supplies the minimal concrete
//! implementation needed to run the pipeline standalone, modeled on
//! `zune_core::options::DecoderOptions`: a dynamic map of typed values with
//! logged, panic-free fallback to each type's zero value, plus a
//! change-notification fan-out the scan manager uses to invalidate its
//! cached [`EffectiveConfig`].
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use deckscan_core::Fixed;

use crate::code_definition::CodeDefinitionHandle;

/// The closed set of value types a [`ConfigStore`] key may hold (§6.1).
#[derive(Clone)]
pub enum ConfigValue
{
    String(String),
    StringMap(HashMap<String, String>),
    Path(String),
    PathArray(Vec<String>),
    CodeDefinition(CodeDefinitionHandle),
    Boolean(bool),
    Integer(i64),
    FixedPoint(Fixed),
    Real(f64),
    RollValue(i32),
    Time(Duration)
}

impl ConfigValue
{
    fn type_name(&self) -> &'static str
    {
        match self
        {
            ConfigValue::String(_) => "String",
            ConfigValue::StringMap(_) => "StringMap",
            ConfigValue::Path(_) => "Path",
            ConfigValue::PathArray(_) => "PathArray",
            ConfigValue::CodeDefinition(_) => "CodeDefinition",
            ConfigValue::Boolean(_) => "Boolean",
            ConfigValue::Integer(_) => "Integer",
            ConfigValue::FixedPoint(_) => "FixedPoint",
            ConfigValue::Real(_) => "Real",
            ConfigValue::RollValue(_) => "RollValue",
            ConfigValue::Time(_) => "Time"
        }
    }
}

/// Opaque identifier for a registered change-notification callback.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SubscriptionId(u64);

type ChangeCallback = Box<dyn Fn(Option<&str>) + Send + Sync>;

/// In-process key/value store of [`ConfigValue`]s, seeded with every
/// default in §6.1.
///
/// Misses and type mismatches never panic: typed getters log at `warn` and
/// return the field's typed zero default, per §7's error handling policy.
pub struct ConfigStore
{
    values: HashMap<&'static str, ConfigValue>,
    subscribers: HashMap<u64, ChangeCallback>,
    next_id: AtomicU64
}

impl Default for ConfigStore
{
    fn default() -> ConfigStore
    {
        ConfigStore::with_defaults()
    }
}

impl ConfigStore
{
    /// Build a store seeded with every key listed in spec §6.1.
    #[must_use]
    pub fn with_defaults() -> ConfigStore
    {
        let mut values: HashMap<&'static str, ConfigValue> = HashMap::new();

        values.insert("edge.minimum_threshold", ConfigValue::RollValue(10));

        values.insert(
            "search.line_horizontal_weight_adjustment",
            ConfigValue::Real(0.47)
        );
        values.insert("search.line_rotation_density", ConfigValue::Real(3.0));
        values.insert("search.line_rotation_steps", ConfigValue::Real(8.0));
        values.insert("search.line_min_angle_cutoff", ConfigValue::Real(-30.0));
        values.insert("search.line_max_angle_cutoff", ConfigValue::Real(30.0));
        values.insert("search.line_linear_limit_scalar", ConfigValue::Real(1.0));
        values.insert("search.line_linear_density", ConfigValue::Real(3.0));
        values.insert("search.line_linear_steps", ConfigValue::Real(8.0));
        values.insert("search.line_bidirectional", ConfigValue::Boolean(true));

        values.insert("search.max_deck_match_error", ConfigValue::Real(1.3));

        values.insert(
            "search.edge_detection_deck_rolling_min_max_window_multiplier",
            ConfigValue::Real(6.77)
        );
        values.insert(
            "search.edge_detection_peak_rolling_average_overlap",
            ConfigValue::Integer(0)
        );
        values.insert(
            "search.edge_detection_edge_sensitivity",
            ConfigValue::FixedPoint(Fixed::from_real(0.2))
        );

        values.insert(
            "search.trace_marks_edge_sensitivity",
            ConfigValue::FixedPoint(Fixed::from_real(0.6))
        );
        values.insert(
            "search.trace_marks_max_stray",
            ConfigValue::FixedPoint(Fixed::from_real(0.5))
        );
        values.insert("search.base_max_edge_trace_misses", ConfigValue::Integer(5));
        values.insert("search.trace_mark_backup_distance", ConfigValue::Integer(10));

        values.insert(
            "search.temporal_expiration_ms",
            ConfigValue::Time(Duration::from_millis(200))
        );
        values.insert("search.battery_saver_start_ms", ConfigValue::Integer(150_000));
        values.insert("search.battery_saver_interval_ms", ConfigValue::Integer(250));

        values.insert("search.use_landmark_contours", ConfigValue::Boolean(true));

        values.insert("decode.enable_sharpness_detection", ConfigValue::Boolean(true));
        values.insert(
            "decode.minimum_sharpness_unit_scalar_threshold",
            ConfigValue::FixedPoint(Fixed::from_real(0.7))
        );
        values.insert(
            "decode.resample_bit_column_length_multiplier",
            ConfigValue::FixedPoint(Fixed::from_real(5.0))
        );
        values.insert(
            "decode.mark_line_average_offset_multiplier",
            ConfigValue::FixedPoint(Fixed::from_real(0.5))
        );

        values.insert(
            "resolve.genocide_scale_factor",
            ConfigValue::FixedPoint(Fixed::from_real(1.0))
        );

        values.insert("deck.min_samples_per_card", ConfigValue::Real(2.0));

        values.insert(
            "analysis.missing_card_popularity",
            ConfigValue::FixedPoint(Fixed::from_real(0.5))
        );
        values.insert("analysis.max_history_age_ms", ConfigValue::Integer(4_000));
        values.insert("analysis.min_history_entries", ConfigValue::Integer(15));
        values.insert(
            "analysis.minimum_confidence_factor_threshold",
            ConfigValue::Real(70.0)
        );
        values.insert(
            "analysis.high_confidence_factor_threshold",
            ConfigValue::Real(90.0)
        );
        values.insert("analysis.enable_low_confidence_reports", ConfigValue::Boolean(true));

        ConfigStore {
            values,
            subscribers: HashMap::new(),
            next_id: AtomicU64::new(1)
        }
    }

    /// Insert or replace a value and notify subscribers with the changed
    /// key name.
    pub fn set(&mut self, key: &'static str, value: ConfigValue)
    {
        self.values.insert(key, value);
        self.notify(Some(key));
    }

    /// Register a change-notification callback; fires with `Some(key)` on a
    /// single-key [`ConfigStore::set`], or `None` on [`ConfigStore::reload`].
    pub fn register<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, Box::new(callback));
        SubscriptionId(id)
    }

    pub fn unregister(&mut self, id: SubscriptionId)
    {
        self.subscribers.remove(&id.0);
    }

    /// Replace the entire map (as a tiered-file reload would) and notify
    /// subscribers with no key name.
    pub fn reload(&mut self, values: HashMap<&'static str, ConfigValue>)
    {
        self.values = values;
        self.notify(None);
    }

    fn notify(&self, key: Option<&str>)
    {
        for callback in self.subscribers.values()
        {
            callback(key);
        }
    }

    fn get(&self, key: &str) -> Option<&ConfigValue>
    {
        self.values.get(key)
    }

    fn miss_or_mismatch(&self, key: &str, wanted: &'static str)
    {
        match self.values.get(key)
        {
            None => log::warn!("config: key '{key}' is not set, using {wanted} zero default"),
            Some(found) => log::warn!(
                "config: key '{key}' has type {}, wanted {wanted}; using zero default",
                found.type_name()
            )
        }
    }

    #[must_use]
    pub fn get_real(&self, key: &str) -> f64
    {
        match self.get(key)
        {
            Some(ConfigValue::Real(v)) => *v,
            _ =>
            {
                self.miss_or_mismatch(key, "Real");
                0.0
            }
        }
    }

    #[must_use]
    pub fn get_fixed(&self, key: &str) -> Fixed
    {
        match self.get(key)
        {
            Some(ConfigValue::FixedPoint(v)) => *v,
            _ =>
            {
                self.miss_or_mismatch(key, "FixedPoint");
                Fixed::ZERO
            }
        }
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool
    {
        match self.get(key)
        {
            Some(ConfigValue::Boolean(v)) => *v,
            _ =>
            {
                self.miss_or_mismatch(key, "Boolean");
                false
            }
        }
    }

    #[must_use]
    pub fn get_int(&self, key: &str) -> i64
    {
        match self.get(key)
        {
            Some(ConfigValue::Integer(v)) => *v,
            _ =>
            {
                self.miss_or_mismatch(key, "Integer");
                0
            }
        }
    }

    #[must_use]
    pub fn get_time(&self, key: &str) -> Duration
    {
        match self.get(key)
        {
            Some(ConfigValue::Time(v)) => *v,
            _ =>
            {
                self.miss_or_mismatch(key, "Time");
                Duration::ZERO
            }
        }
    }

    #[must_use]
    pub fn get_roll(&self, key: &str) -> i32
    {
        match self.get(key)
        {
            Some(ConfigValue::RollValue(v)) => *v,
            _ =>
            {
                self.miss_or_mismatch(key, "RollValue");
                0
            }
        }
    }

    #[must_use]
    pub fn get_string(&self, key: &str) -> String
    {
        match self.get(key)
        {
            Some(ConfigValue::String(v)) => v.clone(),
            _ =>
            {
                self.miss_or_mismatch(key, "String");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn defaults_cover_every_spec_key()
    {
        let store = ConfigStore::with_defaults();
        assert_eq!(store.get_roll("edge.minimum_threshold"), 10);
        assert!((store.get_real("search.max_deck_match_error") - 1.3).abs() < 1e-9);
        assert_eq!(store.get_int("analysis.min_history_entries"), 15);
        assert!(store.get_bool("search.use_landmark_contours"));
    }

    #[test]
    fn missing_key_returns_zero_default_and_does_not_panic()
    {
        let store = ConfigStore::with_defaults();
        assert_eq!(store.get_real("not.a.real.key"), 0.0);
        assert!(!store.get_bool("not.a.bool.key"));
    }

    #[test]
    fn type_mismatch_returns_zero_default()
    {
        let store = ConfigStore::with_defaults();
        // `edge.minimum_threshold` is a RollValue, not a Real.
        assert_eq!(store.get_real("edge.minimum_threshold"), 0.0);
    }

    #[test]
    fn set_notifies_subscribers_with_key_name()
    {
        let mut store = ConfigStore::with_defaults();
        let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        store.register(move |key| seen_clone.lock().unwrap().push(key.map(str::to_owned)));

        store.set("edge.minimum_threshold", ConfigValue::RollValue(20));
        assert_eq!(store.get_roll("edge.minimum_threshold"), 20);
        assert_eq!(seen.lock().unwrap().as_slice(), [Some("edge.minimum_threshold".to_owned())]);
    }

    #[test]
    fn unregister_stops_further_notifications()
    {
        let mut store = ConfigStore::with_defaults();
        let count = Arc::new(Mutex::new(0));
        let count_clone = Arc::clone(&count);
        let id = store.register(move |_| *count_clone.lock().unwrap() += 1);

        store.set("edge.minimum_threshold", ConfigValue::RollValue(1));
        store.unregister(id);
        store.set("edge.minimum_threshold", ConfigValue::RollValue(2));

        assert_eq!(*count.lock().unwrap(), 1);
    }

    #[test]
    fn reload_notifies_with_no_key_name()
    {
        let mut store = ConfigStore::with_defaults();
        let seen: Arc<Mutex<Option<Option<String>>>> = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        store.register(move |key| *seen_clone.lock().unwrap() = Some(key.map(str::to_owned)));

        store.reload(HashMap::new());
        assert_eq!(*seen.lock().unwrap(), Some(None));
    }
}
