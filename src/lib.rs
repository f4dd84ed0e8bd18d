#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod algorithm;
pub mod feature;
pub mod geom;
pub mod io;
pub mod provider;
pub mod transect;

use std::fmt;

use serde::Serialize;
use wasm_bindgen::JsError;
use wasm_bindgen::prelude::*;

use algorithm::{ALGORITHM_ID, ProcessSummary};
use feature::{FeatureSource, Fields, MemorySource, NoFeedback};
use io::{GeoJsonSink, read_feature_collection};
use provider::ProcessingRegistry;
use transect::StationParameters;

cfg_if::cfg_if! {
    if #[cfg(all(feature = "console_error_panic_hook", target_arch = "wasm32"))] {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            console_error_panic_hook::set_once();
            init_logger();
        }
    } else {
        #[wasm_bindgen(start)]
        pub fn initialize() {
            init_logger();
        }
    }
}

#[cfg(feature = "debug_logs")]
fn init_logger() {
    use log::LevelFilter;
    use wasm_bindgen_console_logger::DEFAULT_LOGGER;
    if log::set_logger(&DEFAULT_LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}

#[cfg(not(feature = "debug_logs"))]
fn init_logger() {}

#[cfg(all(feature = "parallel", target_arch = "wasm32"))]
#[wasm_bindgen]
pub async fn initialize_parallel(worker_count: Option<u32>) -> Result<(), JsError> {
    let threads = worker_count
        .map(|count| count.max(1) as usize)
        .or_else(|| {
            std::thread::available_parallelism()
                .map(|value| value.get())
                .ok()
        })
        .unwrap_or(1);

    wasm_bindgen_rayon::init_thread_pool(threads)
        .await
        .map_err(|err| JsError::new(&format!("could not start the rayon thread pool: {err}")))
}

#[macro_export]
macro_rules! debug_log {
    ($($t:tt)*) => {{
        #[cfg(feature = "debug_logs")]
        {
            #[cfg(target_arch = "wasm32")]
            {
                ::web_sys::console::log_1(&::wasm_bindgen::JsValue::from_str(&format!($($t)*)));
            }
            #[cfg(not(target_arch = "wasm32"))]
            {
                println!("{}", format!($($t)*));
            }
        }
    }};
}

/// Result of [`TransectEngine::run`].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput {
    geojson: String,
    summary: ProcessSummary,
}

/// Public entry point for JavaScript consumers.
#[wasm_bindgen]
pub struct TransectEngine {
    initialized: bool,
    registry: ProcessingRegistry,
    source: Option<MemorySource>,
    params: StationParameters,
    last_summary: Option<ProcessSummary>,
}

impl Default for TransectEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl TransectEngine {
    #[wasm_bindgen(constructor)]
    #[must_use]
    pub fn new() -> TransectEngine {
        TransectEngine {
            initialized: true,
            registry: ProcessingRegistry::with_default_providers(),
            source: None,
            params: StationParameters::default(),
            last_summary: None,
        }
    }

    /// Whether the engine went through its minimal setup.
    #[wasm_bindgen]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Loads a GeoJSON FeatureCollection of line features.
    ///
    /// # Errors
    /// Rejects anything [`read_feature_collection`] rejects.
    #[wasm_bindgen]
    pub fn load_geojson(&mut self, input: &str) -> Result<(), JsValue> {
        self.load(input).map_err(to_js_error)
    }

    /// Replaces the station parameters from a plain JS object.
    ///
    /// # Errors
    /// Fails on malformed objects or invalid values.
    #[wasm_bindgen]
    pub fn set_parameters(&mut self, value: JsValue) -> Result<(), JsValue> {
        let params: StationParameters =
            serde_wasm_bindgen::from_value(value).map_err(to_js_error)?;
        self.apply_parameters(params).map_err(to_js_error)
    }

    /// Same as [`set_parameters`](Self::set_parameters) from a JSON string.
    ///
    /// # Errors
    /// Fails on malformed JSON or invalid values.
    #[wasm_bindgen]
    pub fn set_parameters_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.apply_parameters_json(json).map_err(js_error)
    }

    /// # Errors
    /// Fails if the parameters cannot be converted to a JS value.
    #[wasm_bindgen]
    pub fn get_parameters(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.params).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Fields of the loaded input.
    ///
    /// # Errors
    /// Fails when no input is loaded.
    #[wasm_bindgen]
    pub fn get_fields(&self) -> Result<JsValue, JsValue> {
        let fields = self.input_fields().map_err(js_error)?;
        serde_wasm_bindgen::to_value(fields).map_err(|err| JsError::new(&err.to_string()).into())
    }

    /// Runs the station lines algorithm on the loaded input and returns
    /// `{ geojson, summary }`.
    ///
    /// # Errors
    /// Fails when no input is loaded or the run aborts.
    #[wasm_bindgen]
    pub fn run(&mut self) -> Result<JsValue, JsValue> {
        let output = self.run_to_geojson().map_err(js_error)?;
        serde_wasm_bindgen::to_value(&output).map_err(|err| JsError::new(&err.to_string()).into())
    }
}

impl TransectEngine {
    fn load(&mut self, input: &str) -> Result<(), io::GeoJsonError> {
        let source = read_feature_collection(input)?;
        log::info!(
            "loaded {} feature(s) with {} field(s)",
            source.feature_count(),
            source.fields().len()
        );
        self.source = Some(source);
        self.last_summary = None;
        Ok(())
    }

    fn apply_parameters(&mut self, params: StationParameters) -> Result<(), transect::ParameterError> {
        algorithm::check_parameters(&params)?;
        self.params = params;
        Ok(())
    }

    fn apply_parameters_json(&mut self, json: &str) -> Result<(), String> {
        let params: StationParameters = serde_json::from_str(json).map_err(|err| err.to_string())?;
        self.apply_parameters(params).map_err(|err| err.to_string())
    }

    fn input_fields(&self) -> Result<&Fields, String> {
        self.source
            .as_ref()
            .map(FeatureSource::fields)
            .ok_or_else(|| "no GeoJSON input is loaded".to_owned())
    }

    fn run_to_geojson(&mut self) -> Result<RunOutput, String> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| "no GeoJSON input is loaded".to_owned())?;
        let algorithm = self
            .registry
            .create_algorithm(ALGORITHM_ID, self.params)
            .map_err(|err| err.to_string())?;

        let mut sink = GeoJsonSink::new();
        #[cfg(feature = "parallel")]
        let summary = algorithm.process_parallel(source, &mut sink, &mut NoFeedback);
        #[cfg(not(feature = "parallel"))]
        let summary = algorithm.process(source, &mut sink, &mut NoFeedback);
        let summary = summary.map_err(|err| err.to_string())?;

        debug_log!("transect run: {:?}", summary);
        let geojson = sink.to_geojson_string().map_err(|err| err.to_string())?;
        self.last_summary = Some(summary.clone());
        Ok(RunOutput { geojson, summary })
    }
}

fn to_js_error<E: fmt::Display>(error: E) -> JsValue {
    js_error(error.to_string())
}

fn js_error(message: impl AsRef<str>) -> JsValue {
    #[cfg(target_arch = "wasm32")]
    {
        JsError::new(message.as_ref()).into()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        let _ = message;
        JsValue::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transect::Side;

    const INPUT: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "name": "quay" },
                "geometry": { "type": "LineString", "coordinates": [[0, 0], [10, 0]] }
            }
        ]
    }"#;

    #[test]
    fn new_engine_is_initialized_with_defaults() {
        let engine = TransectEngine::new();
        assert!(engine.is_initialized());
        assert_eq!(engine.params, StationParameters::default());
        assert!(engine.input_fields().is_err());
    }

    #[test]
    fn run_requires_input() {
        let mut engine = TransectEngine::new();
        assert_eq!(
            engine.run_to_geojson().unwrap_err(),
            "no GeoJSON input is loaded"
        );
    }

    #[test]
    fn parameters_from_json_are_validated() {
        let mut engine = TransectEngine::new();
        engine
            .apply_parameters_json(r#"{"distance": 5, "length": 2, "side": "right"}"#)
            .unwrap();
        assert_eq!(engine.params.side, Side::Right);
        assert!(engine.apply_parameters_json(r#"{"distance": 0}"#).is_err());
        assert_eq!(engine.params.distance, 5.0);
    }

    #[test]
    fn run_renders_feature_collection() {
        let mut engine = TransectEngine::new();
        engine.load(INPUT).unwrap();
        engine.apply_parameters_json(r#"{"distance": 5}"#).unwrap();
        assert_eq!(engine.input_fields().unwrap().names(), ["name"]);

        let output = engine.run_to_geojson().unwrap();
        assert_eq!(output.summary.transects_written, 3);
        let rendered: serde_json::Value = serde_json::from_str(&output.geojson).unwrap();
        let features = rendered["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(features[2]["properties"]["name"], "quay");
        assert_eq!(features[2]["properties"]["TR_ORIENT"], "B");
        assert_eq!(engine.last_summary, Some(output.summary));
    }
}
