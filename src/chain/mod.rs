//! Process chain descriptors for the remote geoprocessing engine.
//!
//! A chain is plain data: an ordered list of steps, each naming an engine
//! module and its parameters. Module names (`v.to.rast`, `r.series`) are the
//! engine's own identifiers and are passed through verbatim.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const CHAIN_VERSION: &str = "1";

pub const RASTERIZE_MODULE: &str = "v.to.rast";
pub const RASTERIZE_STEP_ID: &str = "rasterize_vector";
pub const AGGREGATE_MODULE: &str = "r.series";
pub const AGGREGATE_STEP_ID: &str = "aggregate_dsm";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInput {
    pub param: String,
    pub value: String,
}

impl StepInput {
    pub fn new(param: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStep {
    pub id: String,
    pub module: String,
    pub inputs: Vec<StepInput>,
}

impl ChainStep {
    /// Value of the first input named `param`.
    pub fn input(&self, param: &str) -> Option<&str> {
        self.inputs.iter().find(|i| i.param == param).map(|i| i.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessChain {
    pub version: String,
    pub list: Vec<ChainStep>,
}

impl ProcessChain {
    pub fn new(list: Vec<ChainStep>) -> Self {
        Self {
            version: CHAIN_VERSION.to_string(),
            list,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::invalid_argument(format!("Failed to encode process chain: {e}")))
    }
}

/// Rasterize `vector_name` into `raster_name`, burning `attribute_column` into the cells.
pub fn build_rasterize_chain(
    vector_name: &str,
    raster_name: &str,
    attribute_column: &str,
) -> Result<ProcessChain, AppError> {
    require_name("vector layer", vector_name)?;
    require_name("output raster", raster_name)?;
    require_name("attribute column", attribute_column)?;

    Ok(ProcessChain::new(vec![ChainStep {
        id: RASTERIZE_STEP_ID.to_string(),
        module: RASTERIZE_MODULE.to_string(),
        inputs: vec![
            StepInput::new("input", vector_name),
            StepInput::new("output", raster_name),
            StepInput::new("use", "attr"),
            StepInput::new("attribute_column", attribute_column),
            StepInput::new("type", "area"),
        ],
    }]))
}

/// Sum `raster_inputs` cell by cell into `output_raster`.
pub fn build_aggregate_chain<S: AsRef<str>>(raster_inputs: &[S], output_raster: &str) -> Result<ProcessChain, AppError> {
    if raster_inputs.is_empty() {
        return Err(AppError::invalid_argument("At least one input raster is required for aggregation."));
    }
    for name in raster_inputs {
        require_name("input raster", name.as_ref())?;
    }
    require_name("output raster", output_raster)?;

    let joined = raster_inputs.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(",");

    Ok(ProcessChain::new(vec![ChainStep {
        id: AGGREGATE_STEP_ID.to_string(),
        module: AGGREGATE_MODULE.to_string(),
        inputs: vec![
            StepInput::new("input", joined),
            StepInput::new("output", output_raster),
            StepInput::new("method", "sum"),
        ],
    }]))
}

fn require_name(what: &str, name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::invalid_argument(format!("The {what} name must not be empty.")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rasterize_chain_burns_the_attribute() {
        let chain = build_rasterize_chain("buildings_v", "buildings_r", "height").unwrap();
        assert_eq!(chain.version, "1");
        assert_eq!(chain.list.len(), 1);

        let step = &chain.list[0];
        assert_eq!(step.id, "rasterize_vector");
        assert_eq!(step.module, "v.to.rast");
        assert_eq!(step.input("input"), Some("buildings_v"));
        assert_eq!(step.input("output"), Some("buildings_r"));
        assert_eq!(step.input("use"), Some("attr"));
        assert_eq!(step.input("attribute_column"), Some("height"));
        assert_eq!(step.input("type"), Some("area"));
    }

    #[test]
    fn aggregate_chain_sums_comma_joined_inputs() {
        let chain = build_aggregate_chain(&["r1", "r2", "r3"], "dsm").unwrap();
        let step = &chain.list[0];
        assert_eq!(step.id, "aggregate_dsm");
        assert_eq!(step.module, "r.series");
        assert_eq!(step.input("input"), Some("r1,r2,r3"));
        assert_eq!(step.input("output"), Some("dsm"));
        assert_eq!(step.input("method"), Some("sum"));
    }

    #[test]
    fn aggregate_chain_rejects_empty_input_list() {
        let none: [&str; 0] = [];
        let err = build_aggregate_chain(&none, "dsm").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn blank_names_are_rejected() {
        assert!(build_rasterize_chain("", "out", "height").is_err());
        assert!(build_aggregate_chain(&["r1", " "], "dsm").is_err());
    }

    #[test]
    fn serializes_to_engine_shape() {
        let chain = build_aggregate_chain(&["a".to_string(), "b".to_string()], "dsm").unwrap();
        let value = serde_json::to_value(&chain).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "version": "1",
                "list": [{
                    "id": "aggregate_dsm",
                    "module": "r.series",
                    "inputs": [
                        { "param": "input", "value": "a,b" },
                        { "param": "output", "value": "dsm" },
                        { "param": "method", "value": "sum" }
                    ]
                }]
            })
        );
    }
}
