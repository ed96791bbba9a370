//! Build-time unit descriptors.
//!
//! A `UnitMetaData` is consumed once by `UnitManager::compile` to materialize a
//! runtime unit and is kept afterwards for shape and initializer lookups.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tensor::{Device, Shape};

use super::id::UnitId;

/// Input slot names used by the built-in unit variants.
pub const INPUT: &str = "input";
pub const PREDICTION: &str = "prediction";
pub const LABEL: &str = "label";

/// Internal variable names used by the dense unit.
pub const WEIGHT: &str = "weight";
pub const BIAS: &str = "bias";

/// Free-form parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Int(i64),
    Float(f64),
    Str(String),
    Floats(Vec<f64>),
}

/// String-keyed parameter bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    items: BTreeMap<String, Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Parameter) -> Self {
        self.insert(name, value);
        self
    }

    pub fn with_float(self, name: &str, value: f64) -> Self {
        self.with(name, Parameter::Float(value))
    }

    pub fn with_int(self, name: &str, value: i64) -> Self {
        self.with(name, Parameter::Int(value))
    }

    pub fn with_str(self, name: &str, value: &str) -> Self {
        self.with(name, Parameter::Str(value.to_string()))
    }

    pub fn insert(&mut self, name: &str, value: Parameter) {
        self.items.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.items.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    fn wrong_type(name: &str, expected: &str) -> Error {
        Error::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected {}", expected),
        }
    }

    /// Float lookup; integers are widened.
    pub fn float(&self, name: &str) -> Result<Option<f64>> {
        match self.items.get(name) {
            None => Ok(None),
            Some(Parameter::Float(v)) => Ok(Some(*v)),
            Some(Parameter::Int(v)) => Ok(Some(*v as f64)),
            Some(_) => Err(Self::wrong_type(name, "a number")),
        }
    }

    pub fn float_or(&self, name: &str, default: f64) -> Result<f64> {
        Ok(self.float(name)?.unwrap_or(default))
    }

    pub fn int(&self, name: &str) -> Result<Option<i64>> {
        match self.items.get(name) {
            None => Ok(None),
            Some(Parameter::Int(v)) => Ok(Some(*v)),
            Some(_) => Err(Self::wrong_type(name, "an integer")),
        }
    }

    pub fn int_or(&self, name: &str, default: i64) -> Result<i64> {
        Ok(self.int(name)?.unwrap_or(default))
    }

    pub fn str(&self, name: &str) -> Result<Option<&str>> {
        match self.items.get(name) {
            None => Ok(None),
            Some(Parameter::Str(v)) => Ok(Some(v.as_str())),
            Some(_) => Err(Self::wrong_type(name, "a string")),
        }
    }

    pub fn floats(&self, name: &str) -> Result<Option<&[f64]>> {
        match self.items.get(name) {
            None => Ok(None),
            Some(Parameter::Floats(v)) => Ok(Some(v.as_slice())),
            Some(_) => Err(Self::wrong_type(name, "a float list")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitMetaData {
    pub unit_id: UnitId,
    /// Shapes of unit-local tensors (weights, biases).
    pub internal_variable_shapes: BTreeMap<String, Shape>,
    /// Initializer name per internal variable.
    pub initializers: BTreeMap<String, String>,
    pub input_shapes: BTreeMap<String, Shape>,
    pub output_shape: Shape,
    pub input_units: BTreeMap<String, UnitId>,
    /// Filled in while wiring the graph.
    pub output_units: Vec<UnitId>,
    pub device: Device,
    pub parameters: Parameters,
}

impl UnitMetaData {
    pub fn new(unit_id: UnitId, output_shape: Shape) -> Self {
        Self {
            unit_id,
            internal_variable_shapes: BTreeMap::new(),
            initializers: BTreeMap::new(),
            input_shapes: BTreeMap::new(),
            output_shape,
            input_units: BTreeMap::new(),
            output_units: Vec::new(),
            device: Device::default(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_input(mut self, slot: &str, unit: &UnitId, shape: Shape) -> Self {
        self.input_units.insert(slot.to_string(), unit.clone());
        self.input_shapes.insert(slot.to_string(), shape);
        self
    }

    pub fn with_internal(mut self, name: &str, shape: Shape, initializer: &str) -> Self {
        self.internal_variable_shapes.insert(name.to_string(), shape);
        self.initializers.insert(name.to_string(), initializer.to_string());
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_parameter(mut self, name: &str, value: Parameter) -> Self {
        self.parameters.insert(name, value);
        self
    }

    /// Source unit emitting fixed data. `data` covers one sample or the
    /// whole batch.
    pub fn constant(unit_id: UnitId, shape: Shape, data: Vec<f64>) -> Self {
        Self::new(unit_id, shape).with_parameter("data", Parameter::Floats(data))
    }

    /// Source unit fed by a data loader registered on the manager.
    pub fn placeholder(unit_id: UnitId, shape: Shape) -> Self {
        Self::new(unit_id, shape)
    }

    /// Fully connected layer `y = x·W + b` with `units` output columns.
    pub fn dense(
        unit_id: UnitId,
        input: &UnitId,
        input_shape: Shape,
        units: usize,
        weight_initializer: &str,
        bias_initializer: &str,
    ) -> Result<Self> {
        let weight_shape = Shape::matrix(input_shape.num_col(), units)?;
        let bias_shape = Shape::matrix(1, units)?;
        let output_shape = input_shape.matmul(&weight_shape)?;
        Ok(Self::new(unit_id, output_shape)
            .with_input(INPUT, input, input_shape)
            .with_internal(WEIGHT, weight_shape, weight_initializer)
            .with_internal(BIAS, bias_shape, bias_initializer))
    }

    pub fn activation(unit_id: UnitId, input: &UnitId, input_shape: Shape, activation: &str) -> Self {
        Self::new(unit_id, input_shape.clone())
            .with_input(INPUT, input, input_shape)
            .with_parameter("activation", Parameter::Str(activation.to_string()))
    }

    pub fn loss(
        unit_id: UnitId,
        prediction: &UnitId,
        label: &UnitId,
        shape: Shape,
        loss: &str,
    ) -> Result<Self> {
        Ok(Self::new(unit_id, Shape::matrix(1, 1)?)
            .with_input(PREDICTION, prediction, shape.clone())
            .with_input(LABEL, label, shape)
            .with_parameter("loss", Parameter::Str(loss.to_string())))
    }

    pub fn input_unit(&self, slot: &str) -> Result<&UnitId> {
        self.input_units.get(slot).ok_or_else(|| Error::MissingInput {
            unit: self.unit_id.clone(),
            what: "input",
            name: slot.to_string(),
        })
    }

    pub fn input_shape(&self, slot: &str) -> Result<&Shape> {
        self.input_shapes.get(slot).ok_or_else(|| Error::MissingInput {
            unit: self.unit_id.clone(),
            what: "input shape",
            name: slot.to_string(),
        })
    }

    pub fn internal_shape(&self, name: &str) -> Result<&Shape> {
        self.internal_variable_shapes
            .get(name)
            .ok_or_else(|| Error::MissingInput {
                unit: self.unit_id.clone(),
                what: "internal variable",
                name: name.to_string(),
            })
    }

    /// Required string parameter.
    pub fn strategy_name(&self, name: &str) -> Result<&str> {
        self.parameters.str(name)?.ok_or_else(|| Error::MissingInput {
            unit: self.unit_id.clone(),
            what: "parameter",
            name: name.to_string(),
        })
    }
}
