//! ONNX inference session backed by tract

use crate::predictor::{Prediction, Predictor};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tract_onnx::pb::{tensor_proto::DataType, type_proto, ValueInfoProto};
use tract_onnx::prelude::*;
use vitals_core::{ColumnData, Error, FeatureKind, InputColumn, Result, SampleBatch};

/// A declared graph input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputInfo {
    pub name: String,
    /// Feature kind implied by the declared element type, when known
    pub kind: Option<FeatureKind>,
}

impl InputInfo {
    fn from_proto(info: &ValueInfoProto) -> Self {
        let elem_type = match info.r#type.as_ref().and_then(|t| t.value.as_ref()) {
            Some(type_proto::Value::TensorType(tensor)) => Some(tensor.elem_type),
            None => None,
        };
        let kind = match elem_type {
            Some(t) if t == DataType::String as i32 => Some(FeatureKind::Categorical),
            Some(t) if t == DataType::Float as i32 => Some(FeatureKind::Numeric),
            _ => None,
        };
        Self {
            name: info.name.clone(),
            kind,
        }
    }
}

/// Loaded ONNX artifact ready to run sample batches
///
/// The graph is kept in its inference form and specialised to the concrete
/// batch shape on every run.
pub struct OnnxSession {
    path: PathBuf,
    model: InferenceModel,
    inputs: Vec<InputInfo>,
    outputs: Vec<String>,
}

impl OnnxSession {
    /// Load and parse an ONNX artifact
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| Error::inference(format!("failed to read {}: {}", path.display(), e)))?;

        let onnx = tract_onnx::onnx();
        let proto = onnx
            .proto_model_for_read(&mut bytes.as_slice())
            .map_err(|e| {
                Error::inference(format!("{} is not a valid ONNX model: {:#}", path.display(), e))
            })?;
        let graph = proto
            .graph
            .as_ref()
            .ok_or_else(|| Error::inference(format!("{} contains no graph", path.display())))?;

        let inputs: Vec<InputInfo> = graph.input.iter().map(InputInfo::from_proto).collect();
        let outputs: Vec<String> = graph.output.iter().map(|o| o.name.clone()).collect();

        let model = onnx
            .model_for_proto_model(&proto)
            .map_err(|e| Error::inference(format!("failed to load {}: {:#}", path.display(), e)))?;

        info!(
            path = %path.display(),
            inputs = inputs.len(),
            outputs = outputs.len(),
            "Loaded ONNX model"
        );

        Ok(Self {
            path: path.to_path_buf(),
            model,
            inputs,
            outputs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared inputs in graph order
    pub fn inputs(&self) -> &[InputInfo] {
        &self.inputs
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.inputs.iter().map(|i| i.name.as_str()).collect()
    }

    /// Output names in graph order (label first, then probabilities)
    pub fn output_names(&self) -> &[String] {
        &self.outputs
    }

    /// Run the graph on a batch, binding columns to inputs by name
    pub fn run(&self, batch: &SampleBatch) -> Result<Prediction> {
        let started = Instant::now();
        let mut model = self.model.clone();
        let mut values: TVec<TValue> = tvec!();

        for (ix, input) in self.inputs.iter().enumerate() {
            let column = batch.column(&input.name).ok_or_else(|| {
                Error::inference(format!("no sample column for model input '{}'", input.name))
            })?;

            if let Some(kind) = input.kind {
                if kind != column.data.kind() {
                    return Err(Error::inference(format!(
                        "input '{}' expects {} data but the sample column holds {}",
                        input.name,
                        kind.element_type(),
                        column.data.kind().element_type()
                    )));
                }
            }

            let tensor = column_tensor(column)?;
            model = model
                .with_input_fact(
                    ix,
                    InferenceFact::dt_shape(tensor.datum_type(), tvec!(batch.rows(), 1)),
                )
                .map_err(tract_error)?;
            values.push(tensor.into());
        }

        // Declared output shapes use a symbolic batch dimension; let tract
        // infer them from the concrete inputs instead.
        for ix in 0..self.outputs.len() {
            model = model
                .with_output_fact(ix, InferenceFact::default())
                .map_err(tract_error)?;
        }

        let plan = model
            .into_optimized()
            .and_then(|m| m.into_runnable())
            .map_err(tract_error)?;
        let outputs = plan.run(values).map_err(tract_error)?;

        let label_output = outputs
            .first()
            .ok_or_else(|| Error::inference("model produced no outputs"))?;
        let labels: Vec<i64> = label_output
            .cast_to::<i64>()
            .map_err(tract_error)?
            .as_slice::<i64>()
            .map_err(tract_error)?
            .to_vec();

        let probabilities = match outputs.get(1) {
            Some(value) => Some(probability_rows(value)?),
            None => None,
        };

        let latency_us = started.elapsed().as_micros() as u64;
        debug!(rows = labels.len(), latency_us, "Ran ONNX model");

        Ok(Prediction::new(labels, probabilities).with_latency(latency_us))
    }
}

impl Predictor for OnnxSession {
    fn predict(&self, batch: &SampleBatch) -> Result<Prediction> {
        self.run(batch)
    }

    fn name(&self) -> &str {
        "onnx"
    }
}

fn column_tensor(column: &InputColumn) -> Result<Tensor> {
    let rows = column.data.len();
    let tensor = match &column.data {
        ColumnData::Text(values) => {
            Tensor::from(tract_ndarray::Array2::from_shape_vec((rows, 1), values.clone()).map_err(
                |e| Error::inference(format!("column '{}': {}", column.name, e)),
            )?)
        }
        ColumnData::Float(values) => {
            Tensor::from(tract_ndarray::Array2::from_shape_vec((rows, 1), values.clone()).map_err(
                |e| Error::inference(format!("column '{}': {}", column.name, e)),
            )?)
        }
    };
    Ok(tensor)
}

fn probability_rows(value: &TValue) -> Result<Vec<Vec<f32>>> {
    let view = value.to_array_view::<f32>().map_err(tract_error)?;
    if view.ndim() != 2 {
        return Err(Error::inference(format!(
            "probability output has rank {}, expected 2",
            view.ndim()
        )));
    }
    Ok(view
        .outer_iter()
        .map(|row| row.iter().copied().collect())
        .collect())
}

fn tract_error(e: TractError) -> Error {
    Error::inference(format!("{:#}", e))
}
