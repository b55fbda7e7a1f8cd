//! ONNX message types and graph construction helpers

pub mod proto;

pub use proto::{
    AttributeProto, AttributeType, DataType, GraphProto, ModelProto, NodeProto,
    OperatorSetIdProto, StringStringEntryProto, TensorShapeProto, TypeProto, ValueInfoProto,
};

use proto::{tensor_shape_proto, type_proto};
use vitals_core::{Dim, FeatureKind};

/// Domain of the classic-ML operators (`TreeEnsembleClassifier`, `CategoryMapper`)
pub const ML_DOMAIN: &str = "ai.onnx.ml";

/// Symbolic name given to unbounded (batch) dimensions
pub const BATCH_DIM: &str = "N";

impl DataType {
    /// Element type used for a feature of the given kind
    pub fn for_feature(kind: FeatureKind) -> Self {
        match kind {
            FeatureKind::Categorical => Self::String,
            FeatureKind::Numeric => Self::Float,
        }
    }
}

pub fn attr_int(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Int as i32,
        i: value,
        ..Default::default()
    }
}

pub fn attr_ints(name: &str, values: Vec<i64>) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Ints as i32,
        ints: values,
        ..Default::default()
    }
}

pub fn attr_floats(name: &str, values: Vec<f32>) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Floats as i32,
        floats: values,
        ..Default::default()
    }
}

pub fn attr_string(name: &str, value: &str) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::String as i32,
        s: value.as_bytes().to_vec(),
        ..Default::default()
    }
}

pub fn attr_strings<S: AsRef<str>>(name: &str, values: &[S]) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: AttributeType::Strings as i32,
        strings: values.iter().map(|s| s.as_ref().as_bytes().to_vec()).collect(),
        ..Default::default()
    }
}

/// Build a graph node
pub fn node(
    op_type: &str,
    domain: &str,
    name: impl Into<String>,
    inputs: Vec<String>,
    outputs: Vec<String>,
    attribute: Vec<AttributeProto>,
) -> NodeProto {
    NodeProto {
        input: inputs,
        output: outputs,
        name: name.into(),
        op_type: op_type.to_string(),
        domain: domain.to_string(),
        attribute,
        ..Default::default()
    }
}

/// Declare a named tensor value with element type and shape
pub fn tensor_value_info(name: &str, elem_type: DataType, dims: &[Dim]) -> ValueInfoProto {
    let dim = dims
        .iter()
        .map(|d| tensor_shape_proto::Dimension {
            value: Some(match d {
                Dim::Unbounded => tensor_shape_proto::dimension::Value::DimParam(BATCH_DIM.to_string()),
                Dim::Fixed(n) => tensor_shape_proto::dimension::Value::DimValue(*n as i64),
            }),
        })
        .collect();

    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: elem_type as i32,
                shape: Some(TensorShapeProto { dim }),
            })),
        }),
        ..Default::default()
    }
}

impl ValueInfoProto {
    /// Element type of a tensor value, if declared
    pub fn elem_type(&self) -> Option<DataType> {
        match self.r#type.as_ref()?.value.as_ref()? {
            type_proto::Value::TensorType(t) => DataType::try_from(t.elem_type).ok(),
        }
    }

    /// Declared dimensions of a tensor value
    pub fn dims(&self) -> Vec<Dim> {
        let shape = match self.r#type.as_ref().and_then(|t| t.value.as_ref()) {
            Some(type_proto::Value::TensorType(t)) => t.shape.as_ref(),
            None => None,
        };

        shape
            .map(|s| {
                s.dim
                    .iter()
                    .map(|d| match d.value {
                        Some(tensor_shape_proto::dimension::Value::DimValue(n)) if n >= 0 => {
                            Dim::Fixed(n as usize)
                        }
                        _ => Dim::Unbounded,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl NodeProto {
    /// Look up an attribute by name
    pub fn attr(&self, name: &str) -> Option<&AttributeProto> {
        self.attribute.iter().find(|a| a.name == name)
    }
}

impl ModelProto {
    /// Declared opset version for a domain (`""` is the default domain)
    pub fn opset(&self, domain: &str) -> Option<i64> {
        self.opset_import
            .iter()
            .find(|o| o.domain == domain)
            .map(|o| o.version)
    }
}
