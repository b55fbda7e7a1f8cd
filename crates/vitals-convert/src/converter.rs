//! Estimator to ONNX graph conversion
//!
//! The emitted graph has one input per declared feature. Categorical inputs
//! go through `CategoryMapper` and `Cast` to become float codes; all columns
//! are concatenated in the pipeline's transformed order and fed to a single
//! `TreeEnsembleClassifier`:
//!
//! ```text
//! gender ─ CategoryMapper ─ Cast ─┐
//! gestational_age_weeks ──────────┤
//! ...                             ├─ Concat ─ TreeEnsembleClassifier ─┬─ output_label
//! heart_rate_bpm ─────────────────┘                                   └─ output_probability
//! ```

use crate::artifact::{write_artifact, ArtifactInfo};
use crate::estimator::{Pipeline, Tree};
use crate::loader::load_best_estimator;
use crate::onnx::{
    attr_floats, attr_int, attr_ints, attr_string, attr_strings, node, tensor_value_info,
    DataType, GraphProto, ModelProto, NodeProto, OperatorSetIdProto, StringStringEntryProto,
    ML_DOMAIN,
};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};
use vitals_core::{Dim, Error, FeatureKind, InputSignature, Result};

/// ONNX IR version written into every artifact
pub const IR_VERSION: i64 = 8;

/// Name of the label output
pub const LABEL_OUTPUT: &str = "output_label";

/// Name of the probability output
pub const PROBABILITY_OUTPUT: &str = "output_probability";

const MIN_OPSET: i64 = 9;
const MAX_OPSET: i64 = 21;

/// Conversion settings
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Opset of the default ONNX domain
    pub target_opset: i64,

    /// Opset of the `ai.onnx.ml` domain
    pub ml_opset: i64,

    /// Graph name stored in the artifact
    pub graph_name: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            target_opset: 14,
            ml_opset: 1,
            graph_name: "health_classifier".to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn with_target_opset(mut self, opset: i64) -> Self {
        self.target_opset = opset;
        self
    }

    pub fn with_graph_name(mut self, name: impl Into<String>) -> Self {
        self.graph_name = name.into();
        self
    }
}

/// Converts fitted pipelines to ONNX models
#[derive(Debug, Clone, Default)]
pub struct ModelConverter {
    options: ConvertOptions,
}

impl ModelConverter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Convert `pipeline` into a graph whose inputs follow `signature`.
    ///
    /// The signature must name exactly the features the pipeline was fitted
    /// on. Order may differ: inputs are wired to the classifier by name.
    pub fn convert(&self, pipeline: &Pipeline, signature: &InputSignature) -> Result<ModelProto> {
        self.check_opsets()?;
        pipeline.validate()?;
        check_signature(pipeline, signature)?;

        let classes = pipeline.classifier.classes()?;
        let trees = pipeline.classifier.trees()?;

        let mut nodes = Vec::new();
        let mut features = Vec::new();
        for column in pipeline.transformed_columns() {
            if let Some(categories) = pipeline.encoder.categories_of(column) {
                let (mapper, cast, output) =
                    encode_column(column, categories, pipeline.encoder.unknown_value);
                nodes.push(mapper);
                nodes.push(cast);
                features.push(output);
            } else {
                features.push(column.to_string());
            }
        }

        nodes.push(node(
            "Concat",
            "",
            "concat_features",
            features,
            vec!["features".to_string()],
            vec![attr_int("axis", 1)],
        ));
        nodes.push(tree_ensemble(&trees, classes));

        let inputs = signature
            .inputs()
            .iter()
            .map(|input| {
                tensor_value_info(&input.name, DataType::for_feature(input.kind), &input.shape.dims)
            })
            .collect();

        let outputs = vec![
            tensor_value_info(LABEL_OUTPUT, DataType::Int64, &[Dim::Unbounded]),
            tensor_value_info(
                PROBABILITY_OUTPUT,
                DataType::Float,
                &[Dim::Unbounded, Dim::Fixed(classes.len())],
            ),
        ];

        debug!(
            nodes = nodes.len(),
            trees = trees.len(),
            classes = classes.len(),
            "Built classifier graph"
        );

        let graph = GraphProto {
            node: nodes,
            name: self.options.graph_name.clone(),
            input: inputs,
            output: outputs,
            ..Default::default()
        };

        let model = ModelProto {
            ir_version: IR_VERSION,
            opset_import: vec![
                OperatorSetIdProto {
                    domain: String::new(),
                    version: self.options.target_opset,
                },
                OperatorSetIdProto {
                    domain: ML_DOMAIN.to_string(),
                    version: self.options.ml_opset,
                },
            ],
            producer_name: env!("CARGO_PKG_NAME").to_string(),
            producer_version: env!("CARGO_PKG_VERSION").to_string(),
            domain: "ai.onnx".to_string(),
            model_version: 0,
            graph: Some(graph),
            metadata_props: vec![StringStringEntryProto {
                key: "estimator".to_string(),
                value: pipeline.classifier.name().to_string(),
            }],
            ..Default::default()
        };

        info!(
            estimator = pipeline.classifier.name(),
            inputs = signature.len(),
            opset = self.options.target_opset,
            "Converted estimator to ONNX"
        );
        Ok(model)
    }

    fn check_opsets(&self) -> Result<()> {
        if !(MIN_OPSET..=MAX_OPSET).contains(&self.options.target_opset) {
            return Err(Error::conversion(format!(
                "target opset {} is outside the supported range {}..={}",
                self.options.target_opset, MIN_OPSET, MAX_OPSET
            )));
        }
        if self.options.ml_opset < 1 {
            return Err(Error::conversion(format!(
                "ai.onnx.ml opset {} is invalid",
                self.options.ml_opset
            )));
        }
        Ok(())
    }
}

/// Convert with default options
pub fn convert_pipeline(pipeline: &Pipeline, signature: &InputSignature) -> Result<ModelProto> {
    ModelConverter::default().convert(pipeline, signature)
}

/// Load the trained model at `model_path`, convert its best estimator and
/// write the artifact to `artifact_path`
pub fn convert_file(
    model_path: impl AsRef<Path>,
    artifact_path: impl AsRef<Path>,
    signature: &InputSignature,
    options: ConvertOptions,
) -> Result<ArtifactInfo> {
    let pipeline = load_best_estimator(model_path)?;
    let model = ModelConverter::new(options).convert(&pipeline, signature)?;
    write_artifact(&model, artifact_path)
}

/// The declared inputs must be the fitted features, with matching kinds
fn check_signature(pipeline: &Pipeline, signature: &InputSignature) -> Result<()> {
    let mut seen = HashSet::new();
    for name in signature.names() {
        if !seen.insert(name) {
            return Err(Error::conversion(format!("feature '{}' is declared twice", name)));
        }
    }

    if signature.len() != pipeline.feature_names_in.len() {
        return Err(Error::conversion(format!(
            "{} features declared but the estimator expects {}",
            signature.len(),
            pipeline.feature_names_in.len()
        )));
    }

    for input in signature.inputs() {
        if !pipeline.feature_names_in.contains(&input.name) {
            return Err(Error::conversion(format!(
                "declared feature '{}' is not one the estimator was fitted on",
                input.name
            )));
        }

        let expected = if pipeline.encoder.encodes(&input.name) {
            FeatureKind::Categorical
        } else {
            FeatureKind::Numeric
        };
        if input.kind != expected {
            return Err(Error::conversion(format!(
                "feature '{}' is declared {} but the estimator expects {} input",
                input.name,
                input.kind.element_type(),
                expected.element_type()
            )));
        }
    }

    Ok(())
}

/// `CategoryMapper` + `Cast`, returning the name of the float output
fn encode_column(
    column: &str,
    categories: &[String],
    unknown_value: i64,
) -> (NodeProto, NodeProto, String) {
    let codes = format!("{}_code", column);
    let output = format!("{}_encoded", column);

    let mapper = node(
        "CategoryMapper",
        ML_DOMAIN,
        format!("{}_mapper", column),
        vec![column.to_string()],
        vec![codes.clone()],
        vec![
            attr_strings("cats_strings", categories),
            attr_ints("cats_int64s", (0..categories.len() as i64).collect()),
            attr_int("default_int64", unknown_value),
        ],
    );

    let cast = node(
        "Cast",
        "",
        format!("{}_cast", column),
        vec![codes],
        vec![output.clone()],
        vec![attr_int("to", DataType::Float as i64)],
    );

    (mapper, cast, output)
}

/// One `TreeEnsembleClassifier` over all trees.
///
/// Leaf weights are class fractions divided by the number of trees, so the
/// summed scores are the averaged probabilities.
fn tree_ensemble(trees: &[&Tree], classes: &[i64]) -> NodeProto {
    let mut nodes_treeids = Vec::new();
    let mut nodes_nodeids = Vec::new();
    let mut nodes_featureids = Vec::new();
    let mut nodes_modes = Vec::new();
    let mut nodes_values = Vec::new();
    let mut nodes_truenodeids = Vec::new();
    let mut nodes_falsenodeids = Vec::new();

    let mut class_treeids = Vec::new();
    let mut class_nodeids = Vec::new();
    let mut class_ids = Vec::new();
    let mut class_weights = Vec::new();

    let scale = trees.len() as f64;
    for (tree_id, tree) in trees.iter().enumerate() {
        for node_id in 0..tree.node_count() {
            nodes_treeids.push(tree_id as i64);
            nodes_nodeids.push(node_id as i64);

            if tree.is_leaf(node_id) {
                nodes_modes.push("LEAF");
                nodes_featureids.push(0);
                nodes_values.push(0.0);
                nodes_truenodeids.push(0);
                nodes_falsenodeids.push(0);

                for (class_id, p) in tree.leaf_proba(node_id).into_iter().enumerate() {
                    class_treeids.push(tree_id as i64);
                    class_nodeids.push(node_id as i64);
                    class_ids.push(class_id as i64);
                    class_weights.push((p / scale) as f32);
                }
            } else {
                nodes_modes.push("BRANCH_LEQ");
                nodes_featureids.push(tree.feature[node_id]);
                nodes_values.push(tree.threshold[node_id] as f32);
                nodes_truenodeids.push(tree.children_left[node_id]);
                nodes_falsenodeids.push(tree.children_right[node_id]);
            }
        }
    }

    node(
        "TreeEnsembleClassifier",
        ML_DOMAIN,
        "tree_ensemble",
        vec!["features".to_string()],
        vec![LABEL_OUTPUT.to_string(), PROBABILITY_OUTPUT.to_string()],
        vec![
            attr_ints("classlabels_int64s", classes.to_vec()),
            attr_ints("nodes_treeids", nodes_treeids),
            attr_ints("nodes_nodeids", nodes_nodeids),
            attr_ints("nodes_featureids", nodes_featureids),
            attr_strings("nodes_modes", &nodes_modes),
            attr_floats("nodes_values", nodes_values),
            attr_ints("nodes_truenodeids", nodes_truenodeids),
            attr_ints("nodes_falsenodeids", nodes_falsenodeids),
            attr_ints("class_treeids", class_treeids),
            attr_ints("class_nodeids", class_nodeids),
            attr_ints("class_ids", class_ids),
            attr_floats("class_weights", class_weights),
            attr_string("post_transform", "NONE"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::tests::small_pipeline;
    use crate::onnx::AttributeType;
    use vitals_core::FEATURE_NAMES;

    #[test]
    fn test_graph_layout() {
        let model = convert_pipeline(&small_pipeline(), &InputSignature::health_classifier()).unwrap();

        assert_eq!(model.ir_version, IR_VERSION);
        assert_eq!(model.opset(""), Some(14));
        assert_eq!(model.opset(ML_DOMAIN), Some(1));

        let graph = model.graph.as_ref().unwrap();
        let inputs: Vec<&str> = graph.input.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(inputs, FEATURE_NAMES.to_vec());
        assert_eq!(graph.input[0].elem_type(), Some(DataType::String));
        assert_eq!(graph.input[1].elem_type(), Some(DataType::Float));
        assert_eq!(graph.input[1].dims(), vec![Dim::Unbounded, Dim::Fixed(1)]);

        let ops: Vec<&str> = graph.node.iter().map(|n| n.op_type.as_str()).collect();
        assert_eq!(
            ops,
            vec!["CategoryMapper", "Cast", "Concat", "TreeEnsembleClassifier"]
        );

        let concat = &graph.node[2];
        assert_eq!(concat.input[0], "gender_encoded");
        assert_eq!(concat.input[1], "gestational_age_weeks");

        let outputs: Vec<&str> = graph.output.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(outputs, vec![LABEL_OUTPUT, PROBABILITY_OUTPUT]);
        assert_eq!(graph.output[1].dims(), vec![Dim::Unbounded, Dim::Fixed(3)]);
    }

    #[test]
    fn test_tree_attributes() {
        let model = convert_pipeline(&small_pipeline(), &InputSignature::health_classifier()).unwrap();
        let graph = model.graph.unwrap();
        let ensemble = graph.node.last().unwrap();

        let modes = ensemble.attr("nodes_modes").unwrap();
        assert_eq!(modes.r#type, AttributeType::Strings as i32);
        assert_eq!(modes.strings.len(), 5);
        assert_eq!(modes.strings[0], b"BRANCH_LEQ".to_vec());
        assert_eq!(modes.strings[2], b"LEAF".to_vec());

        let features = ensemble.attr("nodes_featureids").unwrap();
        assert_eq!(features.ints[..2], [7, 0]);

        // three leaves, three classes each
        let weights = &ensemble.attr("class_weights").unwrap().floats;
        assert_eq!(weights.len(), 9);
        assert!((weights[0] - 0.75).abs() < 1e-6);

        let mapper = &graph.node[0];
        assert_eq!(mapper.domain, ML_DOMAIN);
        assert_eq!(mapper.attr("default_int64").unwrap().i, -1);
    }

    #[test]
    fn test_feature_set_mismatch_is_rejected() {
        let pipeline = small_pipeline();

        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names[8] = "respiratory_rate";
        let renamed = InputSignature::map_features(&names, &["gender"]);
        let err = convert_pipeline(&pipeline, &renamed).unwrap_err();
        assert!(err.to_string().contains("respiratory_rate"));

        let short = InputSignature::map_features(&FEATURE_NAMES[..8], &["gender"]);
        assert!(matches!(convert_pipeline(&pipeline, &short), Err(Error::Conversion(_))));

        let mut doubled: Vec<&str> = FEATURE_NAMES.to_vec();
        doubled[8] = "gender";
        let doubled = InputSignature::map_features(&doubled, &["gender"]);
        assert!(convert_pipeline(&pipeline, &doubled).is_err());
    }

    #[test]
    fn test_kind_mismatch_is_rejected() {
        let numeric_gender = InputSignature::map_features(&FEATURE_NAMES, &[]);
        let err = convert_pipeline(&small_pipeline(), &numeric_gender).unwrap_err();
        assert!(err.to_string().contains("gender"));
    }

    #[test]
    fn test_permuted_signature_keeps_concat_order() {
        let mut names: Vec<&str> = FEATURE_NAMES.to_vec();
        names.reverse();
        let signature = InputSignature::map_features(&names, &["gender"]);

        let model = convert_pipeline(&small_pipeline(), &signature).unwrap();
        let graph = model.graph.unwrap();

        assert_eq!(graph.input[0].name, "heart_rate_bpm");
        let concat = graph.node.iter().find(|n| n.op_type == "Concat").unwrap();
        assert_eq!(concat.input[0], "gender_encoded");
        assert_eq!(concat.input[8], "heart_rate_bpm");
    }

    #[test]
    fn test_opset_range() {
        let converter = ModelConverter::new(ConvertOptions::default().with_target_opset(3));
        let err = converter
            .convert(&small_pipeline(), &InputSignature::health_classifier())
            .unwrap_err();
        assert!(err.to_string().contains("target opset 3"));
    }
}
