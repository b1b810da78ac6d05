use std::collections::BTreeMap;

use anyhow::{anyhow, Context};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Input field names that carry a random seed.
const SEED_FIELDS: [&str; 2] = ["seed", "noise_seed"];

/// File extensions of model weights referenced by workflow inputs.
const WEIGHT_EXTENSIONS: [&str; 4] = [".safetensors", ".ckpt", ".sft", ".pt"];

/// A workflow document: the node graph submitted to the ComfyUI `prompt`
/// endpoint, indexed by node id.
#[derive(Default, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Workflow {
    /// The workflow nodes, indexed by node id.
    #[serde(flatten)]
    pub nodes: BTreeMap<String, WorkflowNode>,
}

impl Workflow {
    /// Parses a workflow document from an API-format JSON string.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("failed to parse workflow document")
    }

    /// Returns a reference to the node with the given id.
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(id)
    }

    /// Returns a mutable reference to the node with the given id.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(id)
    }

    /// Sets an input field on the node with the given id.
    ///
    /// # Errors
    ///
    /// If the node does not exist in this document, an error will be
    /// returned. A field that does not yet exist on the node is inserted.
    pub fn set_input<V>(&mut self, id: &str, field: &str, value: V) -> anyhow::Result<()>
    where
        V: Into<InputValue>,
    {
        let node = self
            .nodes
            .get_mut(id)
            .with_context(|| format!("node \"{id}\" not found in workflow"))?;
        node.inputs.insert(field.to_string(), value.into());
        Ok(())
    }

    /// Checks that every node connection in the document references an
    /// existing node, so that a stale node id fails at load time rather
    /// than mid-mutation.
    pub fn validate_references(&self) -> anyhow::Result<()> {
        let mut dangling = Vec::new();
        for (id, node) in &self.nodes {
            for (field, value) in &node.inputs {
                if let Some(target) = value.node_id() {
                    if !self.nodes.contains_key(target) {
                        dangling.push(format!("{id}.{field} -> {target}"));
                    }
                }
            }
        }
        if dangling.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "workflow references missing nodes: {}",
                dangling.join(", ")
            ))
        }
    }

    /// Assigns a fresh random value to every seed-bearing input field.
    pub fn randomise_seeds<R: Rng>(&mut self, rng: &mut R) {
        for node in self.nodes.values_mut() {
            for (field, value) in node.inputs.iter_mut() {
                if SEED_FIELDS.contains(&field.as_str()) {
                    *value = InputValue::Int(rng.gen_range(0..=i64::from(u32::MAX)));
                }
            }
        }
    }

    /// Returns the model weight filenames referenced by any node input,
    /// deduplicated and sorted.
    pub fn declared_weights(&self) -> Vec<String> {
        let mut weights: Vec<String> = self
            .nodes
            .values()
            .flat_map(|node| node.inputs.values())
            .filter_map(|value| value.as_str())
            .filter(|s| WEIGHT_EXTENSIONS.iter().any(|ext| s.ends_with(ext)))
            .map(str::to_string)
            .collect();
        weights.sort();
        weights.dedup();
        weights
    }
}

/// A single node in a workflow document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkflowNode {
    /// The node class type.
    pub class_type: String,
    /// Editor metadata attached to the node, carried through untouched.
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
    /// The node inputs, either scalar values or connections to other
    /// nodes' outputs.
    pub inputs: BTreeMap<String, InputValue>,
}

/// Enum of possible node input values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum InputValue {
    /// Bool input variant.
    Bool(bool),
    /// Integer input variant.
    Int(i64),
    /// Float input variant.
    Float(f64),
    /// String input variant.
    String(String),
    /// Node connection input variant.
    Connection(NodeConnection),
}

impl InputValue {
    /// Get the string value of the input, if it is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InputValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the numeric value of the input, if it is an integer or float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InputValue::Int(i) => Some(*i as f64),
            InputValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the integer value of the input, if it is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            InputValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the connection of the input, if it is a node connection.
    pub fn connection(&self) -> Option<&NodeConnection> {
        match self {
            InputValue::Connection(connection) => Some(connection),
            _ => None,
        }
    }

    /// Get the id of the node this input draws from, if it is a
    /// connection.
    pub fn node_id(&self) -> Option<&str> {
        self.connection().map(|c| c.node_id.as_str())
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Bool(value)
    }
}

impl From<i64> for InputValue {
    fn from(value: i64) -> Self {
        InputValue::Int(value)
    }
}

impl From<u32> for InputValue {
    fn from(value: u32) -> Self {
        InputValue::Int(i64::from(value))
    }
}

impl From<f64> for InputValue {
    fn from(value: f64) -> Self {
        InputValue::Float(value)
    }
}

impl From<&str> for InputValue {
    fn from(value: &str) -> Self {
        InputValue::String(value.to_string())
    }
}

impl From<String> for InputValue {
    fn from(value: String) -> Self {
        InputValue::String(value)
    }
}

impl From<NodeConnection> for InputValue {
    fn from(value: NodeConnection) -> Self {
        InputValue::Connection(value)
    }
}

/// A node input connection, serialized as a `[node-id, output-index]`
/// pair.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "(String, u32)")]
#[serde(into = "(String, u32)")]
pub struct NodeConnection {
    /// The id of the node providing the input.
    pub node_id: String,
    /// The index of the output from the node providing the input.
    pub output_index: u32,
}

impl NodeConnection {
    /// Returns a connection to the given output of the given node.
    pub fn new<S: Into<String>>(node_id: S, output_index: u32) -> Self {
        Self {
            node_id: node_id.into(),
            output_index,
        }
    }
}

impl From<(String, u32)> for NodeConnection {
    fn from((node_id, output_index): (String, u32)) -> Self {
        Self {
            node_id,
            output_index,
        }
    }
}

impl From<NodeConnection> for (String, u32) {
    fn from(
        NodeConnection {
            node_id,
            output_index,
        }: NodeConnection,
    ) -> Self {
        (node_id, output_index)
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    const WORKFLOW: &str = r#"{
        "3": {
            "class_type": "CheckpointLoaderSimple",
            "inputs": { "ckpt_name": "model_v1.safetensors" }
        },
        "4": {
            "class_type": "CLIPTextEncode",
            "inputs": { "text": "a cat", "clip": ["3", 1] }
        },
        "5": {
            "class_type": "KSampler",
            "inputs": {
                "seed": 42,
                "cfg": 7.5,
                "denoise": 1.0,
                "model": ["3", 0],
                "positive": ["4", 0]
            }
        }
    }"#;

    #[test]
    fn parses_scalars_and_connections() {
        let workflow = Workflow::from_json(WORKFLOW).unwrap();
        let sampler = workflow.node("5").unwrap();
        assert_eq!(sampler.class_type, "KSampler");
        assert_eq!(sampler.inputs["seed"].as_i64(), Some(42));
        assert_eq!(sampler.inputs["cfg"].as_f64(), Some(7.5));
        assert_eq!(
            sampler.inputs["model"].connection(),
            Some(&NodeConnection::new("3", 0))
        );
    }

    #[test]
    fn connection_round_trips_as_pair() {
        let workflow = Workflow::from_json(WORKFLOW).unwrap();
        let json = serde_json::to_value(&workflow).unwrap();
        assert_eq!(json["4"]["inputs"]["clip"], serde_json::json!(["3", 1]));
    }

    #[test]
    fn set_input_fails_on_missing_node() {
        let mut workflow = Workflow::from_json(WORKFLOW).unwrap();
        assert!(workflow.set_input("999", "text", "nope").is_err());
        workflow.set_input("4", "text", "a dog").unwrap();
        assert_eq!(workflow.node("4").unwrap().inputs["text"].as_str(), Some("a dog"));
    }

    #[test]
    fn validate_references_rejects_dangling_connections() {
        let mut workflow = Workflow::from_json(WORKFLOW).unwrap();
        workflow.validate_references().unwrap();

        workflow
            .set_input("5", "latent_image", NodeConnection::new("404", 0))
            .unwrap();
        let err = workflow.validate_references().unwrap_err();
        assert!(err.to_string().contains("5.latent_image -> 404"));
    }

    #[test]
    fn randomise_seeds_touches_only_seed_fields() {
        let mut workflow = Workflow::from_json(WORKFLOW).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        workflow.randomise_seeds(&mut rng);

        let sampler = workflow.node("5").unwrap();
        assert_ne!(sampler.inputs["seed"].as_i64(), Some(42));
        assert_eq!(sampler.inputs["cfg"].as_f64(), Some(7.5));
        assert_eq!(
            workflow.node("4").unwrap().inputs["text"].as_str(),
            Some("a cat")
        );
    }

    #[test]
    fn declared_weights_lists_referenced_checkpoints() {
        let workflow = Workflow::from_json(WORKFLOW).unwrap();
        assert_eq!(workflow.declared_weights(), vec!["model_v1.safetensors"]);
    }
}
