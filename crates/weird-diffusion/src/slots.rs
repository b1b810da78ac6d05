use anyhow::{anyhow, Context};
use comfy_session::{NodeConnection, Workflow};
use serde::{Deserialize, Serialize};

/// A logical slot bound to a template node id and input-field name.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct NodeField {
    /// The template node id carrying the slot.
    pub node: String,
    /// The input field name on that node.
    pub field: String,
}

impl NodeField {
    fn new(node: &str, field: &str) -> Self {
        Self {
            node: node.to_string(),
            field: field.to_string(),
        }
    }
}

/// Slots for the weird-mode graph rewiring: route the final image path
/// through the content reshuffle node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReshuffleSlots {
    /// The reshuffle node's resolution field, set to the requested width.
    pub resolution: NodeField,
    /// The downstream image input that gets repointed at the reshuffle
    /// node's output.
    pub rewire_target: NodeField,
    /// The reshuffle node id the target is rewired to.
    pub source_node: String,
}

/// Describes which logical slots a workflow template exposes and where
/// they live, decoupling the patch logic from any one template revision.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSlots {
    /// The prompt text field on the designated text node.
    pub prompt_text: NodeField,
    /// The sampler's guidance-scale field.
    pub guidance: NodeField,
    /// The sampler's denoise field.
    pub denoise: NodeField,
    /// The latent image width field.
    pub width: NodeField,
    /// The latent image height field.
    pub height: NodeField,
    /// The latent batch-size field. Absent in the streaming template,
    /// which always generates one image per submission.
    pub batch_size: Option<NodeField>,
    /// The weird-mode rewiring slots, when the template has a reshuffle
    /// node.
    pub reshuffle: Option<ReshuffleSlots>,
}

impl WorkflowSlots {
    /// Slot bindings for the batch template (`workflow_api.json`).
    pub fn batch() -> Self {
        Self {
            prompt_text: NodeField::new("282", "Text"),
            guidance: NodeField::new("297", "cfg"),
            denoise: NodeField::new("297", "denoise"),
            width: NodeField::new("342", "width"),
            height: NodeField::new("342", "height"),
            batch_size: Some(NodeField::new("342", "batch_size")),
            reshuffle: Some(ReshuffleSlots {
                resolution: NodeField::new("404", "resolution"),
                rewire_target: NodeField::new("381", "image"),
                source_node: "404".to_string(),
            }),
        }
    }

    /// Slot bindings for the streaming template
    /// (`workflow_stream_api.json`). Identical to the batch bindings
    /// except that there is no batch-size slot and the rewire target is
    /// node "396".
    pub fn streaming() -> Self {
        Self {
            batch_size: None,
            reshuffle: Some(ReshuffleSlots {
                resolution: NodeField::new("404", "resolution"),
                rewire_target: NodeField::new("396", "image"),
                source_node: "404".to_string(),
            }),
            ..Self::batch()
        }
    }

    /// Applies a patch to a workflow document, mutating exactly the slot
    /// fields this adapter names.
    ///
    /// # Errors
    ///
    /// A slot whose node id is absent from the document is a hard error.
    /// Requesting weird mode against a template with no reshuffle slots
    /// is an error as well.
    pub fn apply(&self, workflow: &mut Workflow, patch: &WorkflowPatch) -> anyhow::Result<()> {
        set(workflow, &self.prompt_text, patch.prompt.as_str())?;
        set(workflow, &self.guidance, patch.guidance_scale)?;
        set(workflow, &self.denoise, patch.denoise)?;
        set(workflow, &self.width, patch.width)?;
        set(workflow, &self.height, patch.height)?;

        if let Some(batch_size) = patch.batch_size {
            let slot = self
                .batch_size
                .as_ref()
                .ok_or_else(|| anyhow!("workflow template has no batch-size slot"))?;
            set(workflow, slot, batch_size)?;
        }

        if patch.weird {
            let reshuffle = self
                .reshuffle
                .as_ref()
                .ok_or_else(|| anyhow!("workflow template has no reshuffle slots"))?;
            set(workflow, &reshuffle.resolution, patch.width)?;
            set(
                workflow,
                &reshuffle.rewire_target,
                NodeConnection::new(reshuffle.source_node.as_str(), 0),
            )?;
        }
        Ok(())
    }
}

fn set<V>(workflow: &mut Workflow, slot: &NodeField, value: V) -> anyhow::Result<()>
where
    V: Into<comfy_session::InputValue>,
{
    workflow
        .set_input(&slot.node, &slot.field, value)
        .with_context(|| format!("failed to patch slot {}.{}", slot.node, slot.field))
}

/// The resolved per-request values written into a workflow document.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowPatch {
    /// The prompt text.
    pub prompt: String,
    /// The sampler guidance scale.
    pub guidance_scale: f64,
    /// The sampler denoise strength derived from the chaos level.
    pub denoise: f64,
    /// The latent image width.
    pub width: u32,
    /// The latent image height.
    pub height: u32,
    /// The latent batch size; `None` when submitting one image at a time.
    pub batch_size: Option<u32>,
    /// Whether to route the image path through the reshuffle node.
    pub weird: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BATCH_TEMPLATE: &str = include_str!("../../../workflow_api.json");
    const STREAM_TEMPLATE: &str = include_str!("../../../workflow_stream_api.json");

    fn patch() -> WorkflowPatch {
        WorkflowPatch {
            prompt: "an impossible staircase".to_string(),
            guidance_scale: 4.5,
            denoise: 0.95,
            width: 1024,
            height: 1024,
            batch_size: None,
            weird: false,
        }
    }

    #[test]
    fn templates_pass_reference_validation() {
        for template in [BATCH_TEMPLATE, STREAM_TEMPLATE] {
            Workflow::from_json(template)
                .unwrap()
                .validate_references()
                .unwrap();
        }
    }

    #[test]
    fn prompt_patch_changes_only_the_text_field() {
        let mut workflow = Workflow::from_json(BATCH_TEMPLATE).unwrap();
        let before = serde_json::to_value(&workflow).unwrap();

        WorkflowSlots::batch().apply(&mut workflow, &patch()).unwrap();
        let mut after = serde_json::to_value(&workflow).unwrap();

        assert_eq!(
            after["282"]["inputs"]["Text"],
            serde_json::json!("an impossible staircase")
        );
        // Reverting the slot fields restores the original document:
        // nothing else was touched.
        after["282"]["inputs"]["Text"] = before["282"]["inputs"]["Text"].clone();
        for (node, field) in [
            ("297", "cfg"),
            ("297", "denoise"),
            ("342", "width"),
            ("342", "height"),
        ] {
            after[node]["inputs"][field] = before[node]["inputs"][field].clone();
        }
        assert_eq!(before, after);
    }

    #[test]
    fn weird_mode_is_untouched_unless_requested() {
        let mut workflow = Workflow::from_json(BATCH_TEMPLATE).unwrap();
        let before_resolution = workflow.node("404").unwrap().inputs["resolution"].clone();
        let before_image = workflow.node("381").unwrap().inputs["image"].clone();

        WorkflowSlots::batch().apply(&mut workflow, &patch()).unwrap();

        assert_eq!(
            workflow.node("404").unwrap().inputs["resolution"],
            before_resolution
        );
        assert_eq!(workflow.node("381").unwrap().inputs["image"], before_image);
    }

    #[test]
    fn weird_mode_rewires_through_the_reshuffle_node() {
        let mut workflow = Workflow::from_json(BATCH_TEMPLATE).unwrap();
        let mut weird_patch = patch();
        weird_patch.weird = true;
        weird_patch.width = 1344;
        weird_patch.height = 768;

        WorkflowSlots::batch().apply(&mut workflow, &weird_patch).unwrap();

        assert_eq!(
            workflow.node("404").unwrap().inputs["resolution"].as_i64(),
            Some(1344)
        );
        assert_eq!(
            workflow.node("381").unwrap().inputs["image"].connection(),
            Some(&NodeConnection::new("404", 0))
        );
        workflow.validate_references().unwrap();
    }

    #[test]
    fn streaming_template_rewires_its_own_target_node() {
        let mut workflow = Workflow::from_json(STREAM_TEMPLATE).unwrap();
        let mut weird_patch = patch();
        weird_patch.weird = true;

        WorkflowSlots::streaming()
            .apply(&mut workflow, &weird_patch)
            .unwrap();

        assert_eq!(
            workflow.node("396").unwrap().inputs["image"].connection(),
            Some(&NodeConnection::new("404", 0))
        );
    }

    #[test]
    fn batch_patch_sets_the_batch_size() {
        let mut workflow = Workflow::from_json(BATCH_TEMPLATE).unwrap();
        let mut batch_patch = patch();
        batch_patch.batch_size = Some(4);

        WorkflowSlots::batch().apply(&mut workflow, &batch_patch).unwrap();

        assert_eq!(
            workflow.node("342").unwrap().inputs["batch_size"].as_i64(),
            Some(4)
        );
    }

    #[test]
    fn streaming_slots_reject_a_batch_size() {
        let mut workflow = Workflow::from_json(STREAM_TEMPLATE).unwrap();
        let mut batch_patch = patch();
        batch_patch.batch_size = Some(4);

        assert!(WorkflowSlots::streaming()
            .apply(&mut workflow, &batch_patch)
            .is_err());
    }

    #[test]
    fn missing_slot_node_is_a_hard_error() {
        let mut workflow = Workflow::from_json(BATCH_TEMPLATE).unwrap();
        let mut slots = WorkflowSlots::batch();
        slots.prompt_text = NodeField::new("999", "Text");

        let err = slots.apply(&mut workflow, &patch()).unwrap_err();
        assert!(format!("{err:#}").contains("999"));
    }
}
