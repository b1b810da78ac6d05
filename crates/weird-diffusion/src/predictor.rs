use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Context;
use async_stream::try_stream;
use comfy_session::{EngineServer, Session, Workflow};
use futures::Stream;
use tracing::{info, warn};

use crate::{
    config::Config,
    images::{optimise_image_files, OutputFormat},
    params::{chaos_to_denoise, GenerationParams},
    slots::{WorkflowPatch, WorkflowSlots},
};

/// Owns one engine session for the lifetime of the process and drives
/// generation requests through it, one at a time.
#[derive(Debug)]
pub struct Predictor {
    session: Session,
    config: Config,
    // Held so the engine process is killed when the predictor is dropped.
    _server: EngineServer,
}

impl Predictor {
    /// Starts the engine server, opens the session, and checks both
    /// workflow templates.
    ///
    /// # Errors
    ///
    /// Server startup failures, unreadable or unparsable templates, and
    /// templates with dangling node references are all fatal.
    pub async fn setup(config: Config) -> anyhow::Result<Self> {
        let server = EngineServer::start(&config.server_config()).await?;
        let session = Session::connect(server.url())?;

        for path in [&config.templates.batch, &config.templates.streaming] {
            let workflow = load_template(path)?;
            workflow
                .validate_references()
                .with_context(|| format!("template {} is inconsistent", path.display()))?;
            report_missing_weights(&workflow, &config.models_directory);
        }

        Ok(Self {
            session,
            config,
            _server: server,
        })
    }

    /// Runs one batch-mode prediction: a single submission with the full
    /// image count baked into the batch-size field, returning every
    /// finalized image at once.
    pub async fn predict(
        &self,
        params: &GenerationParams,
        format: OutputFormat,
        quality: u8,
    ) -> anyhow::Result<Vec<PathBuf>> {
        self.config.workspace.cleanup()?;

        let mut workflow = load_template(&self.config.templates.batch)?;
        workflow.randomise_seeds(&mut rand::thread_rng());
        let patch = resolve_patch(params, Some(params.number_of_images))?;
        WorkflowSlots::batch().apply(&mut workflow, &patch)?;

        info!(count = params.number_of_images, "submitting batch workflow");
        self.session.run_workflow(&workflow).await?;

        let produced = self.config.workspace.output_images()?;
        optimise_image_files(format, quality, produced)
    }

    /// Runs one streaming-mode prediction: one submission per image,
    /// yielding each finalized image before the next submission runs.
    /// Seeds are re-randomized for every submission; files are
    /// deduplicated by filename stem across iterations.
    pub fn predict_stream<'a>(
        &'a self,
        params: &'a GenerationParams,
        format: OutputFormat,
        quality: u8,
    ) -> impl Stream<Item = anyhow::Result<PathBuf>> + 'a {
        try_stream! {
            self.config.workspace.cleanup()?;

            let mut workflow = load_template(&self.config.templates.streaming)?;
            let patch = resolve_patch(params, None)?;
            WorkflowSlots::streaming().apply(&mut workflow, &patch)?;

            let mut seen = HashSet::new();
            for index in 0..params.number_of_images {
                workflow.randomise_seeds(&mut rand::thread_rng());
                info!(index, "submitting streaming workflow");
                self.session.run_workflow(&workflow).await?;

                let produced = self.config.workspace.unseen_outputs(&mut seen)?;
                for file in optimise_image_files(format, quality, produced)? {
                    yield file;
                }
            }
        }
    }
}

fn load_template(path: &Path) -> anyhow::Result<Workflow> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read workflow template {}", path.display()))?;
    Workflow::from_json(&json)
}

/// Resolves the user-facing parameters into the values written to the
/// workflow document.
fn resolve_patch(
    params: &GenerationParams,
    batch_size: Option<u32>,
) -> anyhow::Result<WorkflowPatch> {
    let (width, height) = params.aspect_ratio.dimensions();
    let denoise = chaos_to_denoise(params.chaos)
        .with_context(|| format!("chaos level {} out of range", params.chaos))?;
    Ok(WorkflowPatch {
        prompt: params.prompt.clone(),
        guidance_scale: params.guidance_scale,
        denoise,
        width,
        height,
        batch_size,
        weird: params.weird,
    })
}

fn report_missing_weights(workflow: &Workflow, models_directory: &Path) {
    for weight in workflow.declared_weights() {
        if models_directory.join(&weight).exists() {
            info!(weight, "model weights present");
        } else {
            warn!(
                weight,
                dir = %models_directory.display(),
                "model weights not found locally; the engine will fetch them"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::AspectRatio;

    #[test]
    fn resolve_patch_derives_dimensions_and_denoise() {
        let params = GenerationParams {
            prompt: "a glass cathedral".to_string(),
            chaos: 10,
            aspect_ratio: AspectRatio::Wide16x9,
            ..Default::default()
        };
        let patch = resolve_patch(&params, Some(4)).unwrap();
        assert_eq!((patch.width, patch.height), (1344, 768));
        assert!((patch.denoise - 0.90).abs() < 1e-9);
        assert_eq!(patch.batch_size, Some(4));
        assert_eq!(patch.prompt, "a glass cathedral");
    }

    #[test]
    fn resolve_patch_rejects_out_of_range_chaos() {
        let params = GenerationParams {
            chaos: 11,
            ..Default::default()
        };
        assert!(resolve_patch(&params, None).is_err());
    }
}
