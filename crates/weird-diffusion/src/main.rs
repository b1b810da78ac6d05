use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use futures::{pin_mut, StreamExt};
use tracing::metadata::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use weird_diffusion::{Config, GenerationParams, OutputFormat, Predictor};

#[derive(Parser, Debug)]
#[command(version, about = "Generate images through a local ComfyUI workflow engine")]
struct Args {
    /// Path to the configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Yield images one at a time, one submission per image, instead of
    /// one batched submission.
    #[arg(long)]
    stream: bool,

    #[command(flatten)]
    params: GenerationParams,

    /// Format of the output images.
    #[arg(long, value_enum, default_value_t = OutputFormat::Webp)]
    output_format: OutputFormat,

    /// Quality of the output images, from 0 to 100. 100 is best quality,
    /// 0 is lowest quality.
    #[arg(long, default_value_t = 80, value_parser = clap::value_parser!(u8).range(0..=100))]
    output_quality: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()
        .context("Failed to parse filter from env")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&args.config))
        .merge(Env::prefixed("WEIRD_DIFFUSION_"))
        .extract()
        .context("Invalid configuration")?;

    let predictor = Predictor::setup(config).await?;

    if args.stream {
        let stream =
            predictor.predict_stream(&args.params, args.output_format, args.output_quality);
        pin_mut!(stream);
        while let Some(file) = stream.next().await {
            println!("{}", file?.display());
        }
    } else {
        let files = predictor
            .predict(&args.params, args.output_format, args.output_quality)
            .await?;
        for file in files {
            println!("{}", file.display());
        }
    }

    Ok(())
}
