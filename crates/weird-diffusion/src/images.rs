use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::ValueEnum;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Output formats the finalizer can produce.
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Webp,
    Jpg,
    Png,
}

impl OutputFormat {
    /// The file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Jpg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Webp => image::ImageFormat::WebP,
            OutputFormat::Jpg => image::ImageFormat::Jpeg,
            OutputFormat::Png => image::ImageFormat::Png,
        }
    }

    fn matches_extension(self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_ascii_lowercase();
                ext == self.extension() || (self == OutputFormat::Jpg && ext == "jpeg")
            })
    }
}

/// Re-encodes raw produced files into the requested format, one-to-one
/// and order-preserving.
///
/// Quality applies to JPEG encoding; the WebP and PNG encoders are
/// lossless. Files already in the requested format pass through
/// untouched.
pub fn optimise_image_files(
    format: OutputFormat,
    quality: u8,
    files: Vec<PathBuf>,
) -> anyhow::Result<Vec<PathBuf>> {
    files
        .into_iter()
        .map(|file| optimise_image(&file, format, quality))
        .collect()
}

fn optimise_image(path: &Path, format: OutputFormat, quality: u8) -> anyhow::Result<PathBuf> {
    if format.matches_extension(path) {
        return Ok(path.to_path_buf());
    }
    let img = image::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let out = path.with_extension(format.extension());
    match format {
        OutputFormat::Jpg => {
            let writer = BufWriter::new(
                File::create(&out).with_context(|| format!("failed to create {}", out.display()))?,
            );
            let encoder = JpegEncoder::new_with_quality(writer, quality);
            // JPEG has no alpha channel.
            image::DynamicImage::ImageRgb8(img.to_rgb8())
                .write_with_encoder(encoder)
                .with_context(|| format!("failed to encode {}", out.display()))?;
        }
        OutputFormat::Webp | OutputFormat::Png => {
            img.save_with_format(&out, format.image_format())
                .with_context(|| format!("failed to encode {}", out.display()))?;
        }
    }
    debug!(from = %path.display(), to = %out.display(), "optimised image");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_png(path: &Path) {
        let img = image::ImageBuffer::from_fn(32, 32, |x, y| {
            image::Rgb([(x * 8) as u8, (y * 8) as u8, 128u8])
        });
        img.save_with_format(path, image::ImageFormat::Png).unwrap();
    }

    #[test]
    fn reencodes_png_to_jpg_at_requested_quality() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("img_00001_.png");
        write_test_png(&src);

        let out = optimise_image_files(OutputFormat::Jpg, 80, vec![src]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].extension().unwrap(), "jpg");

        let reopened = image::open(&out[0]).unwrap();
        assert_eq!(reopened.width(), 32);
        assert_eq!(reopened.height(), 32);
    }

    #[test]
    fn files_already_in_format_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("img_00001_.png");
        write_test_png(&src);

        let out = optimise_image_files(OutputFormat::Png, 80, vec![src.clone()]).unwrap();
        assert_eq!(out, vec![src]);
    }

    #[test]
    fn output_order_matches_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("img_00002_.png");
        let b = dir.path().join("img_00001_.png");
        write_test_png(&a);
        write_test_png(&b);

        let out = optimise_image_files(OutputFormat::Webp, 80, vec![a, b]).unwrap();
        let names: Vec<_> = out
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["img_00002_.webp", "img_00001_.webp"]);
    }
}
