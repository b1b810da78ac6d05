use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Highest chaos level accepted at the input boundary.
pub const CHAOS_MAX: u8 = 10;

/// Maps the chaos level to the sampler denoise strength.
///
/// Chaos 0 keeps denoise at 1.0; each level above lowers it by 0.01 down
/// to 0.90 at chaos 10, allowing more of the initial noise to survive
/// into the output. Values outside 0..=10 yield `None`; the input
/// boundary validates the range before this is reached.
pub fn chaos_to_denoise(chaos: u8) -> Option<f64> {
    match chaos {
        0 => Some(1.0),
        1 => Some(0.99),
        2 => Some(0.98),
        3 => Some(0.97),
        4 => Some(0.96),
        5 => Some(0.95),
        6 => Some(0.94),
        7 => Some(0.93),
        8 => Some(0.92),
        9 => Some(0.91),
        10 => Some(0.90),
        _ => None,
    }
}

/// The nine supported aspect ratios. Each maps to a fixed pixel pair
/// close to a one-megapixel budget.
#[derive(ValueEnum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[default]
    #[value(name = "1:1")]
    #[serde(rename = "1:1")]
    Square,
    #[value(name = "16:9")]
    #[serde(rename = "16:9")]
    Wide16x9,
    #[value(name = "21:9")]
    #[serde(rename = "21:9")]
    Wide21x9,
    #[value(name = "2:3")]
    #[serde(rename = "2:3")]
    Portrait2x3,
    #[value(name = "3:2")]
    #[serde(rename = "3:2")]
    Landscape3x2,
    #[value(name = "4:5")]
    #[serde(rename = "4:5")]
    Portrait4x5,
    #[value(name = "5:4")]
    #[serde(rename = "5:4")]
    Landscape5x4,
    #[value(name = "9:16")]
    #[serde(rename = "9:16")]
    Tall9x16,
    #[value(name = "9:21")]
    #[serde(rename = "9:21")]
    Tall9x21,
}

impl AspectRatio {
    /// All supported ratios, in the order the input surface lists them.
    pub const ALL: [AspectRatio; 9] = [
        AspectRatio::Square,
        AspectRatio::Wide16x9,
        AspectRatio::Wide21x9,
        AspectRatio::Portrait2x3,
        AspectRatio::Landscape3x2,
        AspectRatio::Portrait4x5,
        AspectRatio::Landscape5x4,
        AspectRatio::Tall9x16,
        AspectRatio::Tall9x21,
    ];

    /// Returns the (width, height) pixel pair for this ratio.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1024, 1024),
            AspectRatio::Wide16x9 => (1344, 768),
            AspectRatio::Wide21x9 => (1536, 640),
            AspectRatio::Portrait2x3 => (832, 1216),
            AspectRatio::Landscape3x2 => (1216, 832),
            AspectRatio::Portrait4x5 => (896, 1088),
            AspectRatio::Landscape5x4 => (1088, 896),
            AspectRatio::Tall9x16 => (768, 1344),
            AspectRatio::Tall9x21 => (640, 1536),
        }
    }

    /// The ratio string as the input surface spells it.
    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Wide16x9 => "16:9",
            AspectRatio::Wide21x9 => "21:9",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait4x5 => "4:5",
            AspectRatio::Landscape5x4 => "5:4",
            AspectRatio::Tall9x16 => "9:16",
            AspectRatio::Tall9x21 => "9:21",
        }
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an aspect-ratio string to its (width, height) pixel pair.
/// Unknown strings yield `None`.
pub fn aspect_ratio_to_width_height(ratio: &str) -> Option<(u32, u32)> {
    AspectRatio::ALL
        .into_iter()
        .find(|r| r.as_str() == ratio)
        .map(AspectRatio::dimensions)
}

fn parse_guidance_scale(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=20.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("guidance scale must be within 0..=20, got {value}"))
    }
}

/// The user-facing generation request parameters, range-validated at the
/// CLI boundary.
#[derive(clap::Args, Serialize, Deserialize, Debug, Clone)]
pub struct GenerationParams {
    /// The text prompt describing the image.
    #[arg(long, default_value = "")]
    pub prompt: String,

    /// Higher values lead to more variation in image outputs.
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=CHAOS_MAX as i64))]
    pub chaos: u8,

    /// Force outputs into more unusual compositions.
    #[arg(long)]
    pub weird: bool,

    /// The aspect ratio of the generated images.
    #[arg(long, value_enum, default_value_t = AspectRatio::Square)]
    pub aspect_ratio: AspectRatio,

    /// How closely the output should follow the prompt.
    #[arg(long, default_value_t = 4.5, value_parser = parse_guidance_scale)]
    pub guidance_scale: f64,

    /// The number of images to generate.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub number_of_images: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            chaos: 5,
            weird: false,
            aspect_ratio: AspectRatio::Square,
            guidance_scale: 4.5,
            number_of_images: 1,
        }
    }
}
