mod image;
mod text;

pub use image::{HttpImageClient, ImagePayload, ImageService};
pub use text::TextClient;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
