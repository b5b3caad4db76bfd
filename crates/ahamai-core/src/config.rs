use serde::{Deserialize, Serialize};

/// Hard ceiling for `max_image_count`; one grid never holds more slots
pub const IMAGE_COUNT_LIMIT: u32 = 32;

/// What happens to a block that is still open when its message finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenBlockPolicy {
    /// Keep the unterminated block hidden
    #[default]
    Discard,
    /// Show the block's inner text, without the opening delimiter
    FlushAsText,
}

/// Rendering behavior for assistant messages
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub open_block_policy: OpenBlockPolicy,

    /// Image directives asking for more than this are clamped
    pub max_image_count: u32,

    /// Fewest options a quiz question may have
    pub min_options: usize,

    /// Most options a quiz question may have
    pub max_options: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            open_block_policy: OpenBlockPolicy::Discard,
            max_image_count: 8,
            min_options: 2,
            max_options: 6,
        }
    }
}

impl RenderConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.min_options == 0 {
            return Err("min_options must be > 0".to_string());
        }

        if self.min_options > self.max_options {
            return Err(format!(
                "min_options ({}) cannot exceed max_options ({})",
                self.min_options, self.max_options
            ));
        }

        if self.max_image_count == 0 {
            return Err("max_image_count must be > 0".to_string());
        }

        if self.max_image_count > IMAGE_COUNT_LIMIT {
            return Err(format!(
                "max_image_count ({}) cannot exceed {}",
                self.max_image_count, IMAGE_COUNT_LIMIT
            ));
        }

        Ok(())
    }
}
