//! The bot's image work as a pool entry point.

use anyhow::Context;
use async_trait::async_trait;
use tracing::debug;

use super::color::{dominant_color, Rgb};
use super::image::{validate_image, ImageInfo, ImagePolicy};
use crate::core::{TaskContext, TaskFailure, WorkerExecutor};

/// One unit of CPU-bound image work.
#[derive(Debug, Clone)]
pub enum ImageJob {
    /// Check an uploaded file against a policy.
    Validate {
        /// Raw file contents.
        bytes: Vec<u8>,
        /// Limits to enforce.
        policy: ImagePolicy,
    },
    /// Find the dominant color of decoded RGBA pixels.
    DominantColor {
        /// `width * height * 4` bytes, row-major RGBA.
        pixels: Vec<u8>,
        /// Width in pixels.
        width: u32,
        /// Height in pixels.
        height: u32,
    },
}

/// Result of an [`ImageJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageJobResult {
    /// The image passed validation.
    Validated(ImageInfo),
    /// The extracted dominant color.
    DominantColor(Rgb),
}

/// Runs [`ImageJob`]s. Rejections become task failures, never crashes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageJobExecutor;

#[async_trait]
impl WorkerExecutor<ImageJob, ImageJobResult> for ImageJobExecutor {
    async fn execute(&self, job: ImageJob, ctx: TaskContext) -> Result<ImageJobResult, TaskFailure> {
        match job {
            ImageJob::Validate { bytes, policy } => {
                debug!(task = ctx.task, unit = ctx.unit, len = bytes.len(), "validating image");
                let info = validate_image(&bytes, &policy).context("image rejected")?;
                Ok(ImageJobResult::Validated(info))
            }
            ImageJob::DominantColor {
                pixels,
                width,
                height,
            } => {
                debug!(task = ctx.task, unit = ctx.unit, width, height, "extracting dominant color");
                let color = dominant_color(&pixels, width, height)
                    .context("dominant color extraction failed")?;
                Ok(ImageJobResult::DominantColor(color))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::ImageFormat;

    const CTX: TaskContext = TaskContext { task: 1, unit: 1 };

    #[tokio::test]
    async fn test_validate_gif() {
        let job = ImageJob::Validate {
            bytes: b"GIF87a\x10\x00\x08\x00".to_vec(),
            policy: ImagePolicy::default(),
        };
        let ImageJobResult::Validated(info) = ImageJobExecutor.execute(job, CTX).await.unwrap() else {
            panic!("expected validation result");
        };
        assert_eq!(info.format, ImageFormat::Gif);
        assert_eq!((info.width, info.height), (16, 8));
    }

    #[tokio::test]
    async fn test_rejection_is_task_failure() {
        let job = ImageJob::Validate {
            bytes: b"not an image".to_vec(),
            policy: ImagePolicy::default(),
        };
        let err = ImageJobExecutor.execute(job, CTX).await.unwrap_err();
        assert_eq!(err.message(), "image rejected: unrecognized image format");
    }

    #[tokio::test]
    async fn test_dominant_color() {
        let job = ImageJob::DominantColor {
            pixels: vec![16, 32, 48, 255],
            width: 1,
            height: 1,
        };
        assert_eq!(
            ImageJobExecutor.execute(job, CTX).await.unwrap(),
            ImageJobResult::DominantColor(Rgb::new(16, 32, 48))
        );
    }
}
