//! Tests for image job helpers

use xivdye_worker_pool::jobs::{
    dominant_color, validate_image, ColorError, ImageFormat, ImagePolicy, ImageRejection, Rgb,
};

fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR".to_vec();
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes
}

#[test]
fn test_default_policy() {
    let policy = ImagePolicy::default();
    assert_eq!(policy.max_bytes, 8 * 1024 * 1024);
    assert_eq!((policy.max_width, policy.max_height), (4096, 4096));
    assert_eq!(policy.allowed_formats, ImageFormat::ALL.to_vec());
}

#[test]
fn test_policy_from_json() {
    let policy: ImagePolicy =
        serde_json::from_str(r#"{"max_width": 512, "allowed_formats": ["png", "webp"]}"#)
            .expect("valid policy");
    assert_eq!(policy.max_width, 512);
    assert_eq!(policy.max_height, 4096);
    assert_eq!(policy.allowed_formats, vec![ImageFormat::Png, ImageFormat::WebP]);

    assert_eq!(
        validate_image(&png_header(600, 10), &policy),
        Err(ImageRejection::DimensionsTooLarge {
            width: 600,
            height: 10,
            max_width: 512,
            max_height: 4096,
        })
    );
}

#[test]
fn test_validate_reports_info() {
    let info = validate_image(&png_header(4096, 4096), &ImagePolicy::default()).expect("valid");
    assert_eq!(info.format, ImageFormat::Png);
    assert_eq!(info.format.mime_type(), "image/png");
    assert_eq!(info.format.to_string(), "png");
}

#[test]
fn test_rejection_messages() {
    assert_eq!(
        ImageRejection::FormatNotAllowed(ImageFormat::Gif).to_string(),
        "gif images are not accepted"
    );
    assert_eq!(
        ImageRejection::TooLarge { size: 10, max: 5 }.to_string(),
        "image is 10 bytes, limit is 5"
    );
}

#[test]
fn test_dominant_color_of_solid_image() {
    let rgba: Vec<u8> = std::iter::repeat([0x5A, 0x8F, 0xC2, 0xFF])
        .take(16)
        .flatten()
        .collect();
    let color = dominant_color(&rgba, 4, 4).expect("opaque image");
    assert_eq!(color, Rgb::new(0x5A, 0x8F, 0xC2));
    assert_eq!(color.to_hex(), "#5A8FC2");
}

#[test]
fn test_dominant_color_buffer_mismatch() {
    assert!(matches!(
        dominant_color(&[0; 12], 2, 2),
        Err(ColorError::BufferSize { actual: 12, expected: 16, .. })
    ));
}
