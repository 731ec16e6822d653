use std::io::Cursor;

use burn::tensor::backend::Backend;
use image::{ImageFormat, Rgb, RgbImage};
use inference::http::{handle_predict, predict_part};
use inference::{InferenceBackend, ServiceContext};
use models::{BackboneConfig, ClassifierConfig, TamperClassifier};

fn tiny_context() -> ServiceContext {
    let config = ClassifierConfig {
        backbone: BackboneConfig {
            stem_channels: 2,
            feature_dim: 8,
        },
        hidden: 4,
        bottleneck: 2,
        dropout: 0.2,
    };
    let device = <InferenceBackend as Backend>::Device::default();
    let model = TamperClassifier::<InferenceBackend>::new(&config, &device);
    ServiceContext::new(model, device)
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(20, 15, Rgb([120, 80, 40]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

#[test]
fn non_image_content_type_is_rejected_with_400() {
    let ctx = tiny_context();
    let err = predict_part(&ctx, Some("text/plain"), b"not an image").unwrap_err();
    assert_eq!(err.status, 400);
    assert!(err.detail.contains("image uploads"));
}

#[test]
fn missing_content_type_is_rejected_with_400() {
    let ctx = tiny_context();
    let err = predict_part(&ctx, None, &png_bytes()).unwrap_err();
    assert_eq!(err.status, 400);
}

#[test]
fn valid_png_returns_probability() {
    let ctx = tiny_context();
    let prediction = predict_part(&ctx, Some("image/png"), &png_bytes()).unwrap();
    assert!((0.0..=1.0).contains(&prediction));
}

#[test]
fn corrupt_image_with_image_content_type_is_a_server_error() {
    let ctx = tiny_context();
    let err = predict_part(&ctx, Some("image/png"), b"garbage").unwrap_err();
    assert_eq!(err.status, 500);
}

#[test]
fn multipart_upload_round_trip() {
    let ctx = tiny_context();
    let boundary = "test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"doc.png\"\r\n\
             Content-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&png_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let content_type = format!("multipart/form-data; boundary={boundary}");
    let prediction = handle_predict(&ctx, &content_type, &body).unwrap();
    assert!((0.0..=1.0).contains(&prediction));
}

#[test]
fn multipart_text_part_content_type_is_rejected() {
    let ctx = tiny_context();
    let boundary = "bbb";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"doc.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello\r\n\
         --{boundary}--\r\n"
    );
    let content_type = format!("multipart/form-data; boundary={boundary}");
    let err = handle_predict(&ctx, &content_type, body.as_bytes()).unwrap_err();
    assert_eq!(err.status, 400);
}
