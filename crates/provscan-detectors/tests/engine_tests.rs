//! End-to-end tests for the provenance detector entry points

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use proptest::prelude::*;
use provscan_core::{DetectionMethod, DetectionResult};
use provscan_detectors::patterns::{IPTC_TRAINED_MEDIA_URI, PNG_SIGNATURE};
use provscan_detectors::utf16::{encode, Endianness};
use provscan_detectors::{DetectorConfig, ProvenanceDetector};
use std::io::Cursor;

fn tiff(fields: &[Field], little_endian: bool) -> Vec<u8> {
    let mut writer = Writer::new();
    for f in fields {
        writer.push_field(f);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, little_endian).unwrap();
    buf.into_inner()
}

fn field(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

fn place(buf: &mut [u8], offset: usize, marker: &[u8]) {
    buf[offset..offset + marker.len()].copy_from_slice(marker);
}

#[tokio::test]
async fn test_manifest_outranks_exif_software() {
    let mut image = tiff(
        &[field(Tag::Software, Value::Ascii(vec![b"Midjourney 6".to_vec()]))],
        true,
    );
    image.extend_from_slice(b"....jumb....c2pa....");

    let engine = ProvenanceDetector::default();
    let sequential = engine.detect_from_bytes(image.clone(), None);
    let concurrent = engine.detect_concurrent(image, None).await;

    assert_eq!(sequential.method, Some(DetectionMethod::C2pa));
    assert_eq!(concurrent.method, Some(DetectionMethod::C2pa));
    assert_eq!(sequential, concurrent);
}

#[test]
fn test_utf16_prompt_comment_in_both_byte_orders() {
    let engine = ProvenanceDetector::default();

    for (endian, little_endian) in [(Endianness::Little, true), (Endianness::Big, false)] {
        let mut comment = b"UNICODE\0".to_vec();
        comment.extend(encode("prompt", endian));
        let image = tiff(&[field(Tag::UserComment, Value::Undefined(comment, 0))], little_endian);

        let r = engine.detect_from_bytes(image, None);
        assert!(r.matched, "missed {}", endian.label());
        assert_eq!(r.method, Some(DetectionMethod::Exif));
    }
}

#[tokio::test]
async fn test_json_comment_reaches_every_entry_point() {
    let mut comment = b"ASCII\0\0\0".to_vec();
    comment.extend_from_slice(br#"{"checkpoint": "juggernautXL", "lora": "detail"}"#);
    let image = tiff(&[field(Tag::UserComment, Value::Undefined(comment, 0))], true);

    let engine = ProvenanceDetector::default();
    let sequential = engine.detect_from_bytes(image.clone(), None);
    let concurrent = engine.detect_concurrent(image, None).await;

    assert_eq!(sequential.provider, "Stable Diffusion");
    assert_eq!(sequential.method, Some(DetectionMethod::Exif));
    assert!(sequential.details.contains("JSON"));
    assert_eq!(sequential, concurrent);
}

#[tokio::test]
async fn test_png_offset_rule() {
    let engine = ProvenanceDetector::default();

    let mut png = vec![0u8; 2048];
    place(&mut png, 0, &PNG_SIGNATURE);
    place(&mut png, 20, b"sui_image_params");
    let r = engine.detect_from_bytes(png.clone(), None);
    assert_eq!(r.provider, "Stable Diffusion (SDXL)");
    assert_eq!(r.method, Some(DetectionMethod::Binary));
    assert_eq!(engine.detect_concurrent(png, None).await, r);

    let mut plain = vec![0u8; 2048];
    place(&mut plain, 20, b"sui_image_params");
    assert!(!engine.detect_from_bytes(plain, None).matched);

    let mut moved = vec![0u8; 2048];
    place(&mut moved, 1500, b"sui_image_params");
    assert_eq!(engine.detect_from_bytes(moved, None).provider, "Stable Diffusion (SDXL)");
}

#[test]
fn test_midjourney_job_id() {
    let r = ProvenanceDetector::default()
        .detect_from_bytes(b"Job ID: 12345 prompt text --ar 16:9".to_vec(), None);
    assert!(r.matched);
    assert_eq!(r.provider, "Midjourney");
}

#[test]
fn test_fast_path_ignores_small_buffers() {
    let engine = ProvenanceDetector::default();
    assert!(!engine.detect_fast(b"sui_image_params midjourney").matched);

    let mut big = vec![b'.'; 4096];
    place(&mut big, 2000, b"Stable Diffusion");
    assert_eq!(engine.detect_fast(&big).provider, "Stable Diffusion");
}

#[tokio::test]
async fn test_xmp_iptc_with_guid() {
    let xmp = format!(
        "<rdf:Description Iptc4xmpExt:DigitalSourceType=\"{}\" xmpMM:DocumentID=\"3f2a9c1e-7b4d-4e2f-9a8b-1c2d3e4f5a6b\"/>",
        IPTC_TRAINED_MEDIA_URI
    );
    let engine = ProvenanceDetector::default();

    let r = engine.detect_concurrent(b"plain bytes".to_vec(), Some(xmp.clone().into())).await;
    assert!(r.matched);
    assert_eq!(r.provider, "Midjourney");
    assert_eq!(r.method, Some(DetectionMethod::Xmp));
    assert_eq!(engine.detect_from_bytes(b"plain bytes".to_vec(), Some(xmp.into())), r);
}

#[test]
fn test_detect_path_reads_embedded_xmp() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("render.jpg");

    let mut image = vec![0xFF, 0xD8, 0xFF, 0xE1];
    image.extend_from_slice(b"<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><dc:creator>Grok</dc:creator></x:xmpmeta>");
    image.extend_from_slice(&[0xFF, 0xD9]);
    std::fs::write(&path, &image).unwrap();

    let r = ProvenanceDetector::default().detect(&path);
    assert_eq!(r.provider, "Grok");
    assert_eq!(r.method, Some(DetectionMethod::Xmp));
}

#[test]
fn test_detect_path_unreadable() {
    let dir = tempfile::tempdir().unwrap();
    let r = ProvenanceDetector::default().detect(dir.path().join("gone.png"));
    assert_eq!(r, DetectionResult::none());
}

#[test]
fn test_generic_terms_follow_config() {
    let text = b"an ai-generated landscape".to_vec();
    assert!(!ProvenanceDetector::default().detect_from_bytes(text.clone(), None).matched);

    let strict = ProvenanceDetector::new(DetectorConfig {
        generic_terms: true,
        ..DetectorConfig::default()
    });
    assert_eq!(strict.detect_from_bytes(text, None).provider, "AI (Generic)");
}

#[test]
fn test_result_serializes_for_storage() {
    let r = ProvenanceDetector::default().detect_from_bytes(b"made with midjourney".to_vec(), None);
    let json = serde_json::to_value(&r).unwrap();
    assert_eq!(json["method"], "binary");
    assert_eq!(json["provider"], "Midjourney");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_markerless_input_never_matches(
        image in proptest::collection::vec(prop_oneof![Just(b' '), b'0'..=b'9'], 0..4096),
        xmp in proptest::option::of("[0-9 ]{0,256}"),
    ) {
        let engine = ProvenanceDetector::default();
        let xmp = xmp.map(bytes::Bytes::from);
        let rt = tokio::runtime::Runtime::new().unwrap();

        prop_assert_eq!(engine.detect_from_bytes(image.clone(), xmp.clone()), DetectionResult::none());
        prop_assert_eq!(engine.detect_fast(&image), DetectionResult::none());
        prop_assert_eq!(
            rt.block_on(engine.detect_concurrent(image, xmp)),
            DetectionResult::none()
        );
    }
}
