//! End-to-end behaviour of the recognition facade with scripted collaborators.

use facelib_core::{
    BackendError, BoundingBox, Codec, DecodeError, Encoding, FaceEmbedder, FaceError,
    FaceRecognition, Gallery, GalleryError, ImageCodec, RawImage, RecognitionOptions,
    ShapeMismatch, SharedGallery,
};

/// Decodes `[width, height, tag]` into a uniformly filled image.
struct ScriptedImages;

impl ImageCodec for ScriptedImages {
    fn decode(&self, bytes: &[u8]) -> Result<RawImage, BackendError> {
        let [w, h, tag] = bytes else {
            return Err(BackendError::Decode("expected 3 header bytes".into()));
        };
        let (w, h) = (*w as u32, *h as u32);
        Ok(RawImage::new(w, h, vec![*tag; (w * h * 3) as usize]).unwrap())
    }

    fn resize(&self, image: &RawImage, max_width: u32, max_height: u32) -> RawImage {
        let (w, h) = if image.width > image.height {
            (max_width, image.height * max_width / image.width)
        } else {
            (image.width * max_height / image.height, max_height)
        };
        RawImage::new(w, h, vec![image.pixels[0]; (w * h * 3) as usize]).unwrap()
    }
}

/// Finds one centred face in any image whose tag is non-zero. The
/// descriptor is `[tag / 10, 0]`, shaped `1 x columns`.
struct ScriptedEmbedder {
    columns: usize,
}

impl FaceEmbedder for ScriptedEmbedder {
    fn detect_faces(&mut self, image: &RawImage) -> Result<Vec<BoundingBox>, BackendError> {
        if image.pixels[0] == 0 {
            return Ok(Vec::new());
        }
        let (w, h) = (image.width as f32, image.height as f32);
        Ok(vec![BoundingBox { x: w / 4.0, y: h / 4.0, width: w / 2.0, height: h / 2.0, confidence: 0.9 }])
    }

    fn encode_face(&mut self, image: &RawImage, _face: &BoundingBox) -> Result<Encoding, BackendError> {
        let mut values = vec![0.0; self.columns];
        values[0] = image.pixels[0] as f32 / 10.0;
        Ok(Encoding::from_matrix(values, 1, self.columns, None).unwrap())
    }
}

fn recognizer() -> FaceRecognition<ScriptedImages, ScriptedEmbedder> {
    FaceRecognition::new(ScriptedImages, ScriptedEmbedder { columns: 2 }, RecognitionOptions::default())
}

fn image(tag: u8) -> Vec<u8> {
    vec![8, 8, tag]
}

#[test]
fn test_enroll_then_identify() {
    let mut faces = recognizer();
    assert!(faces.enroll(&image(10), "alice").unwrap());
    assert!(faces.enroll(&image(30), "bob").unwrap());

    assert_eq!(faces.identify(&image(11)).unwrap().as_deref(), Some("alice"));
    assert_eq!(faces.identify(&image(29)).unwrap().as_deref(), Some("bob"));
    // 2.0 away from everyone
    assert_eq!(faces.identify(&image(60)).unwrap(), None);
}

#[test]
fn test_enroll_replaces_existing_identity() {
    let mut faces = recognizer();
    faces.enroll(&image(10), "alice").unwrap();
    faces.enroll(&image(50), "alice").unwrap();

    assert_eq!(faces.gallery().len(), 1);
    assert_eq!(faces.gallery().get("alice").unwrap().vector(), &[5.0, 0.0]);
    assert_eq!(faces.identify(&image(10)).unwrap(), None);
}

#[test]
fn test_image_without_face() {
    let mut faces = recognizer();
    assert!(!faces.enroll(&image(0), "nobody").unwrap());
    assert!(faces.gallery().is_empty());
    assert_eq!(faces.identify(&image(0)).unwrap(), None);
    assert_eq!(faces.face_location(&image(0)).unwrap(), None);
}

#[test]
fn test_invalid_identity_rejected() {
    let mut faces = recognizer();
    assert!(matches!(faces.enroll(&image(10), ""), Err(FaceError::InvalidId(_))));
    assert!(matches!(faces.enroll(&image(10), "a|b"), Err(FaceError::InvalidId(_))));
    assert!(faces.gallery().is_empty());
}

#[test]
fn test_undecodable_image_is_backend_error() {
    let mut faces = recognizer();
    assert!(matches!(faces.identify(&[1, 2]), Err(FaceError::Backend(BackendError::Decode(_)))));
}

#[test]
fn test_identify_encoding_empty_gallery() {
    let faces = recognizer();
    let probe = Encoding::from_matrix(vec![0.0, 0.0], 1, 2, None).unwrap();
    assert_eq!(faces.identify_encoding(&probe).unwrap(), None);
}

#[test]
fn test_identify_encoding_wrong_dimensionality() {
    let mut faces = recognizer();
    faces.enroll(&image(10), "alice").unwrap();

    let probe = Encoding::from_matrix(vec![1.0; 3], 1, 3, None).unwrap();
    let err = faces.identify_encoding(&probe).unwrap_err();
    assert!(matches!(
        err,
        FaceError::Shape(ShapeMismatch::Dimensions { left: (1, 3), right: (1, 2) })
    ));
}

#[test]
fn test_mismatched_entry_does_not_break_scan() {
    let mut faces = recognizer();
    faces
        .enroll_encoding(Encoding::from_matrix(vec![1.0; 64], 1, 64, Some("legacy".into())).unwrap())
        .unwrap();
    faces.enroll(&image(10), "alice").unwrap();

    let probe = Encoding::from_matrix(vec![1.0, 0.0], 1, 2, None).unwrap();
    let result = faces.compare(&probe);
    assert_eq!(result.id.as_deref(), Some("alice"));
    assert_eq!(result.mismatched, 1);
    assert_eq!(faces.identify_encoding(&probe).unwrap().as_deref(), Some("alice"));
}

#[test]
fn test_locations_reported_in_original_coordinates() {
    let options = RecognitionOptions { max_image_dimension: 10, ..Default::default() };
    let mut faces = FaceRecognition::new(ScriptedImages, ScriptedEmbedder { columns: 2 }, options);

    let located = faces.face_locations(&[20, 20, 5]).unwrap();
    assert_eq!(located.len(), 1);
    let face = located[0];
    assert_eq!((face.x, face.y, face.width, face.height), (5.0, 5.0, 10.0, 10.0));
}

#[test]
fn test_portrait_locations_scale_each_axis() {
    let options = RecognitionOptions { max_image_dimension: 10, ..Default::default() };
    let mut faces = FaceRecognition::new(ScriptedImages, ScriptedEmbedder { columns: 2 }, options);

    // 35x100 shrinks to 3x10, so the width factor (35/3) differs from the height factor (10)
    let face = faces.face_location(&[35, 100, 5]).unwrap().unwrap();
    assert_eq!((face.y, face.height), (25.0, 50.0));
    assert!((face.x - 8.75).abs() < 1e-3);
    assert!((face.width - 17.5).abs() < 1e-3);
}

#[test]
fn test_portrait_preview_crops_original_face() {
    let options = RecognitionOptions { max_image_dimension: 10, preview_size: 100, ..Default::default() };
    let mut faces = FaceRecognition::new(ScriptedImages, ScriptedEmbedder { columns: 2 }, options);

    // the face spans rows 25..75 of the original, columns 8..27 after clamping outward
    let preview = faces.face_preview(&[35, 100, 5]).unwrap().unwrap();
    assert_eq!(preview.height, 100);
    assert_eq!(preview.width, 19 * 100 / 50);
}

#[test]
fn test_face_preview_fits_preview_square() {
    let options = RecognitionOptions { preview_size: 4, ..Default::default() };
    let mut faces = FaceRecognition::new(ScriptedImages, ScriptedEmbedder { columns: 2 }, options);

    let preview = faces.face_preview(&[20, 20, 7]).unwrap().unwrap();
    assert_eq!((preview.width, preview.height), (4, 4));
    assert!(faces.face_preview(&[20, 20, 0]).unwrap().is_none());
}

#[test]
fn test_face_encodings_are_anonymous() {
    let mut faces = recognizer();
    let encodings = faces.face_encodings(&image(10)).unwrap();
    assert_eq!(encodings.len(), 1);
    assert!(encodings[0].is_anonymous());
    assert_eq!(encodings[0].dimensions(), (1, 2));
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("faces.gallery");

    let mut faces = recognizer();
    faces.enroll(&image(10), "alice").unwrap();
    faces.enroll(&image(30), "bob").unwrap();
    faces.save(&path).unwrap();

    let mut restored = recognizer();
    let skipped = restored.load(&path).unwrap();
    assert!(skipped.is_empty());
    assert_eq!(restored.gallery(), faces.gallery());
    assert_eq!(restored.identify(&image(10)).unwrap().as_deref(), Some("alice"));
}

#[test]
fn test_load_missing_file_keeps_gallery() {
    let dir = tempfile::tempdir().unwrap();
    let mut faces = recognizer();
    faces.enroll(&image(10), "alice").unwrap();

    let err = faces.load(&dir.path().join("missing.gallery")).unwrap_err();
    assert!(matches!(err, FaceError::Gallery(GalleryError::Io(_))));
    assert_eq!(faces.gallery().len(), 1);
}

#[test]
fn test_load_skips_malformed_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("faces.gallery");
    let codec = Codec::default();

    let mut lines: Vec<String> = (0..5)
        .map(|i| {
            let enc = Encoding::from_matrix(vec![i as f32, 0.5], 1, 2, Some(format!("id{i}"))).unwrap();
            codec.encode_record(&enc).unwrap()
        })
        .collect();
    lines.insert(2, "only|two".to_string());
    std::fs::write(&path, lines.join("\n") + "\n").unwrap();

    let report = codec.load(&path).unwrap();
    assert_eq!(report.gallery.len(), 5);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 3);
    assert!(matches!(report.skipped[0].error, DecodeError::MissingFields { found: 2 }));
}

#[test]
fn test_enroll_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("alice.img"), image(10)).unwrap();
    std::fs::write(dir.path().join("blank.img"), image(0)).unwrap();
    std::fs::write(dir.path().join("corrupt.img"), [1u8, 2]).unwrap();
    std::fs::create_dir(dir.path().join("nested")).unwrap();

    let mut faces = recognizer();
    faces.enroll(&image(90), "stale").unwrap();

    let report = faces.enroll_directory(dir.path()).unwrap();
    assert_eq!(report.enrolled, 1);
    assert_eq!(report.no_face.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(faces.gallery().ids().collect::<Vec<_>>(), vec!["alice"]);
}

#[test]
fn test_shared_gallery_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.gallery");
    let codec = Codec::default();

    let shared = SharedGallery::new(Gallery::new());
    shared.enroll(Encoding::from_matrix(vec![0.1, 0.2], 1, 2, Some("a".into())).unwrap());
    shared.save(&codec, &path).unwrap();

    let other = SharedGallery::default();
    let skipped = other.reload(&codec, &path).unwrap();
    assert!(skipped.is_empty());
    assert_eq!(other.snapshot(), shared.snapshot());

    assert!(other.reload(&codec, &dir.path().join("nope")).is_err());
    assert_eq!(other.len(), 1);
}
