use approx::assert_relative_eq;
use benchmark_io::image_io::{convert_to_dynamic_image, ImageArray};
use benchmark_io::landmarks::{load_landmarks_csv, load_landmarks_txt};
use benchmark_io::{
    create_dir, load_image, load_landmarks, save_image, save_landmarks, warp_points,
    DisplacementError, ImageData, IoConfig, LandmarkError,
};
use nalgebra::Point2;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Field where every pixel moves by (+dx, +dy).
fn write_shift_field(path: &Path, width: usize, height: usize, dx: f64, dy: f64) {
    let mut text = format!("Width={width}\nHeight={height}\n\n");
    text.push_str("X Trans -----------------------------------\n");
    for _ in 0..height {
        let row: Vec<String> = (0..width).map(|c| (c as f64 + dx).to_string()).collect();
        writeln!(text, "{}", row.join(" ")).unwrap();
    }
    text.push_str("\nY Trans -----------------------------------\n");
    for r in 0..height {
        let row: Vec<String> = (0..width).map(|_| (r as f64 + dy).to_string()).collect();
        writeln!(text, "{}", row.join(" ")).unwrap();
    }
    fs::write(path, text).unwrap();
}

#[test]
fn test_landmarks_warp_workflow() {
    let tmp = TempDir::new().unwrap();
    let case_dir = create_dir(tmp.path().join("case_01")).unwrap();

    let moving = vec![
        Point2::new(3.0, 4.0),
        Point2::new(10.2, 0.0),
        Point2::new(0.0, 19.0),
        Point2::new(3.0, 4.0),
    ];
    save_landmarks(case_dir.join("moving.csv"), &moving).unwrap();

    let field = case_dir.join("raw_transform.txt");
    write_shift_field(&field, 24, 20, 1.5, -0.5);

    let loaded = load_landmarks(case_dir.join("moving.txt")).unwrap();
    let warped = warp_points(&field, &loaded).unwrap();
    assert_eq!(warped.len(), moving.len());
    assert_relative_eq!(warped[0].x, 4.5);
    assert_relative_eq!(warped[0].y, 3.5);
    // 10.2 snaps to column 10
    assert_relative_eq!(warped[1].x, 11.5);
    assert_relative_eq!(warped[1].y, -0.5);
    assert_relative_eq!(warped[2].y, 18.5);
    assert_eq!(warped[3], warped[0]);

    save_landmarks(case_dir.join("warped"), &warped).unwrap();
    let from_csv = load_landmarks_csv(case_dir.join("warped.csv")).unwrap();
    let from_txt = load_landmarks_txt(case_dir.join("warped.txt")).unwrap();
    assert_eq!(from_csv, warped);
    assert_eq!(from_txt, warped);
}

#[test]
fn test_warp_rejects_points_outside_field() {
    let tmp = TempDir::new().unwrap();
    let field = tmp.path().join("raw_transform.txt");
    write_shift_field(&field, 8, 6, 0.0, 0.0);

    let result = warp_points(&field, &[Point2::new(8.0, 0.0)]);
    assert!(matches!(result, Err(DisplacementError::OutOfBounds { .. })));
}

#[test]
fn test_count_mismatch_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("landmarks.txt");
    fs::write(&path, "point\n4\n1 2\n3 4\n5 6").unwrap();

    assert!(matches!(
        load_landmarks(&path),
        Err(LandmarkError::CountMismatch {
            declared: 4,
            found: 3
        })
    ));
}

#[test]
fn test_image_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("image.png");

    let data: Vec<u8> = (0..30 * 20 * 3).map(|i| (i % 251) as u8).collect();
    let original = ImageArray::from_vec(30, 20, 3, data).unwrap();
    save_image(&path, &ImageData::RawByte(original.clone())).unwrap();

    let loaded = load_image(&path).unwrap();
    assert!(loaded.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    assert_eq!(loaded.to_bytes(), original);

    for (a, b) in loaded.data().iter().zip(original.to_normalized().data()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}

#[test]
fn test_gray_alpha_conversion() {
    let array = ImageArray::from_vec(2, 1, 2, vec![0.0, 1.0, 0.5, 0.25]).unwrap();
    let img = convert_to_dynamic_image(&ImageData::Normalized(array)).unwrap();
    assert_eq!(img.to_luma_alpha8().into_raw(), vec![0, 255, 128, 64]);
}

#[test]
fn test_config_file_resolution() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("benchmark.yaml");
    fs::write(&path, "io:\n  max_hops: 2\n  absolute: true\n").unwrap();

    let config = IoConfig::load_from_yaml(&path).unwrap();
    assert_eq!(config.max_hops, 2);
    let resolved = config.resolve("not/a/real/folder/for/sure");
    assert!(resolved.is_absolute());
    assert!(resolved.ends_with("not/a/real/folder/for/sure"));
}
