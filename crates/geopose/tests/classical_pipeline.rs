use geopose::image::{warp::warp_perspective_u8, Image, ImageSize};
use geopose::matching::{ClassicalMatcher, ClassicalMatcherConfig};
use geopose::{AbsentReason, EstimationResult, EstimatorConfig, PoseEstimator};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn blocky_texture(size: ImageSize, block: usize, seed: u64) -> Result<Image<u8, 1>, Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let bw = size.width.div_ceil(block);
    let blocks: Vec<u8> = (0..bw * size.height.div_ceil(block))
        .map(|_| rng.random())
        .collect();
    let data = (0..size.height)
        .flat_map(|y| (0..size.width).map(move |x| (x, y)))
        .map(|(x, y)| blocks[(y / block) * bw + x / block])
        .collect();
    Ok(Image::new(size, data)?)
}

fn to_rgb(gray: &Image<u8, 1>) -> Result<Image<u8, 3>, Box<dyn std::error::Error>> {
    let data = gray.as_slice().iter().flat_map(|&v| [v, v, v]).collect();
    Ok(Image::new(gray.size(), data)?)
}

#[test]
fn test_classical_backend_recovers_translation() -> Result<(), Box<dyn std::error::Error>> {
    let reference = blocky_texture([160, 120].into(), 4, 3)?;
    // query pixel (x, y) shows reference pixel (x + 7, y + 5)
    let to_query = [[1.0, 0.0, -7.0], [0.0, 1.0, -5.0], [0.0, 0.0, 1.0]];
    let query = warp_perspective_u8(&reference, &to_query, [128, 96].into())?;

    let backend = ClassicalMatcher::new(ClassicalMatcherConfig::default())?;
    let mut estimator = PoseEstimator::new(backend, EstimatorConfig::default())?;
    let result = estimator.estimate(&to_rgb(&query)?, &to_rgb(&reference)?)?;

    let estimate = result.into_estimate().ok_or("no estimate")?;
    assert!(estimate.inlier_ratio > 0.8, "inlier ratio {}", estimate.inlier_ratio);
    assert!(estimate.raw_matches >= estimate.inlier_count);

    let fov = estimate.field_of_view(query.size()).ok_or("no field of view")?;
    let expected = [[7.0, 5.0], [7.0, 100.0], [134.0, 100.0], [134.0, 5.0]];
    for (corner, truth) in fov.corners.iter().zip(expected.iter()) {
        assert!((corner[0] - truth[0]).abs() < 0.5, "{corner:?} vs {truth:?}");
        assert!((corner[1] - truth[1]).abs() < 0.5, "{corner:?} vs {truth:?}");
    }
    Ok(())
}

#[test]
fn test_featureless_pair_is_insufficient() -> Result<(), Box<dyn std::error::Error>> {
    let flat = Image::<u8, 1>::from_size_val([96, 64].into(), 128)?;
    let backend = ClassicalMatcher::new(ClassicalMatcherConfig::default())?;
    let mut estimator = PoseEstimator::new(backend, EstimatorConfig::default())?;

    assert_eq!(
        estimator.estimate(&flat, &flat)?,
        EstimationResult::Absent(AbsentReason::InsufficientEvidence {
            raw: 0,
            filtered: 0,
            required: 10,
        })
    );
    Ok(())
}
