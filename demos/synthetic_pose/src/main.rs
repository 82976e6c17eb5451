use argh::FromArgs;
use std::path::PathBuf;

use geopose::geometry::linalg::{inverse_mat33, Mat33};
use geopose::georef::{fov_center, principal_point_wgs84, GeoBoundingBox};
use geopose::image::{warp::warp_perspective_u8, Image, ImageSize};
use geopose::matching::{ClassicalMatcher, ClassicalMatcherConfig};
use geopose::{EstimationResult, EstimatorConfig, PoseEstimator};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Estimate the pose of a synthetic frame against a synthetic map.
#[derive(FromArgs)]
struct Args {
    /// path to a JSON estimator configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// width of the reference map in pixels
    #[argh(option, default = "320")]
    width: usize,

    /// height of the reference map in pixels
    #[argh(option, default = "240")]
    height: usize,

    /// texture block size in pixels
    #[argh(option, default = "4")]
    block: usize,

    /// rotation of the frame in degrees
    #[argh(option, default = "2.0")]
    angle: f64,

    /// horizontal offset of the frame in map pixels
    #[argh(option, default = "18.0")]
    tx: f64,

    /// vertical offset of the frame in map pixels
    #[argh(option, default = "-9.0")]
    ty: f64,

    /// random seed of the texture
    #[argh(option, default = "0")]
    seed: u64,
}

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

// rotation about the map center followed by a translation, map -> frame
fn map_to_frame(size: ImageSize, angle_deg: f64, tx: f64, ty: f64) -> Mat33 {
    let (s, c) = angle_deg.to_radians().sin_cos();
    let (cx, cy) = (size.width as f64 / 2.0, size.height as f64 / 2.0);
    [
        [c, -s, cx - c * cx + s * cy - tx],
        [s, c, cy - s * cx - c * cy - ty],
        [0.0, 0.0, 1.0],
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let config = match &args.config {
        Some(path) => EstimatorConfig::from_json_file(path)?,
        None => EstimatorConfig::default(),
    };

    // synthesize the map and the frame seen by the camera
    let map_size = ImageSize {
        width: args.width,
        height: args.height,
    };
    let reference = blocky_texture(map_size, args.block.max(1), args.seed)?;
    let to_frame = map_to_frame(map_size, args.angle, args.tx, args.ty);
    let frame_size = ImageSize {
        width: args.width * 3 / 4,
        height: args.height * 3 / 4,
    };
    let query = warp_perspective_u8(&reference, &to_frame, frame_size)?;
    let truth = inverse_mat33(&to_frame).ok_or("singular map to frame transform")?;

    let backend = ClassicalMatcher::new(ClassicalMatcherConfig::default())?;
    let mut estimator = PoseEstimator::new(backend, config)?;

    match estimator.estimate(&query, &reference)? {
        EstimationResult::Estimated(estimate) => {
            log::info!(
                "Estimated {:?} with {}/{} inliers ({:.1}%), rms {:.3} px",
                estimate.transform.kind(),
                estimate.inlier_count,
                estimate.inlier_mask.len(),
                estimate.inlier_ratio * 100.0,
                estimate.rms_error
            );
            log::info!("Estimated transform: {:?}", estimate.transform);
            log::info!("True homography: {truth:?}");

            if let Some(fov) = estimate.field_of_view(frame_size) {
                let bbox = GeoBoundingBox::new(8.50, 47.30, 8.56, 47.34);
                let center = fov_center(&fov, map_size, &bbox);
                let pp = principal_point_wgs84(&fov, map_size, &bbox);
                log::info!("Field of view corners: {:?}", fov.corners);
                log::info!("Field of view center at lat {:.6}, lon {:.6}", center.lat, center.lon);
                log::info!("Principal point at lat {:.6}, lon {:.6}", pp.lat, pp.lon);
            }
        }
        EstimationResult::Absent(reason) => {
            log::warn!("No pose: {reason}");
        }
    }

    Ok(())
}
