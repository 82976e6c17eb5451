use geopose_geometry::{homography::project_point, linalg::mat33_mul, Mat33};
use geopose_image::ImageSize;
use serde::{Deserialize, Serialize};

/// The query image footprint projected into the reference image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldOfView {
    /// Projected corners, in the order top-left, bottom-left, bottom-right, top-right.
    pub corners: [[f64; 2]; 4],
    /// Projected image center.
    pub principal_point: [f64; 2],
}

/// Project the footprint of a `size` query image through the homography `h`.
///
/// Returns `None` if any point maps to infinity, i.e. the query camera sees
/// the horizon of the reference plane.
pub fn field_of_view(h: &Mat33, size: ImageSize) -> Option<FieldOfView> {
    let w = size.width as f64;
    let ht = size.height as f64;
    let src = [[0.0, 0.0], [0.0, ht - 1.0], [w - 1.0, ht - 1.0], [w - 1.0, 0.0]];

    let mut corners = [[0.0; 2]; 4];
    for (dst, p) in corners.iter_mut().zip(src.iter()) {
        *dst = project_point(h, p)?;
    }
    let principal_point = project_point(h, &[w / 2.0, ht / 2.0])?;

    Some(FieldOfView {
        corners,
        principal_point,
    })
}

/// Geographic extent of a north-up reference image, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBoundingBox {
    /// Western longitude.
    pub left: f64,
    /// Southern latitude.
    pub bottom: f64,
    /// Eastern longitude.
    pub right: f64,
    /// Northern latitude.
    pub top: f64,
}

impl GeoBoundingBox {
    /// Create a bounding box.
    pub fn new(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self {
            left,
            bottom,
            right,
            top,
        }
    }

    /// The center of the box.
    pub fn center(&self) -> LatLon {
        LatLon {
            lat: (self.bottom + self.top) / 2.0,
            lon: (self.left + self.right) / 2.0,
        }
    }
}

/// A WGS84 position in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lon: f64,
}

/// Convert a reference image pixel to WGS84 coordinates.
///
/// Linear interpolation over `bbox`; the image y axis points south.
///
/// ```
/// use geopose::georef::{pixel_to_wgs84, GeoBoundingBox};
/// use geopose::image::ImageSize;
///
/// let bbox = GeoBoundingBox::new(10.0, 50.0, 11.0, 51.0);
/// let size = ImageSize { width: 100, height: 200 };
/// let p = pixel_to_wgs84(size, &bbox, [50.0, 200.0]);
/// assert_eq!((p.lat, p.lon), (50.0, 10.5));
/// ```
pub fn pixel_to_wgs84(size: ImageSize, bbox: &GeoBoundingBox, pixel: [f64; 2]) -> LatLon {
    let w = size.width as f64;
    let h = size.height as f64;
    LatLon {
        lat: bbox.bottom + (bbox.top - bbox.bottom) * (h - pixel[1]) / h,
        lon: bbox.left + (bbox.right - bbox.left) * pixel[0] / w,
    }
}

/// Center of the smallest WGS84 bounding box around `points`.
fn bbox_center(points: impl IntoIterator<Item = LatLon>) -> LatLon {
    let init = GeoBoundingBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
    points
        .into_iter()
        .fold(init, |b, p| {
            GeoBoundingBox::new(b.left.min(p.lon), b.bottom.min(p.lat), b.right.max(p.lon), b.top.max(p.lat))
        })
        .center()
}

/// WGS84 center of the field of view.
///
/// The four corners are converted to WGS84 and the center of their bounding
/// box is returned. Under perspective this differs from
/// [`principal_point_wgs84`].
pub fn fov_center(fov: &FieldOfView, reference_size: ImageSize, bbox: &GeoBoundingBox) -> LatLon {
    bbox_center(fov.corners.iter().map(|c| pixel_to_wgs84(reference_size, bbox, *c)))
}

/// WGS84 position of the projected query image center.
pub fn principal_point_wgs84(fov: &FieldOfView, reference_size: ImageSize, bbox: &GeoBoundingBox) -> LatLon {
    pixel_to_wgs84(reference_size, bbox, fov.principal_point)
}

/// Rotate `pt` about the center of a `size` image by `radians`, turning the
/// x axis towards the y axis.
pub fn rotate_point(radians: f64, size: ImageSize, pt: [f64; 2]) -> [f64; 2] {
    let (cx, cy) = (size.width as f64 / 2.0, size.height as f64 / 2.0);
    let (s, c) = radians.sin_cos();
    let (dx, dy) = (pt[0] - cx, pt[1] - cy);
    [cx + c * dx - s * dy, cy + s * dx + c * dy]
}

/// Map a pixel of a `cropped` image cut from the center of a `full` image
/// back to the full image.
pub fn uncrop_pixel_coordinates(cropped: ImageSize, full: ImageSize, pt: [f64; 2]) -> [f64; 2] {
    [
        pt[0] + 0.5 * (full.width as f64 - cropped.width as f64),
        pt[1] + 0.5 * (full.height as f64 - cropped.height as f64),
    ]
}

/// A reference image cut from a rotated map raster.
///
/// The north-up `padded_size` raster covering `bbox` was rotated by
/// `rotation` radians about its center (as [`rotate_point`] does) and a
/// `crop_size` window was taken from its center. The padding keeps the
/// window inside the raster for any rotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotatedRaster {
    /// Size of the padded, north-up raster.
    pub padded_size: ImageSize,
    /// Geographic extent of the padded raster.
    pub bbox: GeoBoundingBox,
    /// Rotation applied before cropping, in radians.
    pub rotation: f64,
    /// Size of the cropped reference image.
    pub crop_size: ImageSize,
}

impl RotatedRaster {
    /// Translation from cropped pixels to rotated raster pixels.
    pub fn crop_to_padded(&self) -> Mat33 {
        let [tx, ty] = uncrop_pixel_coordinates(self.crop_size, self.padded_size, [0.0, 0.0]);
        [[1.0, 0.0, tx], [0.0, 1.0, ty], [0.0, 0.0, 1.0]]
    }

    /// Rotation from rotated raster pixels back to north-up raster pixels.
    pub fn rotated_to_unrotated(&self) -> Mat33 {
        let (cx, cy) = (
            self.padded_size.width as f64 / 2.0,
            self.padded_size.height as f64 / 2.0,
        );
        let (s, c) = (-self.rotation).sin_cos();
        [
            [c, -s, cx - c * cx + s * cy],
            [s, c, cy - s * cx - c * cy],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Affine map from north-up raster pixels to `[lat, lon, 1]`.
    ///
    /// Same interpolation as [`pixel_to_wgs84`].
    pub fn unrotated_to_wgs84(&self) -> Mat33 {
        let (w, h) = (self.padded_size.width as f64, self.padded_size.height as f64);
        let b = &self.bbox;
        [
            [0.0, (b.bottom - b.top) / h, b.top],
            [(b.right - b.left) / w, 0.0, b.left],
            [0.0, 0.0, 1.0],
        ]
    }

    /// Affine map from reference image pixels to `[lat, lon, 1]`.
    pub fn pixel_to_wgs84_affine(&self) -> Mat33 {
        mat33_mul(
            &self.unrotated_to_wgs84(),
            &mat33_mul(&self.rotated_to_unrotated(), &self.crop_to_padded()),
        )
    }

    /// Convert a reference image pixel to WGS84 coordinates.
    pub fn pixel_to_wgs84(&self, pixel: [f64; 2]) -> LatLon {
        let m = self.pixel_to_wgs84_affine();
        LatLon {
            lat: m[0][0] * pixel[0] + m[0][1] * pixel[1] + m[0][2],
            lon: m[1][0] * pixel[0] + m[1][1] * pixel[1] + m[1][2],
        }
    }

    /// WGS84 center of a field of view projected into the reference image.
    pub fn fov_center(&self, fov: &FieldOfView) -> LatLon {
        bbox_center(fov.corners.iter().map(|c| self.pixel_to_wgs84(*c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geopose_geometry::linalg::IDENTITY33;

    #[test]
    fn field_of_view_identity() -> Result<(), Box<dyn std::error::Error>> {
        let size = ImageSize {
            width: 640,
            height: 480,
        };
        let fov = field_of_view(&IDENTITY33, size).ok_or("horizon")?;
        assert_eq!(
            fov.corners,
            [[0.0, 0.0], [0.0, 479.0], [639.0, 479.0], [639.0, 0.0]]
        );
        assert_eq!(fov.principal_point, [320.0, 240.0]);
        Ok(())
    }

    #[test]
    fn field_of_view_translation_and_scale() -> Result<(), Box<dyn std::error::Error>> {
        let h = [[2.0, 0.0, 100.0], [0.0, 2.0, 50.0], [0.0, 0.0, 1.0]];
        let size = ImageSize {
            width: 11,
            height: 21,
        };
        let fov = field_of_view(&h, size).ok_or("horizon")?;
        assert_relative_eq!(fov.corners[2][0], 120.0);
        assert_relative_eq!(fov.corners[2][1], 90.0);
        assert_relative_eq!(fov.principal_point[0], 111.0);
        assert_relative_eq!(fov.principal_point[1], 71.0);
        Ok(())
    }

    #[test]
    fn field_of_view_horizon() {
        // the top-left corner maps to infinity
        let h = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let size = ImageSize {
            width: 10,
            height: 10,
        };
        assert!(field_of_view(&h, size).is_none());
    }

    #[test]
    fn pixel_to_wgs84_corners() {
        let bbox = GeoBoundingBox::new(8.0, 47.0, 8.5, 47.25);
        let size = ImageSize {
            width: 1000,
            height: 500,
        };

        let top_left = pixel_to_wgs84(size, &bbox, [0.0, 0.0]);
        assert_relative_eq!(top_left.lat, 47.25);
        assert_relative_eq!(top_left.lon, 8.0);

        let bottom_right = pixel_to_wgs84(size, &bbox, [1000.0, 500.0]);
        assert_relative_eq!(bottom_right.lat, 47.0);
        assert_relative_eq!(bottom_right.lon, 8.5);

        let center = pixel_to_wgs84(size, &bbox, [500.0, 250.0]);
        assert_relative_eq!(center.lat, bbox.center().lat, epsilon = 1e-12);
        assert_relative_eq!(center.lon, bbox.center().lon, epsilon = 1e-12);
    }

    #[test]
    fn fov_center_of_identity() -> Result<(), Box<dyn std::error::Error>> {
        let size = ImageSize {
            width: 200,
            height: 100,
        };
        let bbox = GeoBoundingBox::new(0.0, 0.0, 2.0, 1.0);
        let fov = field_of_view(&IDENTITY33, size).ok_or("horizon")?;
        // corners span pixels 0..=199 by 0..=99
        let center = fov_center(&fov, size, &bbox);
        assert_relative_eq!(center.lat, 0.505, epsilon = 1e-12);
        assert_relative_eq!(center.lon, 0.995, epsilon = 1e-12);

        let pp = principal_point_wgs84(&fov, size, &bbox);
        assert_relative_eq!(pp.lat, 0.5);
        assert_relative_eq!(pp.lon, 1.0);
        Ok(())
    }

    #[test]
    fn fov_center_under_perspective() -> Result<(), Box<dyn std::error::Error>> {
        // the right edge of the frame shrinks towards the left
        let h = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.002, 0.0, 1.0]];
        let size = ImageSize {
            width: 100,
            height: 100,
        };
        let reference_size = ImageSize {
            width: 400,
            height: 400,
        };
        let bbox = GeoBoundingBox::new(0.0, 0.0, 4.0, 4.0);
        let fov = field_of_view(&h, size).ok_or("horizon")?;

        let center = fov_center(&fov, reference_size, &bbox);
        assert_relative_eq!(center.lon, 0.01 * 99.0 / 1.198 / 2.0, epsilon = 1e-9);
        assert_relative_eq!(center.lat, 3.505, epsilon = 1e-9);

        let pp = principal_point_wgs84(&fov, reference_size, &bbox);
        assert_relative_eq!(pp.lon, 0.01 * 50.0 / 1.1, epsilon = 1e-9);
        assert!((pp.lon - center.lon).abs() > 0.03);
        assert!((pp.lat - center.lat).abs() > 0.03);
        Ok(())
    }

    #[test]
    fn rotate_and_uncrop_points() {
        let size = ImageSize {
            width: 100,
            height: 100,
        };
        let p = rotate_point(std::f64::consts::FRAC_PI_2, size, [100.0, 50.0]);
        assert_relative_eq!(p[0], 50.0, epsilon = 1e-12);
        assert_relative_eq!(p[1], 100.0, epsilon = 1e-12);

        let back = rotate_point(-0.3, size, rotate_point(0.3, size, [12.0, 80.0]));
        assert_relative_eq!(back[0], 12.0, epsilon = 1e-12);
        assert_relative_eq!(back[1], 80.0, epsilon = 1e-12);

        let cropped = ImageSize {
            width: 60,
            height: 40,
        };
        let full = ImageSize {
            width: 100,
            height: 80,
        };
        assert_eq!(uncrop_pixel_coordinates(cropped, full, [0.0, 0.0]), [20.0, 20.0]);
        assert_eq!(uncrop_pixel_coordinates(cropped, full, [60.0, 40.0]), [80.0, 60.0]);
    }

    #[test]
    fn rotated_raster_without_rotation_matches_north_up() {
        let size = ImageSize {
            width: 300,
            height: 200,
        };
        let bbox = GeoBoundingBox::new(8.0, 47.0, 8.3, 47.2);
        let raster = RotatedRaster {
            padded_size: size,
            bbox,
            rotation: 0.0,
            crop_size: size,
        };
        for pixel in [[0.0, 0.0], [150.0, 100.0], [299.0, 17.0]] {
            let a = raster.pixel_to_wgs84(pixel);
            let b = pixel_to_wgs84(size, &bbox, pixel);
            assert_relative_eq!(a.lat, b.lat, epsilon = 1e-12);
            assert_relative_eq!(a.lon, b.lon, epsilon = 1e-12);
        }
    }

    #[test]
    fn rotated_raster_undoes_rotation_and_crop() -> Result<(), Box<dyn std::error::Error>> {
        let padded = ImageSize {
            width: 200,
            height: 200,
        };
        let crop = ImageSize {
            width: 100,
            height: 100,
        };
        let raster = RotatedRaster {
            padded_size: padded,
            bbox: GeoBoundingBox::new(0.0, 0.0, 2.0, 2.0),
            rotation: std::f64::consts::FRAC_PI_2,
            crop_size: crop,
        };

        // the crop center is the raster center
        let center = raster.pixel_to_wgs84([50.0, 50.0]);
        assert_relative_eq!(center.lat, 1.0, epsilon = 1e-12);
        assert_relative_eq!(center.lon, 1.0, epsilon = 1e-12);

        // the top middle of the crop came from the west middle of the raster
        let top = raster.pixel_to_wgs84([50.0, 0.0]);
        assert_relative_eq!(top.lat, 1.0, epsilon = 1e-12);
        assert_relative_eq!(top.lon, 0.5, epsilon = 1e-12);

        let west = [50.0, 100.0];
        let uncropped = uncrop_pixel_coordinates(crop, padded, [50.0, 0.0]);
        let rotated = rotate_point(raster.rotation, padded, west);
        assert_relative_eq!(rotated[0], uncropped[0], epsilon = 1e-12);
        assert_relative_eq!(rotated[1], uncropped[1], epsilon = 1e-12);

        let fov = field_of_view(&IDENTITY33, crop).ok_or("horizon")?;
        let fov_center = raster.fov_center(&fov);
        assert_relative_eq!(fov_center.lat, 0.995, epsilon = 1e-12);
        assert_relative_eq!(fov_center.lon, 0.995, epsilon = 1e-12);
        Ok(())
    }
}
