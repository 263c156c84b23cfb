use crate::geometry::{MapPoint, ProjectedPoint};

/// A 2D affine transform from map coordinates to projected coordinates.
///
/// Maps a map point (x, y) in millimetres to grid coordinates (E, N) in metres:
///   E = a * x + b * y + c
///   N = d * x + e * y + f
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    /// Build the map-to-grid transform from the georeferencing parameters.
    ///
    /// `map_ref` maps onto `projected_ref`. Map north (−y) is rotated by
    /// `grivation` degrees clockwise from grid north, and one map millimetre
    /// covers `combined_scale_factor * scale_denominator / 1000` grid metres.
    pub fn from_reference(
        map_ref: MapPoint,
        projected_ref: ProjectedPoint,
        grivation: f64,
        combined_scale_factor: f64,
        scale_denominator: u32,
    ) -> Self {
        let scale = combined_scale_factor * f64::from(scale_denominator) / 1000.0;
        let (sin_g, cos_g) = grivation.to_radians().sin_cos();

        let a = scale * cos_g;
        let b = -scale * sin_g;
        let d = -scale * sin_g;
        let e = -scale * cos_g;
        Self {
            a,
            b,
            c: projected_ref.x - a * map_ref.x - b * map_ref.y,
            d,
            e,
            f: projected_ref.y - d * map_ref.x - e * map_ref.y,
        }
    }

    /// The inverse of [`Affine::from_reference`]: grid coordinates to map coordinates.
    ///
    /// Built directly from the parameters, so it cannot fail.
    /// `combined_scale_factor` and `scale_denominator` must be positive.
    pub fn inverse_from_reference(
        map_ref: MapPoint,
        projected_ref: ProjectedPoint,
        grivation: f64,
        combined_scale_factor: f64,
        scale_denominator: u32,
    ) -> Self {
        let scale = combined_scale_factor * f64::from(scale_denominator) / 1000.0;
        let (sin_g, cos_g) = grivation.to_radians().sin_cos();

        let a = cos_g / scale;
        let b = -sin_g / scale;
        let d = -sin_g / scale;
        let e = -cos_g / scale;
        Self {
            a,
            b,
            c: map_ref.x - a * projected_ref.x - b * projected_ref.y,
            d,
            e,
            f: map_ref.y - d * projected_ref.x - e * projected_ref.y,
        }
    }

    /// Apply the forward transform: (x, y) -> (E, N).
    pub fn forward(&self, x: f64, y: f64) -> (f64, f64) {
        let east = self.a * x + self.b * y + self.c;
        let north = self.d * x + self.e * y + self.f;
        (east, north)
    }

    pub fn map_to_projected(&self, point: MapPoint) -> ProjectedPoint {
        let (x, y) = self.forward(point.x, point.y);
        ProjectedPoint::new(x, y)
    }

    pub fn projected_to_map(&self, point: ProjectedPoint) -> MapPoint {
        let (x, y) = self.forward(point.x, point.y);
        MapPoint::new(x, y)
    }
}
