//! 工程平面坐标到 WGS84 经纬度的投影。
//!
//! 默认源坐标系为 UTM 44N（WGS84 椭球），逆投影采用 Snyder 的横轴墨卡托级数展开。

use std::f64::consts::FRAC_PI_2;

use dxfgeo_core::geojson::Position;
use thiserror::Error;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

pub const DEFAULT_UTM_ZONE: u8 = 44;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("coordinate ({x}, {y}) is not finite")]
    NonFiniteInput { x: f64, y: f64 },
    #[error("northing {northing} lies beyond the pole")]
    BeyondPole { northing: f64 },
    #[error("projected coordinate ({lon}, {lat}) is out of range")]
    OutOfRange { lon: f64, lat: f64 },
    #[error("UTM zone {0} is outside 1..=60")]
    InvalidZone(u8),
}

/// 平面坐标 → `[经度, 纬度]`。
pub trait Projector: Send + Sync {
    fn project(&self, x: f64, y: f64) -> Result<Position, ProjectionError>;

    fn name(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
}

#[derive(Debug, Clone, Copy)]
pub struct Utm {
    zone: u8,
    hemisphere: Hemisphere,
    central_meridian: f64,
}

impl Utm {
    pub fn new(zone: u8, hemisphere: Hemisphere) -> Result<Self, ProjectionError> {
        if !(1..=60).contains(&zone) {
            return Err(ProjectionError::InvalidZone(zone));
        }
        Ok(Self {
            zone,
            hemisphere,
            central_meridian: f64::from(zone - 1) * 6.0 - 180.0 + 3.0,
        })
    }

    #[inline]
    pub fn zone(&self) -> u8 {
        self.zone
    }

    #[inline]
    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }
}

impl Default for Utm {
    fn default() -> Self {
        Self {
            zone: DEFAULT_UTM_ZONE,
            hemisphere: Hemisphere::North,
            central_meridian: f64::from(DEFAULT_UTM_ZONE - 1) * 6.0 - 180.0 + 3.0,
        }
    }
}

impl Projector for Utm {
    fn project(&self, easting: f64, northing: f64) -> Result<Position, ProjectionError> {
        if !easting.is_finite() || !northing.is_finite() {
            return Err(ProjectionError::NonFiniteInput {
                x: easting,
                y: northing,
            });
        }

        let e2 = WGS84_F * (2.0 - WGS84_F);
        let ep2 = e2 / (1.0 - e2);
        let x = easting - UTM_FALSE_EASTING;
        let y = match self.hemisphere {
            Hemisphere::North => northing,
            Hemisphere::South => northing - UTM_FALSE_NORTHING_SOUTH,
        };

        let m = y / UTM_K0;
        let mu = m
            / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
        if mu.abs() > FRAC_PI_2 {
            return Err(ProjectionError::BeyondPole { northing });
        }

        let sqrt_one_minus_e2 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt_one_minus_e2) / (1.0 + sqrt_one_minus_e2);
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin_phi1, cos_phi1) = phi1.sin_cos();
        let tan_phi1 = sin_phi1 / cos_phi1;
        let c1 = ep2 * cos_phi1 * cos_phi1;
        let t1 = tan_phi1 * tan_phi1;
        let denom = 1.0 - e2 * sin_phi1 * sin_phi1;
        let n1 = WGS84_A / denom.sqrt();
        let r1 = WGS84_A * (1.0 - e2) / denom.powf(1.5);
        let d = x / (n1 * UTM_K0);

        let lat = phi1
            - (n1 * tan_phi1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi1;

        let lon = self.central_meridian + lon.to_degrees();
        let lat = lat.to_degrees();
        if !lon.is_finite() || !lat.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(ProjectionError::OutOfRange { lon, lat });
        }
        Ok([lon, lat])
    }

    fn name(&self) -> String {
        let suffix = match self.hemisphere {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
        };
        format!("UTM {}{suffix} / WGS84", self.zone)
    }
}

/// 坐标已是经纬度时使用，原样输出。
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Projector for Identity {
    fn project(&self, x: f64, y: f64) -> Result<Position, ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFiniteInput { x, y });
        }
        Ok([x, y])
    }

    fn name(&self) -> String {
        "identity".to_string()
    }
}

/// 投影结果及是否回退为输入坐标。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projected {
    pub position: Position,
    pub fell_back: bool,
}

/// 投影失败时以输入坐标替代。
pub fn project_or_input(projector: &dyn Projector, x: f64, y: f64) -> Projected {
    match projector.project(x, y) {
        Ok(position) => Projected {
            position,
            fell_back: false,
        },
        Err(err) => {
            tracing::debug!(x, y, error = %err, "投影失败，保留原始坐标");
            Projected {
                position: [x, y],
                fell_back: true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn central_meridian_on_equator_maps_exactly() {
        let utm = Utm::default();
        assert_eq!(utm.central_meridian(), 81.0);
        let [lon, lat] = utm.project(500_000.0, 0.0).expect("投影失败");
        assert_eq!(lon, 81.0);
        assert_eq!(lat, 0.0);
    }

    #[test]
    fn eastings_mirror_about_central_meridian() {
        let utm = Utm::default();
        let [east_lon, east_lat] = utm.project(600_000.0, 3_000_000.0).expect("投影失败");
        let [west_lon, west_lat] = utm.project(400_000.0, 3_000_000.0).expect("投影失败");
        assert!((east_lon - 81.0 - (81.0 - west_lon)).abs() < 1e-9);
        assert!((east_lat - west_lat).abs() < 1e-9);
        assert!(east_lat > 26.0 && east_lat < 28.0);
    }

    #[test]
    fn raw_drawing_origin_lands_west_of_meridian() {
        let utm = Utm::default();
        let [lon0, lat0] = utm.project(0.0, 0.0).expect("投影失败");
        let [lon1, lat1] = utm.project(10.0, 0.0).expect("投影失败");
        assert!(lon0 > 76.0 && lon0 < 77.0, "经度 {lon0}");
        assert!(lat0.abs() < 1e-9 && lat1.abs() < 1e-9);
        assert!(lon1 > lon0);
    }

    #[test]
    fn southern_hemisphere_uses_false_northing() {
        let utm = Utm::new(44, Hemisphere::South).expect("分带有效");
        let [lon, lat] = utm.project(500_000.0, 10_000_000.0).expect("投影失败");
        assert_eq!(lon, 81.0);
        assert_eq!(lat, 0.0);
        let [_, lat] = utm.project(500_000.0, 9_000_000.0).expect("投影失败");
        assert!(lat < -8.0 && lat > -10.0);
    }

    #[test]
    fn failures_fall_back_to_input() {
        let utm = Utm::default();
        assert!(matches!(
            utm.project(0.0, 1e8),
            Err(ProjectionError::BeyondPole { .. })
        ));
        assert!(matches!(
            utm.project(f64::NAN, 0.0),
            Err(ProjectionError::NonFiniteInput { .. })
        ));

        let projected = project_or_input(&utm, 0.0, 1e8);
        assert!(projected.fell_back);
        assert_eq!(projected.position, [0.0, 1e8]);
    }

    #[test]
    fn zone_must_be_valid() {
        assert_eq!(
            Utm::new(0, Hemisphere::North).unwrap_err(),
            ProjectionError::InvalidZone(0)
        );
        assert!(Utm::new(61, Hemisphere::North).is_err());
        assert_eq!(
            Utm::new(31, Hemisphere::North).expect("分带有效").central_meridian(),
            3.0
        );
    }

    #[test]
    fn identity_passes_coordinates_through() {
        assert_eq!(Identity.project(12.5, -3.25), Ok([12.5, -3.25]));
        assert!(Identity.project(f64::INFINITY, 0.0).is_err());
    }
}
