//! 曲线离散化：bulge 圆弧段、圆弧、椭圆。所有函数均为纯函数，不会失败。

use std::f64::consts::TAU;

use dxfgeo_core::geometry::{Point2, Vector2};
use glam::DVec2;

pub const DEFAULT_SEGMENTS_PER_ARC: usize = 24;

const BULGE_EPSILON: f64 = 1e-12;
const SWEEP_EPSILON: f64 = 1e-9;

/// 将 `p0 → p1` 之间的 bulge 圆弧离散为 `segments` 个点（不含 `p0`，末点严格等于 `p1`）。
///
/// bulge 为圆心角四分之一的正切，正值表示逆时针。bulge 近似为 0 时退化为直线，只返回 `[p1]`。
pub fn tessellate_bulge(p0: Point2, p1: Point2, bulge: f64, segments: usize) -> Vec<Point2> {
    if bulge.abs() < BULGE_EPSILON {
        return vec![p1];
    }
    let theta = 4.0 * bulge.atan();
    if theta.abs() < SWEEP_EPSILON {
        return vec![p1];
    }

    let chord = p0.vector_to(p1);
    let chord_len = chord.length();
    if chord_len < BULGE_EPSILON {
        return vec![p1];
    }

    let half = theta.abs() / 2.0;
    let radius = chord_len / (2.0 * half.sin());
    // 圆心到弦中点的有向距离；大于半圆时 cos 为负，圆心自动落到另一侧
    let offset = radius * half.cos() * bulge.signum();
    let normal = chord.perp().as_vec2() / chord_len;
    let center = p0.midpoint(p1).as_vec2() + normal * offset;

    let start = angle_of(p0.as_vec2() - center);
    let end = angle_of(p1.as_vec2() - center);
    let mut sweep = end - start;
    if theta > 0.0 && sweep <= 0.0 {
        sweep += TAU;
    } else if theta < 0.0 && sweep >= 0.0 {
        sweep -= TAU;
    }

    let segments = segments.max(1);
    let mut points = Vec::with_capacity(segments);
    for i in 1..segments {
        let angle = start + sweep * (i as f64) / (segments as f64);
        points.push(Point2::from_vec(
            center + DVec2::new(angle.cos(), angle.sin()) * radius,
        ));
    }
    points.push(p1);
    points
}

/// 圆弧采样，角度为弧度，返回 `segments + 1` 个点（含两端）。
pub fn tessellate_arc(
    center: Point2,
    radius: f64,
    start: f64,
    end: f64,
    segments: usize,
) -> Vec<Point2> {
    let segments = segments.max(1);
    (0..=segments)
        .map(|i| {
            let angle = start + (end - start) * (i as f64) / (segments as f64);
            Point2::new(
                center.x() + radius * angle.cos(),
                center.y() + radius * angle.sin(),
            )
        })
        .collect()
}

/// 椭圆参数方程 `C + M·cos t + ratio·perp(M)·sin t` 在 `[start, end]` 上采样 `segments + 1` 个点。
pub fn tessellate_ellipse(
    center: Point2,
    major_axis: Vector2,
    ratio: f64,
    start: f64,
    end: f64,
    segments: usize,
) -> Vec<Point2> {
    let segments = segments.max(1);
    let major = major_axis.as_vec2();
    let minor = major_axis.perp().as_vec2() * ratio;
    (0..=segments)
        .map(|i| {
            let t = start + (end - start) * (i as f64) / (segments as f64);
            Point2::from_vec(center.as_vec2() + major * t.cos() + minor * t.sin())
        })
        .collect()
}

/// 将终止角调整为不小于起始角的逆时针区间；起止重合视为整圆。
pub fn counter_clockwise_end(start: f64, end: f64) -> f64 {
    let sweep = (end - start).rem_euclid(TAU);
    start + if sweep == 0.0 { TAU } else { sweep }
}

#[inline]
fn angle_of(v: DVec2) -> f64 {
    v.y.atan2(v.x)
}
