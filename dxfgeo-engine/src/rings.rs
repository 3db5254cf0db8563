use dxfgeo_core::geojson::Position;

pub const DEFAULT_CLOSURE_TOLERANCE: f64 = 1e-10;

/// 首尾坐标不同则补上首点；空序列原样返回。
pub fn close_if_needed(mut coords: Vec<Position>) -> Vec<Position> {
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    coords
}

/// 少于 3 个点的序列不构成环，原样返回。
pub fn ensure_ring_closure(coords: Vec<Position>) -> Vec<Position> {
    if coords.len() < 3 {
        return coords;
    }
    close_if_needed(coords)
}

/// 首尾坐标在每个轴上的差值都小于 `tolerance` 时视为闭合。
pub fn is_closed_line_string(coords: &[Position], tolerance: f64) -> bool {
    if coords.len() < 3 {
        return false;
    }
    let first = coords[0];
    let last = coords[coords.len() - 1];
    (first[0] - last[0]).abs() < tolerance && (first[1] - last[1]).abs() < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closing_is_idempotent() {
        let ring = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        assert_eq!(ensure_ring_closure(ring.clone()), ring);
        assert_eq!(close_if_needed(ring.clone()), ring);

        let open = vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
        assert_eq!(ensure_ring_closure(open), ring);
    }

    #[test]
    fn short_sequences_are_left_alone() {
        let pair = vec![[0.0, 0.0], [1.0, 0.0]];
        assert_eq!(ensure_ring_closure(pair.clone()), pair);
        assert!(close_if_needed(Vec::new()).is_empty());
    }

    #[test]
    fn closure_respects_tolerance() {
        let almost = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [1e-11, -1e-11]];
        assert!(is_closed_line_string(&almost, DEFAULT_CLOSURE_TOLERANCE));
        assert!(!is_closed_line_string(&almost, 1e-12));
        assert!(!is_closed_line_string(&[[0.0, 0.0], [0.0, 0.0]], 1.0));
    }
}
