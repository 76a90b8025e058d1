// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Decomposition of simple polygons into convex pieces.
//!
//! The polygon is triangulated by ear clipping, then neighbouring pieces sharing an edge are
//! merged for as long as their union stays convex (Hertel–Mehlhorn).

use alloc::vec::Vec;

use kurbo::Point;

const EPSILON: f64 = 1e-9;

fn cross(o: Point, a: Point, b: Point) -> f64 {
    (a - o).cross(b - o)
}

fn signed_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].to_vec2().cross(points[(i + 1) % n].to_vec2()))
        .sum::<f64>()
        * 0.5
}

fn inside_triangle(p: Point, a: Point, b: Point, c: Point) -> bool {
    cross(a, b, p) >= -EPSILON && cross(b, c, p) >= -EPSILON && cross(c, a, p) >= -EPSILON
}

/// Triangulate a simple polygon, returning counter-clockwise triangles.
///
/// Degenerate input that admits no ear leaves the remainder untriangulated.
pub(crate) fn triangulate(points: &[Point]) -> Vec<[Point; 3]> {
    let mut ring: Vec<Point> = points.to_vec();
    if signed_area(&ring) < 0.0 {
        ring.reverse();
    }
    let mut triangles = Vec::with_capacity(ring.len().saturating_sub(2));
    while ring.len() > 3 {
        let m = ring.len();
        let ear = (0..m).find(|&i| {
            let prev = ring[(i + m - 1) % m];
            let cur = ring[i];
            let next = ring[(i + 1) % m];
            if cross(prev, cur, next) <= EPSILON {
                return false;
            }
            !ring.iter().enumerate().any(|(j, p)| {
                j != i
                    && j != (i + m - 1) % m
                    && j != (i + 1) % m
                    && *p != prev
                    && *p != cur
                    && *p != next
                    && inside_triangle(*p, prev, cur, next)
            })
        });
        let Some(i) = ear else {
            log::warn!("polygon has no ear left; {} vertices dropped", ring.len());
            return triangles;
        };
        triangles.push([ring[(i + m - 1) % m], ring[i], ring[(i + 1) % m]]);
        ring.remove(i);
    }
    if ring.len() == 3 && cross(ring[0], ring[1], ring[2]) > EPSILON {
        triangles.push([ring[0], ring[1], ring[2]]);
    }
    triangles
}

fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    (0..n).all(|i| cross(points[i], points[(i + 1) % n], points[(i + 2) % n]) >= -EPSILON)
}

/// Merge `a` and `b` across an edge they share in opposite directions, if the result is
/// convex.
fn merge(a: &[Point], b: &[Point]) -> Option<Vec<Point>> {
    let (na, nb) = (a.len(), b.len());
    for i in 0..na {
        let (p, q) = (a[i], a[(i + 1) % na]);
        let Some(j) = (0..nb).find(|&j| b[j] == q && b[(j + 1) % nb] == p) else {
            continue;
        };
        // `a` from q around to p, then `b` strictly between p and q.
        let mut merged: Vec<Point> = (0..na).map(|k| a[(i + 1 + k) % na]).collect();
        merged.extend((2..nb).map(|k| b[(j + k) % nb]));
        return is_convex(&merged).then_some(merged);
    }
    None
}

/// Split a simple polygon into convex counter-clockwise pieces.
pub(crate) fn decompose_in_convex(points: &[Point]) -> Vec<Vec<Point>> {
    let mut pieces: Vec<Vec<Point>> = triangulate(points)
        .into_iter()
        .map(|t| t.to_vec())
        .collect();
    'outer: loop {
        for i in 0..pieces.len() {
            for j in (i + 1)..pieces.len() {
                if let Some(merged) = merge(&pieces[i], &pieces[j]) {
                    pieces[i] = merged;
                    pieces.swap_remove(j);
                    continue 'outer;
                }
            }
        }
        break;
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn area(points: &[Point]) -> f64 {
        signed_area(points)
    }

    #[test]
    fn convex_input_stays_one_piece() {
        let square = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 0.0),
        ];
        let pieces = decompose_in_convex(&square);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].len(), 4);
        assert!(area(&pieces[0]) > 0.0, "pieces are counter-clockwise");
    }

    #[test]
    fn l_shape_splits_into_two_convex_pieces() {
        let l = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 4.0),
            Point::new(0.0, 4.0),
        ];
        let pieces = decompose_in_convex(&l);
        assert_eq!(pieces.len(), 2);
        let total: f64 = pieces.iter().map(|p| area(p)).sum();
        assert!((total - 7.0).abs() < 1e-9, "area {total}");
        assert!(pieces.iter().all(|p| is_convex(p)));
    }

    #[test]
    fn triangulation_covers_the_area() {
        let star = [
            Point::new(0.0, -5.0),
            Point::new(1.0, -1.0),
            Point::new(5.0, 0.0),
            Point::new(1.0, 1.0),
            Point::new(0.0, 5.0),
            Point::new(-1.0, 1.0),
            Point::new(-5.0, 0.0),
            Point::new(-1.0, -1.0),
        ];
        let tris = triangulate(&star);
        assert_eq!(tris.len(), 6);
        let total: f64 = tris.iter().map(|t| area(t)).sum();
        assert!((total - area(&star).abs()).abs() < 1e-9);
    }
}
