use image::{ DynamicImage, GenericImageView };
use imageproc::geometry::approximate_polygon_dp;
use imageproc::point::Point;

use std::path::Path;

use crate::error::VrError;

/// Opens and decodes an image, reporting a missing file, a decode failure and
/// an empty image as input errors.
pub fn open_image(path: impl AsRef<Path>) -> Result<DynamicImage, VrError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VrError::input(format!("image not found: {}", path.display())));
    }
    let img = image::open(path)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(VrError::input(format!("image is empty: {}", path.display())));
    }
    Ok(img)
}

/// index of the largest value, the first one wins on ties
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, v) in values.iter().enumerate() {
        match best {
            Some((_, max)) if *v <= max => {},
            _ => best = Some((i, *v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Enclosed area of a closed polyline (shoelace formula)
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let doubled: i64 = points.iter().zip(points.iter().cycle().skip(1)).map(|(a, b)| {
        a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64
    }).sum();
    (doubled as f64 / 2.0).abs()
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    ((a.x - b.x) as f64).hypot((a.y - b.y) as f64)
}

/// distance from `p` to the line through `a` and `b`
fn line_distance(p: Point<i32>, a: Point<i32>, b: Point<i32>) -> f64 {
    let len = distance(a, b);
    if len == 0.0 {
        return distance(p, a);
    }
    let cross = (b.x - a.x) as f64 * (p.y - a.y) as f64 - (b.y - a.y) as f64 * (p.x - a.x) as f64;
    cross.abs() / len
}

fn farthest_from(points: &[Point<i32>], from: usize) -> (usize, f64) {
    points.iter().enumerate().fold((from, 0.0), |(best, max), (i, p)| {
        let d = distance(points[from], *p);
        if d > max { (i, d) } else { (best, max) }
    })
}

/// Douglas-Peucker on a closed curve.
///
/// The curve is cut at two mutually distant points and each half is simplified
/// as an open chain, so the start of the contour never survives as a vertex
/// just because it is the start. Vertices that end up within `epsilon` of the
/// line through their neighbours are dropped afterwards.
pub fn approximate_closed_polygon(points: &[Point<i32>], epsilon: f64) -> Vec<Point<i32>> {
    if points.len() < 3 || epsilon <= 0.0 {
        return points.to_vec();
    }

    // a few rounds of "jump to the farthest point" approximate the diameter
    let (mut anchor, mut max) = (0, 0.0);
    let mut opposite = 0;
    for _ in 0..3 {
        let (next, d) = farthest_from(points, anchor);
        if d <= max {
            break;
        }
        opposite = anchor;
        anchor = next;
        max = d;
    }
    if max <= epsilon {
        return vec![points[anchor]];
    }
    let (start, end) = if anchor < opposite { (anchor, opposite) } else { (opposite, anchor) };

    let first_half = &points[start..=end];
    let second_half: Vec<Point<i32>> = points[end..].iter().chain(points[..=start].iter()).copied().collect();

    let mut polygon = approximate_polygon_dp(first_half, epsilon, false);
    polygon.pop();
    let mut rest = approximate_polygon_dp(&second_half, epsilon, false);
    rest.pop();
    polygon.append(&mut rest);
    polygon.dedup();

    let mut i = 0;
    while polygon.len() > 3 && i < polygon.len() {
        let n = polygon.len();
        let prev = polygon[(i + n - 1) % n];
        let next = polygon[(i + 1) % n];
        if line_distance(polygon[i], prev, next) <= epsilon {
            polygon.remove(i);
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
    polygon
}
