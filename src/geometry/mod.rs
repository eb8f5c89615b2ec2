use nalgebra::{Matrix2, Vector2};

/// Points sampled along the four sides of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderPoints {
    pub top: Vec<Vector2<f64>>,
    pub bottom: Vec<Vector2<f64>>,
    pub left: Vec<Vector2<f64>>,
    pub right: Vec<Vector2<f64>>,
}

/// Sample points evenly along the border of an image
///
/// # Arguments
///
/// * `width` - The width of the image in pixels
/// * `height` - The height of the image in pixels
/// * `n` - The number of points per side, at least 2 are generated
///
/// # Returns
///
/// The points of each side, from pixel centre `0` to `width - 1` (or `height - 1`),
/// corners included.
pub fn border_points(width: f64, height: f64, n: usize) -> BorderPoints {
    let n = n.max(2);
    let last_x = width - 1.0;
    let last_y = height - 1.0;
    let step = |span: f64, i: usize| span * i as f64 / (n - 1) as f64;

    let mut points = BorderPoints {
        top: Vec::with_capacity(n),
        bottom: Vec::with_capacity(n),
        left: Vec::with_capacity(n),
        right: Vec::with_capacity(n),
    };
    for i in 0..n {
        let x = step(last_x, i);
        let y = step(last_y, i);
        points.top.push(Vector2::new(x, 0.0));
        points.bottom.push(Vector2::new(x, last_y));
        points.left.push(Vector2::new(0.0, y));
        points.right.push(Vector2::new(last_x, y));
    }
    points
}

/// A 2D line `normal . p = offset` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub normal: Vector2<f64>,
    pub offset: f64,
}

impl Line {
    /// Perpendicular distance from `point` to the line.
    pub fn distance(&self, point: &Vector2<f64>) -> f64 {
        (self.normal.dot(point) - self.offset).abs()
    }
}

/// Fit a line to points by total least squares
///
/// The line passes through the centroid, along the principal direction of the
/// point scatter. Returns `None` for fewer than 2 points or when all points coincide.
pub fn fit_line(points: &[Vector2<f64>]) -> Option<Line> {
    if points.len() < 2 {
        return None;
    }

    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector2::<f64>::zeros(), |acc, p| acc + p) / n;
    let mut scatter = Matrix2::<f64>::zeros();
    for point in points {
        let d = point - centroid;
        scatter += d * d.transpose();
    }

    let eigen = scatter.symmetric_eigen();
    let (smallest, largest) = if eigen.eigenvalues[0] <= eigen.eigenvalues[1] {
        (0, 1)
    } else {
        (1, 0)
    };
    if eigen.eigenvalues[largest] <= f64::EPSILON {
        return None;
    }

    // The normal is the direction of least spread.
    let normal: Vector2<f64> = eigen.eigenvectors.column(smallest).normalize();
    Some(Line {
        normal,
        offset: normal.dot(&centroid),
    })
}

/// Largest perpendicular distance of `points` from their best-fit line.
///
/// Used as a straightness metric: edges of a rectified image should stay within a
/// pixel of a straight line. Returns `None` when no line can be fitted.
pub fn max_line_deviation(points: &[Vector2<f64>]) -> Option<f64> {
    let line = fit_line(points)?;
    Some(
        points
            .iter()
            .map(|p| line.distance(p))
            .fold(0.0, f64::max),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_border_points() {
        let width = 800f64;
        let height = 600f64;
        let points = border_points(width, height, 5);

        assert_eq!(points.top.len(), 5);
        assert_eq!(points.top[0], Vector2::new(0.0, 0.0));
        assert_eq!(points.top[4], Vector2::new(799.0, 0.0));
        assert_eq!(points.right[2], Vector2::new(799.0, 299.5));
        assert_eq!(points.bottom[1], Vector2::new(199.75, 599.0));
        assert_eq!(points.left[4], Vector2::new(0.0, 599.0));

        // Test that all points are within the image bounds
        for point in points.top.iter().chain(&points.bottom).chain(&points.left).chain(&points.right) {
            assert!(point.x >= 0.0 && point.x < width);
            assert!(point.y >= 0.0 && point.y < height);
        }

        assert_eq!(border_points(width, height, 0).left.len(), 2);
    }

    #[test]
    fn test_fit_line_vertical() {
        let points: Vec<Vector2<f64>> = (0..10).map(|i| Vector2::new(80.0, i as f64 * 10.0)).collect();
        let line = fit_line(&points).unwrap();
        assert_relative_eq!(line.normal.x.abs(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(line.distance(&Vector2::new(83.0, 40.0)), 3.0, epsilon = 1e-9);
        assert_relative_eq!(max_line_deviation(&points).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_max_line_deviation_of_bent_points() {
        // y = x for most points, one point 2 units above the line
        let mut points: Vec<Vector2<f64>> = (0..9).map(|i| Vector2::new(i as f64, i as f64)).collect();
        points.push(Vector2::new(4.0, 4.0 + 2.0 * std::f64::consts::SQRT_2));
        let deviation = max_line_deviation(&points).unwrap();
        assert!(deviation > 1.0 && deviation < 2.0, "deviation = {}", deviation);
    }

    #[test]
    fn test_fit_line_degenerate() {
        assert!(fit_line(&[Vector2::new(1.0, 1.0)]).is_none());
        assert!(fit_line(&[Vector2::new(1.0, 1.0), Vector2::new(1.0, 1.0)]).is_none());
        assert!(max_line_deviation(&[]).is_none());
    }
}
