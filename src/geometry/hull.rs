use super::Pixel;

#[inline]
fn cross(o: Pixel, a: Pixel, b: Pixel) -> i64 {
    (a.x as i64 - o.x as i64) * (b.y as i64 - o.y as i64)
        - (a.y as i64 - o.y as i64) * (b.x as i64 - o.x as i64)
}

/// Indices into `points` of their convex hull, Andrew's monotone chain.
///
/// Vertices come out in a closed walk order without repeating the first
/// one, collinear points are dropped. Duplicated positions are reported
/// once, through the first index holding them after sorting.
pub fn convex_hull_indices(points: &[Pixel]) -> Vec<usize> {
    let mut order = (0..points.len()).collect::<Vec<_>>();
    order.sort_by_key(|&i| (points[i].x, points[i].y));
    order.dedup_by_key(|i| points[*i]);

    if order.len() < 3 {
        return order;
    }

    let mut lower: Vec<usize> = Vec::with_capacity(order.len());
    for &i in &order {
        while lower.len() >= 2
            && cross(points[lower[lower.len() - 2]], points[lower[lower.len() - 1]], points[i]) <= 0
        {
            lower.pop();
        }
        lower.push(i);
    }

    let mut upper: Vec<usize> = Vec::with_capacity(order.len());
    for &i in order.iter().rev() {
        while upper.len() >= 2
            && cross(points[upper[upper.len() - 2]], points[upper[upper.len() - 1]], points[i]) <= 0
        {
            upper.pop();
        }
        upper.push(i);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(x: i32, y: i32) -> Pixel {
        Pixel::new(x, y)
    }

    #[test]
    fn test_square_with_interior_points() {
        let points = vec![px(0, 0), px(5, 5), px(10, 0), px(10, 10), px(3, 7), px(0, 10)];
        let mut hull = convex_hull_indices(&points);
        hull.sort();
        assert_eq!(hull, vec![0, 2, 3, 5]);
    }

    #[test]
    fn test_collinear_points_collapse_to_extremes() {
        let points = vec![px(0, 0), px(1, 1), px(2, 2), px(3, 3)];
        let mut hull = convex_hull_indices(&points);
        hull.sort();
        assert_eq!(hull, vec![0, 3]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(convex_hull_indices(&[]).is_empty());
        assert_eq!(convex_hull_indices(&[px(4, 4)]), vec![0]);
        assert_eq!(convex_hull_indices(&[px(4, 4), px(4, 4), px(4, 4)]), vec![0]);
    }
}
