use super::Pixel;

/// 8-connected Bresenham walk from `start` to `end`, both included.
///
/// Always yields `max(|dx|, |dy|) + 1` pixels, in the direction of travel.
#[derive(Debug, Clone)]
pub struct PixelWalk {
    current: Pixel,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    err: i32,
    remaining: usize,
}

impl PixelWalk {
    pub fn new(start: Pixel, end: Pixel) -> Self {
        let dx = (end.x - start.x).abs();
        let dy = -(end.y - start.y).abs();
        let sx = if start.x < end.x { 1 } else { -1 };
        let sy = if start.y < end.y { 1 } else { -1 };

        Self {
            current: start,
            dx,
            dy,
            sx,
            sy,
            err: dx + dy,
            remaining: dx.max(-dy) as usize + 1,
        }
    }
}

impl Iterator for PixelWalk {
    type Item = Pixel;

    fn next(&mut self) -> Option<Pixel> {
        if self.remaining == 0 {
            return None;
        }

        let pixel = self.current;
        self.remaining -= 1;

        if self.remaining > 0 {
            let e2 = 2 * self.err;
            if e2 >= self.dy {
                self.err += self.dy;
                self.current.x += self.sx;
            }
            if e2 <= self.dx {
                self.err += self.dx;
                self.current.y += self.sy;
            }
        }

        Some(pixel)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for PixelWalk {}

/// Walks `from -> to` and `matched_from -> matched_to` in lockstep.
///
/// Pixels are paired by their position in the walk; the tail of the longer
/// segment is dropped.
pub fn paired_walk(
    from: Pixel,
    to: Pixel,
    matched_from: Pixel,
    matched_to: Pixel,
) -> impl Iterator<Item = (Pixel, Pixel)> {
    PixelWalk::new(from, to).zip(PixelWalk::new(matched_from, matched_to))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_is_directional_and_inclusive() {
        let pts = PixelWalk::new(Pixel::new(3, 0), Pixel::new(0, 0)).collect::<Vec<_>>();
        assert_eq!(
            pts,
            vec![Pixel::new(3, 0), Pixel::new(2, 0), Pixel::new(1, 0), Pixel::new(0, 0)]
        );
    }

    #[test]
    fn test_walk_is_eight_connected() {
        let start = Pixel::new(-2, 7);
        let end = Pixel::new(9, -4);
        let pts = PixelWalk::new(start, end).collect::<Vec<_>>();

        assert_eq!(pts.len(), 12);
        assert_eq!(pts.first(), Some(&start));
        assert_eq!(pts.last(), Some(&end));
        for pair in pts.windows(2) {
            assert!((pair[0].x - pair[1].x).abs() <= 1);
            assert!((pair[0].y - pair[1].y).abs() <= 1);
        }
    }

    #[test]
    fn test_single_pixel_walk() {
        let p = Pixel::new(4, 4);
        assert_eq!(PixelWalk::new(p, p).collect::<Vec<_>>(), vec![p]);
    }

    #[test]
    fn test_paired_walk_uses_shorter_length() {
        let short = PixelWalk::new(Pixel::new(0, 0), Pixel::new(3, 1)).len();
        let long = PixelWalk::new(Pixel::new(10, 10), Pixel::new(10, 20)).len();
        assert_eq!((short, long), (4, 11));

        let pairs = paired_walk(
            Pixel::new(0, 0),
            Pixel::new(3, 1),
            Pixel::new(10, 10),
            Pixel::new(10, 20),
        )
        .collect::<Vec<_>>();
        assert_eq!(pairs.len(), short.min(long));
        assert_eq!(pairs[0], (Pixel::new(0, 0), Pixel::new(10, 10)));
        assert_eq!(pairs[3].1, Pixel::new(10, 13));
    }
}
