//!
//! Nearest-neighbor polyline ordering to minimize total rapid travel (§4.5).
//!

use super::Polyline;

///
/// Orders `polylines` greedily by nearest endpoint to the current pen
/// position, starting from `start`. Both endpoints of an open polyline are
/// candidates; a closed polyline always enters (and exits) at its first
/// point.
///
/// # Returns:
/// - A list of `(polyline_index, reversed)` pairs in travel order. `reversed`
///   is true when the open polyline should be traversed tail-first.
///
pub fn nearest_neighbor_order(polylines: &[Polyline], start: (f64, f64)) -> Vec<(usize, bool)> {
    let mut remaining: Vec<usize> = (0..polylines.len()).collect();
    let mut order = Vec::with_capacity(polylines.len());
    let mut current = start;

    while !remaining.is_empty() {
        let (pick_pos, reversed) = remaining
            .iter()
            .enumerate()
            .map(|(pos, &idx)| {
                let polyline = &polylines[idx];
                let first = polyline.points[0];
                let last = *polyline.points.last().unwrap();
                let dist_first = dist(current, (first.x, first.y));

                if polyline.is_closed() {
                    (pos, dist_first, false)
                } else {
                    let dist_last = dist(current, (last.x, last.y));
                    if dist_last < dist_first {
                        (pos, dist_last, true)
                    } else {
                        (pos, dist_first, false)
                    }
                }
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(pos, _, reversed)| (pos, reversed))
            .expect("remaining is non-empty");

        let idx = remaining.remove(pick_pos);
        let polyline = &polylines[idx];
        current = if reversed {
            let p = polyline.points[0];
            (p.x, p.y)
        } else {
            let p = *polyline.points.last().unwrap();
            (p.x, p.y)
        };

        order.push((idx, reversed));
    }

    order
}

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Point;

    fn open(points: &[(f64, f64)]) -> Polyline {
        Polyline {
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            flow_duty: 50,
            feed_rate: 600.0,
        }
    }

    #[test]
    fn picks_closest_endpoint_first() {
        let far = open(&[(100.0, 100.0), (110.0, 100.0)]);
        let near = open(&[(1.0, 0.0), (2.0, 0.0)]);
        let order = nearest_neighbor_order(&[far, near], (0.0, 0.0));
        assert_eq!(order[0].0, 1);
    }

    #[test]
    fn reverses_when_tail_is_closer() {
        let polyline = open(&[(10.0, 0.0), (1.0, 0.0)]);
        let order = nearest_neighbor_order(&[polyline], (0.0, 0.0));
        assert_eq!(order, vec![(0, true)]);
    }
}
