use crate::Pt2D;

/// Returns the convex hull of some points, counter-clockwise, without repeating the first point
/// at the end. Duplicates and collinear points are dropped. Zero or one points are returned as-is.
pub fn convex_hull(pts: Vec<Pt2D>) -> Vec<Pt2D> {
    convex_hull_by_key(pts.into_iter().map(|pt| (pt, pt)).collect())
        .into_iter()
        .map(|(pt, _)| pt)
        .collect()
}

/// Like `convex_hull`, but each point carries a key (like an IntersectionID) through the
/// calculation.
///
/// Uses Andrew's monotone chain. Points are sorted by x, then y, so the result is deterministic
/// regardless of the input order (except for which of several identical points is kept).
pub fn convex_hull_by_key<K: Clone>(mut input: Vec<(K, Pt2D)>) -> Vec<(K, Pt2D)> {
    if input.len() <= 1 {
        return input;
    }
    // Stable, so of several identical points, the first one in the input survives
    input.sort_by(|(_, a), (_, b)| a.x().total_cmp(&b.x()).then(a.y().total_cmp(&b.y())));
    input.dedup_by(|(_, a), (_, b)| a == b);
    if input.len() == 1 {
        return input;
    }

    // Indices into input
    let mut hull: Vec<usize> = Vec::new();

    // Lower hull
    for idx in 0..input.len() {
        while hull.len() >= 2 && !is_left_turn(&input, &hull, idx) {
            hull.pop();
        }
        hull.push(idx);
    }

    // Upper hull
    let lower_len = hull.len() + 1;
    for idx in (0..input.len() - 1).rev() {
        while hull.len() >= lower_len && !is_left_turn(&input, &hull, idx) {
            hull.pop();
        }
        hull.push(idx);
    }

    // The upper hull ends by revisiting the first point
    hull.pop();
    hull.into_iter().map(|idx| input[idx].clone()).collect()
}

// Do the last two points of the hull and the candidate make a strict counter-clockwise turn?
fn is_left_turn<K>(input: &[(K, Pt2D)], hull: &[usize], candidate: usize) -> bool {
    let a = input[hull[hull.len() - 2]].1;
    let b = input[hull[hull.len() - 1]].1;
    let c = input[candidate].1;
    Pt2D::cross(a, b, c) > 0.0
}
