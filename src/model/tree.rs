//! Histogram-binned regression trees, the weak learner of [`super::booster::GradientBooster`].

use super::stats::sorted_finite;

/// Upper bound on bins per feature; bin indices are stored as `u8`.
pub const MAX_BINS: usize = 255;

/// Training matrix quantized per feature into at most `max_bins` bins.
///
/// `edges[f]` holds ascending upper bin edges. A value `v` falls in the first bin `j`
/// with `v <= edges[f][j]`, or in the last bin when it exceeds every edge, so a split
/// "bin <= b" is equivalent to "value <= edges[f][b]" on raw values.
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    edges: Vec<Vec<f64>>,
    bins: Vec<Vec<u8>>,
}

impl BinnedMatrix {
    pub fn new(rows: &[&[f64]], max_bins: usize) -> Self {
        let n_features = rows.first().map_or(0, |r| r.len());
        let max_bins = max_bins.clamp(2, MAX_BINS);
        let mut edges = Vec::with_capacity(n_features);
        let mut bins = Vec::with_capacity(n_features);

        for feature in 0..n_features {
            let mut unique = sorted_finite(rows.iter().map(|r| r[feature]));
            unique.dedup();
            let feature_edges = bin_edges(&unique, max_bins);
            let column = rows
                .iter()
                .map(|r| feature_edges.partition_point(|e| *e < r[feature]) as u8)
                .collect();
            edges.push(feature_edges);
            bins.push(column);
        }
        Self { edges, bins }
    }

    pub fn n_features(&self) -> usize {
        self.edges.len()
    }
}

fn bin_edges(unique: &[f64], max_bins: usize) -> Vec<f64> {
    if unique.len() < 2 {
        return Vec::new();
    }
    if unique.len() <= max_bins {
        return unique[..unique.len() - 1].to_vec();
    }
    let mut edges: Vec<f64> = (1..max_bins)
        .map(|b| unique[b * unique.len() / max_bins - 1])
        .collect();
    edges.dedup();
    edges
}

#[derive(Debug, Clone, Copy)]
pub struct TreeSettings {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

struct SplitCandidate {
    feature: usize,
    bin: u8,
    gain: f64,
}

/// Depth-limited binary regression tree.
///
/// Structure is grown by least-squares variance reduction on the supplied gradients;
/// leaf values come from a caller-supplied function so each loss can set its own
/// optimal leaf constant.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn grow<F>(
        matrix: &BinnedMatrix,
        gradients: &[f64],
        indices: Vec<usize>,
        settings: TreeSettings,
        leaf_value: &mut F,
    ) -> Self
    where
        F: FnMut(&[usize]) -> f64,
    {
        let mut tree = RegressionTree { nodes: Vec::new() };
        tree.build(matrix, gradients, indices, 0, settings, leaf_value);
        tree
    }

    fn build<F>(
        &mut self,
        matrix: &BinnedMatrix,
        gradients: &[f64],
        indices: Vec<usize>,
        depth: usize,
        settings: TreeSettings,
        leaf_value: &mut F,
    ) -> usize
    where
        F: FnMut(&[usize]) -> f64,
    {
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf(0.0));

        let split = if depth < settings.max_depth {
            best_split(matrix, gradients, &indices, settings.min_samples_leaf)
        } else {
            None
        };

        match split {
            Some(candidate) => {
                let column = &matrix.bins[candidate.feature];
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .into_iter()
                    .partition(|&i| column[i] <= candidate.bin);
                let threshold = matrix.edges[candidate.feature][candidate.bin as usize];
                let left = self.build(matrix, gradients, left_idx, depth + 1, settings, leaf_value);
                let right =
                    self.build(matrix, gradients, right_idx, depth + 1, settings, leaf_value);
                self.nodes[node_id] = Node::Split {
                    feature: candidate.feature,
                    threshold,
                    left,
                    right,
                };
            }
            None => {
                self.nodes[node_id] = Node::Leaf(leaf_value(&indices));
            }
        }
        node_id
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        loop {
            match self.nodes[node] {
                Node::Leaf(value) => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf(_)))
            .count()
    }
}

fn best_split(
    matrix: &BinnedMatrix,
    gradients: &[f64],
    indices: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = indices.len();
    let min_leaf = min_samples_leaf.max(1);
    if n < 2 * min_leaf {
        return None;
    }
    let total: f64 = indices.iter().map(|&i| gradients[i]).sum();
    let parent_score = total * total / n as f64;
    let mut best: Option<SplitCandidate> = None;

    for (feature, column) in matrix.bins.iter().enumerate() {
        let n_bins = matrix.edges[feature].len() + 1;
        if n_bins < 2 {
            continue;
        }
        let mut sums = vec![0.0; n_bins];
        let mut counts = vec![0usize; n_bins];
        for &i in indices {
            let b = column[i] as usize;
            sums[b] += gradients[i];
            counts[b] += 1;
        }

        let mut left_sum = 0.0;
        let mut left_n = 0usize;
        for bin in 0..n_bins - 1 {
            left_sum += sums[bin];
            left_n += counts[bin];
            let right_n = n - left_n;
            if left_n < min_leaf {
                continue;
            }
            if right_n < min_leaf {
                break;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / left_n as f64
                + right_sum * right_sum / right_n as f64
                - parent_score;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    bin: bin as u8,
                    gain,
                });
            }
        }
    }
    best
}
