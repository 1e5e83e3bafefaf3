//src/cluster.rs
//! Agglomerative clustering used to order heatmap columns.
//!
//! Average linkage (UPGMA) over Euclidean distances. Cluster ids follow the
//! usual linkage-matrix convention: `0..n` are the observations and the
//! cluster formed at merge step `k` gets id `n + k`.

/// One agglomeration step.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    /// The lower of the two merged cluster ids
    pub left: usize,
    pub right: usize,
    /// Average distance between the members of `left` and `right`
    pub height: f64,
    /// Number of observations in the new cluster
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Linkage {
    pub n_leaves: usize,
    pub merges: Vec<Merge>,
    /// Observations in dendrogram order (left subtree first)
    pub leaves: Vec<usize>,
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Clusters `points` (one vector per observation) with average linkage.
pub fn average_linkage(points: &[Vec<f64>]) -> Linkage {
    let n = points.len();
    if n == 0 {
        return Linkage { n_leaves: 0, merges: Vec::new(), leaves: Vec::new() };
    }

    // Pairwise distances between active clusters, indexed by slot; each slot
    // starts as an observation and is reused by the merged cluster.
    let mut dist = vec![vec![0.0_f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = euclidean(&points[i], &points[j]);
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut active: Vec<bool> = vec![true; n];
    let mut cluster_id: Vec<usize> = (0..n).collect();
    let mut size: Vec<usize> = vec![1; n];
    let mut merges = Vec::with_capacity(n.saturating_sub(1));

    for step in 0..n.saturating_sub(1) {
        // Closest pair of active slots; first pair wins ties
        let mut best: Option<(usize, usize, f64)> = None;
        for i in (0..n).filter(|&i| active[i]) {
            for j in ((i + 1)..n).filter(|&j| active[j]) {
                if best.map_or(true, |(_, _, d)| dist[i][j] < d) {
                    best = Some((i, j, dist[i][j]));
                }
            }
        }
        let Some((a, b, height)) = best else { break };

        let (id_a, id_b) = (cluster_id[a], cluster_id[b]);
        let merged_size = size[a] + size[b];
        merges.push(Merge {
            left: id_a.min(id_b),
            right: id_a.max(id_b),
            height,
            size: merged_size,
        });

        // Slot `a` now holds the merged cluster
        for k in (0..n).filter(|&k| active[k] && k != a && k != b) {
            let d = (dist[a][k] * size[a] as f64 + dist[b][k] * size[b] as f64)
                / merged_size as f64;
            dist[a][k] = d;
            dist[k][a] = d;
        }
        active[b] = false;
        size[a] = merged_size;
        cluster_id[a] = n + step;
    }

    let leaves = leaf_order(n, &merges);
    Linkage { n_leaves: n, merges, leaves }
}

/// Depth-first traversal from the root, left child first.
fn leaf_order(n: usize, merges: &[Merge]) -> Vec<usize> {
    if merges.is_empty() {
        return (0..n).collect();
    }

    let mut order = Vec::with_capacity(n);
    let mut stack = vec![n + merges.len() - 1];
    while let Some(id) = stack.pop() {
        if id < n {
            order.push(id);
        } else {
            let m = &merges[id - n];
            stack.push(m.right);
            stack.push(m.left);
        }
    }
    order
}

impl Linkage {
    /// Horizontal position of every cluster id when leaves sit at
    /// `0, 1, 2, ...` in dendrogram order; merged clusters sit midway
    /// between their children.
    pub fn positions(&self) -> Vec<f64> {
        let n = self.n_leaves;
        let mut pos = vec![0.0; n + self.merges.len()];
        for (rank, &leaf) in self.leaves.iter().enumerate() {
            pos[leaf] = rank as f64;
        }
        for (k, m) in self.merges.iter().enumerate() {
            pos[n + k] = (pos[m.left] + pos[m.right]) / 2.0;
        }
        pos
    }

    /// Height of a cluster id (0 for observations).
    pub fn height(&self, id: usize) -> f64 {
        if id < self.n_leaves {
            0.0
        } else {
            self.merges[id - self.n_leaves].height
        }
    }

    pub fn max_height(&self) -> f64 {
        self.merges.iter().map(|m| m.height).fold(0.0, f64::max)
    }
}
