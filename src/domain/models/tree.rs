//! Regression tree shared by the forest and boosting families.
//!
//! Nodes live in a flat vector; children are referenced by index. Splits
//! minimise the summed squared error of the two children, scanning every
//! distinct value boundary of each candidate feature.

#[derive(Debug, Clone, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

impl Default for TreeParams {
    fn default() -> Self {
        TreeParams {
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree over `samples` (row indices into `x`, repeats allowed)
    /// considering only the columns listed in `features`.
    pub fn fit(
        x: &[&[f64]],
        y: &[f64],
        samples: &[usize],
        features: &[usize],
        params: &TreeParams,
    ) -> Self {
        let mut tree = RegressionTree { nodes: Vec::new() };
        let builder = Builder {
            x,
            y,
            features,
            params,
        };
        builder.grow(&mut tree.nodes, samples.to_vec(), 0);
        tree
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

struct Builder<'a> {
    x: &'a [&'a [f64]],
    y: &'a [f64],
    features: &'a [usize],
    params: &'a TreeParams,
}

impl Builder<'_> {
    fn grow(&self, nodes: &mut Vec<Node>, samples: Vec<usize>, depth: usize) -> usize {
        let idx = nodes.len();
        let (mean, sse) = self.moments(&samples);
        nodes.push(Node::Leaf { value: mean });

        let n = samples.len();
        if depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf.max(1)
            || sse <= f64::EPSILON * n as f64
        {
            return idx;
        }

        let Some(best) = self.best_split(&samples) else {
            return idx;
        };
        if best.sse >= sse {
            return idx;
        }

        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&s| self.x[s][best.feature] <= best.threshold);
        if left_samples.is_empty() || right_samples.is_empty() {
            return idx;
        }

        let left = self.grow(nodes, left_samples, depth + 1);
        let right = self.grow(nodes, right_samples, depth + 1);
        nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }

    fn moments(&self, samples: &[usize]) -> (f64, f64) {
        if samples.is_empty() {
            return (0.0, 0.0);
        }
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&s| self.y[s]).sum::<f64>() / n;
        let sse = samples
            .iter()
            .map(|&s| (self.y[s] - mean).powi(2))
            .sum::<f64>();
        (mean, sse)
    }

    fn best_split(&self, samples: &[usize]) -> Option<SplitCandidate> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;
        let mut order = samples.to_vec();

        for &feature in self.features {
            order.sort_by(|&a, &b| self.x[a][feature].total_cmp(&self.x[b][feature]));

            let total: f64 = order.iter().map(|&s| self.y[s]).sum();
            let total_sq: f64 = order.iter().map(|&s| self.y[s] * self.y[s]).sum();
            let mut left_sum = 0.0;
            let mut left_sq = 0.0;

            for k in 1..n {
                let prev = order[k - 1];
                left_sum += self.y[prev];
                left_sq += self.y[prev] * self.y[prev];

                if k < min_leaf || n - k < min_leaf {
                    continue;
                }
                let lo = self.x[prev][feature];
                let hi = self.x[order[k]][feature];
                if lo >= hi {
                    continue;
                }

                let nl = k as f64;
                let nr = (n - k) as f64;
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let sse = (left_sq - left_sum * left_sum / nl)
                    + (right_sq - right_sum * right_sum / nr);

                if best.as_ref().is_none_or(|b| sse < b.sse) {
                    let mid = lo + (hi - lo) / 2.0;
                    // Midpoint can round onto `hi` for adjacent floats.
                    let threshold = if mid < hi { mid } else { lo };
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        sse,
                    });
                }
            }
        }
        best
    }
}
