use std::sync::Arc;

use crate::boundary::{Boundary, BoundarySegment};
use crate::geometry::Envelope;
use crate::pedestrian::{Crowd, PedestrianSnapshot};

const NODE_CAPACITY: usize = 16;
const MAX_DEPTH: usize = 8;

/// Envelope-keyed quadtree. Queries are a primary filter: every item whose
/// envelope intersects the query envelope is returned, possibly along with
/// false positives; exact predicates are the caller's job.
#[derive(Debug, Clone)]
pub struct Quadtree<T> {
    root: Option<Node<T>>,
    len: usize,
}

#[derive(Debug, Clone)]
struct Node<T> {
    envelope: Envelope,
    items: Vec<(Envelope, T)>,
    children: Option<Box<[Node<T>; 4]>>,
    depth: usize,
}

impl<T> Default for Quadtree<T> {
    fn default() -> Self {
        Quadtree::new()
    }
}

impl<T> Quadtree<T> {
    pub fn new() -> Self {
        Quadtree { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn insert(&mut self, envelope: Envelope, item: T) {
        if !envelope.is_finite() {
            return;
        }
        self.len += 1;

        match &mut self.root {
            None => {
                let mut node = Node::new(envelope, 0);
                node.insert(envelope, item);
                self.root = Some(node);
            }
            Some(root) if root.envelope.contains_envelope(&envelope) => {
                root.insert(envelope, item);
            }
            Some(_) => {
                // Out-of-extent insert: grow the root and redistribute.
                let old = self.root.take().expect("root checked above");
                let grown = old.envelope.expand_to_include(&envelope);
                let mut node = Node::new(grown, 0);
                let mut drained = Vec::with_capacity(self.len);
                old.drain_into(&mut drained);
                for (env, it) in drained {
                    node.insert(env, it);
                }
                node.insert(envelope, item);
                self.root = Some(node);
            }
        }
    }

    pub fn query(&self, envelope: &Envelope) -> Vec<&T> {
        let mut found = Vec::new();
        if let Some(root) = &self.root {
            root.query(envelope, &mut found);
        }
        found
    }
}

impl<T> Node<T> {
    fn new(envelope: Envelope, depth: usize) -> Self {
        Node {
            envelope,
            items: Vec::new(),
            children: None,
            depth,
        }
    }

    fn quadrants(&self) -> [Envelope; 4] {
        let c = self.envelope.center();
        let e = &self.envelope;
        [
            Envelope { min_x: e.min_x, min_y: e.min_y, max_x: c.x, max_y: c.y },
            Envelope { min_x: c.x, min_y: e.min_y, max_x: e.max_x, max_y: c.y },
            Envelope { min_x: e.min_x, min_y: c.y, max_x: c.x, max_y: e.max_y },
            Envelope { min_x: c.x, min_y: c.y, max_x: e.max_x, max_y: e.max_y },
        ]
    }

    fn insert(&mut self, envelope: Envelope, item: T) {
        if let Some(children) = &mut self.children {
            for child in children.iter_mut() {
                if child.envelope.contains_envelope(&envelope) {
                    child.insert(envelope, item);
                    return;
                }
            }
            // Straddles the split: stays at this node.
            self.items.push((envelope, item));
            return;
        }

        self.items.push((envelope, item));

        if self.items.len() > NODE_CAPACITY && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    fn split(&mut self) {
        let depth = self.depth + 1;
        let mut children = Box::new(self.quadrants().map(|env| Node::new(env, depth)));

        let mut keep = Vec::new();
        for (envelope, item) in self.items.drain(..) {
            let child = children
                .iter_mut()
                .find(|c| c.envelope.contains_envelope(&envelope));
            match child {
                Some(c) => c.insert(envelope, item),
                None => keep.push((envelope, item)),
            }
        }
        self.items = keep;
        self.children = Some(children);
    }

    fn query<'a>(&'a self, envelope: &Envelope, found: &mut Vec<&'a T>) {
        if !self.envelope.intersects(envelope) {
            return;
        }
        for (item_env, item) in &self.items {
            if item_env.intersects(envelope) {
                found.push(item);
            }
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(envelope, found);
            }
        }
    }

    fn drain_into(self, out: &mut Vec<(Envelope, T)>) {
        out.extend(self.items);
        if let Some(children) = self.children {
            let children: [Node<T>; 4] = *children;
            for child in children {
                child.drain_into(out);
            }
        }
    }
}

/// The three logical spatial indexes of a scene.
///
/// The pedestrian tree is replaced wholesale every tick from immutable
/// snapshots so force evaluation reads a frozen view; the boundary trees are
/// append-only.
#[derive(Debug, Default, Clone)]
pub struct SceneIndex {
    pedestrians: Quadtree<PedestrianSnapshot>,
    boundaries: Quadtree<Arc<Boundary>>,
    boundary_segments: Quadtree<BoundarySegment>,
}

impl SceneIndex {
    pub fn new() -> Self {
        SceneIndex::default()
    }

    pub fn add_boundary(&mut self, boundary: Arc<Boundary>) {
        for segment in boundary.segments() {
            self.boundary_segments
                .insert(segment.envelope(), segment.clone());
        }
        self.boundaries.insert(boundary.envelope(), boundary);
    }

    /// Discard the pedestrian tree and repopulate it from copies of the
    /// current crowd state. `reach` is the pedestrian interaction distance
    /// the per-item envelopes are expanded by.
    pub fn update_crowds(&mut self, crowds: &[Crowd], reach: f32) {
        let mut fresh = Quadtree::new();
        for crowd in crowds {
            for pedestrian in crowd.pedestrians() {
                fresh.insert(pedestrian.envelope(reach), pedestrian.snapshot());
            }
        }
        self.pedestrians = fresh;
    }

    pub fn pedestrians_within(&self, envelope: &Envelope) -> Vec<&PedestrianSnapshot> {
        self.pedestrians.query(envelope)
    }

    pub fn boundaries_within(&self, envelope: &Envelope) -> Vec<&Arc<Boundary>> {
        self.boundaries.query(envelope)
    }

    pub fn boundary_segments_within(&self, envelope: &Envelope) -> Vec<&BoundarySegment> {
        self.boundary_segments.query(envelope)
    }
}

#[cfg(test)]
mod tests {
    use glam::vec2;

    use super::*;

    fn random_envelope(rng: &mut fastrand::Rng) -> Envelope {
        let x = rng.f32() * 100.0;
        let y = rng.f32() * 100.0;
        let w = rng.f32() * 10.0;
        let h = rng.f32() * 10.0;
        Envelope::of_segment(vec2(x, y), vec2(x + w, y + h))
    }

    #[test]
    fn test_query_is_primary_filter() {
        let mut rng = fastrand::Rng::with_seed(42);
        let envelopes: Vec<Envelope> = (0..200).map(|_| random_envelope(&mut rng)).collect();

        let mut tree = Quadtree::new();
        for (i, env) in envelopes.iter().enumerate() {
            tree.insert(*env, i);
        }
        assert_eq!(tree.len(), envelopes.len());

        for _ in 0..50 {
            let query = random_envelope(&mut rng);
            let result: Vec<usize> = tree.query(&query).into_iter().copied().collect();

            // Superset of the exact intersectors.
            for (i, env) in envelopes.iter().enumerate() {
                if env.intersects(&query) {
                    assert!(result.contains(&i), "missing item {i}");
                }
            }
            // Subset of the population.
            assert!(result.len() <= envelopes.len());
            for i in &result {
                assert!(*i < envelopes.len());
            }
        }
    }

    #[test]
    fn test_grows_beyond_initial_extent() {
        let mut tree = Quadtree::new();
        tree.insert(Envelope::point(vec2(0.0, 0.0)), 'a');
        tree.insert(Envelope::point(vec2(1000.0, -500.0)), 'b');

        let hits = tree.query(&Envelope::point(vec2(1000.0, -500.0)).expand_by(0.5));
        assert_eq!(hits, vec![&'b']);
    }

    #[test]
    fn test_split_keeps_straddling_items() {
        let mut tree = Quadtree::new();
        let world = Envelope::of_segment(vec2(0.0, 0.0), vec2(64.0, 64.0));
        tree.insert(world, usize::MAX);
        for i in 0..64 {
            let p = vec2((i % 8) as f32 * 8.0 + 1.0, (i / 8) as f32 * 8.0 + 1.0);
            tree.insert(Envelope::point(p).expand_by(0.25), i);
        }

        // The world-sized item straddles every split and must still be found.
        let hits = tree.query(&Envelope::point(vec2(33.0, 33.0)).expand_by(0.1));
        assert!(hits.contains(&&usize::MAX));
    }
}
