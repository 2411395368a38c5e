//! Spatial Index
//!
//! Bounding-box R-tree over the features of one dataset. Queries return a
//! superset of candidates; exact geometric tests are the caller's job.
//! An index is bulk loaded once and never patched.

use geo::{Coord, Rect};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::model::{Feature, FeatureKey, LayerId};

type Entry = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// R-tree of feature slots keyed by bounding box.
#[derive(Debug)]
pub struct SpatialIndex {
    tree: RTree<Entry>,
}

impl SpatialIndex {
    /// Bulk load an index over `features`; a slot is the feature's position.
    pub fn build(features: &[Feature]) -> Self {
        let entries: Vec<Entry> = features
            .iter()
            .enumerate()
            .filter_map(|(slot, feature)| {
                let rect = feature.geometry.bounding_rect()?;
                Some(GeomWithData::new(
                    Rectangle::from_corners(corner(rect.min()), corner(rect.max())),
                    slot,
                ))
            })
            .collect();

        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Slots whose bounding box intersects `bbox`, in ascending order.
    pub fn query(&self, bbox: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(corner(bbox.min()), corner(bbox.max()));
        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        slots.sort_unstable();
        slots
    }

    /// Slots whose bounding box comes within `radius` of `center`.
    pub fn query_around(&self, center: Coord<f64>, radius: f64) -> Vec<usize> {
        let bbox = Rect::new(
            Coord {
                x: center.x - radius,
                y: center.y - radius,
            },
            Coord {
                x: center.x + radius,
                y: center.y + radius,
            },
        );
        self.query(&bbox)
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

fn corner(c: Coord<f64>) -> [f64; 2] {
    [c.x, c.y]
}

/// One comparable dataset: normalized features, their origin keys and index.
#[derive(Debug)]
pub struct IndexedLayer {
    pub id: LayerId,
    pub features: Vec<Feature>,
    pub keys: Vec<FeatureKey>,
    pub index: SpatialIndex,
}

impl IndexedLayer {
    pub fn build(id: LayerId, features: Vec<Feature>) -> Self {
        let keys = features.iter().map(|f| f.key(&id)).collect();
        let index = SpatialIndex::build(&features);
        Self {
            id,
            features,
            keys,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Candidate slots near the bounding box of `feature`, expanded by `margin`.
    pub fn candidates(&self, feature: &Feature, margin: f64) -> Vec<usize> {
        match feature.geometry.bounding_rect() {
            Some(rect) => {
                let grown = Rect::new(
                    Coord {
                        x: rect.min().x - margin,
                        y: rect.min().y - margin,
                    },
                    Coord {
                        x: rect.max().x + margin,
                        y: rect.max().y + margin,
                    },
                );
                self.index.query(&grown)
            }
            None => Vec::new(),
        }
    }
}
