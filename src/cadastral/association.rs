//! Point to polygon association through id fields.

use std::collections::HashMap;

use crate::index::IndexedLayer;

/// How one point relates to the polygon layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointLink {
    /// Null or missing id: not checked.
    NoId,
    Unmatched,
    Unique(usize),
    Ambiguous(Vec<usize>),
}

#[derive(Debug)]
pub struct Association {
    /// Indexed by point slot.
    pub links: Vec<PointLink>,
    /// Uniquely associated point slots, indexed by polygon slot.
    pub polygon_points: Vec<Vec<usize>>,
    /// Whether each polygon carries a usable id.
    pub polygon_has_id: Vec<bool>,
}

impl Association {
    pub fn build(points: &IndexedLayer, polygons: &IndexedLayer, point_field: &str, polygon_field: &str) -> Self {
        let mut by_id: HashMap<String, Vec<usize>> = HashMap::new();
        let mut polygon_has_id = Vec::with_capacity(polygons.len());
        for (slot, polygon) in polygons.features.iter().enumerate() {
            match polygon.attribute_key(polygon_field) {
                Some(id) => {
                    by_id.entry(id).or_default().push(slot);
                    polygon_has_id.push(true);
                }
                None => polygon_has_id.push(false),
            }
        }

        let mut polygon_points = vec![Vec::new(); polygons.len()];
        let links = points
            .features
            .iter()
            .enumerate()
            .map(|(slot, point)| {
                let Some(id) = point.attribute_key(point_field) else {
                    return PointLink::NoId;
                };
                match by_id.get(&id).map(Vec::as_slice) {
                    None | Some([]) => PointLink::Unmatched,
                    Some([polygon]) => {
                        polygon_points[*polygon].push(slot);
                        PointLink::Unique(*polygon)
                    }
                    Some(many) => PointLink::Ambiguous(many.to_vec()),
                }
            })
            .collect();

        Self {
            links,
            polygon_points,
            polygon_has_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Crs, Feature, Geometry, LayerId};

    #[test]
    fn test_links() {
        let polygons = IndexedLayer::build(
            LayerId::from("parcels"),
            vec![
                Feature::new("a", Geometry::rect((0.0, 0.0), (1.0, 1.0), Crs::default())).with_attribute("num", 1i64),
                Feature::new("b", Geometry::rect((2.0, 0.0), (3.0, 1.0), Crs::default())).with_attribute("num", 2i64),
                Feature::new("c", Geometry::rect((4.0, 0.0), (5.0, 1.0), Crs::default())).with_attribute("num", 2i64),
            ],
        );
        let points = IndexedLayer::build(
            LayerId::from("markers"),
            vec![
                Feature::new("1", Geometry::point(0.0, 0.0, Crs::default())).with_attribute("parcel", "1"),
                Feature::new("2", Geometry::point(2.0, 0.0, Crs::default())).with_attribute("parcel", 2.0),
                Feature::new("3", Geometry::point(9.0, 0.0, Crs::default())).with_attribute("parcel", "7"),
                Feature::new("4", Geometry::point(9.0, 0.0, Crs::default())),
            ],
        );

        let assoc = Association::build(&points, &polygons, "parcel", "num");
        assert_eq!(assoc.links[0], PointLink::Unique(0));
        assert_eq!(assoc.links[1], PointLink::Ambiguous(vec![1, 2]));
        assert_eq!(assoc.links[2], PointLink::Unmatched);
        assert_eq!(assoc.links[3], PointLink::NoId);
        assert_eq!(assoc.polygon_points[0], vec![0]);
        assert!(assoc.polygon_points[1].is_empty());
    }
}
