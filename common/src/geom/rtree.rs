use super::rect::Rect;
use crate::db::indices::ItemId;
use rstar::{AABB, RTree};

pub struct SpatialIndex {
    tree: RTree<IndexedRect>,
}

struct IndexedRect {
    rect: Rect,
    id: ItemId,
}

impl rstar::RTreeObject for IndexedRect {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.min.x, self.rect.min.y],
            [self.rect.max.x, self.rect.max.y],
        )
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn bulk_load(entries: impl IntoIterator<Item = (Rect, ItemId)>) -> Self {
        let objects = entries
            .into_iter()
            .map(|(rect, id)| IndexedRect { rect, id })
            .collect();
        Self {
            tree: RTree::bulk_load(objects),
        }
    }

    pub fn insert(&mut self, rect: Rect, id: ItemId) {
        self.tree.insert(IndexedRect { rect, id });
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Ids of every entry whose box intersects `rect`, in ascending order.
    pub fn query(&self, rect: Rect) -> Vec<ItemId> {
        let aabb = AABB::from_corners([rect.min.x, rect.min.y], [rect.max.x, rect.max.y]);
        let mut ids: Vec<ItemId> = self
            .tree
            .locate_in_envelope_intersecting(&aabb)
            .map(|item| item.id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::point::Point;

    #[test]
    fn test_query_returns_intersecting_ids() {
        let index = SpatialIndex::bulk_load([
            (Rect::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0)), ItemId(1)),
            (Rect::new(Point::new(5.0, 5.0), Point::new(6.0, 6.0)), ItemId(2)),
            (Rect::new(Point::new(0.5, 0.5), Point::new(2.0, 2.0)), ItemId(3)),
        ]);
        let hits = index.query(Rect::new(Point::new(0.9, 0.9), Point::new(1.5, 1.5)));
        assert_eq!(hits, vec![ItemId(1), ItemId(3)]);
        assert_eq!(index.len(), 3);
    }
}
