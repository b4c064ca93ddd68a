use crate::db::indices::{ItemId, NetId};
use crate::geom::line::{FloatLine, GEOM_TOLERANCE};
use crate::geom::point::Point;
use crate::geom::rect::Rect;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::ops::RangeInclusive;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    Pin,
    Via,
    Trace,
    ConductionArea,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemShape {
    Pin {
        center: Point<f64>,
        first_layer: u8,
        last_layer: u8,
    },
    Via {
        center: Point<f64>,
        first_layer: u8,
        last_layer: u8,
    },
    Trace {
        line: FloatLine,
        layer: u8,
        width: f64,
    },
    ConductionArea {
        area: Rect,
        layer: u8,
    },
}

/// Which dangling route items survive a tail removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopConnectionOption {
    /// Everything not connected at both ends goes.
    None,
    /// Vias hanging off a single trace are kept as fanout stubs.
    FanoutVia,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub nets: Vec<NetId>,
    #[serde(flatten)]
    pub shape: ItemShape,
}

impl Item {
    pub fn kind(&self) -> ItemKind {
        match self.shape {
            ItemShape::Pin { .. } => ItemKind::Pin,
            ItemShape::Via { .. } => ItemKind::Via,
            ItemShape::Trace { .. } => ItemKind::Trace,
            ItemShape::ConductionArea { .. } => ItemKind::ConductionArea,
        }
    }

    /// Traces and vias are routes; pins and planes are terminals.
    pub fn is_route(&self) -> bool {
        matches!(self.kind(), ItemKind::Trace | ItemKind::Via)
    }

    pub fn is_drill_item(&self) -> bool {
        matches!(self.kind(), ItemKind::Pin | ItemKind::Via)
    }

    pub fn is_conduction_area(&self) -> bool {
        self.kind() == ItemKind::ConductionArea
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    pub fn contains_net(&self, net: NetId) -> bool {
        self.nets.contains(&net)
    }

    pub fn shares_net(&self, other: &Item) -> bool {
        self.nets.iter().any(|n| other.nets.contains(n))
    }

    pub fn center(&self) -> Option<Point<f64>> {
        match self.shape {
            ItemShape::Pin { center, .. } | ItemShape::Via { center, .. } => Some(center),
            _ => None,
        }
    }

    pub fn layers(&self) -> RangeInclusive<u8> {
        match self.shape {
            ItemShape::Pin {
                first_layer,
                last_layer,
                ..
            }
            | ItemShape::Via {
                first_layer,
                last_layer,
                ..
            } => first_layer..=last_layer,
            ItemShape::Trace { layer, .. } | ItemShape::ConductionArea { layer, .. } => {
                layer..=layer
            }
        }
    }

    pub fn is_on_layer(&self, layer: u8) -> bool {
        self.layers().contains(&layer)
    }

    pub fn trace_line(&self) -> Option<(FloatLine, u8)> {
        match self.shape {
            ItemShape::Trace { line, layer, .. } => Some((line, layer)),
            _ => None,
        }
    }

    pub fn bounding_box(&self) -> Rect {
        match self.shape {
            ItemShape::Pin { center, .. } | ItemShape::Via { center, .. } => {
                Rect::new(center, center)
            }
            ItemShape::Trace { line, width, .. } => line.bounding_box().expand(width * 0.5),
            ItemShape::ConductionArea { area, .. } => area,
        }
    }

    /// True if `p` on `layer` is an electrical contact point of this item.
    pub fn touches_point(&self, p: Point<f64>, layer: u8) -> bool {
        if !self.is_on_layer(layer) {
            return false;
        }
        match self.shape {
            ItemShape::Pin { center, .. } | ItemShape::Via { center, .. } => {
                center.approx_eq(p, GEOM_TOLERANCE)
            }
            ItemShape::Trace { line, .. } => line.has_endpoint(p),
            ItemShape::ConductionArea { area, .. } => area.expand(GEOM_TOLERANCE).contains(p),
        }
    }

    /// Geometric contact on a common layer. Net membership is not checked.
    pub fn touches(&self, other: &Item) -> bool {
        match (&self.shape, &other.shape) {
            (ItemShape::Trace { line, layer, .. }, _) => {
                other.touches_point(line.a, *layer) || other.touches_point(line.b, *layer)
            }
            (_, ItemShape::Trace { .. }) => other.touches(self),
            (
                ItemShape::ConductionArea { area: a, layer: la },
                ItemShape::ConductionArea { area: b, layer: lb },
            ) => la == lb && a.overlaps(b),
            (ItemShape::ConductionArea { area, layer }, _) => other
                .center()
                .is_some_and(|c| other.is_on_layer(*layer) && area.contains(c)),
            (_, ItemShape::ConductionArea { .. }) => other.touches(self),
            _ => match (self.center(), other.center()) {
                (Some(a), Some(b)) => {
                    a.approx_eq(b, GEOM_TOLERANCE)
                        && self.layers().into_iter().any(|l| other.is_on_layer(l))
                }
                _ => false,
            },
        }
    }

    /// Stable textual form used for board fingerprints. Ids are left out so that
    /// identical geometry hashes identically.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        let mut nets: Vec<u32> = self.nets.iter().map(|n| n.0).collect();
        nets.sort_unstable();
        let _ = write!(out, "{:?}{:?}", self.kind(), nets);
        match self.shape {
            ItemShape::Pin {
                center,
                first_layer,
                last_layer,
            }
            | ItemShape::Via {
                center,
                first_layer,
                last_layer,
            } => {
                let _ = write!(
                    out,
                    "({:.4},{:.4})[{}-{}]",
                    center.x, center.y, first_layer, last_layer
                );
            }
            ItemShape::Trace { line, layer, width } => {
                let (p, q) = ordered_endpoints(&line);
                let _ = write!(
                    out,
                    "({:.4},{:.4})-({:.4},{:.4})@{}w{:.4}",
                    p.x, p.y, q.x, q.y, layer, width
                );
            }
            ItemShape::ConductionArea { area, layer } => {
                let _ = write!(
                    out,
                    "({:.4},{:.4})-({:.4},{:.4})@{}",
                    area.min.x, area.min.y, area.max.x, area.max.y, layer
                );
            }
        }
        out
    }
}

/// Endpoints in lexicographic order so a trace and its reverse compare equal.
pub fn ordered_endpoints(line: &FloatLine) -> (Point<f64>, Point<f64>) {
    if (line.a.x, line.a.y) <= (line.b.x, line.b.y) {
        (line.a, line.b)
    } else {
        (line.b, line.a)
    }
}
