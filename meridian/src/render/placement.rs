use meridian_types::BoundingBox;

/// Constraints of a single label or marker placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementRules {
    /// Place even if the box collides with already placed boxes.
    pub allow_overlap: bool,
    /// Refuse boxes that are not fully inside the image.
    pub avoid_edges: bool,
    /// Minimal distance to other boxes in pixels.
    pub min_distance: f64,
    /// Whether the placed box blocks later placements.
    pub reserve: bool,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            allow_overlap: false,
            avoid_edges: false,
            min_distance: 0.0,
            reserve: true,
        }
    }
}

/// Collision detection of labels and markers.
///
/// Keeps the pixel boxes of everything placed so far. Symbolizers ask it for room before drawing
/// point-like things.
#[derive(Debug, Clone)]
pub struct PlacementArbiter {
    extent: BoundingBox,
    boxes: Vec<BoundingBox>,
}

impl PlacementArbiter {
    /// Creates an arbiter for an image of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: BoundingBox::new(0.0, 0.0, width as f64, height as f64),
            boxes: Vec::new(),
        }
    }

    /// Forgets every placed box.
    pub fn clear(&mut self) {
        self.boxes.clear();
    }

    /// Number of placed boxes.
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Returns true if nothing is placed.
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Returns true if the box can be placed under the rules.
    pub fn has_room(&self, bbox: &BoundingBox, rules: &PlacementRules) -> bool {
        if rules.avoid_edges && !self.extent.contains_box(bbox) {
            return false;
        }

        if rules.allow_overlap {
            return true;
        }

        let grown = bbox.buffered(rules.min_distance.max(0.0));
        !self.boxes.iter().any(|placed| placed.intersects(&grown))
    }

    /// Places the box if there is room for it. Returns whether it was placed.
    pub fn try_place(&mut self, bbox: BoundingBox, rules: &PlacementRules) -> bool {
        if !self.has_room(&bbox, rules) {
            return false;
        }

        if rules.reserve {
            self.boxes.push(bbox);
        }
        true
    }
}
