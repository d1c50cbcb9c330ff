use serde::{Deserialize, Serialize};

use crate::{BoundingBox, Point2d};

/// Type of a geometry, determining how its vertex stream is interpreted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    /// One or more separate points. Every vertex is a point.
    Point,
    /// One or more line strings, each starting with a [`VertexCommand::MoveTo`].
    LineString,
    /// One or more rings, each starting with a [`VertexCommand::MoveTo`]. Rings are implicitly closed.
    Polygon,
}

/// Drawing command attached to a vertex.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexCommand {
    /// Starts a new part of the geometry.
    MoveTo,
    /// Continues the current part.
    LineTo,
}

/// Single vertex of a [`Geometry`].
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// X coordinate (longitude for geographic data).
    pub x: f64,
    /// Y coordinate (latitude for geographic data).
    pub y: f64,
    /// Command of the vertex.
    pub command: VertexCommand,
}

impl Vertex {
    /// Creates a new vertex.
    pub fn new(x: f64, y: f64, command: VertexCommand) -> Self {
        Self { x, y, command }
    }

    /// Position of the vertex.
    pub fn point(&self) -> Point2d {
        Point2d::new(self.x, self.y)
    }
}

/// Typed stream of vertices.
///
/// A geometry can be iterated any number of times. Multi-part geometries are expressed with several
/// [`VertexCommand::MoveTo`] vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    kind: GeometryKind,
    vertices: Vec<Vertex>,
}

impl Geometry {
    /// Creates an empty geometry of the given kind.
    pub fn new(kind: GeometryKind) -> Self {
        Self {
            kind,
            vertices: Vec::new(),
        }
    }

    /// Creates a single point geometry.
    pub fn point(x: f64, y: f64) -> Self {
        let mut geometry = Self::new(GeometryKind::Point);
        geometry.move_to(x, y);
        geometry
    }

    /// Creates a line string from the list of points.
    pub fn line_string(points: &[(f64, f64)]) -> Self {
        let mut geometry = Self::new(GeometryKind::LineString);
        geometry.push_part(points);
        geometry
    }

    /// Creates a polygon from a list of rings. The first ring is the exterior.
    ///
    /// Rings may be given closed (last point equal to the first one) or open.
    pub fn polygon(rings: &[&[(f64, f64)]]) -> Self {
        let mut geometry = Self::new(GeometryKind::Polygon);
        for ring in rings {
            let ring = match (ring.first(), ring.last()) {
                (Some(first), Some(last)) if ring.len() > 1 && first == last => {
                    &ring[..ring.len() - 1]
                }
                _ => ring,
            };
            geometry.push_part(ring);
        }
        geometry
    }

    fn push_part(&mut self, points: &[(f64, f64)]) {
        for (index, (x, y)) in points.iter().enumerate() {
            if index == 0 {
                self.move_to(*x, *y);
            } else {
                self.line_to(*x, *y);
            }
        }
    }

    /// Type of the geometry.
    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Appends a vertex starting a new part.
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.vertices
            .push(Vertex::new(x, y, VertexCommand::MoveTo));
    }

    /// Appends a vertex continuing the current part.
    pub fn line_to(&mut self, x: f64, y: f64) {
        self.vertices
            .push(Vertex::new(x, y, VertexCommand::LineTo));
    }

    /// Number of vertices.
    pub fn num_points(&self) -> usize {
        self.vertices.len()
    }

    /// All vertices of the geometry.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Iterates over the vertices. Can be called any number of times.
    pub fn iter(&self) -> impl Iterator<Item = &Vertex> + '_ {
        self.vertices.iter()
    }

    /// Splits the vertex stream into parts, each starting at a `MoveTo` vertex.
    ///
    /// For polygons the parts are rings, for line strings separate lines. A stream that doesn't
    /// start with a `MoveTo` is treated as if it did.
    pub fn rings(&self) -> impl Iterator<Item = &[Vertex]> + '_ {
        let mut start = 0;
        let vertices = &self.vertices;
        std::iter::from_fn(move || {
            if start >= vertices.len() {
                return None;
            }

            let end = vertices[start + 1..]
                .iter()
                .position(|v| v.command == VertexCommand::MoveTo)
                .map(|offset| start + 1 + offset)
                .unwrap_or(vertices.len());
            let part = &vertices[start..end];
            start = end;
            Some(part)
        })
    }

    /// Bounding box of all vertices, or `None` for an empty geometry.
    pub fn envelope(&self) -> Option<BoundingBox> {
        let mut iter = self.vertices.iter();
        let first = iter.next()?;
        let mut bbox = BoundingBox::from_point(&first.point());
        for v in iter {
            bbox.expand_to_include(&v.point());
        }

        Some(bbox)
    }

    /// Returns true if the point hits the geometry.
    ///
    /// Points and lines are hit when the point is within `tolerance` of them; polygons when the point
    /// is inside by the even-odd rule or within `tolerance` of the boundary.
    pub fn contains_point(&self, point: &Point2d, tolerance: f64) -> bool {
        match self.kind {
            GeometryKind::Point => self
                .vertices
                .iter()
                .any(|v| (v.point() - point).norm() <= tolerance),
            GeometryKind::LineString => self.rings().any(|part| {
                part.windows(2)
                    .any(|w| segment_distance(point, &w[0].point(), &w[1].point()) <= tolerance)
            }),
            GeometryKind::Polygon => {
                let mut inside = false;
                for ring in self.rings() {
                    let n = ring.len();
                    for i in 0..n {
                        let a = ring[i].point();
                        let b = ring[(i + 1) % n].point();
                        if segment_distance(point, &a, &b) <= tolerance {
                            return true;
                        }
                        if (a.y > point.y) != (b.y > point.y)
                            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
                        {
                            inside = !inside;
                        }
                    }
                }
                inside
            }
        }
    }

    /// Position where a label for the geometry should be anchored.
    ///
    /// For points it is the first point, for lines the middle of the first line by length, and for
    /// polygons the centroid of the exterior ring (falling back to the envelope center for degenerate
    /// rings).
    pub fn label_position(&self) -> Option<Point2d> {
        match self.kind {
            GeometryKind::Point => self.vertices.first().map(Vertex::point),
            GeometryKind::LineString => {
                let part = self.rings().next()?;
                let length: f64 = part
                    .windows(2)
                    .map(|w| (w[1].point() - w[0].point()).norm())
                    .sum();
                let mut remaining = length / 2.0;
                for w in part.windows(2) {
                    let (a, b) = (w[0].point(), w[1].point());
                    let segment = (b - a).norm();
                    if segment >= remaining && segment > 0.0 {
                        return Some(a + (b - a) * (remaining / segment));
                    }
                    remaining -= segment;
                }
                part.first().map(Vertex::point)
            }
            GeometryKind::Polygon => {
                let ring = self.rings().next()?;
                let n = ring.len();
                let mut area = 0.0;
                let mut cx = 0.0;
                let mut cy = 0.0;
                for i in 0..n {
                    let a = ring[i];
                    let b = ring[(i + 1) % n];
                    let cross = a.x * b.y - b.x * a.y;
                    area += cross;
                    cx += (a.x + b.x) * cross;
                    cy += (a.y + b.y) * cross;
                }

                if area.abs() < f64::EPSILON {
                    return self.envelope().map(|bbox| bbox.center());
                }

                Some(Point2d::new(cx / (3.0 * area), cy / (3.0 * area)))
            }
        }
    }

    /// Returns a new geometry with every vertex converted by `f`. Returns `None` if `f` fails for
    /// any vertex.
    pub fn transform<F>(&self, mut f: F) -> Option<Geometry>
    where
        F: FnMut(f64, f64) -> Option<(f64, f64)>,
    {
        let vertices = self
            .vertices
            .iter()
            .map(|v| f(v.x, v.y).map(|(x, y)| Vertex::new(x, y, v.command)))
            .collect::<Option<Vec<_>>>()?;

        Some(Geometry {
            kind: self.kind,
            vertices,
        })
    }
}

fn segment_distance(p: &Point2d, a: &Point2d, b: &Point2d) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }

    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::polygon(&[&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0)]])
    }

    #[test]
    fn polygon_drops_closing_vertex() {
        let polygon = square();
        assert_eq!(polygon.num_points(), 4);
        assert_eq!(polygon.vertices()[0].command, VertexCommand::MoveTo);
        assert_eq!(polygon.vertices()[3].command, VertexCommand::LineTo);
    }

    #[test]
    fn rings_split_on_move_to() {
        let polygon = Geometry::polygon(&[
            &[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
            &[(1.0, 1.0), (2.0, 1.0), (2.0, 2.0)],
        ]);
        let rings: Vec<_> = polygon.rings().collect();
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[1][0].x, 1.0);

        // Iteration can be repeated.
        assert_eq!(polygon.rings().count(), 2);
    }

    #[test]
    fn contains_point() {
        let polygon = square();
        assert!(polygon.contains_point(&Point2d::new(5.0, 5.0), 0.0));
        assert!(!polygon.contains_point(&Point2d::new(15.0, 5.0), 0.0));
        assert!(polygon.contains_point(&Point2d::new(10.5, 5.0), 1.0));

        let line = Geometry::line_string(&[(0.0, 0.0), (10.0, 0.0)]);
        assert!(line.contains_point(&Point2d::new(5.0, 0.5), 1.0));
        assert!(!line.contains_point(&Point2d::new(5.0, 2.0), 1.0));
    }

    #[test]
    fn label_positions() {
        let center = square().label_position().unwrap();
        assert!((center.x - 5.0).abs() < 1e-10);
        assert!((center.y - 5.0).abs() < 1e-10);

        let line = Geometry::line_string(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert_eq!(line.label_position(), Some(Point2d::new(10.0, 0.0)));
    }

    #[test]
    fn transform_keeps_commands() {
        let moved = square().transform(|x, y| Some((x + 1.0, y * 2.0))).unwrap();
        assert_eq!(moved.vertices()[2], Vertex::new(11.0, 20.0, VertexCommand::LineTo));
        assert!(square().transform(|_, _| None).is_none());
    }
}
