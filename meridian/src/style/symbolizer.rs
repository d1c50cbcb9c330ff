//! The closed set of symbolizers.
//!
//! Rendering and serialization both match exhaustively over [`Symbolizer`], so adding a variant is
//! a compile-time checked change in every place that has to know about it.

use std::collections::BTreeSet;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::expression::{Expression, PathExpression};
use crate::style::colorizer::RasterColorizer;
use crate::style::stroke::Stroke;

keyword_enum! {
    /// How a pattern image is aligned when filling a polygon.
    PatternAlignment {
        /// Pattern origin at the polygon's own corner.
        Local => "local",
        /// Pattern origin at the map's corner, so adjacent polygons tile seamlessly.
        Global => "global",
    }
}

keyword_enum! {
    /// Resampling used when drawing rasters.
    RasterScaling {
        /// Nearest neighbour.
        Fast => "fast",
        /// Bilinear interpolation.
        Bilinear => "bilinear",
    }
}

keyword_enum! {
    /// How raster pixels are composited with what is already drawn.
    CompositeMode {
        /// Source over.
        Normal => "normal",
        /// Channels are multiplied.
        Multiply => "multiply",
        /// Inverted channels are multiplied.
        Screen => "screen",
        /// Minimum of each channel.
        Darken => "darken",
        /// Maximum of each channel.
        Lighten => "lighten",
    }
}

keyword_enum! {
    /// Where labels are placed relative to the geometry.
    LabelPlacement {
        /// At the label position of the geometry.
        Point => "point",
        /// Along the lines of the geometry.
        Line => "line",
    }
}

keyword_enum! {
    /// Vertical alignment of a label relative to its anchor.
    VerticalAlignment {
        /// Label above the anchor.
        Top => "top",
        /// Label centered on the anchor.
        Middle => "middle",
        /// Label below the anchor.
        Bottom => "bottom",
    }
}

keyword_enum! {
    /// Horizontal alignment of a label relative to its anchor.
    HorizontalAlignment {
        /// Label to the left of the anchor.
        Left => "left",
        /// Label centered on the anchor.
        Middle => "middle",
        /// Label to the right of the anchor.
        Right => "right",
    }
}

keyword_enum! {
    /// Alignment of lines within a wrapped label.
    JustifyAlignment {
        /// Left aligned lines.
        Left => "left",
        /// Centered lines.
        Center => "center",
        /// Right aligned lines.
        Right => "right",
    }
}

keyword_enum! {
    /// Case conversion applied to label text.
    TextTransform {
        /// Text as is.
        None => "none",
        /// Upper case.
        ToUpper => "toupper",
        /// Lower case.
        ToLower => "tolower",
    }
}

keyword_enum! {
    /// Where markers are placed.
    MarkerPlacement {
        /// One marker at the label position.
        Point => "point",
        /// Markers repeated along lines.
        Line => "line",
    }
}

keyword_enum! {
    /// Built-in marker shapes.
    MarkerType {
        /// Arrow pointing along the line.
        Arrow => "arrow",
        /// Ellipse of the marker's width and height.
        Ellipse => "ellipse",
    }
}

keyword_enum! {
    /// How the angle of a glyph is measured.
    AngleMode {
        /// Clockwise from north.
        Azimuth => "azimuth",
        /// Counter-clockwise from east.
        Trigonometric => "trigonometric",
    }
}

/// Attributes shared by every symbolizer.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SymbolizerBase {
    /// Name of the meta writer recording what this symbolizer draws.
    pub meta_writer: Option<String>,
    /// Attribute names recorded by the meta writer, overriding its default output.
    pub meta_output: Option<String>,
}

/// Font used by a label: either a single face or a named font set.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FontRef {
    /// Face name, e.g. `DejaVu Sans Bold`.
    Face(String),
    /// Name of a [`FontSet`](crate::style::FontSet) of the map.
    FontSet(String),
}

/// Draws an image, or a small square if no file is set, at the label position of the geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointSymbolizer {
    /// Image file.
    pub file: Option<PathExpression>,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Draw even if the point collides with something already placed.
    pub allow_overlap: bool,
    /// Don't reserve space in the placement arbiter.
    pub ignore_placement: bool,
    /// Don't place points whose image crosses the map edge.
    pub avoid_edges: bool,
    /// Affine transform applied to the image, e.g. `scale(2)` or `rotate(45)`.
    pub transform: Option<String>,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

impl Default for PointSymbolizer {
    fn default() -> Self {
        Self {
            file: None,
            opacity: 1.0,
            allow_overlap: false,
            ignore_placement: false,
            avoid_edges: false,
            transform: None,
            base: SymbolizerBase::default(),
        }
    }
}

/// Strokes lines and polygon outlines.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineSymbolizer {
    /// Stroke parameters.
    pub stroke: Stroke,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

/// Draws an image repeatedly along lines.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinePatternSymbolizer {
    /// Pattern image.
    pub file: PathExpression,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

/// Fills polygons with a color.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonSymbolizer {
    /// Fill color.
    pub fill: Color,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Gamma of the anti-aliasing. Values below 1 shrink the edges of the polygon.
    pub gamma: f64,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

impl Default for PolygonSymbolizer {
    fn default() -> Self {
        Self {
            fill: Color::GRAY,
            opacity: 1.0,
            gamma: 1.0,
            base: SymbolizerBase::default(),
        }
    }
}

/// Fills polygons with a repeated image.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PolygonPatternSymbolizer {
    /// Pattern image.
    pub file: PathExpression,
    /// Pattern alignment.
    pub alignment: PatternAlignment,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

/// Draws raster features.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RasterSymbolizer {
    /// Compositing mode.
    pub mode: CompositeMode,
    /// Resampling method.
    pub scaling: RasterScaling,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Colorizer for single band rasters.
    pub colorizer: Option<RasterColorizer>,
}

impl Default for RasterSymbolizer {
    fn default() -> Self {
        Self {
            mode: CompositeMode::Normal,
            scaling: RasterScaling::Fast,
            opacity: 1.0,
            colorizer: None,
        }
    }
}

/// Extrudes polygons into pseudo-3d buildings.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BuildingSymbolizer {
    /// Roof color. Walls are drawn darker.
    pub fill: Color,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Height of the extrusion in pixels at scale factor 1.
    ///
    /// The height does not depend on the map's coordinate system or zoom: it is multiplied by the
    /// map's scale factor and then converted to map units with the vertical resolution of the view.
    pub height: f64,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

impl Default for BuildingSymbolizer {
    fn default() -> Self {
        Self {
            fill: Color::GRAY,
            opacity: 1.0,
            height: 0.0,
            base: SymbolizerBase::default(),
        }
    }
}

/// Label parameters shared by text and shield symbolizers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextProperties {
    /// Text of the label.
    pub name: Expression,
    /// Font of the label.
    pub font: FontRef,
    /// Font size in pixels.
    pub size: f64,
    /// Text color.
    pub fill: Color,
    /// Horizontal displacement of the label in pixels.
    pub dx: f64,
    /// Vertical displacement of the label in pixels, positive is down.
    pub dy: f64,
    /// Placement mode.
    pub placement: LabelPlacement,
    /// Vertical alignment. When not set, it is derived from `dy`.
    pub vertical_alignment: Option<VerticalAlignment>,
    /// Horizontal alignment.
    pub horizontal_alignment: HorizontalAlignment,
    /// Alignment of the lines of a wrapped label.
    pub justify_alignment: JustifyAlignment,
    /// Halo color.
    pub halo_fill: Color,
    /// Halo radius in pixels, `0` for no halo.
    pub halo_radius: f64,
    /// Preferred ratio of label width to height when wrapping. `0` disables it.
    pub text_ratio: u32,
    /// Wrap lines longer than this many pixels. `0` disables wrapping.
    pub wrap_width: u32,
    /// Wrap before the wrap character instead of after it.
    pub wrap_before: bool,
    /// Character at which lines may be broken.
    pub wrap_character: char,
    /// Case conversion.
    pub text_transform: TextTransform,
    /// Additional space between lines in pixels.
    pub line_spacing: f64,
    /// Additional space between characters in pixels.
    pub character_spacing: f64,
    /// Distance between repeated labels along a line in pixels. `0` places one label.
    pub spacing: f64,
    /// Minimal distance to other labels in pixels.
    pub min_distance: f64,
    /// Don't place labels crossing the map edge.
    pub avoid_edges: bool,
    /// Place labels even if they collide with already placed ones.
    pub allow_overlap: bool,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Maximum angle between adjacent characters of a label placed along a line, in degrees.
    pub max_char_angle_delta: f64,
}

impl TextProperties {
    /// Creates text properties with default values for everything but the text and the font.
    pub fn new(name: Expression, font: FontRef) -> Self {
        Self {
            name,
            font,
            size: 10.0,
            fill: Color::BLACK,
            dx: 0.0,
            dy: 0.0,
            placement: LabelPlacement::Point,
            vertical_alignment: None,
            horizontal_alignment: HorizontalAlignment::Middle,
            justify_alignment: JustifyAlignment::Center,
            halo_fill: Color::WHITE,
            halo_radius: 0.0,
            text_ratio: 0,
            wrap_width: 0,
            wrap_before: false,
            wrap_character: ' ',
            text_transform: TextTransform::None,
            line_spacing: 0.0,
            character_spacing: 0.0,
            spacing: 0.0,
            min_distance: 0.0,
            avoid_edges: false,
            allow_overlap: false,
            opacity: 1.0,
            max_char_angle_delta: 22.5,
        }
    }

    /// Vertical alignment to use: the explicit one, or `bottom` for positive `dy`, `top` for
    /// negative `dy` and `middle` otherwise.
    pub fn effective_vertical_alignment(&self) -> VerticalAlignment {
        self.vertical_alignment.unwrap_or(if self.dy > 0.0 {
            VerticalAlignment::Bottom
        } else if self.dy < 0.0 {
            VerticalAlignment::Top
        } else {
            VerticalAlignment::Middle
        })
    }
}

/// Draws text labels.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextSymbolizer {
    /// Label parameters.
    pub text: TextProperties,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

/// Draws an image with a label on top of it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShieldSymbolizer {
    /// Label parameters.
    pub text: TextProperties,
    /// Shield image.
    pub file: PathExpression,
    /// Horizontal displacement of the image in pixels.
    pub shield_dx: f64,
    /// Vertical displacement of the image in pixels.
    pub shield_dy: f64,
    /// Opacity of the text, the image uses `text.opacity`.
    pub text_opacity: f64,
    /// Move the text independently of the image when placing along lines.
    pub unlock_image: bool,
    /// Draw only the image.
    pub no_text: bool,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

/// Draws markers at points or along lines.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MarkersSymbolizer {
    /// Marker image. Built-in shapes are used if not set.
    pub file: Option<PathExpression>,
    /// Opacity in `0..=1`.
    pub opacity: f64,
    /// Fill color of built-in shapes.
    pub fill: Color,
    /// Outline of built-in shapes.
    pub stroke: Option<Stroke>,
    /// Distance between markers along a line in pixels.
    pub spacing: f64,
    /// Tolerance of marker positions along a line, as a fraction of the spacing.
    pub max_error: f64,
    /// Place markers even if they collide with already placed ones.
    pub allow_overlap: bool,
    /// Don't place markers crossing the map edge.
    pub avoid_edges: bool,
    /// Width of built-in shapes in pixels.
    pub width: f64,
    /// Height of built-in shapes in pixels.
    pub height: f64,
    /// Placement mode.
    pub placement: MarkerPlacement,
    /// Built-in shape. When not set: ellipse for point placement, arrow for line placement.
    pub marker_type: Option<MarkerType>,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

impl Default for MarkersSymbolizer {
    fn default() -> Self {
        Self {
            file: None,
            opacity: 1.0,
            fill: Color::BLUE,
            stroke: None,
            spacing: 100.0,
            max_error: 0.2,
            allow_overlap: false,
            avoid_edges: false,
            width: 10.0,
            height: 10.0,
            placement: MarkerPlacement::Point,
            marker_type: None,
            base: SymbolizerBase::default(),
        }
    }
}

impl MarkersSymbolizer {
    /// Shape to draw.
    pub fn effective_marker_type(&self) -> MarkerType {
        self.marker_type.unwrap_or(match self.placement {
            MarkerPlacement::Point => MarkerType::Ellipse,
            MarkerPlacement::Line => MarkerType::Arrow,
        })
    }
}

/// Draws a single font glyph, rotated and colored from feature attributes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlyphSymbolizer {
    /// Face to take the glyph from.
    pub face_name: String,
    /// The character to draw, evaluated to text or to a code point number.
    pub char: Expression,
    /// Rotation in degrees.
    pub angle: Option<Expression>,
    /// Value to color by, used with the colorizer.
    pub value: Option<Expression>,
    /// Size in pixels.
    pub size: Expression,
    /// Color of the glyph, when no colorizer is set.
    pub color: Option<Expression>,
    /// How the angle is measured.
    pub angle_mode: AngleMode,
    /// Halo color.
    pub halo_fill: Color,
    /// Halo radius in pixels.
    pub halo_radius: f64,
    /// Opacity in `0..=1`, applied to the glyph and its halo.
    pub opacity: f64,
    /// Place even if the glyph collides with already placed labels.
    pub allow_overlap: bool,
    /// Don't place glyphs crossing the map edge.
    pub avoid_edges: bool,
    /// Horizontal displacement in pixels.
    pub dx: f64,
    /// Vertical displacement in pixels.
    pub dy: f64,
    /// Colors the glyph from `value`.
    pub colorizer: Option<RasterColorizer>,
    /// Shared attributes.
    pub base: SymbolizerBase,
}

impl GlyphSymbolizer {
    /// Creates a glyph symbolizer with default values for the optional attributes.
    pub fn new(face_name: impl Into<String>, char: Expression, size: Expression) -> Self {
        Self {
            face_name: face_name.into(),
            char,
            angle: None,
            value: None,
            size,
            color: None,
            angle_mode: AngleMode::Trigonometric,
            halo_fill: Color::WHITE,
            halo_radius: 0.0,
            opacity: 1.0,
            allow_overlap: false,
            avoid_edges: false,
            dx: 0.0,
            dy: 0.0,
            colorizer: None,
            base: SymbolizerBase::default(),
        }
    }
}

/// Typed rendering instruction.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Symbolizer {
    /// See [`PointSymbolizer`].
    Point(PointSymbolizer),
    /// See [`LineSymbolizer`].
    Line(LineSymbolizer),
    /// See [`LinePatternSymbolizer`].
    LinePattern(LinePatternSymbolizer),
    /// See [`PolygonSymbolizer`].
    Polygon(PolygonSymbolizer),
    /// See [`PolygonPatternSymbolizer`].
    PolygonPattern(PolygonPatternSymbolizer),
    /// See [`RasterSymbolizer`].
    Raster(RasterSymbolizer),
    /// See [`BuildingSymbolizer`].
    Building(BuildingSymbolizer),
    /// See [`TextSymbolizer`].
    Text(TextSymbolizer),
    /// See [`ShieldSymbolizer`].
    Shield(ShieldSymbolizer),
    /// See [`MarkersSymbolizer`].
    Markers(MarkersSymbolizer),
    /// See [`GlyphSymbolizer`].
    Glyph(GlyphSymbolizer),
}

impl Symbolizer {
    /// Element name of the symbolizer in documents.
    pub fn element_name(&self) -> &'static str {
        match self {
            Symbolizer::Point(_) => "PointSymbolizer",
            Symbolizer::Line(_) => "LineSymbolizer",
            Symbolizer::LinePattern(_) => "LinePatternSymbolizer",
            Symbolizer::Polygon(_) => "PolygonSymbolizer",
            Symbolizer::PolygonPattern(_) => "PolygonPatternSymbolizer",
            Symbolizer::Raster(_) => "RasterSymbolizer",
            Symbolizer::Building(_) => "BuildingSymbolizer",
            Symbolizer::Text(_) => "TextSymbolizer",
            Symbolizer::Shield(_) => "ShieldSymbolizer",
            Symbolizer::Markers(_) => "MarkersSymbolizer",
            Symbolizer::Glyph(_) => "GlyphSymbolizer",
        }
    }

    /// Shared attributes. Raster symbolizers have none.
    pub fn base(&self) -> Option<&SymbolizerBase> {
        match self {
            Symbolizer::Point(s) => Some(&s.base),
            Symbolizer::Line(s) => Some(&s.base),
            Symbolizer::LinePattern(s) => Some(&s.base),
            Symbolizer::Polygon(s) => Some(&s.base),
            Symbolizer::PolygonPattern(s) => Some(&s.base),
            Symbolizer::Raster(_) => None,
            Symbolizer::Building(s) => Some(&s.base),
            Symbolizer::Text(s) => Some(&s.base),
            Symbolizer::Shield(s) => Some(&s.base),
            Symbolizer::Markers(s) => Some(&s.base),
            Symbolizer::Glyph(s) => Some(&s.base),
        }
    }

    /// Image files referenced by the symbolizer.
    pub fn files(&self) -> Vec<&PathExpression> {
        match self {
            Symbolizer::Point(s) => s.file.iter().collect(),
            Symbolizer::LinePattern(s) => vec![&s.file],
            Symbolizer::PolygonPattern(s) => vec![&s.file],
            Symbolizer::Shield(s) => vec![&s.file],
            Symbolizer::Markers(s) => s.file.iter().collect(),
            Symbolizer::Line(_)
            | Symbolizer::Polygon(_)
            | Symbolizer::Raster(_)
            | Symbolizer::Building(_)
            | Symbolizer::Text(_)
            | Symbolizer::Glyph(_) => Vec::new(),
        }
    }

    /// Names of feature attributes the symbolizer reads.
    pub fn attribute_names(&self) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .files()
            .into_iter()
            .flat_map(|file| file.attribute_names())
            .collect();

        match self {
            Symbolizer::Text(s) => names.extend(s.text.name.attribute_names()),
            Symbolizer::Shield(s) => names.extend(s.text.name.attribute_names()),
            Symbolizer::Glyph(s) => {
                let expressions = [Some(&s.char), s.angle.as_ref(), s.value.as_ref(), Some(&s.size), s.color.as_ref()];
                for expression in expressions.into_iter().flatten() {
                    names.extend(expression.attribute_names());
                }
            }
            Symbolizer::Point(_)
            | Symbolizer::Line(_)
            | Symbolizer::LinePattern(_)
            | Symbolizer::Polygon(_)
            | Symbolizer::PolygonPattern(_)
            | Symbolizer::Raster(_)
            | Symbolizer::Building(_)
            | Symbolizer::Markers(_) => {}
        }

        names
    }
}

macro_rules! impl_from_symbolizer {
    ($($variant:ident($ty:ident)),+ $(,)?) => {
        $(
            impl From<$ty> for Symbolizer {
                fn from(value: $ty) -> Self {
                    Symbolizer::$variant(value)
                }
            }
        )+
    };
}

impl_from_symbolizer!(
    Point(PointSymbolizer),
    Line(LineSymbolizer),
    LinePattern(LinePatternSymbolizer),
    Polygon(PolygonSymbolizer),
    PolygonPattern(PolygonPatternSymbolizer),
    Raster(RasterSymbolizer),
    Building(BuildingSymbolizer),
    Text(TextSymbolizer),
    Shield(ShieldSymbolizer),
    Markers(MarkersSymbolizer),
    Glyph(GlyphSymbolizer),
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let polygon = PolygonSymbolizer::default();
        assert_eq!(polygon.fill, Color::rgb(128, 128, 128));
        assert_eq!(polygon.opacity, 1.0);

        let markers = MarkersSymbolizer::default();
        assert_eq!(markers.fill, Color::BLUE);
        assert_eq!(markers.spacing, 100.0);
        assert_eq!(markers.effective_marker_type(), MarkerType::Ellipse);

        let line_markers = MarkersSymbolizer {
            placement: MarkerPlacement::Line,
            ..Default::default()
        };
        assert_eq!(line_markers.effective_marker_type(), MarkerType::Arrow);
    }

    #[test]
    fn vertical_alignment_follows_dy() {
        let mut text = TextProperties::new(
            Expression::attribute("name"),
            FontRef::Face("DejaVu Sans Book".into()),
        );
        assert_eq!(text.effective_vertical_alignment(), VerticalAlignment::Middle);
        text.dy = 5.0;
        assert_eq!(text.effective_vertical_alignment(), VerticalAlignment::Bottom);
        text.dy = -5.0;
        assert_eq!(text.effective_vertical_alignment(), VerticalAlignment::Top);
        text.vertical_alignment = Some(VerticalAlignment::Middle);
        assert_eq!(text.effective_vertical_alignment(), VerticalAlignment::Middle);
    }

    #[test]
    fn referenced_attributes() {
        let shield = Symbolizer::Shield(ShieldSymbolizer {
            text: TextProperties::new(
                Expression::parse("[ref] + ' ' + [name]").unwrap(),
                FontRef::FontSet("labels".into()),
            ),
            file: PathExpression::new("shields/[network].png"),
            shield_dx: 0.0,
            shield_dy: 0.0,
            text_opacity: 1.0,
            unlock_image: false,
            no_text: false,
            base: SymbolizerBase::default(),
        });

        let names: Vec<_> = shield.attribute_names().into_iter().collect();
        assert_eq!(names, vec!["name", "network", "ref"]);
        assert_eq!(shield.element_name(), "ShieldSymbolizer");
    }

    #[test]
    fn keywords() {
        assert_eq!("round".parse::<crate::style::LineJoin>().unwrap(), crate::style::LineJoin::Round);
        assert_eq!(TextTransform::ToUpper.to_string(), "toupper");
        assert!("sideways".parse::<LabelPlacement>().is_err());
    }
}
