//! Label layout: shaping with rustybuzz and glyph outlines as lyon paths.

use lyon::math::point;
use lyon::path::path::Builder;
use lyon::path::Path;
use meridian_types::BoundingBox;
use rustybuzz::ttf_parser::{GlyphId, OutlineBuilder};
use rustybuzz::{Face, UnicodeBuffer};

use crate::font::FaceData;
use crate::style::{HorizontalAlignment, JustifyAlignment, TextProperties, TextTransform, VerticalAlignment};

/// Layout parameters of a label, with sizes in pixels.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextLayout {
    pub size: f64,
    pub character_spacing: f64,
    pub line_spacing: f64,
    pub wrap_width: f64,
    pub text_ratio: f64,
    pub wrap_before: bool,
    pub wrap_character: char,
    pub horizontal_alignment: HorizontalAlignment,
    pub vertical_alignment: VerticalAlignment,
    pub justify_alignment: JustifyAlignment,
}

impl TextLayout {
    /// Layout of the text properties with every pixel size multiplied by the scale factor.
    pub fn from_properties(properties: &TextProperties, scale_factor: f64) -> Self {
        Self {
            size: properties.size * scale_factor,
            character_spacing: properties.character_spacing * scale_factor,
            line_spacing: properties.line_spacing * scale_factor,
            wrap_width: properties.wrap_width as f64 * scale_factor,
            text_ratio: properties.text_ratio as f64,
            wrap_before: properties.wrap_before,
            wrap_character: properties.wrap_character,
            horizontal_alignment: properties.horizontal_alignment,
            vertical_alignment: properties.effective_vertical_alignment(),
            justify_alignment: properties.justify_alignment,
        }
    }

    /// Single line, centered layout of the given size.
    pub fn centered(size: f64) -> Self {
        Self {
            size,
            character_spacing: 0.0,
            line_spacing: 0.0,
            wrap_width: 0.0,
            text_ratio: 0.0,
            wrap_before: false,
            wrap_character: ' ',
            horizontal_alignment: HorizontalAlignment::Middle,
            vertical_alignment: VerticalAlignment::Middle,
            justify_alignment: JustifyAlignment::Center,
        }
    }
}

/// Laid out label. Coordinates are relative to the anchor point, `y` down.
#[derive(Debug, Clone)]
pub(crate) struct ShapedText {
    pub path: Path,
    pub bbox: BoundingBox,
}

/// Applies the case conversion.
pub(crate) fn transform_text(text: &str, transform: TextTransform) -> String {
    match transform {
        TextTransform::None => text.to_string(),
        TextTransform::ToUpper => text.to_uppercase(),
        TextTransform::ToLower => text.to_lowercase(),
    }
}

/// Shapes labels with the first face of a fallback chain that has glyphs for every character.
pub(crate) struct TextShaper<'a> {
    faces: Vec<Face<'a>>,
}

impl<'a> TextShaper<'a> {
    /// Parses the faces. Faces that fail to parse are skipped. Returns `None` if no face is usable.
    pub fn new(faces: &'a [FaceData]) -> Option<Self> {
        let faces: Vec<Face<'a>> = faces
            .iter()
            .filter_map(|face| {
                let parsed = Face::from_slice(&face.data, face.index);
                if parsed.is_none() {
                    log::debug!("Failed to parse font face with index {}", face.index);
                }
                parsed
            })
            .collect();

        (!faces.is_empty()).then_some(Self { faces })
    }

    fn face_for(&self, text: &str) -> &Face<'a> {
        self.faces
            .iter()
            .find(|face| {
                text.chars()
                    .filter(|c| !c.is_whitespace())
                    .all(|c| face.glyph_index(c).is_some())
            })
            .unwrap_or(&self.faces[0])
    }

    /// Width of a single line of text in pixels.
    fn measure(&self, face: &Face<'a>, text: &str, layout: &TextLayout) -> f64 {
        let scale = layout.size / face.units_per_em() as f64;
        let glyphs = shape(face, text);
        let advance: i32 = glyphs.glyph_positions().iter().map(|p| p.x_advance).sum();
        advance as f64 * scale + layout.character_spacing * glyphs.len().saturating_sub(1) as f64
    }

    fn wrap(&self, face: &Face<'a>, text: &str, layout: &TextLayout) -> Vec<String> {
        let mut wrap_width = layout.wrap_width;
        if wrap_width <= 0.0 && layout.text_ratio > 0.0 {
            let line_height = layout.size;
            let width = self.measure(face, text, layout);
            wrap_width = (width * line_height * layout.text_ratio).sqrt();
        }

        if wrap_width <= 0.0 {
            return vec![text.to_string()];
        }

        let separator = layout.wrap_character;
        let mut words: Vec<String> = Vec::new();
        for (index, word) in text.split(separator).enumerate() {
            if index == 0 {
                words.push(word.to_string());
            } else if layout.wrap_before {
                words.push(format!("{separator}{word}"));
            } else if let Some(last) = words.last_mut() {
                last.push(separator);
                words.push(word.to_string());
            }
        }

        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        for word in words {
            let candidate = format!("{current}{word}");
            if !current.is_empty() && self.measure(face, candidate.trim(), layout) > wrap_width {
                lines.push(std::mem::take(&mut current));
                current = word;
            } else {
                current = candidate;
            }
        }
        lines.push(current);

        if separator.is_whitespace() {
            lines.iter().map(|line| line.trim().to_string()).collect()
        } else {
            lines
        }
    }

    /// Lays the text out around the anchor point.
    pub fn layout(&self, text: &str, layout: &TextLayout) -> Option<ShapedText> {
        if text.trim().is_empty() {
            return None;
        }

        let face = self.face_for(text);
        let scale = layout.size / face.units_per_em() as f64;
        let ascender = face.ascender() as f64 * scale;
        let descender = face.descender() as f64 * scale;
        let line_height = ascender - descender;

        let lines = self.wrap(face, text, layout);
        let widths: Vec<f64> = lines
            .iter()
            .map(|line| self.measure(face, line, layout))
            .collect();
        let width = widths.iter().copied().fold(0.0, f64::max);
        let height = line_height * lines.len() as f64 + layout.line_spacing * (lines.len() - 1) as f64;

        let x0 = match layout.horizontal_alignment {
            HorizontalAlignment::Left => -width,
            HorizontalAlignment::Middle => -width / 2.0,
            HorizontalAlignment::Right => 0.0,
        };
        let y0 = match layout.vertical_alignment {
            VerticalAlignment::Top => -height,
            VerticalAlignment::Middle => -height / 2.0,
            VerticalAlignment::Bottom => 0.0,
        };

        let mut builder = GlyphPathBuilder::new(scale as f32);
        for (index, (line, line_width)) in lines.iter().zip(&widths).enumerate() {
            let justify = match layout.justify_alignment {
                JustifyAlignment::Left => 0.0,
                JustifyAlignment::Center => (width - line_width) / 2.0,
                JustifyAlignment::Right => width - line_width,
            };
            let baseline = y0 + index as f64 * (line_height + layout.line_spacing) + ascender;

            let glyphs = shape(face, line);
            let mut advance = 0.0;
            for (info, position) in glyphs.glyph_infos().iter().zip(glyphs.glyph_positions()) {
                builder.offset = (
                    (x0 + justify + advance + position.x_offset as f64 * scale) as f32,
                    (baseline - position.y_offset as f64 * scale) as f32,
                );
                face.outline_glyph(GlyphId(info.glyph_id as u16), &mut builder);
                builder.finish_contour();
                advance += position.x_advance as f64 * scale + layout.character_spacing;
            }
        }

        Some(ShapedText {
            path: builder.builder.build(),
            bbox: BoundingBox::new(x0, y0, x0 + width, y0 + height),
        })
    }
}

fn shape(face: &Face<'_>, text: &str) -> rustybuzz::GlyphBuffer {
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.guess_segment_properties();
    rustybuzz::shape(face, &[], buffer)
}

/// Collects glyph outlines into a single path, flipping font units (`y` up) into pixels (`y` down).
struct GlyphPathBuilder {
    builder: Builder,
    scale: f32,
    offset: (f32, f32),
    open: bool,
}

impl GlyphPathBuilder {
    fn new(scale: f32) -> Self {
        Self {
            builder: Path::builder(),
            scale,
            offset: (0.0, 0.0),
            open: false,
        }
    }

    fn point(&self, x: f32, y: f32) -> lyon::math::Point {
        point(x * self.scale + self.offset.0, -y * self.scale + self.offset.1)
    }

    fn finish_contour(&mut self) {
        if self.open {
            self.builder.end(true);
            self.open = false;
        }
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        self.finish_contour();
        let at = self.point(x, y);
        self.builder.begin(at);
        self.open = true;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let to = self.point(x, y);
        self.builder.line_to(to);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let ctrl = self.point(x1, y1);
        let to = self.point(x, y);
        self.builder.quadratic_bezier_to(ctrl, to);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let ctrl1 = self.point(x1, y1);
        let ctrl2 = self.point(x2, y2);
        let to = self.point(x, y);
        self.builder.cubic_bezier_to(ctrl1, ctrl2, to);
    }

    fn close(&mut self) {
        self.finish_contour();
    }
}
