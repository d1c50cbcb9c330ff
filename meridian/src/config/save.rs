use std::fmt::Display;
use std::path::Path;

use crate::color::Color;
use crate::config::node::ConfigNode;
use crate::config::SaveOptions;
use crate::error::{Error, ResultExt};
use crate::map::{Layer, Map};
use crate::style::{
    AngleMode, BuildingSymbolizer, FontRef, FontSet, MarkersSymbolizer, MetaWriter,
    PatternAlignment, PointSymbolizer, PolygonSymbolizer, RasterColorizer, RasterSymbolizer, Rule,
    Stroke, Style, Symbolizer, TextProperties,
};

/// Writes the map as a document to the file.
pub fn save_map(map: &Map, path: impl AsRef<Path>, options: &SaveOptions) -> Result<(), Error> {
    let path = path.as_ref();
    let xml = save_map_to_string(map, options)?;
    std::fs::write(path, xml).with_context(|| format!("in map '{}'", path.display()))?;

    log::info!("Saved map '{}'", path.display());
    Ok(())
}

/// Writes the map as a document.
pub fn save_map_to_string(map: &Map, options: &SaveOptions) -> Result<String, Error> {
    map_to_node(map, options).to_xml()
}

/// Converts the map into a tree of nodes.
///
/// Font sets come first, then styles, layers and meta writers.
pub fn map_to_node(map: &Map, options: &SaveOptions) -> ConfigNode {
    let mut writer = ElementWriter::new("Map", options);
    writer.set("srs", map.srs());
    writer.set_optional("background-color", map.background());
    writer.set_optional(
        "background-image",
        map.background_image().map(|path| path.display()),
    );
    writer.set_default("buffer_size", map.buffer_size(), 0);

    for fontset in map.fontsets().values() {
        writer.add_child(fontset_node(fontset));
    }
    for (name, style) in map.styles() {
        writer.add_child(style_node(name, style, options));
    }
    for layer in map.layers() {
        writer.add_child(layer_node(layer, options));
    }
    for (name, metawriter) in map.metawriters() {
        writer.add_child(metawriter_node(name, metawriter, options));
    }

    writer.finish()
}

/// Element being written, eliding attributes equal to their defaults unless asked not to.
struct ElementWriter {
    node: ConfigNode,
    explicit_defaults: bool,
}

impl ElementWriter {
    fn new(name: &str, options: &SaveOptions) -> Self {
        Self {
            node: ConfigNode::new(name),
            explicit_defaults: options.explicit_defaults,
        }
    }

    fn set(&mut self, name: &str, value: impl Display) {
        self.node.set_attribute(name, value);
    }

    fn set_default<T: PartialEq + Display>(&mut self, name: &str, value: T, default: T) {
        if self.explicit_defaults || value != default {
            self.set(name, value);
        }
    }

    fn set_optional(&mut self, name: &str, value: Option<impl Display>) {
        if let Some(value) = value {
            self.set(name, value);
        }
    }

    fn set_non_empty(&mut self, name: &str, value: &str) {
        if self.explicit_defaults || !value.is_empty() {
            self.set(name, value);
        }
    }

    fn add_child(&mut self, child: ConfigNode) {
        self.node.add_child(child);
    }

    fn finish(self) -> ConfigNode {
        self.node
    }
}

fn fontset_node(fontset: &FontSet) -> ConfigNode {
    let mut node = ConfigNode::new("FontSet").with_attribute("name", fontset.name());
    for face_name in fontset.face_names() {
        node.add_child(ConfigNode::new("Font").with_attribute("face_name", face_name));
    }

    node
}

fn style_node(name: &str, style: &Style, options: &SaveOptions) -> ConfigNode {
    let mut node = ConfigNode::new("Style").with_attribute("name", name);
    for rule in style.rules() {
        node.add_child(rule_node(rule, options));
    }

    node
}

fn rule_node(rule: &Rule, options: &SaveOptions) -> ConfigNode {
    let mut writer = ElementWriter::new("Rule", options);
    writer.set_non_empty("name", &rule.name);
    writer.set_non_empty("title", &rule.title);

    if let Some(filter) = &rule.filter {
        writer.add_child(ConfigNode::new("Filter").with_text(filter.source()));
    }
    if rule.is_else {
        writer.add_child(ConfigNode::new("ElseFilter"));
    }
    if options.explicit_defaults || rule.min_scale() > 0.0 {
        writer.add_child(
            ConfigNode::new("MinScaleDenominator").with_text(rule.min_scale().to_string()),
        );
    }
    if options.explicit_defaults || rule.max_scale().is_finite() {
        writer.add_child(
            ConfigNode::new("MaxScaleDenominator").with_text(rule.max_scale().to_string()),
        );
    }

    for symbolizer in &rule.symbolizers {
        writer.add_child(symbolizer_node(symbolizer, options));
    }

    writer.finish()
}

fn symbolizer_node(symbolizer: &Symbolizer, options: &SaveOptions) -> ConfigNode {
    let mut w = ElementWriter::new(symbolizer.element_name(), options);
    match symbolizer {
        Symbolizer::Point(s) => {
            let d = PointSymbolizer::default();
            w.set_optional("file", s.file.as_ref());
            w.set_default("opacity", s.opacity, d.opacity);
            w.set_default("allow_overlap", s.allow_overlap, d.allow_overlap);
            w.set_default("ignore_placement", s.ignore_placement, d.ignore_placement);
            w.set_default("avoid_edges", s.avoid_edges, d.avoid_edges);
            w.set_optional("transform", s.transform.as_deref());
        }
        Symbolizer::Line(s) => write_stroke(&mut w, &s.stroke, false),
        Symbolizer::LinePattern(s) => {
            w.set("file", &s.file);
            w.set_default("opacity", s.opacity, 1.0);
        }
        Symbolizer::Polygon(s) => {
            let d = PolygonSymbolizer::default();
            w.set_default("fill", s.fill, d.fill);
            w.set_default("fill-opacity", s.opacity, d.opacity);
            w.set_default("gamma", s.gamma, d.gamma);
        }
        Symbolizer::PolygonPattern(s) => {
            w.set("file", &s.file);
            w.set_default("alignment", s.alignment, PatternAlignment::Local);
            w.set_default("opacity", s.opacity, 1.0);
        }
        Symbolizer::Raster(s) => {
            let d = RasterSymbolizer::default();
            w.set_default("mode", s.mode, d.mode);
            w.set_default("scaling", s.scaling, d.scaling);
            w.set_default("opacity", s.opacity, d.opacity);
            if let Some(colorizer) = &s.colorizer {
                w.add_child(colorizer_node(colorizer, options));
            }
        }
        Symbolizer::Building(s) => {
            let d = BuildingSymbolizer::default();
            w.set_default("fill", s.fill, d.fill);
            w.set_default("fill-opacity", s.opacity, d.opacity);
            w.set_default("height", s.height, d.height);
        }
        Symbolizer::Text(s) => write_text(&mut w, &s.text),
        Symbolizer::Shield(s) => {
            write_text(&mut w, &s.text);
            w.set("file", &s.file);
            w.set_default("shield_dx", s.shield_dx, 0.0);
            w.set_default("shield_dy", s.shield_dy, 0.0);
            w.set_default("text-opacity", s.text_opacity, 1.0);
            w.set_default("unlock_image", s.unlock_image, false);
            w.set_default("no_text", s.no_text, false);
        }
        Symbolizer::Markers(s) => {
            let d = MarkersSymbolizer::default();
            w.set_optional("file", s.file.as_ref());
            w.set_default("opacity", s.opacity, d.opacity);
            w.set_default("fill", s.fill, d.fill);
            if let Some(stroke) = &s.stroke {
                write_stroke(&mut w, stroke, true);
            }
            w.set_default("spacing", s.spacing, d.spacing);
            w.set_default("max_error", s.max_error, d.max_error);
            w.set_default("allow_overlap", s.allow_overlap, d.allow_overlap);
            w.set_default("avoid_edges", s.avoid_edges, d.avoid_edges);
            w.set_default("width", s.width, d.width);
            w.set_default("height", s.height, d.height);
            w.set_default("placement", s.placement, d.placement);
            w.set_optional("marker_type", s.marker_type);
        }
        Symbolizer::Glyph(s) => {
            w.set("face_name", &s.face_name);
            w.set("char", &s.char);
            w.set("size", &s.size);
            w.set_optional("angle", s.angle.as_ref());
            w.set_optional("value", s.value.as_ref());
            w.set_optional("color", s.color.as_ref());
            w.set_default("angle_mode", s.angle_mode, AngleMode::Trigonometric);
            w.set_default("halo_fill", s.halo_fill, Color::WHITE);
            w.set_default("halo_radius", s.halo_radius, 0.0);
            w.set_default("opacity", s.opacity, 1.0);
            w.set_default("allow_overlap", s.allow_overlap, false);
            w.set_default("avoid_edges", s.avoid_edges, false);
            w.set_default("dx", s.dx, 0.0);
            w.set_default("dy", s.dy, 0.0);
            if let Some(colorizer) = &s.colorizer {
                w.add_child(colorizer_node(colorizer, options));
            }
        }
    }

    if let Some(base) = symbolizer.base() {
        w.set_optional("meta-writer", base.meta_writer.as_deref());
        w.set_optional("meta-output", base.meta_output.as_deref());
    }

    w.finish()
}

/// Stroke attributes. Markers have an optional stroke, so their stroke color is always written
/// to mark it present.
fn write_stroke(w: &mut ElementWriter, stroke: &Stroke, always_color: bool) {
    let d = Stroke::default();
    if always_color {
        w.set("stroke", stroke.color);
    } else {
        w.set_default("stroke", stroke.color, d.color);
    }
    w.set_default("stroke-width", stroke.width, d.width);
    w.set_default("stroke-opacity", stroke.opacity, d.opacity);
    w.set_default("stroke-linejoin", stroke.line_join, d.line_join);
    w.set_default("stroke-linecap", stroke.line_cap, d.line_cap);
    if w.explicit_defaults || !stroke.dashes.is_empty() {
        let dashes: Vec<String> = stroke.dash_array().iter().map(f64::to_string).collect();
        w.set("stroke-dasharray", dashes.join(","));
    }
    w.set_default("stroke-dashoffset", stroke.dash_offset, d.dash_offset);
}

fn write_text(w: &mut ElementWriter, text: &TextProperties) {
    let d = TextProperties::new(text.name.clone(), text.font.clone());
    w.set("name", &text.name);
    match &text.font {
        FontRef::Face(face_name) => w.set("face_name", face_name),
        FontRef::FontSet(fontset) => w.set("fontset_name", fontset),
    }
    w.set_default("size", text.size, d.size);
    w.set_default("fill", text.fill, d.fill);
    w.set_default("dx", text.dx, d.dx);
    w.set_default("dy", text.dy, d.dy);
    w.set_default("placement", text.placement, d.placement);
    w.set_optional("vertical_alignment", text.vertical_alignment);
    w.set_default("horizontal_alignment", text.horizontal_alignment, d.horizontal_alignment);
    w.set_default("justify_alignment", text.justify_alignment, d.justify_alignment);
    w.set_default("halo_fill", text.halo_fill, d.halo_fill);
    w.set_default("halo_radius", text.halo_radius, d.halo_radius);
    w.set_default("text_ratio", text.text_ratio, d.text_ratio);
    w.set_default("wrap_width", text.wrap_width, d.wrap_width);
    w.set_default("wrap_before", text.wrap_before, d.wrap_before);
    w.set_default("wrap_character", text.wrap_character, d.wrap_character);
    w.set_default("text_convert", text.text_transform, d.text_transform);
    w.set_default("line_spacing", text.line_spacing, d.line_spacing);
    w.set_default("character_spacing", text.character_spacing, d.character_spacing);
    w.set_default("spacing", text.spacing, d.spacing);
    w.set_default("min_distance", text.min_distance, d.min_distance);
    w.set_default("avoid_edges", text.avoid_edges, d.avoid_edges);
    w.set_default("allow_overlap", text.allow_overlap, d.allow_overlap);
    w.set_default("opacity", text.opacity, d.opacity);
    w.set_default("max_char_angle_delta", text.max_char_angle_delta, d.max_char_angle_delta);
}

fn colorizer_node(colorizer: &RasterColorizer, options: &SaveOptions) -> ConfigNode {
    let mut node = ConfigNode::new("RasterColorizer");
    for band in colorizer.bands() {
        let mut w = ElementWriter::new("ColorBand", options);
        w.set("value", band.value);
        w.set("color", band.color);
        w.set_optional("max_value", band.max_value);
        w.set_default("midpoints", band.midpoints, 0);
        w.set_optional("label", band.label.as_deref());
        node.add_child(w.finish());
    }

    node
}

fn layer_node(layer: &Layer, options: &SaveOptions) -> ConfigNode {
    let defaults = Layer::new("");
    let mut w = ElementWriter::new("Layer", options);
    w.set_non_empty("name", &layer.name);
    w.set("srs", &layer.srs);
    w.set_default("status", layer.active, defaults.active);
    w.set_non_empty("title", &layer.title);
    w.set_non_empty("abstract", &layer.abstract_);
    w.set_default("minzoom", layer.min_zoom, defaults.min_zoom);
    w.set_default("maxzoom", layer.max_zoom, defaults.max_zoom);
    w.set_default("queryable", layer.queryable, defaults.queryable);
    w.set_default(
        "clear_label_cache",
        layer.clear_label_cache,
        defaults.clear_label_cache,
    );

    for style in layer.styles() {
        w.add_child(ConfigNode::new("StyleName").with_text(style.as_str()));
    }

    if let Some(datasource) = layer.datasource() {
        let mut node = ConfigNode::new("Datasource");
        for (name, value) in datasource.params() {
            node.add_child(
                ConfigNode::new("Parameter")
                    .with_attribute("name", name)
                    .with_text(value.as_str()),
            );
        }
        w.add_child(node);
    }

    w.finish()
}

fn metawriter_node(name: &str, metawriter: &MetaWriter, options: &SaveOptions) -> ConfigNode {
    let mut w = ElementWriter::new("MetaWriter", options);
    w.set("name", name);
    w.set("type", metawriter.type_name());
    match metawriter {
        MetaWriter::Json {
            file,
            default_output,
            output_empty,
        } => {
            w.set("file", file);
            w.set_optional("default-output", default_output.as_deref());
            w.set_default("output-empty", *output_empty, true);
        }
    }

    w.finish()
}
