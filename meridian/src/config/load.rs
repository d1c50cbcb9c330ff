use std::path::{Path, PathBuf};

use ahash::HashMap;

use crate::color::Color;
use crate::config::node::ConfigNode;
use crate::config::LoadOptions;
use crate::context::Context;
use crate::datasource::{Datasource, Parameters};
use crate::error::{Error, ErrorKind, ResultExt};
use crate::expression::{Expression, PathExpression};
use crate::map::{Layer, Map};
use crate::render::symbolizer::parse_transform;
use crate::style::{
    dash_pairs, BuildingSymbolizer, ColorBand, FontRef, FontSet, GlyphSymbolizer,
    LinePatternSymbolizer, LineSymbolizer, MarkersSymbolizer, MetaWriter, PatternAlignment,
    PointSymbolizer, PolygonPatternSymbolizer, PolygonSymbolizer, RasterColorizer,
    RasterSymbolizer, Rule, ShieldSymbolizer, Stroke, Style, Symbolizer, SymbolizerBase,
    TextProperties, TextSymbolizer,
};

pub(super) const SYMBOLIZER_ELEMENTS: [&str; 11] = [
    "PointSymbolizer",
    "LineSymbolizer",
    "LinePatternSymbolizer",
    "PolygonSymbolizer",
    "PolygonPatternSymbolizer",
    "RasterSymbolizer",
    "BuildingSymbolizer",
    "TextSymbolizer",
    "ShieldSymbolizer",
    "MarkersSymbolizer",
    "GlyphSymbolizer",
];

const MAP_CHILDREN: [&str; 7] = [
    "Include",
    "Style",
    "Layer",
    "FontSet",
    "MetaWriter",
    "FileSource",
    "Datasource",
];

/// Loads a map document from a file into the map.
///
/// Styles, layers, font sets and meta writers of the document are added to the map, its
/// attributes replace those of the map. Relative paths are resolved against the directory of the
/// document unless [`LoadOptions::base_path`] is set.
pub fn load_map(
    map: &mut Map,
    path: impl AsRef<Path>,
    context: &Context,
    options: &LoadOptions,
) -> Result<(), Error> {
    let path = path.as_ref();
    let scope = || format!("in map '{}'", path.display());
    log::info!("Loading map '{}'", path.display());

    let xml = std::fs::read_to_string(path).with_context(scope)?;
    let mut options = options.clone();
    if options.base_path.is_none() {
        options.base_path = path.parent().map(Path::to_path_buf);
    }

    ConfigNode::parse(&xml)
        .and_then(|root| map_from_node(map, &root, context, &options))
        .with_context(scope)
}

/// Loads a map document from a string into the map.
pub fn load_map_string(
    map: &mut Map,
    xml: &str,
    context: &Context,
    options: &LoadOptions,
) -> Result<(), Error> {
    ConfigNode::parse(xml)
        .and_then(|root| map_from_node(map, &root, context, options))
        .context("in map '<string>'")
}

/// Loads a map document already read into a tree of nodes.
pub fn map_from_node(
    map: &mut Map,
    root: &ConfigNode,
    context: &Context,
    options: &LoadOptions,
) -> Result<(), Error> {
    if root.name() != "Map" {
        return Err(Error::config(format!(
            "not a map document: root element is '{}', expected 'Map'",
            root.name()
        )));
    }

    check_version(root)?;

    let mut parser = MapParser::new(context, options);
    if let Some(paths_from_xml) = root.flag("paths_from_xml")? {
        parser.paths_from_xml = paths_from_xml;
    }

    parser.parse_map(map, root)?;
    parser.check_references(map)?;

    log::debug!(
        "Loaded {} styles and {} layers",
        map.styles().len(),
        map.layers().len()
    );
    Ok(())
}

fn check_version(root: &ConfigNode) -> Result<(), Error> {
    let Some(required) = root.attribute("minimum_version") else {
        return Ok(());
    };
    let Some(required_version) = parse_version(required) else {
        log::warn!("Ignoring minimum_version '{required}': expected major.minor.patch");
        return Ok(());
    };

    let current = env!("CARGO_PKG_VERSION");
    match parse_version(current) {
        Some(current_version) if required_version > current_version => {
            Err(Error::new(ErrorKind::Version {
                required: required.to_string(),
                current: current.to_string(),
            }))
        }
        _ => Ok(()),
    }
}

fn parse_version(text: &str) -> Option<(u32, u32, u32)> {
    let mut parts = text.trim().split('.').map(|part| part.parse::<u32>().ok());
    let version = (parts.next()??, parts.next()??, parts.next()??);
    parts.next().is_none().then_some(version)
}

struct MapParser<'a> {
    context: &'a Context,
    strict: bool,
    paths_from_xml: bool,
    skip_failed_datasources: bool,
    base_path: Option<PathBuf>,
    datasource_templates: HashMap<String, Parameters>,
    file_sources: HashMap<String, String>,
}

impl<'a> MapParser<'a> {
    fn new(context: &'a Context, options: &LoadOptions) -> Self {
        Self {
            context,
            strict: options.strict,
            paths_from_xml: options.paths_from_xml,
            skip_failed_datasources: options.skip_failed_datasources,
            base_path: options.base_path.clone(),
            datasource_templates: HashMap::default(),
            file_sources: HashMap::default(),
        }
    }

    fn parse_map(&mut self, map: &mut Map, node: &ConfigNode) -> Result<(), Error> {
        if let Some(srs) = node.attribute("srs") {
            map.set_srs(srs);
        }
        if let Some(color) = node.parsed::<Color>("background-color")? {
            map.set_background(Some(color));
        }
        if let Some(image) = node.attribute("background-image") {
            map.set_background_image(Some(PathBuf::from(self.resolve_path(image))));
        }
        if let Some(buffer_size) = node.parsed::<u32>("buffer_size")? {
            map.set_buffer_size(buffer_size);
        }

        self.parse_children(map, node)
    }

    fn parse_children(&mut self, map: &mut Map, node: &ConfigNode) -> Result<(), Error> {
        node.check_children(&MAP_CHILDREN)?;
        for child in node.children() {
            match child.name() {
                "Include" => self.parse_children(map, child).context("in Include")?,
                "Style" => self.parse_style(map, child)?,
                "Layer" => self.parse_layer(map, child)?,
                "FontSet" => self.parse_fontset(map, child)?,
                "MetaWriter" => self.parse_metawriter(map, child)?,
                "FileSource" => {
                    let name = child.required("name")?;
                    self.file_sources
                        .insert(name.to_string(), child.text().to_string());
                }
                "Datasource" => {
                    let name = child.attribute("name").unwrap_or("Unnamed");
                    let mut params = Parameters::new();
                    read_parameters(child, &mut params)
                        .with_context(|| format!("in datasource template '{name}'"))?;
                    self.datasource_templates.insert(name.to_string(), params);
                }
                _ => {}
            }
        }

        Ok(())
    }

    fn parse_style(&self, map: &mut Map, node: &ConfigNode) -> Result<(), Error> {
        let name = node.required("name")?;
        let style = self
            .style_rules(node)
            .with_context(|| format!("in style '{name}'"))?;

        if !map.insert_style(name, style) {
            log::warn!("Duplicate style '{name}', keeping the first definition");
        }

        Ok(())
    }

    fn style_rules(&self, node: &ConfigNode) -> Result<Style, Error> {
        node.check_children(&["Rule"])?;

        let mut style = Style::new();
        for child in node.children() {
            style.add_rule(self.parse_rule(child)?);
        }

        if style.else_rule_count() > 1 {
            if self.strict {
                return Err(Error::config("a style can have only one rule with 'ElseFilter'"));
            }
            log::warn!("Style has more than one rule with 'ElseFilter', all of them apply");
        }

        Ok(style)
    }

    fn parse_rule(&self, node: &ConfigNode) -> Result<Rule, Error> {
        let name = node.attribute("name").unwrap_or_default();
        self.rule_body(node, name)
            .with_context(|| format!("in rule '{name}'"))
    }

    fn rule_body(&self, node: &ConfigNode, name: &str) -> Result<Rule, Error> {
        let mut allowed = vec![
            "Filter",
            "ElseFilter",
            "MinScaleDenominator",
            "MaxScaleDenominator",
        ];
        allowed.extend(SYMBOLIZER_ELEMENTS);
        node.check_children(&allowed)?;

        let mut rule = Rule::new(name);
        if let Some(title) = node.attribute("title") {
            rule.title = title.to_string();
        }

        match (node.child("Filter"), node.child("ElseFilter")) {
            (Some(_), Some(_)) => {
                return Err(Error::config(
                    "a rule can't have both 'Filter' and 'ElseFilter'",
                ))
            }
            (Some(filter), None) => rule.filter = Some(Expression::parse(filter.text())?),
            (None, Some(_)) => rule.is_else = true,
            (None, None) => {}
        }

        let min_scale = node
            .child_parsed::<f64>("MinScaleDenominator")?
            .unwrap_or(0.0);
        let max_scale = node
            .child_parsed::<f64>("MaxScaleDenominator")?
            .unwrap_or(f64::INFINITY);
        rule.set_scale_range(min_scale, max_scale)?;

        for child in node.children() {
            if SYMBOLIZER_ELEMENTS.contains(&child.name()) {
                let symbolizer = self
                    .parse_symbolizer(child)
                    .with_context(|| format!("in {}", child.name()))?;
                rule.symbolizers.push(symbolizer);
            }
        }

        Ok(rule)
    }

    fn parse_symbolizer(&self, node: &ConfigNode) -> Result<Symbolizer, Error> {
        match node.name() {
            "RasterSymbolizer" | "GlyphSymbolizer" => node.check_children(&["RasterColorizer"])?,
            _ => node.check_children(&[])?,
        }

        let symbolizer = match node.name() {
            "PointSymbolizer" => {
                let defaults = PointSymbolizer::default();
                PointSymbolizer {
                    file: self.file(node)?,
                    opacity: node.parsed_or("opacity", defaults.opacity)?,
                    allow_overlap: node.flag_or("allow_overlap", defaults.allow_overlap)?,
                    ignore_placement: node
                        .flag_or("ignore_placement", defaults.ignore_placement)?,
                    avoid_edges: node.flag_or("avoid_edges", defaults.avoid_edges)?,
                    transform: self.transform(node)?,
                    base: base(node),
                }
                .into()
            }
            "LineSymbolizer" => LineSymbolizer {
                stroke: stroke(node)?,
                base: base(node),
            }
            .into(),
            "LinePatternSymbolizer" => LinePatternSymbolizer {
                file: self.required_file(node)?,
                opacity: node.parsed_or("opacity", 1.0)?,
                base: base(node),
            }
            .into(),
            "PolygonSymbolizer" => {
                let defaults = PolygonSymbolizer::default();
                PolygonSymbolizer {
                    fill: node.parsed_or("fill", defaults.fill)?,
                    opacity: node.parsed_or("fill-opacity", defaults.opacity)?,
                    gamma: node.parsed_or("gamma", defaults.gamma)?,
                    base: base(node),
                }
                .into()
            }
            "PolygonPatternSymbolizer" => PolygonPatternSymbolizer {
                file: self.required_file(node)?,
                alignment: node.parsed_or("alignment", PatternAlignment::Local)?,
                opacity: node.parsed_or("opacity", 1.0)?,
                base: base(node),
            }
            .into(),
            "RasterSymbolizer" => {
                let defaults = RasterSymbolizer::default();
                RasterSymbolizer {
                    mode: node.parsed_or("mode", defaults.mode)?,
                    scaling: node.parsed_or("scaling", defaults.scaling)?,
                    opacity: node.parsed_or("opacity", defaults.opacity)?,
                    colorizer: colorizer(node)?,
                }
                .into()
            }
            "BuildingSymbolizer" => {
                let defaults = BuildingSymbolizer::default();
                BuildingSymbolizer {
                    fill: node.parsed_or("fill", defaults.fill)?,
                    opacity: node.parsed_or("fill-opacity", defaults.opacity)?,
                    height: node.parsed_or("height", defaults.height)?,
                    base: base(node),
                }
                .into()
            }
            "TextSymbolizer" => TextSymbolizer {
                text: self.text_properties(node)?,
                base: base(node),
            }
            .into(),
            "ShieldSymbolizer" => ShieldSymbolizer {
                text: self.text_properties(node)?,
                file: self.required_file(node)?,
                shield_dx: node.parsed_or("shield_dx", 0.0)?,
                shield_dy: node.parsed_or("shield_dy", 0.0)?,
                text_opacity: node.parsed_or("text-opacity", 1.0)?,
                unlock_image: node.flag_or("unlock_image", false)?,
                no_text: node.flag_or("no_text", false)?,
                base: base(node),
            }
            .into(),
            "MarkersSymbolizer" => {
                let defaults = MarkersSymbolizer::default();
                MarkersSymbolizer {
                    file: self.file(node)?,
                    opacity: node.parsed_or("opacity", defaults.opacity)?,
                    fill: node.parsed_or("fill", defaults.fill)?,
                    stroke: if has_stroke(node) {
                        Some(stroke(node)?)
                    } else {
                        None
                    },
                    spacing: node.parsed_or("spacing", defaults.spacing)?,
                    max_error: node.parsed_or("max_error", defaults.max_error)?,
                    allow_overlap: node.flag_or("allow_overlap", defaults.allow_overlap)?,
                    avoid_edges: node.flag_or("avoid_edges", defaults.avoid_edges)?,
                    width: node.parsed_or("width", defaults.width)?,
                    height: node.parsed_or("height", defaults.height)?,
                    placement: node.parsed_or("placement", defaults.placement)?,
                    marker_type: node.parsed("marker_type")?,
                    base: base(node),
                }
                .into()
            }
            "GlyphSymbolizer" => self.glyph(node)?.into(),
            other => {
                return Err(Error::config(format!("unknown symbolizer '{other}'")));
            }
        };

        Ok(symbolizer)
    }

    fn text_properties(&self, node: &ConfigNode) -> Result<TextProperties, Error> {
        let name = Expression::parse(node.required("name")?)?;
        let font = match (node.attribute("face_name"), node.attribute("fontset_name")) {
            (Some(_), Some(_)) => {
                return Err(Error::config(
                    "can't have both 'face_name' and 'fontset_name'",
                ))
            }
            (Some(face_name), None) => {
                self.check_face(face_name)?;
                FontRef::Face(face_name.to_string())
            }
            (None, Some(fontset)) => FontRef::FontSet(fontset.to_string()),
            (None, None) => {
                return Err(Error::config(format!(
                    "missing required attribute 'face_name' or 'fontset_name' in '{}'",
                    node.name()
                )))
            }
        };

        let d = TextProperties::new(name, font);
        let wrap_character = match node.attribute("wrap_character") {
            Some(value) => single_char(value).ok_or_else(|| {
                Error::config(format!(
                    "failed to parse attribute 'wrap_character' value '{value}': expected a single character"
                ))
            })?,
            None => d.wrap_character,
        };

        Ok(TextProperties {
            size: node.parsed_or("size", d.size)?,
            fill: node.parsed_or("fill", d.fill)?,
            dx: node.parsed_or("dx", d.dx)?,
            dy: node.parsed_or("dy", d.dy)?,
            placement: node.parsed_or("placement", d.placement)?,
            vertical_alignment: node.parsed("vertical_alignment")?,
            horizontal_alignment: node.parsed_or("horizontal_alignment", d.horizontal_alignment)?,
            justify_alignment: node.parsed_or("justify_alignment", d.justify_alignment)?,
            halo_fill: node.parsed_or("halo_fill", d.halo_fill)?,
            halo_radius: node.parsed_or("halo_radius", d.halo_radius)?,
            text_ratio: node.parsed_or("text_ratio", d.text_ratio)?,
            wrap_width: node.parsed_or("wrap_width", d.wrap_width)?,
            wrap_before: node.flag_or("wrap_before", d.wrap_before)?,
            wrap_character,
            text_transform: node.parsed_or("text_convert", d.text_transform)?,
            line_spacing: node.parsed_or("line_spacing", d.line_spacing)?,
            character_spacing: node.parsed_or("character_spacing", d.character_spacing)?,
            spacing: node.parsed_or("spacing", d.spacing)?,
            min_distance: node.parsed_or("min_distance", d.min_distance)?,
            avoid_edges: node.flag_or("avoid_edges", d.avoid_edges)?,
            allow_overlap: node.flag_or("allow_overlap", d.allow_overlap)?,
            opacity: node.parsed_or("opacity", d.opacity)?,
            max_char_angle_delta: node.parsed_or("max_char_angle_delta", d.max_char_angle_delta)?,
            ..d
        })
    }

    fn glyph(&self, node: &ConfigNode) -> Result<GlyphSymbolizer, Error> {
        let face_name = node.required("face_name")?;
        self.check_face(face_name)?;

        let d = GlyphSymbolizer::new(
            face_name,
            Expression::parse(node.required("char")?)?,
            Expression::parse(node.required("size")?)?,
        );

        Ok(GlyphSymbolizer {
            angle: optional_expression(node, "angle")?,
            value: optional_expression(node, "value")?,
            color: optional_expression(node, "color")?,
            angle_mode: node.parsed_or("angle_mode", d.angle_mode)?,
            halo_fill: node.parsed_or("halo_fill", d.halo_fill)?,
            halo_radius: node.parsed_or("halo_radius", d.halo_radius)?,
            opacity: node.parsed_or("opacity", d.opacity)?,
            allow_overlap: node.flag_or("allow_overlap", d.allow_overlap)?,
            avoid_edges: node.flag_or("avoid_edges", d.avoid_edges)?,
            dx: node.parsed_or("dx", d.dx)?,
            dy: node.parsed_or("dy", d.dy)?,
            colorizer: colorizer(node)?,
            base: base(node),
            ..d
        })
    }

    fn parse_layer(&self, map: &mut Map, node: &ConfigNode) -> Result<(), Error> {
        let name = node.attribute("name").unwrap_or_default();
        let layer = self
            .layer_body(map, node, name)
            .with_context(|| format!("in layer '{name}'"))?;
        map.add_layer(layer);
        Ok(())
    }

    fn layer_body(&self, map: &Map, node: &ConfigNode, name: &str) -> Result<Layer, Error> {
        node.check_children(&["StyleName", "Datasource"])?;

        let mut layer = Layer::new(name);
        layer.srs = node.attribute("srs").unwrap_or(map.srs()).to_string();
        layer.active = node.flag_or("status", layer.active)?;
        layer.title = node.attribute("title").unwrap_or_default().to_string();
        layer.abstract_ = node.attribute("abstract").unwrap_or_default().to_string();
        layer.min_zoom = node.parsed_or("minzoom", layer.min_zoom)?;
        layer.max_zoom = node.parsed_or("maxzoom", layer.max_zoom)?;
        layer.queryable = node.flag_or("queryable", layer.queryable)?;
        layer.clear_label_cache = node.flag_or("clear_label_cache", layer.clear_label_cache)?;

        for child in node.children() {
            match child.name() {
                "StyleName" => layer.add_style(child.text()),
                "Datasource" => {
                    if let Some(datasource) = self.layer_datasource(child)? {
                        layer.set_datasource(datasource);
                    }
                }
                _ => {}
            }
        }

        Ok(layer)
    }

    fn layer_datasource(&self, node: &ConfigNode) -> Result<Option<Box<dyn Datasource>>, Error> {
        let mut params = match node.attribute("base") {
            Some(template) => self
                .datasource_templates
                .get(template)
                .cloned()
                .ok_or_else(|| {
                    Error::config(format!("datasource template '{template}' not found"))
                })?,
            None => Parameters::new(),
        };
        read_parameters(node, &mut params)?;

        if self.paths_from_xml {
            if let Some(base) = params.get_mut("base") {
                *base = self.resolve_path(base);
            } else if let Some(file) = params.get_mut("file") {
                *file = self.resolve_path(file);
            }
        }

        match self.context.registry.create(&params) {
            Ok(datasource) => Ok(Some(datasource)),
            Err(err) if self.skip_failed_datasources => {
                log::warn!("Skipping datasource: {err}");
                Ok(None)
            }
            Err(err) => Err(err.into_config()),
        }
    }

    fn parse_fontset(&self, map: &mut Map, node: &ConfigNode) -> Result<(), Error> {
        let name = node.required("name")?;
        let fontset = self
            .fontset_faces(node, name)
            .with_context(|| format!("in FontSet '{name}'"))?;

        if !map.insert_fontset(fontset) {
            log::warn!("Duplicate font set '{name}', keeping the first definition");
        }

        Ok(())
    }

    fn fontset_faces(&self, node: &ConfigNode, name: &str) -> Result<FontSet, Error> {
        node.check_children(&["Font"])?;

        let mut fontset = FontSet::new(name);
        for font in node.children() {
            let face_name = font.required("face_name")?;
            self.check_face(face_name)?;
            fontset.add_face_name(face_name);
        }

        Ok(fontset)
    }

    fn parse_metawriter(&self, map: &mut Map, node: &ConfigNode) -> Result<(), Error> {
        let name = node.required("name")?;
        let writer = match node.required("type")? {
            "json" => Ok(MetaWriter::Json {
                file: self.resolve_path(node.required("file")?),
                default_output: node.attribute("default-output").map(str::to_string),
                output_empty: node.flag_or("output-empty", true)?,
            }),
            other => Err(Error::config(format!("unknown meta writer type '{other}'"))),
        }
        .with_context(|| format!("in MetaWriter '{name}'"))?;

        if !map.insert_metawriter(name, writer) {
            log::warn!("Duplicate meta writer '{name}', keeping the first definition");
        }

        Ok(())
    }

    /// Checks references between elements that may be declared in any order.
    fn check_references(&self, map: &Map) -> Result<(), Error> {
        for (style_name, style) in map.styles() {
            for rule in style.rules() {
                for symbolizer in &rule.symbolizers {
                    self.check_symbolizer_references(map, symbolizer)
                        .with_context(|| format!("in {}", symbolizer.element_name()))
                        .with_context(|| format!("in rule '{}'", rule.name))
                        .with_context(|| format!("in style '{style_name}'"))?;
                }
            }
        }

        Ok(())
    }

    fn check_symbolizer_references(&self, map: &Map, symbolizer: &Symbolizer) -> Result<(), Error> {
        let font = match symbolizer {
            Symbolizer::Text(s) => Some(&s.text.font),
            Symbolizer::Shield(s) => Some(&s.text.font),
            _ => None,
        };
        if let Some(FontRef::FontSet(name)) = font {
            if map.find_fontset(name).is_none() {
                return Err(Error::config(format!(
                    "unable to find any fontset named '{name}'"
                )));
            }
        }

        let writer = symbolizer
            .base()
            .and_then(|base| base.meta_writer.as_deref());
        if let Some(name) = writer {
            if map.find_metawriter(name).is_none() {
                if self.strict {
                    return Err(Error::config(format!("meta writer '{name}' not found")));
                }
                log::warn!("Meta writer '{name}' not found, nothing will be recorded");
            }
        }

        Ok(())
    }

    fn check_face(&self, face_name: &str) -> Result<(), Error> {
        if self.context.fonts.has_face(face_name) {
            return Ok(());
        }

        if self.strict {
            return Err(Error::resource(face_name, "font face not found"));
        }

        log::warn!("Font face '{face_name}' not found");
        Ok(())
    }

    fn resolve_path(&self, path: &str) -> String {
        match &self.base_path {
            Some(base) if self.paths_from_xml && Path::new(path).is_relative() => {
                base.join(path).to_string_lossy().into_owned()
            }
            _ => path.to_string(),
        }
    }

    /// The `file` attribute, joined with the directory of the `base` file source if there is one.
    fn file(&self, node: &ConfigNode) -> Result<Option<PathExpression>, Error> {
        let Some(file) = node.attribute("file") else {
            return Ok(None);
        };

        let file = match node.attribute("base") {
            Some(base) => match self.file_sources.get(base) {
                Some(dir) => Path::new(dir).join(file).to_string_lossy().into_owned(),
                None if self.strict => {
                    return Err(Error::config(format!("unknown file source '{base}'")))
                }
                None => {
                    log::warn!("Unknown file source '{base}', using '{file}' as is");
                    file.to_string()
                }
            },
            None => file.to_string(),
        };

        let path = PathExpression::new(self.resolve_path(&file));
        if self.strict && !path.has_placeholders() {
            self.context
                .images
                .get(Path::new(path.template()))
                .map_err(|err| Error::resource(path.template(), err.to_string()))?;
        }

        Ok(Some(path))
    }

    fn required_file(&self, node: &ConfigNode) -> Result<PathExpression, Error> {
        self.file(node)?.ok_or_else(|| {
            Error::config(format!(
                "missing required attribute 'file' in '{}'",
                node.name()
            ))
        })
    }

    fn transform(&self, node: &ConfigNode) -> Result<Option<String>, Error> {
        let Some(transform) = node.attribute("transform") else {
            return Ok(None);
        };

        if parse_transform(transform).is_none() {
            if self.strict {
                return Err(Error::config(format!("invalid transform '{transform}'")));
            }
            log::warn!("Invalid transform '{transform}' will be ignored");
        }

        Ok(Some(transform.to_string()))
    }
}

fn read_parameters(node: &ConfigNode, params: &mut Parameters) -> Result<(), Error> {
    node.check_children(&["Parameter"])?;
    for parameter in node.children() {
        let name = parameter.required("name")?;
        let value = parameter.attribute("value").unwrap_or(parameter.text());
        params.insert(name.to_string(), value.to_string());
    }

    Ok(())
}

fn base(node: &ConfigNode) -> SymbolizerBase {
    SymbolizerBase {
        meta_writer: node.attribute("meta-writer").map(str::to_string),
        meta_output: node.attribute("meta-output").map(str::to_string),
    }
}

fn has_stroke(node: &ConfigNode) -> bool {
    node.attributes()
        .iter()
        .any(|(name, _)| name.starts_with("stroke"))
}

fn stroke(node: &ConfigNode) -> Result<Stroke, Error> {
    let d = Stroke::default();
    let dashes = match node.attribute("stroke-dasharray") {
        Some(text) => parse_number_list(text)
            .and_then(|values| dash_pairs(&values))
            .ok_or_else(|| Error::config(format!("invalid stroke-dasharray '{text}'")))?,
        None => d.dashes,
    };

    Ok(Stroke {
        color: node.parsed_or("stroke", d.color)?,
        width: node.parsed_or("stroke-width", d.width)?,
        opacity: node.parsed_or("stroke-opacity", d.opacity)?,
        line_join: node.parsed_or("stroke-linejoin", d.line_join)?,
        line_cap: node.parsed_or("stroke-linecap", d.line_cap)?,
        dashes,
        dash_offset: node.parsed_or("stroke-dashoffset", d.dash_offset)?,
    })
}

fn parse_number_list(text: &str) -> Option<Vec<f64>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse().ok())
        .collect()
}

fn single_char(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

fn optional_expression(node: &ConfigNode, name: &str) -> Result<Option<Expression>, Error> {
    node.attribute(name).map(Expression::parse).transpose()
}

fn colorizer(node: &ConfigNode) -> Result<Option<RasterColorizer>, Error> {
    node.child("RasterColorizer")
        .map(|child| color_bands(child).context("in RasterColorizer"))
        .transpose()
}

fn color_bands(node: &ConfigNode) -> Result<RasterColorizer, Error> {
    node.check_children(&["ColorBand"])?;

    let mut colorizer = RasterColorizer::new();
    for child in node.children() {
        let band = color_band(child).context("in ColorBand")?;
        colorizer.add_band(band);
    }

    Ok(colorizer)
}

fn color_band(node: &ConfigNode) -> Result<ColorBand, Error> {
    let mut band = ColorBand::new(node.required_parsed("value")?, node.required_parsed("color")?);
    band.max_value = node.parsed("max_value")?;
    band.midpoints = node.parsed_or("midpoints", 0)?;
    band.label = node.attribute("label").map(str::to_string);
    Ok(band)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::style::{LineJoin, MarkerType};

    fn load(xml: &str) -> Result<Map, Error> {
        load_with(xml, &LoadOptions::default())
    }

    fn load_with(xml: &str, options: &LoadOptions) -> Result<Map, Error> {
        let mut map = Map::new(256, 256);
        load_map_string(&mut map, xml, &Context::new(), options)?;
        Ok(map)
    }

    #[test]
    fn map_attributes() {
        let map = load(
            r##"<Map srs="+proj=merc" background-color="#ff0000" buffer_size="64"/>"##,
        )
        .unwrap();

        assert_eq!(map.srs(), "+proj=merc");
        assert_eq!(map.background(), Some(Color::RED));
        assert_eq!(map.buffer_size(), 64);
    }

    #[test]
    fn rules_and_symbolizers() {
        let map = load(
            r##"
            <Map>
              <Style name="roads">
                <Rule name="major" title="Major roads">
                  <Filter>[kind] = 'major'</Filter>
                  <MaxScaleDenominator>50000</MaxScaleDenominator>
                  <LineSymbolizer stroke="#ff0000" stroke-width="3" stroke-linejoin="round" stroke-dasharray="4,2"/>
                </Rule>
                <Rule>
                  <ElseFilter/>
                  <PolygonPatternSymbolizer file="hatch.png" alignment="global"/>
                  <MarkersSymbolizer stroke-width="2" placement="line"/>
                </Rule>
              </Style>
            </Map>"##,
        )
        .unwrap();

        let style = map.find_style("roads").unwrap();
        assert_eq!(style.rules().len(), 2);

        let major = &style.rules()[0];
        assert_eq!(major.title, "Major roads");
        assert_eq!(major.filter.as_ref().unwrap().source(), "[kind] = 'major'");
        assert_eq!(major.max_scale(), 50000.0);
        let Symbolizer::Line(line) = &major.symbolizers[0] else {
            panic!("expected a line symbolizer");
        };
        assert_eq!(line.stroke.color, Color::RED);
        assert_eq!(line.stroke.width, 3.0);
        assert_eq!(line.stroke.line_join, LineJoin::Round);
        assert_eq!(line.stroke.dashes, vec![(4.0, 2.0)]);

        let other = &style.rules()[1];
        assert!(other.is_else);
        let Symbolizer::PolygonPattern(pattern) = &other.symbolizers[0] else {
            panic!("expected a polygon pattern symbolizer");
        };
        assert_eq!(pattern.alignment, PatternAlignment::Global);
        let Symbolizer::Markers(markers) = &other.symbolizers[1] else {
            panic!("expected a markers symbolizer");
        };
        assert_eq!(markers.stroke.as_ref().unwrap().width, 2.0);
        assert_eq!(markers.effective_marker_type(), MarkerType::Arrow);
    }

    #[test]
    fn opacity_and_edge_attributes() {
        let map = load(
            r#"
            <Map>
              <Style name="s">
                <Rule name="set">
                  <PointSymbolizer avoid_edges="true"/>
                  <LinePatternSymbolizer file="dash.png" opacity="0.5"/>
                  <PolygonPatternSymbolizer file="hatch.png" opacity="0.25"/>
                  <MarkersSymbolizer avoid_edges="true"/>
                  <GlyphSymbolizer face_name="DejaVu Sans Book" char="'A'" size="10" opacity="0.75"/>
                </Rule>
                <Rule name="defaults">
                  <PointSymbolizer/>
                  <LinePatternSymbolizer file="dash.png"/>
                  <PolygonPatternSymbolizer file="hatch.png"/>
                  <MarkersSymbolizer/>
                  <GlyphSymbolizer face_name="DejaVu Sans Book" char="'A'" size="10"/>
                </Rule>
              </Style>
            </Map>"#,
        )
        .unwrap();

        let values = |rule: &Rule| -> (bool, f64, f64, bool, f64) {
            match rule.symbolizers.as_slice() {
                [
                    Symbolizer::Point(point),
                    Symbolizer::LinePattern(line),
                    Symbolizer::PolygonPattern(polygon),
                    Symbolizer::Markers(markers),
                    Symbolizer::Glyph(glyph),
                ] => (
                    point.avoid_edges,
                    line.opacity,
                    polygon.opacity,
                    markers.avoid_edges,
                    glyph.opacity,
                ),
                other => panic!("unexpected symbolizers {other:?}"),
            }
        };

        let rules = map.find_style("s").unwrap().rules();
        assert_eq!(values(&rules[0]), (true, 0.5, 0.25, true, 0.75));
        assert_eq!(values(&rules[1]), (false, 1.0, 1.0, false, 1.0));
    }

    #[test]
    fn unknown_child_is_named() {
        let err = load(r#"<Map><Style name="s"><Rules/></Style></Map>"#).unwrap_err();
        assert_matches!(err.kind(), ErrorKind::Config(_));
        assert_eq!(
            err.to_string(),
            "unknown child element 'Rules' in 'Style', expected 'Rule' in style 's' in map '<string>'"
        );
    }

    #[test]
    fn missing_attribute_names_element() {
        let err = load(
            r#"<Map><Style name="s"><Rule name="r"><LinePatternSymbolizer/></Rule></Style></Map>"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing required attribute 'file' in 'LinePatternSymbolizer' in LinePatternSymbolizer in rule 'r' in style 's' in map '<string>'"
        );
    }

    #[test]
    fn filter_and_else_filter_conflict() {
        let err = load(
            r#"<Map><Style name="s"><Rule><Filter>[a] = 1</Filter><ElseFilter/></Rule></Style></Map>"#,
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("a rule can't have both"));
    }

    #[test]
    fn colorizer_errors_carry_the_path() {
        let err = load(
            r#"
            <Map>
              <Style name="dem">
                <Rule name="water">
                  <RasterSymbolizer>
                    <RasterColorizer>
                      <ColorBand value="0"/>
                    </RasterColorizer>
                  </RasterSymbolizer>
                </Rule>
              </Style>
            </Map>"#,
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "missing required attribute 'color' in 'ColorBand' in ColorBand in RasterColorizer in RasterSymbolizer in rule 'water' in style 'dem' in map '<string>'"
        );
    }

    #[test]
    fn version_gate() {
        let err = load(r#"<Map minimum_version="99.0.0"/>"#).unwrap_err();
        assert_matches!(err.kind(), ErrorKind::Version { required, .. } if required == "99.0.0");

        assert!(load(r#"<Map minimum_version="0.0.1"/>"#).is_ok());
        assert!(load(r#"<Map minimum_version="latest"/>"#).is_ok());
    }

    #[test]
    fn versions() {
        assert_eq!(parse_version("2.0.10"), Some((2, 0, 10)));
        assert_eq!(parse_version("2.0"), None);
        assert_eq!(parse_version("2.0.1.4"), None);
        assert!(parse_version("1.10.0") > parse_version("1.9.9"));
    }

    #[test]
    fn not_a_map() {
        let err = load("<Style/>").unwrap_err();
        assert!(err.to_string().starts_with("not a map document"));
    }

    #[test]
    fn unknown_plugin_fails_layer() {
        let xml = r#"
            <Map>
              <Layer name="roads">
                <Datasource>
                  <Parameter name="type">no-such-plugin</Parameter>
                </Datasource>
              </Layer>
            </Map>"#;

        let err = load(xml).unwrap_err();
        assert_matches!(err.kind(), ErrorKind::Config(message) if message.contains("no-such-plugin"));
        assert!(err.to_string().ends_with("in layer 'roads' in map '<string>'"));

        let map = load_with(xml, &LoadOptions::default().with_skip_failed_datasources(true)).unwrap();
        assert_eq!(map.layers().len(), 1);
        assert!(map.layers()[0].datasource().is_none());
    }

    #[cfg(feature = "geojson")]
    #[test]
    fn datasource_templates() {
        let map = load(
            r#"
            <Map srs="+proj=merc">
              <Datasource name="empty">
                <Parameter name="type">geojson</Parameter>
                <Parameter name="inline">{"type": "FeatureCollection", "features": []}</Parameter>
              </Datasource>
              <Layer name="a" status="off" maxzoom="1000">
                <StyleName>one</StyleName>
                <StyleName>two</StyleName>
                <Datasource base="empty">
                  <Parameter name="encoding" value="utf-8"/>
                </Datasource>
              </Layer>
            </Map>"#,
        )
        .unwrap();

        let layer = &map.layers()[0];
        assert_eq!(layer.srs, "+proj=merc");
        assert!(!layer.active);
        assert_eq!(layer.max_zoom, 1000.0);
        assert_eq!(layer.styles(), ["one", "two"]);

        let params = layer.datasource().unwrap().params();
        assert_eq!(params.get("type").map(String::as_str), Some("geojson"));
        assert_eq!(params.get("encoding").map(String::as_str), Some("utf-8"));
    }

    #[test]
    fn includes_are_flattened() {
        let map = load(
            r#"<Map><Include><Style name="a"/><Include><Style name="b"/></Include></Include></Map>"#,
        )
        .unwrap();
        assert!(map.find_style("a").is_some());
        assert!(map.find_style("b").is_some());
    }

    #[test]
    fn text_fonts() {
        let xml = r#"
            <Map>
              <Style name="labels">
                <Rule>
                  <TextSymbolizer name="[name]" fontset_name="sans" wrap_character=";" text_convert="toupper"/>
                </Rule>
              </Style>
              <FontSet name="sans">
                <Font face_name="DejaVu Sans Book"/>
              </FontSet>
            </Map>"#;
        let map = load(xml).unwrap();
        let Symbolizer::Text(text) = &map.find_style("labels").unwrap().rules()[0].symbolizers[0] else {
            panic!("expected a text symbolizer");
        };
        assert_eq!(text.text.font, FontRef::FontSet("sans".into()));
        assert_eq!(text.text.wrap_character, ';');
        assert_eq!(map.find_fontset("sans").unwrap().face_names(), ["DejaVu Sans Book"]);

        let err = load(r#"<Map><Style name="s"><Rule><TextSymbolizer name="[n]" fontset_name="missing"/></Rule></Style></Map>"#).unwrap_err();
        assert!(err.to_string().starts_with("unable to find any fontset named 'missing'"));

        let err = load(r#"<Map><Style name="s"><Rule><TextSymbolizer name="[n]" face_name="a" fontset_name="b"/></Rule></Style></Map>"#).unwrap_err();
        assert!(err.to_string().starts_with("can't have both"));
    }

    #[test]
    fn strict_mode() {
        let strict = LoadOptions::default().with_strict(true);

        let missing_font = r#"<Map><Style name="s"><Rule><TextSymbolizer name="[n]" face_name="No Such Font"/></Rule></Style></Map>"#;
        assert!(load(missing_font).is_ok());
        let err = load_with(missing_font, &strict).unwrap_err();
        assert_matches!(err.kind(), ErrorKind::ResourceLoad { resource, .. } if resource == "No Such Font");

        let missing_image = r#"<Map><Style name="s"><Rule><PointSymbolizer file="/no/such/icon.png"/></Rule></Style></Map>"#;
        assert!(load(missing_image).is_ok());
        assert_matches!(load_with(missing_image, &strict).unwrap_err().kind(), ErrorKind::ResourceLoad { .. });

        let two_else = r#"<Map><Style name="s"><Rule><ElseFilter/></Rule><Rule><ElseFilter/></Rule></Style></Map>"#;
        assert!(load(two_else).is_ok());
        assert!(load_with(two_else, &strict).is_err());

        let missing_writer = r#"<Map><Style name="s"><Rule><PolygonSymbolizer meta-writer="points"/></Rule></Style></Map>"#;
        assert!(load(missing_writer).is_ok());
        assert!(load_with(missing_writer, &strict).is_err());
    }

    #[test]
    fn paths_are_resolved() {
        let xml = r#"
            <Map>
              <FileSource name="icons">symbols</FileSource>
              <Style name="s">
                <Rule>
                  <PointSymbolizer file="[kind].png" base="icons"/>
                  <PointSymbolizer file="/abs/dot.png"/>
                </Rule>
              </Style>
            </Map>"#;

        let files = |map: &Map| -> Vec<String> {
            map.find_style("s").unwrap().rules()[0]
                .symbolizers
                .iter()
                .flat_map(|s| s.files())
                .map(|f| f.template().to_string())
                .collect()
        };

        let map = load_with(xml, &LoadOptions::default().with_base_path("/maps")).unwrap();
        let relative = Path::new("/maps").join("symbols").join("[kind].png");
        assert_eq!(
            files(&map),
            vec![relative.to_string_lossy().into_owned(), "/abs/dot.png".to_string()]
        );

        let map = load_with(
            xml,
            &LoadOptions::default()
                .with_base_path("/maps")
                .with_paths_from_xml(false),
        )
        .unwrap();
        let relative = Path::new("symbols").join("[kind].png");
        assert_eq!(
            files(&map),
            vec![relative.to_string_lossy().into_owned(), "/abs/dot.png".to_string()]
        );
    }

    #[test]
    fn metawriters() {
        let map = load(
            r#"<Map><MetaWriter name="points" type="json" file="meta.json" default-output="name" output-empty="false"/></Map>"#,
        )
        .unwrap();
        assert_eq!(
            map.find_metawriter("points"),
            Some(&MetaWriter::Json {
                file: "meta.json".into(),
                default_output: Some("name".into()),
                output_empty: false,
            })
        );

        let err = load(r#"<Map><MetaWriter name="x" type="csv" file="a"/></Map>"#).unwrap_err();
        assert!(err.to_string().starts_with("unknown meta writer type 'csv' in MetaWriter 'x'"));
    }

    #[test]
    fn invalid_values() {
        let err = load(r#"<Map><Style name="s"><Rule><PolygonSymbolizer fill="nope"/></Rule></Style></Map>"#).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse attribute 'fill' value 'nope'"));

        let err = load(r#"<Map><Style name="s"><Rule><LineSymbolizer stroke-dasharray="0,0"/></Rule></Style></Map>"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid stroke-dasharray"));

        let err = load(r#"<Map><Style name="s"><Rule><MinScaleDenominator>10</MinScaleDenominator><MaxScaleDenominator>5</MaxScaleDenominator></Rule></Style></Map>"#).unwrap_err();
        assert!(err.to_string().starts_with("invalid scale range"));
    }
}
