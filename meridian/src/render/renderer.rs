use std::collections::BTreeSet;
use std::sync::Arc;

use meridian_types::{BoundingBox, Projection};

use crate::context::Context;
use crate::error::{Error, ResultExt};
use crate::datasource::Query;
use crate::map::{Layer, Map};
use crate::render::canvas::{rect_path, Canvas, FillPaint};
use crate::render::image_canvas::ImageCanvas;
use crate::render::metawriter::MetaRecorder;
use crate::render::placement::PlacementArbiter;
use crate::render::symbolizer::{render_symbolizer, SymbolizerContext};
use crate::style::Style;
use crate::transform::{PixelTransform, ProjTransform, ViewTransform};

/// Renders maps into a [`Canvas`].
///
/// A render pass paints the background, then every layer that is active and visible at the current
/// scale in order. For each style of a layer, the layer's datasource is queried for the buffered
/// map extent, every feature is matched against the style's rules and the symbolizers of the
/// matching rules draw it. Labels and markers of all layers share one placement arbiter, unless a
/// layer asks to clear it.
pub struct Renderer<'a> {
    map: &'a Map,
    context: &'a Context,
}

impl<'a> Renderer<'a> {
    /// Creates a renderer of the map, taking shared resources from the context.
    pub fn new(map: &'a Map, context: &'a Context) -> Self {
        Self { map, context }
    }

    /// Renders the map into the canvas.
    pub fn render(&self, canvas: &mut dyn Canvas) -> Result<(), Error> {
        let map = self.map;
        let map_projection = Projection::new(map.srs()).context("in map srs")?;
        let view = map.view_transform();
        let scale_denominator = map.scale_denominator();
        log::debug!(
            "Rendering {}x{} map at scale 1:{scale_denominator:.0}, extent {:?}",
            map.width(),
            map.height(),
            map.current_extent()
        );

        self.render_background(canvas);

        let mut placement = PlacementArbiter::new(map.width(), map.height());
        let mut meta = MetaRecorder::new();
        for layer in map.layers() {
            if !layer.visible(scale_denominator) {
                log::trace!("Layer '{}' is not visible at the current scale", layer.name);
                continue;
            }

            let mut pass = LayerPass {
                canvas: &mut *canvas,
                map_projection: &map_projection,
                view: &view,
                scale_denominator,
                placement: &mut placement,
                meta: &mut meta,
            };
            self.render_layer(layer, &mut pass)
                .with_context(|| format!("in layer '{}'", layer.name))?;
        }

        meta.write_all(map)
    }

    fn render_background(&self, canvas: &mut dyn Canvas) {
        let size = canvas.size();
        let full = BoundingBox::new(0.0, 0.0, size.width() as f64, size.height() as f64);
        if let Some(color) = self.map.background() {
            canvas.fill_path(&rect_path(&full), &FillPaint::new(color));
        }

        let Some(path) = self.map.background_image() else {
            return;
        };
        let image = match self.context.images.get(path) {
            Ok(image) => image,
            Err(err) => {
                log::warn!("Skipping map background image: {err}");
                return;
            }
        };
        if image.width() == 0 || image.height() == 0 {
            return;
        }

        for y in (0..size.height()).step_by(image.height() as usize) {
            for x in (0..size.width()).step_by(image.width() as usize) {
                canvas.draw_image_at(&image, x as f64, y as f64, 1.0);
            }
        }
    }

    fn render_layer(&self, layer: &Layer, pass: &mut LayerPass<'_>) -> Result<(), Error> {
        let Some(datasource) = layer.datasource() else {
            log::debug!("Layer '{}' has no datasource", layer.name);
            return Ok(());
        };

        if layer.clear_label_cache {
            pass.placement.clear();
        }

        let layer_projection = Projection::new(&layer.srs).context("in layer srs")?;
        let proj = ProjTransform::new(&layer_projection, pass.map_projection);
        let bbox = proj.backward_box(&self.map.buffered_extent())?;
        let resolution = (
            self.map.width() as f64 / bbox.width(),
            self.map.height() as f64 / bbox.height(),
        );

        for style_name in layer.styles() {
            let style = self.find_style(style_name);
            if style.applicable_rules(pass.scale_denominator).is_empty() {
                log::trace!("No rules of style '{style_name}' apply at the current scale");
                continue;
            }

            let mut query = Query::new(bbox, resolution, pass.scale_denominator);
            for name in style.attribute_names() {
                query.add_property_name(name);
            }
            for name in self.meta_output_names(&style) {
                query.add_property_name(name);
            }

            let features = datasource
                .features(&query)
                .with_context(|| format!("in style '{style_name}'"))?;

            let mut ctx = SymbolizerContext {
                canvas: &mut *pass.canvas,
                transform: PixelTransform::new(&proj, pass.view),
                map: self.map,
                resources: self.context,
                placement: &mut *pass.placement,
                meta: &mut *pass.meta,
            };

            let mut count = 0usize;
            for feature in features {
                for rule in style.matching_rules(&feature, pass.scale_denominator) {
                    for symbolizer in &rule.symbolizers {
                        render_symbolizer(symbolizer, &feature, &mut ctx);
                    }
                }
                count += 1;
            }
            log::trace!(
                "Rendered {count} features of layer '{}' with style '{style_name}'",
                layer.name
            );
        }

        Ok(())
    }

    /// Attributes recorded by the meta writers named by the symbolizers of the style.
    fn meta_output_names(&self, style: &Style) -> BTreeSet<String> {
        style
            .rules()
            .iter()
            .flat_map(|rule| &rule.symbolizers)
            .filter_map(|symbolizer| symbolizer.base())
            .flat_map(|base| {
                base.meta_writer
                    .as_deref()
                    .and_then(|name| self.map.find_metawriter(name))
                    .map(|writer| writer.output_properties(base.meta_output.as_deref()))
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Style of the map with the name, falling back to the shared style cache.
    fn find_style(&self, name: &str) -> StyleRef<'a> {
        match self.map.find_style(name) {
            Some(style) => StyleRef::Map(style),
            None => StyleRef::Cached(self.context.styles.find(name)),
        }
    }
}

struct LayerPass<'p> {
    canvas: &'p mut dyn Canvas,
    map_projection: &'p Projection,
    view: &'p ViewTransform,
    scale_denominator: f64,
    placement: &'p mut PlacementArbiter,
    meta: &'p mut MetaRecorder,
}

enum StyleRef<'a> {
    Map(&'a Style),
    Cached(Arc<Style>),
}

impl std::ops::Deref for StyleRef<'_> {
    type Target = Style;

    fn deref(&self) -> &Style {
        match self {
            StyleRef::Map(style) => style,
            StyleRef::Cached(style) => style,
        }
    }
}

/// Renders the map into a new image of the map's size.
pub fn render_to_image(map: &Map, context: &Context) -> Result<ImageCanvas, Error> {
    let mut canvas = ImageCanvas::new(map.width(), map.height());
    Renderer::new(map, context).render(&mut canvas)?;
    Ok(canvas)
}
