use std::path::PathBuf;

use assert_matches::assert_matches;
use meridian::config::{load_map, load_map_string, save_map_to_string, LoadOptions, SaveOptions};
use meridian::meridian_types::BoundingBox;
use meridian::render::{DrawCommand, RecordingCanvas};
use meridian::{render_to_image, Color, Context, ErrorKind, Map, Renderer};

const STYLE: &str = r##"
<Map srs="+proj=longlat +datum=WGS84" background-color="#ffffff" buffer_size="8">
  <Style name="water">
    <Rule name="lakes">
      <Filter>[natural] = 'water'</Filter>
      <PolygonSymbolizer fill="#0000ff"/>
    </Rule>
    <Rule name="rest">
      <ElseFilter/>
      <LineSymbolizer stroke="#ff0000" stroke-width="2"/>
    </Rule>
  </Style>
  <Layer name="areas">
    <StyleName>water</StyleName>
    <Datasource>
      <Parameter name="type">geojson</Parameter>
      <Parameter name="file">areas.geojson</Parameter>
    </Datasource>
  </Layer>
</Map>
"##;

const AREAS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": {"natural": "water"},
      "geometry": {"type": "Polygon", "coordinates": [[[10,10],[40,10],[40,40],[10,40],[10,10]]]}
    },
    {
      "type": "Feature",
      "properties": {"natural": "wood"},
      "geometry": {"type": "Polygon", "coordinates": [[[60,60],[90,60],[90,90],[60,90],[60,60]]]}
    }
  ]
}"#;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meridian-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_document(name: &str) -> PathBuf {
    let dir = temp_dir(name);
    std::fs::write(dir.join("areas.geojson"), AREAS).unwrap();
    let path = dir.join("style.xml");
    std::fs::write(&path, STYLE).unwrap();
    path
}

#[test]
fn loads_and_renders_a_document() {
    let _ = env_logger::builder().is_test(true).try_init();

    let path = write_document("render");
    let context = Context::new();
    let mut map = Map::new(100, 100);
    load_map(&mut map, &path, &context, &LoadOptions::default()).unwrap();

    assert_eq!(map.background(), Some(Color::WHITE));
    assert_eq!(map.buffer_size(), 8);
    assert_eq!(map.layers().len(), 1);
    assert!(map.layers()[0].datasource().is_some());

    map.zoom_to_box(BoundingBox::new(0.0, 0.0, 100.0, 100.0));

    let mut canvas = RecordingCanvas::new(100, 100);
    Renderer::new(&map, &context).render(&mut canvas).unwrap();
    let commands: Vec<(&'static str, Color)> = canvas
        .commands
        .iter()
        .map(|command| match command {
            DrawCommand::Fill { color, .. } => ("fill", *color),
            DrawCommand::Stroke { color, .. } => ("stroke", *color),
            other => panic!("unexpected command {other:?}"),
        })
        .collect();
    assert_eq!(
        commands,
        [
            ("fill", Color::WHITE),
            ("fill", Color::BLUE),
            ("stroke", Color::RED)
        ]
    );

    let image = render_to_image(&map, &context).unwrap();
    assert_eq!(image.pixel(25, 75), Some(Color::BLUE));
    assert_eq!(image.pixel(75, 25), Some(Color::WHITE));
    assert_eq!(image.pixel(5, 5), Some(Color::WHITE));

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn saved_document_loads_into_the_same_map() {
    let path = write_document("save");
    let context = Context::new();
    let mut map = Map::new(100, 100);
    load_map(&mut map, &path, &context, &LoadOptions::default()).unwrap();

    let options = SaveOptions::default().with_explicit_defaults(true);
    let saved = save_map_to_string(&map, &options).unwrap();

    let mut reloaded = Map::new(100, 100);
    load_map_string(&mut reloaded, &saved, &context, &LoadOptions::default()).unwrap();

    assert_eq!(reloaded.srs(), map.srs());
    assert_eq!(reloaded.background(), map.background());
    assert_eq!(reloaded.buffer_size(), map.buffer_size());
    assert_eq!(reloaded.styles(), map.styles());
    assert_eq!(reloaded.layers()[0].styles(), map.layers()[0].styles());
    assert_eq!(save_map_to_string(&reloaded, &options).unwrap(), saved);

    std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
}

#[test]
fn newer_documents_are_rejected() {
    let mut map = Map::new(10, 10);
    let err = load_map_string(
        &mut map,
        r#"<Map minimum_version="99.0.0"/>"#,
        &Context::new(),
        &LoadOptions::default(),
    )
    .unwrap_err();

    assert_matches!(err.kind(), ErrorKind::Version { required, .. } if required == "99.0.0");
}

const UNKNOWN_PLUGIN: &str = r#"
<Map>
  <Layer name="roads">
    <Datasource>
      <Parameter name="type">no-such-plugin</Parameter>
    </Datasource>
  </Layer>
</Map>
"#;

#[test]
fn unknown_plugins_are_config_errors() {
    let mut map = Map::new(10, 10);
    let err = load_map_string(
        &mut map,
        UNKNOWN_PLUGIN,
        &Context::new(),
        &LoadOptions::default(),
    )
    .unwrap_err();

    assert_matches!(err.kind(), ErrorKind::Config(message) if message.contains("'no-such-plugin'"));
    assert_eq!(err.context(), ["in layer 'roads'", "in map '<string>'"]);
    assert!(err.to_string().ends_with(" in layer 'roads' in map '<string>'"));
}

#[test]
fn failed_datasources_can_be_skipped() {
    let mut map = Map::new(10, 10);
    load_map_string(
        &mut map,
        UNKNOWN_PLUGIN,
        &Context::new(),
        &LoadOptions::default().with_skip_failed_datasources(true),
    )
    .unwrap();

    assert_eq!(map.layers().len(), 1);
    assert!(map.layers()[0].datasource().is_none());
}

#[test]
fn errors_name_the_failing_element() {
    let xml = r#"
        <Map>
          <Style name="roads">
            <Rule name="major">
              <LineSymbolizer stroke-width="wide"/>
            </Rule>
          </Style>
        </Map>
    "#;
    let mut map = Map::new(10, 10);
    let err = load_map_string(&mut map, xml, &Context::new(), &LoadOptions::default()).unwrap_err();

    assert_matches!(err.kind(), ErrorKind::Config(_));
    assert_eq!(
        err.context(),
        [
            "in LineSymbolizer",
            "in rule 'major'",
            "in style 'roads'",
            "in map '<string>'"
        ]
    );
}
