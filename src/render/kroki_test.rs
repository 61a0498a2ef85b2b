use super::*;

#[test]
fn url_joins_type_and_format() {
    let transport = KrokiTransport::new("https://kroki.example/", Duration::from_secs(1)).unwrap();
    assert_eq!(
        transport.url(DiagramType::Graphviz, ImageFormat::Svg),
        "https://kroki.example/graphviz/svg"
    );
    assert_eq!(
        transport.url(DiagramType::PlantUml, ImageFormat::Png),
        "https://kroki.example/plantuml/png"
    );
}
