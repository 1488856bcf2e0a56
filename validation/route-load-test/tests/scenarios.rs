//! The bundled scenario files must stay loadable.

use std::path::Path;

use route_load_test::RunSettings;

#[test]
fn test_bundled_scenarios_validate() {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("scenarios");
    let mut count = 0;

    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
            continue;
        }
        let settings = RunSettings::from_file(&path).unwrap();
        let config = settings
            .validate()
            .unwrap_or_else(|e| panic!("{}: {}", path.display(), e));
        assert!(config.name().is_some(), "{} has no name", path.display());
        count += 1;
    }

    assert!(count >= 2);
}
