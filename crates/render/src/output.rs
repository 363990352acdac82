use std::fs;
use std::path::Path;

use anyhow::Context;
use teammap_core::engine::HeadlessFactory;
use teammap_core::icons::PhotoSource;
use teammap_core::session::DebugStatus;
use teammap_core::svg;
use teammap_core::PeopleMap;
use tracing::info;

pub const ICON_DIR: &str = "icons";

/// Write `map.svg`, `status.json` and every registered icon under `dir`.
pub fn write_snapshot<P: PhotoSource + 'static>(
    dir: &Path,
    map: &PeopleMap<HeadlessFactory, P>,
) -> anyhow::Result<DebugStatus> {
    let icons = dir.join(ICON_DIR);
    fs::create_dir_all(&icons).with_context(|| format!("creating {}", icons.display()))?;

    let engine = map.engine()?;
    for (key, icon) in engine.images() {
        let png = icon
            .encode_png()
            .with_context(|| format!("encoding icon {key}"))?;
        fs::write(icons.join(svg::icon_file_name(key)), png)?;
    }

    let camera = map.controller().camera()?;
    let doc = svg::render_snapshot(
        &camera,
        engine.shapes(),
        engine.images(),
        map.overlay(),
        ICON_DIR,
    );
    fs::write(dir.join("map.svg"), doc).context("writing map.svg")?;

    let status = map.debug_status();
    let json = serde_json::to_string_pretty(&status)?;
    fs::write(dir.join("status.json"), json).context("writing status.json")?;

    info!(
        dir = %dir.display(),
        icons = engine.images().len(),
        shapes = engine.shapes().len(),
        "Snapshot written"
    );
    Ok(status)
}
