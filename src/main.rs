use std::path::PathBuf;
use yolo_annotate::app::App;
use yolo_annotate::config::AppConfig;

fn main() {
    let (config, config_error) = match AppConfig::load_default_location() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    // RUST_LOG overrides the configured level.
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();
    if let Some(e) = config_error {
        log::warn!("Failed to load configuration, using defaults: {}", e);
    }

    let dataset_dir = std::env::args().nth(1).map(PathBuf::from);
    if let Some(dir) = &dataset_dir {
        if !dir.is_dir() {
            eprintln!("Not a directory: {}", dir.display());
            std::process::exit(1);
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 900.0])
            .with_title("yolo-annotate"),
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "yolo-annotate",
        options,
        Box::new(move |cc| Ok(Box::new(App::new(cc, config, dataset_dir)))),
    ) {
        log::error!("Application error: {}", e);
        std::process::exit(1);
    }
}
