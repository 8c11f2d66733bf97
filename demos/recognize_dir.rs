use std::error::Error;
use std::env::args;
use std::process;
use std::time::SystemTime;
use std::fs;

use vehicle_recognition::Pipeline;
use vehicle_recognition::classifier::load_classifier;
use vehicle_recognition::config::RecognitionConfig;
use vehicle_recognition::db::SqliteRegistry;
use vehicle_recognition::ocr::TesseractOcr;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let mut args = args();
    args.next();
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: recognize_dir <dir> [model.pb] [registry.db]");
            process::exit(1);
        }
    };
    let model = args.next().unwrap_or_else(|| "model_600_450_32_categorical.pb".to_string());
    let db = args.next().unwrap_or_else(|| "vehicle_recognition.db".to_string());

    let config = RecognitionConfig::default();
    let classifier = load_classifier(&model, &config.classifier)?;
    let ocr = TesseractOcr::new(config.ocr.clone());
    let registry = SqliteRegistry::open(&db)?;
    let pipeline = Pipeline::new(&config, classifier, Box::new(ocr), Box::new(registry))?;

    let mut paths: Vec<_> = fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| match p.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ["jpg", "jpeg", "png"].contains(&ext.to_lowercase().as_str()),
            None => false,
        })
        .collect();
    paths.sort();

    let mut speeds = Vec::new();
    let mut plates = 0;
    let mut matches = 0;
    for path in &paths {
        let before_time = SystemTime::now();
        let res = pipeline.process_image(path);
        let speed = SystemTime::now().duration_since(before_time)?.as_millis();
        speeds.push(speed);
        match res {
            Ok(report) => {
                if report.plate_text().is_some() {
                    plates += 1;
                }
                if report.is_match() {
                    matches += 1;
                }
                println!("file: {:?}, plate: {:?}, match: {}, speed: {}",
                    path, report.plate_text(), report.is_match(), speed);
            },
            Err(e) => println!("file: {:?}, error: {}", path, e),
        }
    }
    let total_speed: u128 = speeds.iter().sum();
    let average_speed = if speeds.is_empty() { 0 } else { total_speed / speeds.len() as u128 };
    println!("total_amount: {}, plates: {}, matches: {}, average_speed: {}",
        paths.len(), plates, matches, average_speed);
    Ok(())
}
