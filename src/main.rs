use clap::{ Arg, App, ArgMatches };
use env_logger::Env;
use log::{ error, info, warn };

use std::path::Path;
use std::process;

use vehicle_recognition::Pipeline;
use vehicle_recognition::classifier::load_classifier;
use vehicle_recognition::config::RecognitionConfig;
use vehicle_recognition::db::SqliteRegistry;
use vehicle_recognition::error::VrError;
use vehicle_recognition::ocr::TesseractOcr;


fn main() {
    let matches = App::new("vehicle-recognition")
                    .version("0.1.0")
                    .author("kingrong")
                    .about("Recognizes make/model, color and plate of a vehicle and checks them against a registry")
                    .arg(Arg::with_name("image")
                        .long("image")
                        .help("image file of the vehicle")
                        .takes_value(true)
                        .required(true))
                    .arg(Arg::with_name("model")
                        .long("model")
                        .help("frozen make/model classifier graph")
                        .takes_value(true)
                        .default_value("model_600_450_32_categorical.pb"))
                    .arg(Arg::with_name("db")
                        .long("db")
                        .help("SQLite registry of known vehicles")
                        .takes_value(true)
                        .default_value("vehicle_recognition.db"))
                    .arg(Arg::with_name("config")
                        .long("config")
                        .help("JSON file overriding recognition thresholds")
                        .takes_value(true))
                    .arg(Arg::with_name("init-db")
                        .long("init-db")
                        .help("insert the sample vehicles into the registry first"))
                    .arg(Arg::with_name("quiet")
                        .long("quiet")
                        .short("q")
                        .help("only print warnings and errors"))
                    .get_matches();

    let level = if matches.is_present("quiet") { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    // 0 only when everything ran and the registry knows the vehicle
    let code = match run(&matches) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            error!("{}", e);
            1
        }
    };
    process::exit(code);
}

fn run(matches: &ArgMatches) -> Result<bool, VrError> {
    let image = matches.value_of("image").ok_or_else(|| VrError::input("image is required"))?;
    if !Path::new(image).exists() {
        return Err(VrError::input(format!("image not found: {}", image)));
    }
    let model = matches.value_of("model").unwrap_or_default();
    let db = matches.value_of("db").unwrap_or_default();

    let config = match matches.value_of("config") {
        Some(path) => RecognitionConfig::load(path)?,
        None => RecognitionConfig::default(),
    };

    let classifier = load_classifier(model, &config.classifier)?;

    let ocr = TesseractOcr::new(config.ocr.clone());
    match ocr.version() {
        Ok(version) => info!("using {}", version),
        Err(e) => warn!("{}", e),
    }

    let registry = SqliteRegistry::open(db)?;
    if matches.is_present("init-db") {
        registry.add_sample_data()?;
    }

    let pipeline = Pipeline::new(&config, classifier, Box::new(ocr), Box::new(registry))?;
    let report = pipeline.process_image(image)?;
    if !matches.is_present("quiet") {
        println!("{}", report.summary());
    }
    Ok(report.is_match())
}
