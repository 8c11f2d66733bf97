use std::error::Error;
use std::env::args;
use std::process;

use vehicle_recognition::locator::PlateLocator;

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = args();
    args.next();
    let path = match args.next() {
        Some(path) => path,
        None => {
            eprintln!("usage: locate <image> [crop.png] [overlay.png]");
            process::exit(1);
        }
    };
    let crop_path = args.next().unwrap_or_else(|| "plate_crop.png".to_string());
    let overlay_path = args.next();

    let locator = PlateLocator::default();
    let img = vehicle_recognition::utils::open_image(&path)?;
    match locator.locate(&img) {
        Some(crop) => {
            println!("plate region {}x{}, saved to {}", crop.width(), crop.height(), crop_path);
            crop.save(&crop_path)?;
        },
        None => {
            println!("no plate region in {}", path);
            process::exit(1);
        }
    }
    if let Some(overlay_path) = overlay_path {
        locator.draw_detection(&img, &overlay_path)?;
        println!("overlay saved to {}", overlay_path);
    }
    Ok(())
}
