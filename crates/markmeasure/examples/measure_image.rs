use image::ImageReader;
use markmeasure::{MeasureConfig, Measurer};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "Usage: {} <image.png> <marker_side_cm> [marker_id] [out.json]",
            args[0]
        );
        std::process::exit(2);
    }

    let frame = ImageReader::open(&args[1])?.decode()?.to_rgb8();
    let mut config = MeasureConfig::default();
    config.calibration.side_length = args[2].parse()?;
    if let Some(id) = args.get(3) {
        config.calibration.expected_id = id.parse()?;
    }

    let mut measurer = Measurer::new(config)?;
    let report = measurer.process_frame(&frame);

    println!("{}", report.marker);
    for object in &report.objects {
        println!(
            "object at ({:.0}, {:.0}): {:.2} x {:.2} cm",
            object.rect.center[0], object.rect.center[1], object.size.width, object.size.height
        );
    }

    if let Some(out_path) = args.get(4) {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(out_path, json)?;
        println!("Wrote {out_path}");
    }
    Ok(())
}
