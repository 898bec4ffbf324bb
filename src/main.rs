// Example runner for the `gradient_blobs` library: loads an image, runs the
// full pipeline, and prints a summary of the extracted blobs.

use std::env;
use std::process;

use gradient_blobs::pipeline::{BlobPipeline, PipelineConfig};

fn main() {
    flexi_logger::Logger::try_with_env_or_str("info")
        .expect("invalid log specification")
        .start()
        .expect("logger failed to start");

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: gradient_blobs <image_path> [kernel_width]");
        return;
    }

    let kernel_width = args
        .get(2)
        .map(|raw| raw.parse::<u32>().unwrap_or(0))
        .unwrap_or(3);
    let config = PipelineConfig {
        kernel_width,
        gradient_average: None,
    };

    let pipeline = match BlobPipeline::new(config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            eprintln!("bad configuration: {err}");
            process::exit(1);
        }
    };

    let frame = match pipeline.process_file(&args[1]) {
        Ok(frame) => frame,
        Err(err) => {
            eprintln!("failed to process {}: {err}", args[1]);
            process::exit(1);
        }
    };

    println!(
        "{}: {} blobs over a {}x{} field",
        args[1],
        frame.blobs.len(),
        frame.width,
        frame.height
    );
    println!(
        "frame totals: I={:.1} G={:.1} Dy={:.1} Dx={:.1}",
        frame.i, frame.g, frame.dy, frame.dx
    );

    let mut largest: Vec<_> = frame.blobs.iter().collect();
    largest.sort_by_key(|blob| std::cmp::Reverse(blob.dert.l));
    for blob in largest.iter().take(5) {
        let bb = &blob.bounding_box;
        println!(
            "  blob {:>4}: sign={} box=({},{})..({},{}) pixels={} segments={}",
            blob.id,
            if blob.sign { '+' } else { '-' },
            bb.y0,
            bb.x0,
            bb.yn,
            bb.xn,
            blob.dert.l,
            blob.segments.len()
        );
    }
}
