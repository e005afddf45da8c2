//! Select the most mutually distinct frames of a video.

use maxspread::cli::parse_args;
use maxspread::logging;
use maxspread::run::run_frames;

const ABOUT: &str = "Select the k most spread-out frames of a folder of images.";

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(cli) = parse_args(std::env::args().skip(1).collect(), "maxspread-frames", ABOUT)? else {
        return Ok(());
    };
    let settings = cli
        .resolve()
        .map_err(|err| format!("configuration failed: {err}"))?;
    if let Err(err) = logging::init(Some(&settings.results)) {
        eprintln!("Logging unavailable: {err}");
    }
    let report =
        run_frames(&settings).map_err(|err| format!("{} failed: {err}", err.stage()))?;
    println!("{}", report.run_dir.display());
    for frame in &report.selected {
        println!("{frame}");
    }
    Ok(())
}
