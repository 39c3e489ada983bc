use log::{error, info, warn};
use sift_cli::render;
use sift_cli::{load_grid, FeaturePipeline, PipelineConfig, PipelineError, PipelineResult};
use sift_core::{BorderPolicy, Grid};
use sift_descriptor::Capabilities;
use sift_detect::{AnmsSpec, CornerMethod, LevelNaming, PyramidSpec};
use std::path::{Path, PathBuf};
use std::time::Instant;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "sift",
    about = "Scale-space keypoints, gradient-histogram descriptors and matching"
)]
struct Opt {
    /// One image to detect keypoints in, or two images to match.
    #[structopt(parse(from_os_str), required = true, max_values = 2)]
    sources: Vec<PathBuf>,
    /// Border policy: 0 black, 1 edge, 2 reflect, 3 wrap [default: 2]
    #[structopt(short, long)]
    border: Option<usize>,
    /// Gaussian pre-blur sigma, 0 disables it [default: 1.0]
    #[structopt(short, long)]
    sigma: Option<f64>,
    /// Pyramid "sigmaA;sigma0;octaves;levels" [default: 0.5;1.6;4;5]
    #[structopt(long, allow_hyphen_values = true)]
    pyramid: Option<String>,
    /// Print L(x, y, sigma) for "x;y;sigma"
    #[structopt(short = "L", long, allow_hyphen_values = true)]
    pixel: Option<String>,
    /// Save dx, dy, Sobel magnitude and Gaussian blur images
    #[structopt(long)]
    derivatives: bool,
    /// Moravec corners "window;localMaxWindow;threshold"
    #[structopt(long, allow_hyphen_values = true)]
    moravec: Option<String>,
    /// Harris corners "window;localMaxWindow;threshold" [default: 5;5;0.01]
    #[structopt(long, allow_hyphen_values = true)]
    harris: Option<String>,
    /// Thin corners to this many points by ANMS
    #[structopt(long)]
    anms: Option<usize>,
    /// Descriptor "gridSize;cellCount;binCount" [default: 16;4;8]
    #[structopt(long, allow_hyphen_values = true)]
    descriptor: Option<String>,
    /// Detect DoG extrema and use scale-aware descriptors
    #[structopt(long)]
    scale: bool,
    /// Nearest-neighbour distance ratio threshold [default: 0.66]
    #[structopt(short, long)]
    threshold: Option<f64>,
    /// Write every pyramid level into this directory
    #[structopt(long, parse(from_os_str))]
    save_pyramid: Option<PathBuf>,
    /// Load settings from a .json or .toml file; flags override it
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,
    /// Directory for output images
    #[structopt(short, long, parse(from_os_str), default_value = ".")]
    out_dir: PathBuf,
    /// Print the effective settings and image sizes
    #[structopt(long)]
    info: bool,
}

const PYRAMID_DEFAULTS: [f64; 4] = [0.5, 1.6, 4.0, 5.0];
const CORNER_DEFAULTS: [f64; 3] = [5.0, 5.0, 0.01];
const DESCRIPTOR_DEFAULTS: [f64; 3] = [16.0, 4.0, 8.0];
const PIXEL_DEFAULTS: [f64; 3] = [0.0, 0.0, 1.6];

/// Parses a `;`-separated list of numbers, falling back to `defaults` when
/// the count or any value is wrong. Entries at the `counts` positions are
/// sizes and must be at least 1.
fn parse_list<const N: usize>(text: &str, defaults: [f64; N], what: &str, counts: &[usize]) -> [f64; N] {
    let parsed: Result<Vec<f64>, _> = text.split(';').map(|v| v.trim().parse::<f64>()).collect();
    match parsed {
        Ok(values)
            if values.len() == N
                && values.iter().all(|v| v.is_finite())
                && counts.iter().all(|&i| values[i] >= 1.0) =>
        {
            let mut out = defaults;
            out.copy_from_slice(&values);
            out
        }
        _ => {
            warn!(
                "Malformed {what} \"{text}\" (expected {} numbers separated by ';'), using {defaults:?}",
                N
            );
            defaults
        }
    }
}

fn build_config(opt: &Opt) -> PipelineResult<PipelineConfig> {
    let mut config = match &opt.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let detector = &mut config.detector;

    if let Some(index) = opt.border {
        detector.border = BorderPolicy::from_index(index).unwrap_or_else(|| {
            warn!("Unknown border policy {index}, using reflect");
            BorderPolicy::Reflect
        });
    }
    if let Some(sigma) = opt.sigma {
        detector.blur_sigma = (sigma > 0.0).then_some(sigma);
    }
    if let Some(text) = &opt.pyramid {
        let [sigma_a, sigma0, octaves, levels] = parse_list(text, PYRAMID_DEFAULTS, "pyramid", &[2, 3]);
        detector.pyramid =
            PyramidSpec::new(sigma_a, sigma0, octaves as usize, levels as usize).with_overlap(detector.pyramid.overlap);
    }
    for (method, text) in [(CornerMethod::Moravec, &opt.moravec), (CornerMethod::Harris, &opt.harris)] {
        if let Some(text) = text {
            let [window, local_max, threshold] = parse_list(text, CORNER_DEFAULTS, method.name(), &[0, 1]);
            detector.corner.method = method;
            detector.corner.window = window as usize;
            detector.corner.local_max_window = local_max as usize;
            detector.corner.threshold = threshold;
        }
    }
    if let Some(target) = opt.anms {
        let spec = detector.anms.unwrap_or_default();
        detector.anms = Some(AnmsSpec { target, ..spec });
    }

    let extractor = &mut config.extractor;
    if let Some(text) = &opt.descriptor {
        let [grid, cells, bins] = parse_list(text, DESCRIPTOR_DEFAULTS, "descriptor", &[0, 1, 2]);
        extractor.grid_size = grid as usize;
        extractor.cell_count = cells as usize;
        extractor.bin_count = bins as usize;
    }
    if let Some(threshold) = opt.threshold {
        extractor.nndr_threshold = threshold;
    }
    if opt.scale {
        config.scale_aware = true;
        config.extractor.capabilities = Capabilities::FULL;
    }

    config.validate()?;
    Ok(config)
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

fn save_derivatives(grid: &Grid, sigma: f64, out_dir: &Path, stem: &str) -> PipelineResult<()> {
    let outputs = [
        ("dx", grid.dx()),
        ("dy", grid.dy()),
        ("sobel", grid.sobel_magnitude()),
        ("gauss", grid.gaussian(sigma)),
    ];
    for (name, image) in &outputs {
        let path = out_dir.join(format!("{stem}-{name}.png"));
        render::save_grid(image, &path)?;
        info!("Saved {}", path.display());
    }
    Ok(())
}

fn inspect_source(pipeline: &FeaturePipeline, opt: &Opt, source: &Path, grid: &Grid) -> PipelineResult<()> {
    let stem = file_stem(source);
    if opt.info {
        println!("{}: {}x{}", source.display(), grid.width(), grid.height());
    }
    if opt.derivatives {
        let sigma = pipeline.config().detector.blur_sigma.unwrap_or(1.0);
        save_derivatives(grid, sigma, &opt.out_dir, &stem)?;
    }
    if opt.pixel.is_none() && opt.save_pyramid.is_none() {
        return Ok(());
    }

    let pyramid = pipeline.pyramid(grid)?;
    if let Some(text) = &opt.pixel {
        let [x, y, sigma] = parse_list(text, PIXEL_DEFAULTS, "pixel", &[]);
        println!("{stem}: L({x}, {y}, {sigma}) = {}", pyramid.value_at(x, y, sigma));
    }
    if let Some(dir) = &opt.save_pyramid {
        let dir = dir.join(&stem);
        std::fs::create_dir_all(&dir)?;
        let written = pyramid.save_levels(&dir, "png", LevelNaming::Detailed, |level, path| {
            render::save_grid(level, path)
        })?;
        println!("Saved {} pyramid levels to {}", written.len(), dir.display());
    }
    Ok(())
}

fn detection_suffix(config: &PipelineConfig) -> String {
    let method = if config.scale_aware {
        "dog"
    } else {
        config.detector.corner.method.name()
    };
    match &config.detector.anms {
        Some(anms) => format!("{method}-anms{}", anms.target),
        None => method.to_string(),
    }
}

fn run(opt: &Opt) -> PipelineResult<()> {
    let config = build_config(opt)?;
    if opt.info {
        println!("{}", config.summary());
    }
    let pipeline = FeaturePipeline::new(config)?;
    std::fs::create_dir_all(&opt.out_dir)?;

    let border = pipeline.config().detector.border;
    let grids = opt
        .sources
        .iter()
        .map(|path| load_grid(path, border))
        .collect::<PipelineResult<Vec<Grid>>>()?;
    for (source, grid) in opt.sources.iter().zip(&grids) {
        inspect_source(&pipeline, opt, source, grid)?;
    }

    let t0 = Instant::now();
    match (opt.sources.as_slice(), grids.as_slice()) {
        ([source], [grid]) => {
            let keypoints = pipeline.detect(grid)?;
            println!("Detected {} keypoints in {:.2?}", keypoints.len(), t0.elapsed());
            let path = opt
                .out_dir
                .join(format!("{}-{}.png", file_stem(source), detection_suffix(pipeline.config())));
            render::render_keypoints(grid, &keypoints).save(&path)?;
            println!("Saved {}", path.display());
        }
        ([source_a, source_b], [grid_a, grid_b]) => {
            let features_a = pipeline.detect_and_describe(grid_a)?;
            let features_b = pipeline.detect_and_describe(grid_b)?;
            let matches = pipeline.match_features(&features_a, &features_b);
            println!(
                "{} + {} features, {} matches in {:.2?}",
                features_a.len(),
                features_b.len(),
                matches.len(),
                t0.elapsed()
            );
            let canvas = render::render_matches(
                grid_a,
                &features_a.keypoints,
                grid_b,
                &features_b.keypoints,
                &matches,
            );
            let path = opt
                .out_dir
                .join(format!("match-{}-{}.png", file_stem(source_a), file_stem(source_b)));
            canvas.save(&path)?;
            println!("Saved {}", path.display());
        }
        _ => {
            return Err(PipelineError::Config(format!(
                "expected one or two source images, got {}",
                opt.sources.len()
            )))
        }
    }
    Ok(())
}

fn main() {
    pretty_env_logger::init();
    let opt = Opt::from_args();
    if let Err(e) = run(&opt) {
        error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(args: &[&str]) -> Opt {
        Opt::from_iter(std::iter::once("sift").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("1;2;3", [0.0; 3], "test", &[]), [1.0, 2.0, 3.0]);
        assert_eq!(parse_list(" 0.5 ; 1.6;4;5", PYRAMID_DEFAULTS, "test", &[2, 3]), [0.5, 1.6, 4.0, 5.0]);
    }

    #[test]
    fn test_parse_list_falls_back() {
        assert_eq!(parse_list("1;2", CORNER_DEFAULTS, "test", &[0, 1]), CORNER_DEFAULTS);
        assert_eq!(parse_list("a;b;c", CORNER_DEFAULTS, "test", &[0, 1]), CORNER_DEFAULTS);
        assert_eq!(parse_list("", DESCRIPTOR_DEFAULTS, "test", &[0, 1, 2]), DESCRIPTOR_DEFAULTS);
        assert_eq!(parse_list("1;inf;3", CORNER_DEFAULTS, "test", &[0, 1]), CORNER_DEFAULTS);
    }

    #[test]
    fn test_negative_sizes_fall_back() {
        assert_eq!(parse_list("-3;5;0.01", CORNER_DEFAULTS, "test", &[0, 1]), CORNER_DEFAULTS);
        assert_eq!(parse_list("0.5;1.6;-4;5", PYRAMID_DEFAULTS, "test", &[2, 3]), PYRAMID_DEFAULTS);
        assert_eq!(parse_list("16;0;8", DESCRIPTOR_DEFAULTS, "test", &[0, 1, 2]), DESCRIPTOR_DEFAULTS);
        // Thresholds and coordinates are not sizes.
        assert_eq!(parse_list("3;3;-0.5", CORNER_DEFAULTS, "test", &[0, 1]), [3.0, 3.0, -0.5]);
        assert_eq!(parse_list("-2;4;1.6", PIXEL_DEFAULTS, "test", &[]), [-2.0, 4.0, 1.6]);

        let config = build_config(&opt(&["a.png", "--harris=-3;5;0.01", "--pyramid", "0.5;1.6;-1;5"])).unwrap();
        assert_eq!(config.detector.corner.window, 5);
        assert_eq!(config.detector.corner.local_max_window, 5);
        assert_eq!(config.detector.pyramid, PyramidSpec::new(0.5, 1.6, 4, 5));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = build_config(&opt(&[
            "a.png", "--border", "0", "--moravec", "3;7;0.2", "--anms", "50", "-t", "0.5", "--sigma", "0",
        ]))
        .unwrap();
        assert_eq!(config.detector.border, BorderPolicy::Zero);
        assert_eq!(config.detector.corner.method, CornerMethod::Moravec);
        assert_eq!(config.detector.corner.window, 3);
        assert_eq!(config.detector.corner.local_max_window, 7);
        assert_eq!(config.detector.corner.threshold, 0.2);
        assert_eq!(config.detector.anms.map(|a| a.target), Some(50));
        assert_eq!(config.detector.blur_sigma, None);
        assert_eq!(config.extractor.nndr_threshold, 0.5);
        assert_eq!(detection_suffix(&config), "moravec-anms50");
    }

    #[test]
    fn test_malformed_values_use_defaults() {
        let config = build_config(&opt(&["a.png", "--border", "9", "--pyramid", "1;2", "--descriptor", "x"])).unwrap();
        assert_eq!(config.detector.border, BorderPolicy::Reflect);
        assert_eq!(config.detector.pyramid, PyramidSpec::new(0.5, 1.6, 4, 5));
        assert_eq!(
            (config.extractor.grid_size, config.extractor.cell_count, config.extractor.bin_count),
            (16, 4, 8)
        );
    }

    #[test]
    fn test_scale_mode() {
        let config = build_config(&opt(&["a.png", "b.png", "--scale"])).unwrap();
        assert!(config.scale_aware);
        assert_eq!(config.extractor.capabilities, Capabilities::FULL);
        assert_eq!(detection_suffix(&config), "dog");
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem(Path::new("dir/lenna.png")), "lenna");
    }
}
