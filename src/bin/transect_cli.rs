#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(err) = native::run() {
        eprintln!("transect_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs;
    use std::io::{self, Read};
    use std::path::{Path, PathBuf};

    use transect_engine::algorithm::{ALGORITHM_ID, PARAMETERS, output_fields};
    use transect_engine::feature::{FeatureSource, Feedback};
    use transect_engine::geom::VertexAngle;
    use transect_engine::io::{GeoJsonSink, read_feature_collection};
    use transect_engine::provider::ProcessingRegistry;
    use transect_engine::transect::{Side, StationNumbering, StationParameters};

    const USAGE: &str = r#"transect_cli (transect-engine)

USAGE:
  transect_cli run --input <file|-> --output <file|-> [options]
  transect_cli fields --input <file|->
  transect_cli params

OPTIONS (run):
  --distance <d>       Fixed distance between transects (default 50)
  --length <l>         Length of each transect (default 5)
  --angle <deg>        Angle from the line, 0 to 360 (default 90)
  --side <side>        left | right | both, or L | R | B, or 0 | 1 | 2 (default both)
  --numbering <mode>   per-feature | continuous (default per-feature)
  --vertex-angle <m>   bisector | outgoing (default bisector)
  --overwrite          Overwrite an existing output file
  -h, --help           Show this help

Input and output are GeoJSON FeatureCollections; `-` means stdin/stdout.
Set RUST_LOG=debug for per-feature logging.
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "run" => cmd_run(&mut args),
            "fields" => cmd_fields(&mut args),
            "params" => cmd_params(),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let mut input: Option<String> = None;
        let mut output: Option<String> = None;
        let mut params = StationParameters::default();
        let mut overwrite = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--input" | "-i" => input = Some(args.value("--input")?),
                "--output" | "-o" => output = Some(args.value("--output")?),
                "--distance" => params.distance = args.number("--distance")?,
                "--length" => params.length = args.number("--length")?,
                "--angle" => params.angle_deg = args.number("--angle")?,
                "--side" => {
                    params.side = args
                        .value("--side")?
                        .parse::<Side>()
                        .map_err(|e| e.to_string())?;
                }
                "--numbering" => {
                    params.numbering = args
                        .value("--numbering")?
                        .parse::<StationNumbering>()
                        .map_err(|e| e.to_string())?;
                }
                "--vertex-angle" => {
                    params.vertex_angle = parse_vertex_angle(&args.value("--vertex-angle")?)?;
                }
                "--overwrite" => overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let input = input.ok_or("missing --input")?;
        let output = output.ok_or("missing --output")?;
        if output != "-" {
            check_writable(Path::new(&output), overwrite)?;
        }

        let source = read_feature_collection(&read_input(&input)?).map_err(|e| e.to_string())?;
        let algorithm = ProcessingRegistry::with_default_providers()
            .create_algorithm(ALGORITHM_ID, params)
            .map_err(|e| e.to_string())?;

        let mut sink = GeoJsonSink::new();
        let mut feedback = ProgressLog::default();
        let summary = algorithm
            .process(&source, &mut sink, &mut feedback)
            .map_err(|e| e.to_string())?;

        if output == "-" {
            sink.write_to(io::stdout().lock()).map_err(|e| e.to_string())?;
        } else {
            let path = PathBuf::from(&output);
            let file = fs::File::create(&path).map_err(|e| format!("create {}: {e}", path.display()))?;
            sink.write_to(io::BufWriter::new(file)).map_err(|e| e.to_string())?;
            eprintln!("wrote {}", path.display());
        }

        eprintln!(
            "features={} skipped={} parts={} transects={}",
            summary.features_read, summary.features_skipped, summary.parts, summary.transects_written
        );
        Ok(())
    }

    fn cmd_fields(args: &mut Args) -> Result<(), String> {
        let mut input: Option<String> = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--input" | "-i" => input = Some(args.value("--input")?),
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let input = input.ok_or("missing --input")?;
        let source = read_feature_collection(&read_input(&input)?).map_err(|e| e.to_string())?;
        if let Some(crs) = source.crs() {
            println!("crs: {crs}");
        }
        for field in output_fields(source.fields()).iter() {
            println!("{}\t{:?}", field.name, field.kind);
        }
        Ok(())
    }

    fn cmd_params() -> Result<(), String> {
        let text = serde_json::to_string_pretty(PARAMETERS).map_err(|e| e.to_string())?;
        println!("{text}");
        Ok(())
    }

    fn parse_vertex_angle(value: &str) -> Result<VertexAngle, String> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bisector" | "mean" => Ok(VertexAngle::Bisector),
            "outgoing" | "next" => Ok(VertexAngle::Outgoing),
            other => Err(format!("unknown vertex angle `{other}` (expected bisector or outgoing)")),
        }
    }

    fn read_input(input: &str) -> Result<String, String> {
        if input == "-" {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| format!("read stdin: {e}"))?;
            return Ok(text);
        }
        fs::read_to_string(input).map_err(|e| format!("read {input}: {e}"))
    }

    fn check_writable(path: &Path, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        Ok(())
    }

    /// Logs progress in 10% steps.
    #[derive(Debug, Default)]
    struct ProgressLog {
        last_decile: u8,
    }

    impl Feedback for ProgressLog {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        fn set_progress(&mut self, percent: f64) {
            let decile = (percent.clamp(0.0, 100.0) / 10.0).floor() as u8;
            if decile > self.last_decile {
                self.last_decile = decile;
                log::info!("{}%", u32::from(decile) * 10);
            }
        }
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }

        fn number(&mut self, flag: &str) -> Result<f64, String> {
            let value = self.value(flag)?;
            value
                .parse::<f64>()
                .map_err(|_| format!("{flag} expects a number, got `{value}`"))
        }
    }
}
