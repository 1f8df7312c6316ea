use anyhow::{bail, Context};
use crabcapture::config::CrabCaptureConfig;
use crabcapture::device_model::DeviceModel;
use crabcapture::format_selector;
use crabcapture::testing::{front_camera_catalog, rear_camera_catalog};
use crabcapture::types::CaptureFormat;
use std::env;
use std::fs;

const USAGE: &str = "Usage: crabcapture-cli <select|explain|parse-model|demo-catalog> [args]";

fn main() -> anyhow::Result<()> {
    crabcapture::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    match args[1].as_str() {
        "select" => cmd_select(&args),
        "explain" => cmd_explain(&args),
        "parse-model" => cmd_parse_model(&args),
        "demo-catalog" => cmd_demo_catalog(&args),
        other => {
            eprintln!("Unknown command: {}\n{}", other, USAGE);
            std::process::exit(1);
        }
    }
}

struct Options {
    catalog: String,
    config: CrabCaptureConfig,
    json: bool,
}

fn parse_options(args: &[String], command: &str) -> anyhow::Result<Options> {
    let mut catalog = None;
    let mut config_path = None;
    let mut rate = None;
    let mut json = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).context("--config needs a path")?.clone());
            }
            "--rate" => {
                i += 1;
                let value = args.get(i).context("--rate needs a value")?;
                rate = Some(value.parse::<f64>().with_context(|| format!("bad rate {value:?}"))?);
            }
            "--json" => json = true,
            other if catalog.is_none() => catalog = Some(other.to_string()),
            other => bail!("unexpected argument {:?}", other),
        }
        i += 1;
    }

    let Some(catalog) = catalog else {
        bail!(
            "Usage: crabcapture-cli {} <catalog.json> [--config <file>] [--rate <fps>] [--json]",
            command
        );
    };

    let mut config = match config_path {
        Some(path) => CrabCaptureConfig::load_from_file(&path)?,
        None => CrabCaptureConfig::default(),
    };
    if let Some(rate) = rate {
        config.selection.preferred_frame_rate = rate;
    }
    config.validate()?;

    Ok(Options {
        catalog,
        config,
        json,
    })
}

fn load_catalog(path: &str) -> anyhow::Result<Vec<CaptureFormat>> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let formats = serde_json::from_str(&text).with_context(|| format!("parsing {path}"))?;
    Ok(formats)
}

fn cmd_select(args: &[String]) -> anyhow::Result<()> {
    let options = parse_options(args, "select")?;
    let formats = load_catalog(&options.catalog)?;
    let selection = format_selector::select(&formats, &options.config.selection)?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&selection)?);
    } else {
        println!("#{} {}", selection.index, selection.format);
        match selection.frame_duration {
            Some(d) => println!(
                "frame duration {}/{} ({} fps)",
                d.value,
                d.timescale,
                d.frames_per_second()
            ),
            None => println!("frame duration: device default (preferred rate not supported)"),
        }
    }
    Ok(())
}

fn cmd_explain(args: &[String]) -> anyhow::Result<()> {
    let options = parse_options(args, "explain")?;
    let formats = load_catalog(&options.catalog)?;
    let verdicts = format_selector::explain(&formats, &options.config.selection);

    if options.json {
        println!("{}", serde_json::to_string_pretty(&verdicts)?);
        return Ok(());
    }
    for v in verdicts {
        let status = match v.rejection {
            Some(r) => r.as_str().to_string(),
            None if v.supports_preferred_rate => "appropriate, supports preferred rate".to_string(),
            None => "appropriate".to_string(),
        };
        println!("#{} {}: {}", v.index, v.format, status);
    }
    Ok(())
}

fn cmd_parse_model(args: &[String]) -> anyhow::Result<()> {
    let Some(identifier) = args.get(2) else {
        bail!("Usage: crabcapture-cli parse-model <identifier>");
    };
    let model = DeviceModel::parse(identifier)?;
    if args.contains(&"--json".to_string()) {
        println!("{}", serde_json::to_string(&model)?);
    } else {
        println!("{:?} {}.{}", model.kind, model.major, model.minor);
    }
    Ok(())
}

fn cmd_demo_catalog(args: &[String]) -> anyhow::Result<()> {
    let catalog = if args.contains(&"--front".to_string()) {
        front_camera_catalog()
    } else {
        rear_camera_catalog()
    };
    println!("{}", serde_json::to_string_pretty(&catalog)?);
    Ok(())
}
