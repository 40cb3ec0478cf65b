use boardsight::capture::CaptureDevice;
use boardsight::client::{ImageUpload, RequestClient};
use boardsight::config::BoardSightConfig;
use boardsight::platform::open_camera;
use boardsight::testing::SyntheticCamera;
use boardsight::types::{AnalyzeMode, DetectorSelection, EngineOptions};
use boardsight::workbench::Workbench;
use std::env;
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

const USAGE: &str = "Usage: boardsight-cli <command> [args] [--config <path>] [--json]

Commands:
  analyze <image> [--detector <name>] [--detect-only] [--save-overlay <path>]
  best-move <fen> [--depth <n>] [--time <ms>]
  stream [--detector <name>] [--camera <index> | --synthetic] [--seconds <n>]
  health
  config [--init <path>]";

fn main() -> CliResult {
    boardsight::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{}", USAGE);
        std::process::exit(1);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let command = &args[1];
    match command.as_str() {
        "analyze" => runtime.block_on(cmd_analyze(&args)),
        "best-move" => runtime.block_on(cmd_best_move(&args)),
        "stream" => runtime.block_on(cmd_stream(&args)),
        "health" => runtime.block_on(cmd_health(&args)),
        "config" => cmd_config(&args),
        "help" | "--help" | "-h" => {
            println!("{}", USAGE);
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    }
}

/// Value following `flag`, if present.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// First argument after the command that is neither a flag nor a flag value.
fn positional(args: &[String]) -> Option<&str> {
    const VALUED: [&str; 9] = [
        "--config",
        "--detector",
        "--save-overlay",
        "--depth",
        "--time",
        "--camera",
        "--seconds",
        "--init",
        "--timeout",
    ];
    let mut i = 2;
    while i < args.len() {
        let arg = args[i].as_str();
        if VALUED.contains(&arg) {
            i += 2;
            continue;
        }
        if !arg.starts_with("--") {
            return Some(arg);
        }
        i += 1;
    }
    None
}

fn load_config(args: &[String]) -> Result<BoardSightConfig, Box<dyn std::error::Error>> {
    let config = match flag_value(args, "--config") {
        Some(path) => BoardSightConfig::load_from_file(path)?,
        None => BoardSightConfig::load_or_default(),
    };
    Ok(config)
}

fn detector_arg(args: &[String]) -> Result<Option<DetectorSelection>, Box<dyn std::error::Error>> {
    Ok(flag_value(args, "--detector")
        .map(DetectorSelection::new)
        .transpose()?)
}

async fn cmd_analyze(args: &[String]) -> CliResult {
    let Some(path) = positional(args) else {
        eprintln!("Usage: boardsight-cli analyze <image> [--detector <name>] [--detect-only]");
        std::process::exit(1);
    };
    let config = load_config(args)?;
    let detector = match detector_arg(args)? {
        Some(d) => d,
        None => config.service.detector()?,
    };
    let mode = if has_flag(args, "--detect-only") {
        AnalyzeMode::Detect
    } else {
        AnalyzeMode::DetectAndMove
    };

    let mut client = RequestClient::from_config(&config.service)?;
    if let Some(ms) = flag_value(args, "--timeout") {
        client = client.with_timeout(Duration::from_millis(ms.parse()?));
    }

    let upload = ImageUpload::from_path(path)?;
    let result = client.analyze(&upload, &detector, mode).await?;

    if let Some(out) = flag_value(args, "--save-overlay") {
        match &result.overlay {
            Some(overlay) => overlay.save(out)?,
            None => eprintln!("No overlay in response, nothing saved"),
        }
    }

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string(&result)?);
    } else {
        println!("FEN: {}", result.fen);
        if let Some(mv) = &result.recommended_move {
            println!("Move: {}", mv);
        }
        if let Some(confidence) = result.confidence {
            println!("Confidence: {:.2}", confidence);
        }
    }
    Ok(())
}

async fn cmd_best_move(args: &[String]) -> CliResult {
    let fen = positional(args).unwrap_or("");
    let config = load_config(args)?;
    let defaults = config.engine.options();
    let depth = match flag_value(args, "--depth") {
        Some(v) => v.parse()?,
        None => defaults.depth,
    };
    let time_ms = match flag_value(args, "--time") {
        Some(v) => v.parse()?,
        None => defaults.time_ms,
    };

    let client = RequestClient::from_config(&config.service)?;
    let best = client
        .compute_best_move(fen, &EngineOptions::new(depth, time_ms))
        .await?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string(&best)?);
    } else {
        match &best.san {
            Some(san) => println!("Best move: {} ({})", best.uci, san),
            None => println!("Best move: {}", best.uci),
        }
        if let Some(score) = best.score {
            if let Some(mate) = score.mate {
                println!("Mate in {}", mate);
            } else if let Some(cp) = score.cp {
                println!("Score: {} cp", cp);
            }
        }
    }
    Ok(())
}

async fn cmd_stream(args: &[String]) -> CliResult {
    let config = load_config(args)?;
    let detector = detector_arg(args)?;
    let seconds: u64 = match flag_value(args, "--seconds") {
        Some(v) => v.parse()?,
        None => 30,
    };
    let json = has_flag(args, "--json");

    let device: Box<dyn CaptureDevice> = if has_flag(args, "--synthetic") {
        let [w, h] = config.capture.fallback_resolution;
        Box::new(SyntheticCamera::new(w, h))
    } else {
        let index = match flag_value(args, "--camera") {
            Some(v) => v.parse()?,
            None => 0,
        };
        open_camera(index)?
    };

    let bench = Workbench::new(config, device)?;
    let mut updates = bench.subscribe();
    let id = bench.start_stream(detector).await?;
    eprintln!("Session {} streaming for {}s (Ctrl+C to stop)", id, seconds);

    let deadline = tokio::time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = updates.borrow_and_update().clone();
                if json {
                    println!("{}", serde_json::to_string(&view)?);
                } else {
                    println!(
                        "[{}] {} | move: {} | {}",
                        view.revision,
                        view.board_encoding().unwrap_or("-"),
                        view.displayed_move.as_deref().unwrap_or("-"),
                        view.status
                    );
                }
                // Session ended by itself
                if bench.session_id().is_none() {
                    break;
                }
            }
        }
    }

    bench.stop_stream().await;
    eprintln!("{}", bench.view().status);
    Ok(())
}

async fn cmd_health(args: &[String]) -> CliResult {
    let config = load_config(args)?;
    let client = RequestClient::from_config(&config.service)?;
    let healthy = client.health().await?;

    if has_flag(args, "--json") {
        println!("{}", serde_json::json!({ "base_url": client.base_url(), "ok": healthy }));
    } else if healthy {
        println!("{} is healthy", client.base_url());
    } else {
        println!("{} answered but is not healthy", client.base_url());
    }
    if !healthy {
        std::process::exit(2);
    }
    Ok(())
}

fn cmd_config(args: &[String]) -> CliResult {
    if let Some(path) = flag_value(args, "--init") {
        BoardSightConfig::default().save_to_file(path)?;
        println!("Wrote default configuration to {}", path);
        return Ok(());
    }

    let config = load_config(args)?;
    if has_flag(args, "--json") {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}
