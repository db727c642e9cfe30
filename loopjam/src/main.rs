mod commands;
mod config;
mod network;
mod status;

use std::fs::File;

use rand::Rng;

use loopjam_types::{Player, PlayerId};

const USAGE: &str = "\
usage: loopjam --host [--port N] [--name NAME] [-v]
       loopjam --join ADDR CODE [--name NAME] [-v]";

fn init_logging(verbose: bool) {
    use simplelog::*;

    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    let log_path = config::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("loopjam.log");

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = match File::create(&log_path)
        .or_else(|_| File::create(std::env::temp_dir().join("loopjam.log")))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("loopjam: cannot create log file: {}", e);
            return;
        }
    };

    if let Err(e) = WriteLogger::init(log_level, Config::default(), log_file) {
        eprintln!("loopjam: failed to initialize logger: {}", e);
        return;
    }

    log::info!("loopjam starting (log level: {:?})", log_level);
}

/// Player id: the display name plus a random suffix so two "player"s can share a room.
fn make_player(name: &str, color: &str) -> Player {
    let suffix: u16 = rand::thread_rng().gen();
    let id = PlayerId::new(format!("{}-{:04x}", name.to_lowercase().replace(' ', "-"), suffix));
    Player::with_default_loops(id, name, color)
}

fn main() -> std::io::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose" || a == "-v");
    init_logging(verbose);

    let config = config::Config::load();

    let host_mode = args.iter().any(|a| a == "--host");
    let join = args
        .iter()
        .position(|a| a == "--join")
        .map(|i| (args.get(i + 1).cloned(), args.get(i + 2).cloned()));
    let name = args
        .iter()
        .position(|a| a == "--name")
        .and_then(|i| args.get(i + 1).cloned())
        .unwrap_or_else(|| config.player_name());
    let port = match args.iter().position(|a| a == "--port") {
        Some(i) => match args.get(i + 1).and_then(|p| p.parse::<u16>().ok()) {
            Some(port) => port,
            None => {
                eprintln!("--port needs a number\n{}", USAGE);
                std::process::exit(2);
            }
        },
        None => config.port(),
    };

    let me = make_player(&name, &config.player_color());
    log::info!("Playing as {} ({})", me.name, me.id);

    match (host_mode, join) {
        (true, None) => network::run_host(&config, me, port),
        (false, Some((Some(addr), Some(code)))) => network::run_join(&config, me, &addr, &code),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}
