use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::actions::{Action, ActionSink};
use crate::config::{SharedSwipeConfig, SwipeOverrides};
use crate::gesture::GestureState;
use crate::ipc;
use crate::profile::DaemonConfigState;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    if env::args().len() == 1 || pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            match topic {
                Some(t) => print_subcmd_help(&t),
                None => print_help(),
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("swipectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op":"shutdown"})),
        Some("status") => request(serde_json::json!({"op":"status"})),
        Some("reload") => request(serde_json::json!({"op":"reload"})),
        Some("list") => request(serde_json::json!({"op":"list"})),
        Some("doctor") => request(serde_json::json!({"op":"doctor"})),

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swipectl use <profile_name>"))?;
            request(serde_json::json!({"op":"use","profile":name}))
        }

        Some("check") => {
            let gesture = parse_gesture(&mut pargs)?;
            let overrides = parse_overrides(&mut pargs)?;
            if pargs.contains("--local") {
                let cfg = DaemonConfigState::load_or_install_default()?;
                let swipe = SharedSwipeConfig::from_overrides(&cfg.profile.swipe);
                let overrides = SwipeOverrides::from_json(&overrides);
                print_response(&ipc::check_report(&gesture, &swipe, &overrides));
                Ok(())
            } else {
                request(serde_json::json!({"op":"check","gesture":gesture,"overrides":overrides}))
            }
        }

        Some("emit") => {
            // e.g. swipectl emit key:ALT+LEFT
            let raw: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swipectl emit <action>"))?;
            let action: Action = raw.parse()?;
            if matches!(action, Action::Command(_)) {
                return Err(anyhow!("emit does not run cmd: actions"));
            }
            let mut sink = ActionSink::new()?;
            sink.perform(&action)?;
            println!("ok: performed {raw}");
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn parse_gesture(pargs: &mut Arguments) -> Result<GestureState> {
    let usage = || anyhow!("usage: swipectl check --dx <n> --dy <n> --vx <n> --vy <n> [--touches <n>] [--local]");
    let dx: f64 = pargs.value_from_str("--dx").map_err(|_| usage())?;
    let dy: f64 = pargs.value_from_str("--dy").map_err(|_| usage())?;
    let vx: f64 = pargs.value_from_str("--vx").map_err(|_| usage())?;
    let vy: f64 = pargs.value_from_str("--vy").map_err(|_| usage())?;
    let touches: Option<usize> = pargs.opt_value_from_str("--touches").map_err(|_| usage())?;
    Ok(GestureState {
        touch_count: touches.unwrap_or(1),
        ..GestureState::new(dx, dy, vx, vy)
    })
}

/// `--overrides '<json object>'`, e.g. `{"velocityThreshold": 0.1}`.
fn parse_overrides(pargs: &mut Arguments) -> Result<serde_json::Value> {
    let raw: Option<String> = pargs
        .opt_value_from_str("--overrides")
        .map_err(|e| anyhow!("--overrides: {e}"))?;
    let Some(raw) = raw else {
        return Ok(serde_json::Value::Null);
    };
    let v: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| anyhow!("--overrides is not valid JSON: {e}"))?;
    if !v.is_object() {
        return Err(anyhow!("--overrides must be a JSON object"));
    }
    Ok(v)
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

fn print_help() {
    println!(
        r#"swipectl - single-finger swipe gestures for Linux touch devices

USAGE:
  swipectl help [command]                 Show general or command-specific help
  swipectl start                          Start the daemon
  swipectl stop                           Stop the daemon
  swipectl status                         Show daemon state and effective swipe config
  swipectl reload                         Reload active profile
  swipectl use <name>                     Switch active profile
  swipectl list                           List profiles
  swipectl doctor                         Diagnose permissions/devices
  swipectl check --dx N --dy N --vx N --vy N [--touches N] [--overrides JSON] [--local]
                                          Classify one gesture state
  swipectl emit <action>                  Perform a binding action once

LOGGING:
  SWIPECTL_LOG=debug swipectl start       Log claim decisions

FILES:
  Profiles: ~/.config/swipectl/profiles
  Active profile pointer: ~/.config/swipectl/active
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: swipectl start\nStarts the background daemon."),
        "stop" => println!("usage: swipectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: swipectl status\nShows active profile, effective swipe config, devices, socket."
        ),
        "reload" => println!(
            "usage: swipectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: swipectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: swipectl list\nLists available profiles."),
        "doctor" => println!(
            "usage: swipectl doctor\nChecks permissions and lists detected multitouch devices."
        ),
        "check" => println!(
            "usage: swipectl check --dx <n> --dy <n> --vx <n> --vy <n> [--touches <n>] [--overrides <json>] [--local]\n\
             Prints whether the gesture would be claimed and which swipe it is.\n\
             --overrides resolves the given thresholds on top of the defaults.\n\
             --local uses the active profile on disk instead of the running daemon."
        ),
        "emit" => println!(
            "usage: swipectl emit <action>\n  e.g. key:ALT+LEFT, mouse:right, scroll:vertical@-3, toggle"
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
