//! crtcal - display gamma calibration for the Linux console
//!
//! Lists, applies and tests per-output gamma calibration through DRM/KMS
//! gamma ramps and raw framebuffers.

use anyhow::{Context, Result};
use log::info;

use crtcal::config::Config;
use crtcal::drm::EdidIdentity;
use crtcal::session::{self, VideoSession};
use crtcal::Channel;

/// What to do with the acquired session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Print outputs and their current calibration
    List,
    /// Program the configured calibration
    Apply,
    /// Paint the contrast/brightness pattern on every framebuffer
    Pattern,
}

fn print_help() {
    println!(
        r#"crtcal {} - display gamma calibration for Linux console

USAGE:
    crtcal [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    -l, --list              List connected outputs and their calibration (default)
    -a, --apply             Apply the configured calibration to every output
    -p, --pattern           Paint the contrast/brightness test pattern
    --init-config           Generate default config file
    -f, --force             Overwrite config file when generating

EXAMPLES:
    sudo crtcal                       List outputs (requires DRM master or root)
    sudo crtcal --apply               Apply calibration from the config file
    sudo crtcal --pattern             Show the test pattern on /dev/fb*
    crtcal --init-config              Generate default config

ENVIRONMENT:
    CRTCAL_CONFIG           Config file to load instead of the default
    RUST_LOG                Log filter (default: warn)

CONFIG FILE:
    ~/.config/crtcal/config.toml
"#,
        env!("CARGO_PKG_VERSION")
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Check command line arguments
    let args: Vec<String> = std::env::args().collect();
    let has = |short: &str, long: &str| args.iter().any(|a| a == short || a == long);

    // --help
    if has("-h", "--help") {
        print_help();
        return Ok(());
    }

    // --version
    if has("-V", "--version") {
        println!("crtcal {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Config file generation mode
    if args.iter().any(|a| a == "--init-config") {
        let path = Config::write_default_config(has("-f", "--force"))?;
        println!("Config file written: {}", path.display());
        return Ok(());
    }

    let mode = if has("-a", "--apply") {
        Mode::Apply
    } else if has("-p", "--pattern") {
        Mode::Pattern
    } else {
        Mode::List
    };
    info!("crtcal starting ({:?})", mode);

    let config = Config::load();
    let mut session = VideoSession::system(config.devices.clone());

    // Release runs whether or not acquisition got all the way through
    let result = session
        .acquire()
        .context("Failed to acquire video devices")
        .and_then(|()| run(mode, &mut session, &config));
    session.release();
    result
}

fn run(mode: Mode, session: &mut VideoSession, config: &Config) -> Result<()> {
    match mode {
        Mode::List => {
            session::read_calibration(session).context("Failed to read gamma ramps")?;
            list_outputs(session);
        }
        Mode::Apply => {
            session::apply_calibration(session, &config.calibration)
                .context("Failed to apply calibration")?;
            println!("Calibration applied to {} output(s)", session.crtc_count());
        }
        Mode::Pattern => {
            if session.framebuffer_count() == 0 {
                anyhow::bail!("No framebuffer devices found");
            }
            for fb in session.framebuffers_mut() {
                fb.draw_level_bars()
                    .with_context(|| format!("Failed to draw on {}", fb.path().display()))?;
                println!("Pattern drawn on {}", fb.path().display());
            }
        }
    }
    Ok(())
}

fn list_outputs(session: &VideoSession) {
    for fb in session.framebuffers() {
        println!(
            "{}: {}x{}, {} bytes/pixel, stride {}",
            fb.path().display(),
            fb.width(),
            fb.height(),
            fb.bytes_per_pixel(),
            fb.line_length()
        );
    }

    if session.crtc_count() == 0 {
        println!("No connected outputs");
        return;
    }

    for (pos, crtc) in session.crtcs().iter().enumerate() {
        let monitor = crtc
            .edid()
            .and_then(EdidIdentity::from_hex)
            .map_or_else(|| "unknown monitor".to_string(), |id| id.to_string());
        println!(
            "card{} CRTC {}: {} stops, {}",
            crtc.card_index(),
            crtc.id(),
            crtc.stops(),
            monitor
        );
        for channel in Channel::ALL {
            if let Some(p) = session.params(channel, pos) {
                println!(
                    "  {:<5}  gamma {:.3}  contrast {:.3}  brightness {:.3}",
                    channel.name(),
                    p.gamma,
                    p.contrast,
                    p.brightness
                );
            }
        }
    }
}
