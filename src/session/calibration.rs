//! Calibration state transfer between hardware ramps and the session
//!
//! Reading analyses each connected CRTC's ramps into the session's
//! per-channel state; writing generates ramps from that state and
//! programs them.

use log::{debug, info, warn};

use super::{Platform, VideoSession};
use crate::config::CalibrationConfig;
use crate::error::{Result, VideoError};
use crate::gamma::{analyse, generate, Channel, CurveParams};

/// Read every connected CRTC's ramps and store the fitted curves
///
/// Ramps too short to fit (fewer than 2 stops) or whose fit is not finite
/// keep their current values.
pub fn read_calibration<P: Platform>(session: &mut VideoSession<P>) -> Result<()> {
    for pos in 0..session.crtc_count() {
        session.get_gamma(pos)?;

        for channel in Channel::ALL {
            let (id, params) = match session.crtc(pos) {
                Some(crtc) if crtc.stops() >= 2 => (crtc.id(), analyse(crtc.channel(channel))),
                Some(crtc) => {
                    warn!(
                        "CRTC {}: {} stop(s) is too short to analyse",
                        crtc.id(),
                        crtc.stops()
                    );
                    break;
                }
                None => return Err(VideoError::NoSuchOutput(pos)),
            };

            if !params.is_finite() {
                warn!(
                    "CRTC {}: {} ramp is degenerate ({:?}), keeping previous values",
                    id,
                    channel.name(),
                    params
                );
                continue;
            }
            debug!("CRTC {} {}: {:?}", id, channel.name(), params);
            session.set_params(channel, pos, params)?;
        }
    }
    Ok(())
}

/// Copy configured curves into the session state, matching monitors by EDID
pub fn store_calibration<P: Platform>(
    session: &mut VideoSession<P>,
    config: &CalibrationConfig,
) -> Result<()> {
    for pos in 0..session.crtc_count() {
        let edid = session.crtc(pos).and_then(|crtc| crtc.edid().map(str::to_owned));
        for channel in Channel::ALL {
            let params = config.params_for(edid.as_deref(), channel);
            session.set_params(channel, pos, params)?;
        }
    }
    Ok(())
}

/// Generate ramps from the session state and program every connected CRTC
///
/// All three channels of a CRTC are validated before its buffers are
/// touched; the first invalid curve stops the run.
pub fn write_calibration<P: Platform>(session: &mut VideoSession<P>) -> Result<()> {
    for pos in 0..session.crtc_count() {
        let mut curves = [CurveParams::default(); 3];
        for channel in Channel::ALL {
            let params = session
                .params(channel, pos)
                .ok_or(VideoError::NoSuchOutput(pos))?;
            params.validate()?;
            curves[channel.index()] = params;
        }

        let crtc = session.crtc_mut(pos).ok_or(VideoError::NoSuchOutput(pos))?;
        for channel in Channel::ALL {
            generate(crtc.channel_mut(channel), &curves[channel.index()]);
        }
        session.set_gamma(pos)?;
        info!("Programmed CRTC {}", session.crtcs()[pos].id());
    }
    Ok(())
}

/// Store the configured calibration and program it into the hardware
pub fn apply_calibration<P: Platform>(
    session: &mut VideoSession<P>,
    config: &CalibrationConfig,
) -> Result<()> {
    store_calibration(session, config)?;
    write_calibration(session)
}
