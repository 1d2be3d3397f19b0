//! # Small Position Corrections

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, info};

use comms_if::eqpt::acs::AcsCmd;

use super::{Frame, OpError, Orchestrator};
use crate::angle::{is_delimiter, AS_PER_DEG};

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<'a> Orchestrator<'a> {
    /// Shift the tracking position by a pair of arcsecond offsets.
    ///
    /// In the horizontal frame the azimuth offset is an offset on the sky, it is rescaled to a
    /// mount angle using the current zenith distance.
    pub fn run_correction(&mut self, text: &str, frame: Frame) -> Result<(), OpError> {
        let name = match frame {
            Frame::Equatorial => "RA/Dec correction",
            Frame::Horizontal => "A/Z correction",
        };

        self.run_op(name, text, |orc, op| {
            let (dx_as, dy_as) = parse_correction(text)?;
            let p = orc.params.correction;

            for d in [dx_as, dy_as].iter() {
                if !(d.abs() <= p.max_angle_as) {
                    return Err(OpError::Range(format!(
                        "correction of {}\" exceeds {}\"", d, p.max_angle_as
                    )))
                }
            }

            let state = orc.snapshot()?;
            orc.require_automatic(&state)?;

            let cmd = match frame {
                Frame::Horizontal => {
                    let zdist_deg = state.val_zdist_as / AS_PER_DEG;
                    if zdist_deg < p.zenith_guard_deg {
                        return Err(OpError::NearZenith(zdist_deg))
                    }

                    let d_azim_as = dx_as / zdist_deg.to_radians().sin();
                    debug!("Azimuth offset {}\" is {:.2}\" of mount angle", dx_as, d_azim_as);

                    AcsCmd::DoAzCorr { d_azim_as, d_zdist_as: dy_as }
                },
                Frame::Equatorial => AcsCmd::DoAdCorr { d_alpha_as: dx_as, d_delta_as: dy_as },
            };

            let old_mode = state.sys_mode;
            orc.dispatch(op, cmd)?;

            orc.require_state(op, "the correction to start", p.start_timeout_s, |s| {
                s.sys_mode != old_mode
            })?;
            info!("Correcting");
            orc.require_state(op, "the correction to end", p.end_timeout_s, |s| {
                s.sys_mode == old_mode
            })
        })
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a pair of offsets in arcseconds such as `"10.5,-3"`.
pub fn parse_correction(text: &str) -> Result<(f64, f64), OpError> {
    let bad = || OpError::Parse(format!(
        "wrong correction \"{}\", should be \"dx,dy\" in arcseconds", text
    ));

    let mut parts = text.split(is_delimiter).filter(|p| !p.is_empty());

    let mut next = || -> Result<f64, OpError> {
        parts.next()
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(bad)
    };

    let dx_as = next()?;
    let dy_as = next()?;

    if parts.next().is_some() {
        return Err(bad())
    }

    Ok((dx_as, dy_as))
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
