//! Telescope command-line executable entry point.
//!
//! # Architecture
//!
//! One invocation runs one batch of operations and exits:
//!
//!     - Parse the command line into a dispatch plan
//!     - Initialise the session and the logger
//!     - Load the parameters
//!     - Connect to the ACS (or start the emulated one) and check its heartbeat
//!     - Execute the plan, the exit status tells whether every operation succeeded

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::{debug, info, warn};
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use comms_if::net::zmq;
use tel_lib::{
    acs_client::{check_heartbeat, AcsLink, CommandQueue, StateProvider},
    astrom::{Epoch, NativeAstrometry},
    dispatch::{self, Plan, EXIT_SUCCESS},
    orchestrator::{OpOptions, Orchestrator},
    params::TelExecParams,
    report::InfoLevel,
    sim::SimAcs,
};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the parameter file, relative to the parameters directory
const PARAMS_FILE: &str = "tel_exec.toml";

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Command and control client for the BTA telescope.
#[derive(Debug, StructOpt)]
#[structopt(name = "tel_exec")]
struct Opts {
    /// Stop a moving P2 or focus motor instead of refusing to move it
    #[structopt(short, long)]
    force: bool,

    /// Move P2 to an angle in degrees, append "rel" for a relative move
    #[structopt(short = "P", long, allow_hyphen_values = true)]
    p2move: Option<String>,

    /// Set the P2 mode (stop or track)
    #[structopt(short = "M", long)]
    p2mode: Option<String>,

    /// Move the focus to the given position in millimetres
    #[structopt(short = "F", long)]
    focmove: Option<f64>,

    /// Set the input equatorial coordinates ("hh:mm:ss.s +dd:mm:ss.s" in any order)
    #[structopt(short = "e", long = "eq-crds", allow_hyphen_values = true)]
    eq_crds: Option<String>,

    /// Set the input horizontal coordinates ("azimuth zenith-distance" in degrees)
    #[structopt(short = "a", long = "hor-crds", allow_hyphen_values = true)]
    hor_crds: Option<String>,

    /// Toggle the azimuth reverse
    #[structopt(short = "R", long = "az-reverse")]
    az_reverse: bool,

    /// Stop the telescope
    #[structopt(short = "S", long = "stop-tel")]
    stop_tel: bool,

    /// Go to the last entered RA/Dec
    #[structopt(short = "G", long)]
    gotoradec: bool,

    /// Go to the last entered A/Z
    #[structopt(short = "A", long)]
    gotoaz: bool,

    /// Epoch of the given RA/Dec as a Julian year, "now" when given without a value. J2000.0
    /// when omitted
    #[structopt(short = "E", long)]
    epoch: Option<Option<String>>,

    /// Proper motion in right ascension (mas/year)
    #[structopt(short = "x", long = "pm-ra", default_value = "0", allow_hyphen_values = true)]
    pm_ra: f64,

    /// Proper motion in declination (mas/year)
    #[structopt(short = "y", long = "pm-decl", default_value = "0", allow_hyphen_values = true)]
    pm_decl: f64,

    /// Turn the pointing correction system off
    #[structopt(short = "O", long = "pcs-off")]
    pcs_off: bool,

    /// Run an A/Z correction, "dA,dZ" in arcseconds
    #[structopt(long = "az-corr", allow_hyphen_values = true)]
    az_corr: Option<String>,

    /// Run an RA/Dec correction, "dRA,dDec" in arcseconds
    #[structopt(long = "rad-corr", allow_hyphen_values = true)]
    rad_corr: Option<String>,

    /// Report the telescope state (coords, extcrds, time, acs or all, default all)
    #[structopt(short = "I", long = "get-info")]
    get_info: Option<Option<String>>,

    /// Only show warnings and errors
    #[structopt(short, long)]
    quiet: bool,

    /// Show every message
    #[structopt(short, long)]
    verbose: bool,

    /// Run against an emulated ACS instead of the telescope
    #[structopt(long)]
    emulate: bool,

    /// Parameter file, by default tel_exec.toml in the parameters directory
    #[structopt(long, parse(from_os_str))]
    params: Option<PathBuf>,

    /// Directory in which a session log is written
    #[structopt(long = "log-dir", parse(from_os_str))]
    log_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    let status = run(opts)?;

    std::process::exit(status)
}

/// Run the requested operations, returning the exit status.
fn run(opts: Opts) -> Result<i32, Report> {

    // ---- EARLY INITIALISATION ----

    let session = Session::new("tel_exec", opts.log_dir.as_ref())
        .wrap_err("Failed to create the session")?;

    let level = match (opts.quiet, opts.verbose) {
        (_, true) => LevelFilter::Trace,
        (true, false) => LevelFilter::Warn,
        (false, false) => LevelFilter::Info,
    };
    logger_init(level, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("BTA Telescope Executable\n");
    debug!("CLI arguments: {:#?}", opts);

    // ---- BUILD THE PLAN ----

    let info_level = match opts.get_info {
        None => None,
        Some(None) => Some(InfoLevel::ALL),
        Some(Some(ref s)) => {
            let lvl = InfoLevel::parse(s);
            if lvl.is_empty() {
                println!("Information levels: {}", InfoLevel::names());
                return Ok(EXIT_SUCCESS)
            }
            Some(lvl)
        }
    };

    let plan = Plan {
        stop: opts.stop_tel,
        eq_coords: opts.eq_crds.clone(),
        hor_coords: opts.hor_crds.clone(),
        p2_move: opts.p2move.clone(),
        p2_mode: opts.p2mode.clone(),
        focus_mm: opts.focmove,
        az_reverse: opts.az_reverse,
        pcs_off: opts.pcs_off,
        goto_radec: opts.gotoradec,
        goto_azimz: opts.gotoaz,
        az_corr: opts.az_corr.clone(),
        rad_corr: opts.rad_corr.clone(),
        info: info_level,
    };

    if !plan.needs_connection() {
        info!("Nothing to do");
        return Ok(EXIT_SUCCESS)
    }

    let epoch = match opts.epoch {
        None => Epoch::J2000,
        Some(None) => Epoch::Now,
        Some(Some(ref s)) => s.parse().wrap_err("Invalid epoch")?,
    };

    let options = OpOptions {
        force: opts.force,
        epoch,
        pm_ra_mas_yr: opts.pm_ra,
        pm_dec_mas_yr: opts.pm_decl,
    };

    // ---- LOAD PARAMETERS ----

    let params: TelExecParams = match opts.params {
        Some(ref path) => util::params::load_path(path)
            .wrap_err_with(|| format!("Could not load the parameters from {:?}", path))?,
        None => match util::params::load(PARAMS_FILE) {
            Ok(p) => p,
            Err(e) => {
                warn!("Using the default parameters ({})", e);
                TelExecParams::default()
            }
        },
    };

    info!("Exec parameters loaded");

    // ---- CONNECT TO THE ACS ----

    let zmq_ctx;
    let link;
    let sim;

    let (state, queue): (&dyn StateProvider, &dyn CommandQueue) = match opts.emulate {
        true => {
            info!("Running against the emulated ACS");
            sim = SimAcs::new(&params);
            (&sim, &sim)
        },
        false => {
            zmq_ctx = zmq::Context::new();
            link = AcsLink::new(&zmq_ctx, &params.acs)
                .wrap_err("Failed to connect to the ACS")?;
            (&link, &link)
        }
    };

    info!("Testing the ACS connection");
    check_heartbeat(
        state,
        params.timing.heartbeat_timeout_s,
        params.timing.heartbeat_min_advance_s,
        params.timing.poll_interval_s,
    ).wrap_err("There's no connection to the BTA")?;

    // ---- EXECUTE ----

    let astrom = NativeAstrometry;
    let mut orc = Orchestrator::new(state, queue, &astrom, params, options);

    let status = dispatch::execute(&mut orc, &plan);

    match status {
        EXIT_SUCCESS => info!("All operations succeeded"),
        _ => warn!("Some operations failed"),
    }

    Ok(status)
}
