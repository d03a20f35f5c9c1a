extern crate clap;
use std::{path::PathBuf, str::FromStr};
use clap::{App, Arg, ArgMatches};
use crate::{config::RunParams, math::*};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CliError {
    #[error("--{option}: cannot parse {value:?}")]
    InvalidValue { option: &'static str, value: String },
    #[error("missing dataset path")]
    MissingDataset,
}

pub fn build_cli() -> App<'static, 'static> {
    let dataset_arg = Arg::with_name("dataset")
        .required(true)
        .index(1)
        .help("TOML or JSON dataset describing the bodies");

    let rate_option = Arg::with_name("days-per-second")
        .long("days-per-second")
        .alias("dps")
        .short("d")
        .takes_value(true)
        .help("Simulated days per wall-clock second");

    let radius_option = Arg::with_name("radius")
        .long("radius")
        .short("r")
        .takes_value(true)
        .help("Initial view radius, Gm");

    let fps_option = Arg::with_name("fps")
        .long("fps")
        .alias("framerate")
        .short("f")
        .takes_value(true)
        .help("Reports per second, 0 disables the report");

    let first_day_option = Arg::with_name("first-day")
        .long("first-day")
        .takes_value(true);

    let last_day_option = Arg::with_name("last-day")
        .long("last-day")
        .short("l")
        .takes_value(true);

    let timestep_option = Arg::with_name("timestep")
        .long("timestep")
        .takes_value(true)
        .help("Largest integration step, s");

    App::new("gsim")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Real-time N-body gravity simulation")
        .arg(dataset_arg)
        .arg(rate_option)
        .arg(radius_option)
        .arg(fps_option)
        .arg(first_day_option)
        .arg(last_day_option)
        .arg(timestep_option)
        .arg(Arg::with_name("unpaced").long("unpaced").short("u").help("Run as fast as possible"))
}

pub fn parse_command_line() -> ArgMatches<'static> {
    build_cli().get_matches()
}

pub fn dataset_path(matches: &ArgMatches) -> Result<PathBuf, CliError> {
    matches.value_of("dataset").map(PathBuf::from).ok_or(CliError::MissingDataset)
}

fn parse_value<T: FromStr>(matches: &ArgMatches, option: &'static str) -> Result<Option<T>, CliError> {
    match matches.value_of(option) {
        Some(value) => value.parse::<T>()
            .map(Some)
            .map_err(|_| CliError::InvalidValue { option, value: value.to_string() }),
        None => Ok(None),
    }
}

/// Overrides the dataset's run parameters with whatever was given on the command line
pub fn apply_overrides(matches: &ArgMatches, params: &mut RunParams) -> Result<(), CliError> {
    if let Some(rate) = parse_value::<f64>(matches, "days-per-second")? {
        params.days_per_second = rate;
    }
    if let Some(radius) = parse_value::<f64>(matches, "radius")? {
        params.view_radius = Length(radius);
    }
    if let Some(fps) = parse_value::<f64>(matches, "fps")? {
        params.report_frequency = Frequency::hertz(fps);
    }
    if let Some(day) = parse_value::<u32>(matches, "first-day")? {
        params.first_day = day;
    }
    if let Some(day) = parse_value::<u32>(matches, "last-day")? {
        params.last_day = day;
    }
    if let Some(seconds) = parse_value::<f64>(matches, "timestep")? {
        params.max_timestep = Time::seconds(seconds);
    }
    if matches.is_present("unpaced") {
        params.paced = false;
    }
    Ok(())
}
