use std::ffi::OsString;

use anyhow::{Context, Result};
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use log::*;

use read_sensor::{
    dispatch::{self, Mode, Request, SensorType, Selection},
    i2c::{Bus, LinuxBus},
    SensorError,
};

const COPYRIGHT: &str = "Copyright (c) 2019 MinenoLab.\nCopyright (c) 2019 Akihisa ONODA";

#[derive(Parser, Debug)]
#[command(
    name = "read_sensor",
    disable_help_flag = true,
    disable_version_flag = true,
    args_override_self = true
)]
struct Args {
    /// Sensor type
    #[arg(short = 't', long = "type", allow_hyphen_values = true, action = ArgAction::Append)]
    sensor: Vec<String>,

    /// Sensor instance, digits only
    #[arg(short, long, allow_hyphen_values = true, action = ArgAction::Append)]
    id: Vec<String>,

    /// What to measure
    #[arg(short, long, allow_hyphen_values = true, action = ArgAction::Append)]
    mode: Vec<String>,

    #[arg(short, long, action = ArgAction::SetTrue)]
    version: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    help: bool,
}

#[derive(Debug, PartialEq)]
enum Action {
    Version,
    Usage,
    Measure(Request),
}

impl Args {
    /// Options take effect in command line order, and whichever of
    /// `--version`/`--help` comes first wins.
    fn action(&self, matches: &ArgMatches) -> Action {
        match (self.version, self.help) {
            (true, true) if matches.index_of("version") < matches.index_of("help") => {
                Action::Version
            }
            (true, false) => Action::Version,
            (_, true) => Action::Usage,
            (false, false) => Action::Measure(self.request(matches)),
        }
    }

    fn request(&self, matches: &ArgMatches) -> Request {
        let mut out = Vec::new();
        ordered(&mut out, matches, "sensor", &self.sensor, Selection::Sensor);
        ordered(&mut out, matches, "id", &self.id, Selection::Id);
        ordered(&mut out, matches, "mode", &self.mode, Selection::Mode);
        out.sort_by_key(|(index, _)| *index);
        Request::from_selections(out.into_iter().map(|(_, selection)| selection))
    }
}

/// Pairs each value of `id` with its position on the command line.
fn ordered<'a>(
    selections: &mut Vec<(usize, Selection<'a>)>,
    matches: &ArgMatches,
    id: &str,
    values: &'a [String],
    select: impl Fn(&'a str) -> Selection<'a>,
) {
    if let Some(indices) = matches.indices_of(id) {
        for (index, value) in indices.zip(values) {
            selections.push((index, select(value.as_str())));
        }
    }
}

fn parse<I, T>(argv: I) -> Result<Action, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = Args::command().try_get_matches_from(argv)?;
    let args = Args::from_arg_matches(&matches)?;
    Ok(args.action(&matches))
}

fn main() {
    let env = env_logger::Env::default().default_filter_or("warn");
    env_logger::Builder::from_env(env).init();

    let request = match parse(std::env::args_os()).unwrap_or_else(|e| e.exit()) {
        Action::Version => {
            println!("{}", version());
            return;
        }
        Action::Usage => {
            println!("{}", usage());
            return;
        }
        Action::Measure(request) => request,
    };
    debug!("main: {:?}", request);

    let mut bus = LinuxBus::new();
    let code = match run(&mut bus, &request) {
        Ok(value) => {
            println!("{}", dispatch::format_reading(value));
            0
        }
        Err(err) => {
            warn!("{:#}", err);
            err.downcast_ref::<SensorError>()
                .map_or(SensorError::NoMeasurement.code(), |e| e.code())
        }
    };
    std::process::exit(code);
}

fn run<B: Bus>(bus: &mut B, request: &Request) -> Result<f64> {
    dispatch::measure(bus, request)
        .with_context(|| format!("failed to read {}", request))
}

fn version() -> String {
    format!(
        "read_sensor version {}\n{}",
        env!("CARGO_PKG_VERSION"),
        COPYRIGHT
    )
}

fn usage() -> String {
    let ids = if cfg!(feature = "s1133") { "0-1" } else { "0" };
    let types: Vec<_> = SensorType::ALL.iter().map(|t| t.token()).collect();
    let modes: Vec<_> = Mode::ALL.iter().map(|m| m.token()).collect();
    let params = if types.is_empty() {
        ""
    } else {
        " [-t type] [-i id] [-m mode]"
    };
    let indent = " ".repeat(19);
    format!(
        "Usage: read_sensor [-hv]{}\n{indent}type = {},\n{indent}id = {},\n{indent}mode = {}",
        params,
        types.join(" / "),
        ids,
        modes.join(" / "),
        indent = indent
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(argv: &[&str]) -> Action {
        parse(argv.iter().copied()).unwrap()
    }

    fn measure_request(argv: &[&str]) -> Request {
        match action(argv) {
            Action::Measure(request) => request,
            other => panic!("expected a measurement, got {:?}", other),
        }
    }

    #[test]
    fn short_options() {
        let request = measure_request(&["read_sensor", "-t", "sht25", "-i", "0", "-m", "temp"]);
        assert_eq!(
            request,
            Request::from_tokens(Some("sht25"), Some("0"), Some("temp"))
        );
    }

    #[test]
    fn last_option_wins() {
        let request = measure_request(&["read_sensor", "--type", "sht25", "--type", "s1133"]);
        assert_eq!(request.sensor, SensorType::from_token("s1133"));
    }

    #[cfg(feature = "s1133")]
    #[test]
    fn negative_id_reaches_the_driver() {
        let request = measure_request(&["read_sensor", "-t", "s1133", "-i", "-1"]);
        assert_eq!(request.id, None);

        let mut bus = LinuxBus::with_path("/nonexistent/i2c-42");
        let err = run(&mut bus, &request).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SensorError>(),
            Some(&SensorError::UnknownId)
        );
    }

    #[cfg(all(feature = "s1133", feature = "sht25"))]
    #[test]
    fn type_after_mode_selects_lux() {
        let request = measure_request(&["read_sensor", "-m", "temp", "-t", "s1133", "-i", "0"]);
        assert_eq!(request.mode, Some(Mode::Lux));

        let request = measure_request(&["read_sensor", "-t", "s1133", "-m", "temp", "-i", "0"]);
        assert_eq!(request.mode, Some(Mode::Temperature));
    }

    #[test]
    fn first_of_help_and_version_wins() {
        assert_eq!(action(&["read_sensor", "-h"]), Action::Usage);
        assert_eq!(action(&["read_sensor", "--version"]), Action::Version);
        assert_eq!(action(&["read_sensor", "-h", "-v"]), Action::Usage);
        assert_eq!(action(&["read_sensor", "-v", "-h"]), Action::Version);
        assert_eq!(
            action(&["read_sensor", "-t", "bogus", "-i", "x", "-v"]),
            Action::Version
        );
    }

    #[test]
    fn version_text() {
        assert_eq!(
            version(),
            "read_sensor version 1.0.0\n\
             Copyright (c) 2019 MinenoLab.\n\
             Copyright (c) 2019 Akihisa ONODA"
        );
    }

    #[cfg(all(feature = "s1133", feature = "sht25"))]
    #[test]
    fn usage_lists_everything() {
        let indent = " ".repeat(19);
        assert_eq!(
            usage(),
            format!(
                "Usage: read_sensor [-hv] [-t type] [-i id] [-m mode]\n\
                 {indent}type = s1133 / sht25,\n\
                 {indent}id = 0-1,\n\
                 {indent}mode = lux / temp / humi",
                indent = indent
            )
        );
    }
}
