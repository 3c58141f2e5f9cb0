use std::path::PathBuf;

use clap::{value_t, value_t_or_exit, App, AppSettings, Arg, ErrorKind, SubCommand};

const CELLAR_USAGE: &str = "\
EXAMPLES:
  cellar append --group Benchmarks --input bench.txt --commit commit.json \\
                --store dev/bench/data.js
  cellar check --group Benchmarks --threshold 0.1 --store dev/bench/data.js";

#[derive(Clone, Debug)]
pub enum Command {
    Append {
        group: String,
        input: PathBuf,
        store: PathBuf,
        commit: PathBuf,
        tool: String,
        repo_url: String,
        date: Option<i64>,
        lock_retries: u32,
    },
    Check {
        group: String,
        store: PathBuf,
        threshold: Option<f64>,
        config: Option<PathBuf>,
        baseline: Option<String>,
        verbose: bool,
    },
    Groups {
        store: PathBuf,
    },
}

pub fn parse_args() -> Command {
    let store_arg = Arg::with_name("store")
        .long("store")
        .takes_value(true)
        .required(true)
        .value_name("SNAPSHOT")
        .help("Path to the history snapshot file (data.js or plain JSON)");
    let group_arg = Arg::with_name("group")
        .long("group")
        .takes_value(true)
        .required(true)
        .value_name("NAME")
        .help("Benchmark group (suite) name, e.g. \"Benchmarks\"");

    let args = App::new("cellar")
        .version("0.1.0")
        .about("Keeps a history of benchmark results per commit and checks it for regressions.")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("append")
                .about("Record one benchmark run for a commit")
                .arg(group_arg.clone())
                .arg(store_arg.clone())
                .arg(
                    Arg::with_name("input")
                        .long("input")
                        .takes_value(true)
                        .required(true)
                        .value_name("RESULTS")
                        .help("Raw benchmark harness output to ingest"),
                )
                .arg(
                    Arg::with_name("commit")
                        .long("commit")
                        .takes_value(true)
                        .required(true)
                        .value_name("COMMIT_JSON")
                        .help("JSON file with the commit object the results were taken from"),
                )
                .arg(
                    Arg::with_name("tool")
                        .long("tool")
                        .takes_value(true)
                        .default_value("cargo")
                        .possible_values(&["cargo", "json"])
                        .help("Harness that produced the input"),
                )
                .arg(
                    Arg::with_name("repo_url")
                        .long("repo-url")
                        .takes_value(true)
                        .help("Repository URL to seed a newly created snapshot with"),
                )
                .arg(
                    Arg::with_name("date")
                        .long("date")
                        .takes_value(true)
                        .value_name("EPOCH_MILLIS")
                        .help("Ingestion instant; defaults to now"),
                )
                .arg(
                    Arg::with_name("lock_retries")
                        .long("lock-retries")
                        .takes_value(true)
                        .default_value("5")
                        .help("Lock acquisition attempts before giving up with exit code 3"),
                ),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Compare the two most recent entries of a group")
                .arg(group_arg.clone())
                .arg(store_arg.clone())
                .arg(
                    Arg::with_name("threshold")
                        .long("threshold")
                        .takes_value(true)
                        .value_name("FRACTION")
                        .help(
                            "Relative worsening above which a result is a regression \
                             (0.1 = +10%); overrides the config file",
                        ),
                )
                .arg(
                    Arg::with_name("config")
                        .long("config")
                        .takes_value(true)
                        .value_name("TOML")
                        .help("Thresholds and unit polarities (cellar.toml)"),
                )
                .arg(
                    Arg::with_name("baseline")
                        .long("baseline")
                        .takes_value(true)
                        .value_name("COMMIT_ID")
                        .help("Compare against this commit instead of the direct predecessor"),
                )
                .arg(
                    Arg::with_name("verbose")
                        .long("verbose")
                        .help("Also print improvements and added/removed benchmarks"),
                ),
        )
        .subcommand(
            SubCommand::with_name("groups")
                .about("List group names in publishing order")
                .arg(store_arg.clone()),
        )
        .after_help(CELLAR_USAGE)
        .get_matches();

    match args.subcommand() {
        ("append", Some(m)) => Command::Append {
            group: String::from(m.value_of("group").unwrap()),
            input: PathBuf::from(m.value_of("input").unwrap()),
            store: PathBuf::from(m.value_of("store").unwrap()),
            commit: PathBuf::from(m.value_of("commit").unwrap()),
            tool: String::from(m.value_of("tool").unwrap()),
            repo_url: m.value_of("repo_url").map(String::from).unwrap_or_default(),
            date: match value_t!(m, "date", i64) {
                Ok(ms) => Some(ms),
                Err(e) => match e.kind {
                    ErrorKind::ArgumentNotFound => None,
                    _ => e.exit(),
                },
            },
            lock_retries: value_t_or_exit!(m, "lock_retries", u32),
        },
        ("check", Some(m)) => Command::Check {
            group: String::from(m.value_of("group").unwrap()),
            store: PathBuf::from(m.value_of("store").unwrap()),
            threshold: match value_t!(m, "threshold", f64) {
                Ok(t) => Some(t),
                Err(e) => match e.kind {
                    ErrorKind::ArgumentNotFound => None,
                    _ => e.exit(),
                },
            },
            config: m.value_of("config").map(PathBuf::from),
            baseline: m.value_of("baseline").map(String::from),
            verbose: m.is_present("verbose"),
        },
        ("groups", Some(m)) => Command::Groups {
            store: PathBuf::from(m.value_of("store").unwrap()),
        },
        _ => unreachable!("clap enforces a known subcommand"),
    }
}
