mod cli;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use rulegraph_core::{SessionBuilder, load_scenario_file};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default)]
struct Options {
    scenario: Option<PathBuf>,
    seed: Option<u64>,
    ask: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rulegraph_core=info,rulegraph_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = parse_options(std::env::args().skip(1))?;
    let scenario_path = match options.scenario {
        Some(path) => path,
        None => resolve_scenario_path()?,
    };

    let scenario = load_scenario_file(&scenario_path).with_context(|| {
        format!(
            "シナリオの読み込みに失敗しました: {}",
            scenario_path.display()
        )
    })?;

    let mut builder = SessionBuilder::new(scenario);
    if let Some(seed) = options.seed {
        builder = builder.with_seed(seed);
    }
    let mut session = builder.build();

    cli::run(&mut session, options.ask)
}

fn parse_options<I>(args: I) -> Result<Options>
where
    I: IntoIterator<Item = String>,
{
    let mut options = Options::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| anyhow!("--seed には数値を指定してください。"))?;
                let seed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("シード値は整数で指定してください: {value}"))?;
                options.seed = Some(seed);
            }
            "--ask" => options.ask = true,
            flag if flag.starts_with("--") => bail!("未知のオプションです: {flag}"),
            path => {
                if options.scenario.is_some() {
                    bail!("シナリオファイルは1つだけ指定してください。");
                }
                options.scenario = Some(PathBuf::from(path));
            }
        }
    }
    Ok(options)
}

fn resolve_scenario_path() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("カレントディレクトリの取得に失敗しました")?;
    let candidates = [
        cwd.join("config").join("scenarios").join("default.yaml"),
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("config")
            .join("scenarios")
            .join("default.yaml"),
    ];

    for path in candidates {
        if path.exists() {
            return Ok(path);
        }
    }

    bail!(
        "シナリオファイルが見つかりません。config/scenarios/default.yaml を配置するか、パスを引数で指定してください。"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn options_accept_path_seed_and_ask() {
        let options = parse_options(args(&["maps/war.json", "--seed", "42", "--ask"])).unwrap();
        assert_eq!(options.scenario, Some(PathBuf::from("maps/war.json")));
        assert_eq!(options.seed, Some(42));
        assert!(options.ask);
    }

    #[test]
    fn options_reject_bad_seed_and_unknown_flags() {
        assert!(parse_options(args(&["--seed", "abc"])).is_err());
        assert!(parse_options(args(&["--seed"])).is_err());
        assert!(parse_options(args(&["--verbose"])).is_err());
        assert!(parse_options(args(&["a.yaml", "b.yaml"])).is_err());
    }
}
