use askbridge_core::config::{AppConfig, LoadOptions};
use askbridge_db::connect_with_settings;
use serde::Serialize;

use crate::commands::{block_on, CommandOutput};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum Verdict {
    Pass,
    Fail,
    Skipped,
}

impl Verdict {
    fn label(self) -> &'static str {
        match self {
            Self::Pass => "ok",
            Self::Fail => "fail",
            Self::Skipped => "skip",
        }
    }
}

#[derive(Debug, Serialize)]
struct ReadinessCheck {
    name: &'static str,
    verdict: Verdict,
    detail: String,
}

#[derive(Debug, Serialize)]
struct ReadinessReport {
    healthy: bool,
    checks: Vec<ReadinessCheck>,
}

pub fn run(json_output: bool) -> CommandOutput {
    let report = assess();
    let exit_code = if report.healthy { 0 } else { 1 };

    if json_output {
        let rendered = serde_json::to_string_pretty(&report)
            .unwrap_or_else(|error| format!(r#"{{"healthy":false,"error":"{error}"}}"#));
        return CommandOutput { exit_code, lines: vec![rendered] };
    }

    let mut lines = vec![if report.healthy {
        "doctor: all readiness checks passed".to_owned()
    } else {
        "doctor: one or more readiness checks failed".to_owned()
    }];
    for check in &report.checks {
        lines.push(format!("  [{}] {}: {}", check.verdict.label(), check.name, check.detail));
    }

    CommandOutput { exit_code, lines }
}

fn assess() -> ReadinessReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(ReadinessCheck {
                name: "config",
                verdict: Verdict::Pass,
                detail: "configuration loaded and validated".to_owned(),
            });
            checks.push(relay_readiness(&config));
            checks.push(database_readiness(&config));
        }
        Err(error) => {
            checks.push(ReadinessCheck {
                name: "config",
                verdict: Verdict::Fail,
                detail: error.to_string(),
            });
            for name in ["relay_credentials", "database"] {
                checks.push(ReadinessCheck {
                    name,
                    verdict: Verdict::Skipped,
                    detail: "configuration did not load".to_owned(),
                });
            }
        }
    }

    let healthy = checks.iter().all(|check| check.verdict != Verdict::Fail);
    ReadinessReport { healthy, checks }
}

// Missing relay credentials are a supported mode (listener stays stopped),
// so this check informs rather than fails.
fn relay_readiness(config: &AppConfig) -> ReadinessCheck {
    let detail = match &config.relay.app_id {
        Some(app_id) => format!("credentials configured for app `{app_id}`"),
        None => "not configured; the relay listener will stay stopped".to_owned(),
    };
    ReadinessCheck { name: "relay_credentials", verdict: Verdict::Pass, detail }
}

fn database_readiness(config: &AppConfig) -> ReadinessCheck {
    let connected = block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| error.to_string())?;
        pool.close().await;
        Ok::<(), String>(())
    });

    match connected {
        Ok(Ok(())) => ReadinessCheck {
            name: "database",
            verdict: Verdict::Pass,
            detail: format!("reachable at `{}`", config.database.url),
        },
        Ok(Err(detail)) | Err(detail) => {
            ReadinessCheck { name: "database", verdict: Verdict::Fail, detail }
        }
    }
}
