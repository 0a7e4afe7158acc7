use std::path::PathBuf;

use clap::Parser;

use crate::config::{BusyPolicy, Config};

#[derive(Parser, Debug, Default)]
#[command(name = "sitegen", version, about = "Web code generation backend over a local Ollama server")]
pub struct Args {
    /// TOML config file; values here override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub ollama_url: Option<String>,

    /// Default model for requests that do not name one.
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub timeout_secs: Option<u64>,

    #[arg(long, value_enum)]
    pub busy_policy: Option<BusyPolicy>,

    /// Answer with canned artifacts without contacting Ollama.
    #[arg(long, default_value_t = false)]
    pub mock: bool,

    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

impl Args {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(host) = &self.host {
            cfg.host = host.clone();
        }
        if let Some(port) = self.port {
            cfg.port = port;
        }
        if let Some(url) = &self.ollama_url {
            cfg.ollama_url = url.clone();
        }
        if let Some(model) = &self.model {
            cfg.default_model = model.clone();
        }
        if let Some(secs) = self.timeout_secs {
            cfg.timeout_secs = secs;
        }
        if let Some(policy) = self.busy_policy {
            cfg.busy_policy = policy;
        }
        cfg.mock |= self.mock;
        cfg.debug |= self.debug;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "sitegen", "--port", "9000", "--model", "gpt-oss-20b", "--busy-policy", "reject", "--mock",
        ]);
        let mut cfg = Config::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.default_model, "gpt-oss-20b");
        assert_eq!(cfg.busy_policy, BusyPolicy::Reject);
        assert!(cfg.mock);
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let mut cfg = Config { mock: true, ..Config::default() };
        Args::parse_from(["sitegen"]).apply(&mut cfg);
        assert!(cfg.mock);
        assert_eq!(cfg.timeout_secs, 300);
    }

    #[test]
    fn busy_policy_flag_uses_config_names() {
        let args = Args::try_parse_from(["sitegen", "--busy-policy", "queue"]).unwrap();
        assert_eq!(args.busy_policy, Some(BusyPolicy::Queue));
        assert!(Args::try_parse_from(["sitegen", "--busy-policy", "drop"]).is_err());
    }
}
