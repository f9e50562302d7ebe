use std::{
    collections::HashMap,
    fmt::{Display, Formatter},
    net::SocketAddr,
};

use crate::rewrite::{Eligibility, RewriteRule};

pub struct Config {
    pub listen_addr: SocketAddr,
    pub s3_bucket: String,
    /// Prefix that replaces `s3://<bucket>` in index files. Empty disables
    /// rewriting.
    pub replace_http_path: String,
    pub rewrite_suffixes: Vec<String>,
    pub upstream_endpoint: Option<String>,
    pub upstream_region: Option<String>,
    pub upstream_access_key_id: Option<String>,
    pub upstream_secret_access_key: Option<String>,
    pub worker_threads: usize,
    pub otel_grpc_endpoint_url: Option<String>,
    pub prometheus_textfile_dir: Option<String>,
}

impl Config {
    pub fn from_env(vars: &HashMap<String, String>) -> Self {
        let config = Self {
            listen_addr: vars
                .get("LISTEN_ADDR")
                .map(|s| parse_listen_addr(s).expect("invalid LISTEN_ADDR"))
                .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 8080))),
            s3_bucket: vars
                .get("S3_BUCKET")
                .cloned()
                .expect("S3_BUCKET is required"),
            replace_http_path: vars.get("REPLACE_HTTP_PATH").cloned().unwrap_or_default(),
            rewrite_suffixes: vars
                .get("REWRITE_SUFFIXES")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|suffix| !suffix.is_empty())
                        .map(str::to_owned)
                        .collect()
                })
                .unwrap_or_else(|| vec![".yaml".to_string()]),
            upstream_endpoint: non_empty(vars, "UPSTREAM_ENDPOINT"),
            upstream_region: non_empty(vars, "UPSTREAM_REGION"),
            upstream_access_key_id: non_empty(vars, "UPSTREAM_ACCESS_KEY_ID"),
            upstream_secret_access_key: non_empty(vars, "UPSTREAM_SECRET_ACCESS_KEY"),
            worker_threads: vars
                .get("WORKER_THREADS")
                .map(|s| s.parse().expect("invalid WORKER_THREADS"))
                .unwrap_or(4),
            otel_grpc_endpoint_url: non_empty(vars, "OTEL_GRPC_ENDPOINT_URL"),
            prometheus_textfile_dir: non_empty(vars, "PROMETHEUS_TEXTFILE_DIR"),
        };

        config.validate();
        config
    }

    fn validate(&self) {
        if self.s3_bucket.is_empty() {
            panic!("Invalid configuration: S3_BUCKET must not be empty");
        }

        if self.rewrite_suffixes.is_empty() {
            panic!("Invalid configuration: REWRITE_SUFFIXES must name at least one suffix");
        }

        if self.upstream_access_key_id.is_some() != self.upstream_secret_access_key.is_some() {
            panic!(
                "Invalid configuration: UPSTREAM_ACCESS_KEY_ID and UPSTREAM_SECRET_ACCESS_KEY must be set together"
            );
        }

        if self.worker_threads == 0 {
            panic!("Invalid configuration: worker_threads must be greater than 0");
        }
    }

    pub fn eligibility(&self) -> Eligibility {
        Eligibility::from_suffixes(self.rewrite_suffixes.iter().cloned())
    }

    pub fn rewrite_rule(&self) -> Option<RewriteRule> {
        RewriteRule::new(&self.s3_bucket, &self.replace_http_path)
    }
}

/// Accepts a full socket address or a bare `:port`, which listens on all
/// interfaces.
fn parse_listen_addr(value: &str) -> Result<SocketAddr, std::net::AddrParseError> {
    match value.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}").parse(),
        None => value.parse(),
    }
}

fn non_empty(vars: &HashMap<String, String>, name: &str) -> Option<String> {
    vars.get(name).filter(|value| !value.is_empty()).cloned()
}

impl Display for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Config{{ listen_addr: {}, s3_bucket: {}, replace_http_path: {:?}, \
             rewrite_suffixes: {:?}, upstream_endpoint: {:?}, upstream_region: {:?}, \
             static_credentials: {}, worker_threads: {}, otel_grpc_endpoint_url: {:?}, \
             prometheus_textfile_dir: {:?} }}",
            self.listen_addr,
            self.s3_bucket,
            self.replace_http_path,
            self.rewrite_suffixes,
            self.upstream_endpoint,
            self.upstream_region,
            self.upstream_access_key_id.is_some(),
            self.worker_threads,
            self.otel_grpc_endpoint_url,
            self.prometheus_textfile_dir,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_env() -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("S3_BUCKET".to_string(), "mybucket".to_string());
        env
    }

    #[test]
    fn config_defaults() {
        let config = Config::from_env(&minimal_env());
        assert_eq!(config.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.s3_bucket, "mybucket");
        assert_eq!(config.replace_http_path, "");
        assert_eq!(config.rewrite_suffixes, vec![".yaml".to_string()]);
        assert_eq!(config.worker_threads, 4);
        assert!(config.upstream_endpoint.is_none());
        assert!(config.rewrite_rule().is_none());
    }

    #[test]
    fn config_listen_addr() {
        let mut env = minimal_env();
        env.insert("LISTEN_ADDR".to_string(), "127.0.0.1:9000".to_string());
        let config = Config::from_env(&env);
        assert_eq!(config.listen_addr, "127.0.0.1:9000".parse().unwrap());
    }

    #[test]
    fn config_listen_addr_bare_port() {
        let mut env = minimal_env();
        env.insert("LISTEN_ADDR".to_string(), ":9090".to_string());
        let config = Config::from_env(&env);
        assert_eq!(config.listen_addr, "0.0.0.0:9090".parse().unwrap());
    }

    #[test]
    #[should_panic(expected = "invalid LISTEN_ADDR")]
    fn config_listen_addr_bad_port() {
        let mut env = minimal_env();
        env.insert("LISTEN_ADDR".to_string(), ":http".to_string());
        Config::from_env(&env);
    }

    #[test]
    fn config_rewrite_rule() {
        let mut env = minimal_env();
        env.insert(
            "REPLACE_HTTP_PATH".to_string(),
            "https://cdn.example.com".to_string(),
        );
        let config = Config::from_env(&env);

        let rule = config.rewrite_rule().unwrap();
        assert_eq!(rule.pattern(), "s3://mybucket/");
    }

    #[test]
    fn config_rewrite_suffixes() {
        let mut env = minimal_env();
        env.insert("REWRITE_SUFFIXES".to_string(), ".yaml, .json,".to_string());
        let config = Config::from_env(&env);

        assert_eq!(config.rewrite_suffixes, vec![".yaml", ".json"]);
        assert!(config.eligibility().is_eligible("/index.json"));
    }

    #[test]
    fn config_display_hides_secret() {
        let mut env = minimal_env();
        env.insert("UPSTREAM_ACCESS_KEY_ID".to_string(), "AKIA".to_string());
        env.insert(
            "UPSTREAM_SECRET_ACCESS_KEY".to_string(),
            "supersecret".to_string(),
        );
        let config = Config::from_env(&env);

        let rendered = config.to_string();
        assert!(rendered.contains("static_credentials: true"));
        assert!(!rendered.contains("supersecret"));
    }

    #[test]
    #[should_panic(expected = "S3_BUCKET is required")]
    fn config_missing_bucket() {
        Config::from_env(&HashMap::new());
    }

    #[test]
    #[should_panic(expected = "S3_BUCKET must not be empty")]
    fn config_empty_bucket() {
        let mut env = HashMap::new();
        env.insert("S3_BUCKET".to_string(), String::new());
        Config::from_env(&env);
    }

    #[test]
    #[should_panic(expected = "REWRITE_SUFFIXES")]
    fn config_blank_suffixes() {
        let mut env = minimal_env();
        env.insert("REWRITE_SUFFIXES".to_string(), " , ".to_string());
        Config::from_env(&env);
    }

    #[test]
    #[should_panic(expected = "must be set together")]
    fn config_half_credentials() {
        let mut env = minimal_env();
        env.insert("UPSTREAM_ACCESS_KEY_ID".to_string(), "AKIA".to_string());
        Config::from_env(&env);
    }

    #[test]
    #[should_panic(expected = "worker_threads")]
    fn config_zero_worker_threads() {
        let mut env = minimal_env();
        env.insert("WORKER_THREADS".to_string(), "0".to_string());
        Config::from_env(&env);
    }
}
